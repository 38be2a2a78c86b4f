use glam::Vec3;

use super::Mesh;

/// Outward normal plus the two in-plane axes of each face, wound counter-clockwise.
const FACES: [(Vec3, Vec3, Vec3); 6] = [
    (Vec3::Z, Vec3::X, Vec3::Y),
    (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
    (Vec3::NEG_X, Vec3::Z, Vec3::Y),
    (Vec3::X, Vec3::NEG_Z, Vec3::Y),
    (Vec3::NEG_Y, Vec3::X, Vec3::Z),
    (Vec3::Y, Vec3::X, Vec3::NEG_Z),
];

/// Axis-aligned box centered on the origin with the given edge lengths.
pub fn cube(size: Vec3) -> Mesh {
    let half = size * 0.5;
    let mut mesh = Mesh::default();
    for (normal, right, up) in FACES {
        let corners = [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)];
        let indices = corners.map(|(u, v)| {
            let position = (normal + right * u + up * v) * half;
            mesh.push_vertex(position, normal)
        });
        mesh.indices.extend_from_slice(&[
            indices[0], indices[1], indices[2], indices[0], indices[2], indices[3],
        ]);
    }
    mesh
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floor_slab_spans_requested_size() {
        let mesh = cube(Vec3::new(10.0, 0.5, 10.0));
        assert_eq!(mesh.vertex_count(), 24);
        assert_eq!(mesh.triangle_count(), 12);
        let (min, max) = mesh.bounds().unwrap();
        assert_eq!(min, Vec3::new(-5.0, -0.25, -5.0));
        assert_eq!(max, Vec3::new(5.0, 0.25, 5.0));
    }

    #[test]
    fn triangles_wind_toward_their_normals() {
        let mesh = cube(Vec3::ONE);
        for triangle in mesh.indices.chunks_exact(3) {
            let [a, b, c] = [0, 1, 2].map(|i| mesh.position(triangle[i] as usize));
            let face_normal = (b - a).cross(c - a).normalize();
            let vertex_normal = mesh.normal(triangle[0] as usize);
            assert!(face_normal.dot(vertex_normal) > 0.99);
        }
    }
}
