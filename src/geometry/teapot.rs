//! Utah teapot tessellated from its 32 bicubic Bezier patches.
//!
//! Twenty-four patches are surfaces of revolution (rim, body, lid and
//! bottom) built from a profile curve swept through four quadrants. The
//! handle and spout are listed explicitly for the `y <= 0` half and mirrored
//! across the XZ plane. Control data is Z-up as in the classic data set and is
//! converted to Y-up while tessellating.

use glam::{Vec2, Vec3};

use super::Mesh;

/// Ratio that makes a cubic Bezier quadrant approximate a circle.
const CIRCLE_HANDLE: f32 = 0.56;

/// Teapot height in data units; the mesh is scaled to unit height.
const DATA_HEIGHT: f32 = 3.15;

/// `(radius, height)` rows of each revolved section, top to bottom of a patch.
const REVOLVED: [[[f32; 2]; 4]; 6] = [
    // rim
    [[1.4, 2.4], [1.3375, 2.53125], [1.4375, 2.53125], [1.5, 2.4]],
    // upper body
    [[1.5, 2.4], [1.75, 1.875], [2.0, 1.35], [2.0, 0.9]],
    // lower body
    [[2.0, 0.9], [2.0, 0.45], [1.5, 0.225], [1.5, 0.15]],
    // lid knob
    [[0.0, 3.15], [0.8, 3.15], [0.0, 2.85], [0.2, 2.7]],
    // lid
    [[0.2, 2.7], [0.4, 2.55], [1.3, 2.55], [1.3, 2.4]],
    // bottom
    [[1.5, 0.15], [1.5, 0.075], [1.425, 0.0], [0.0, 0.0]],
];

/// Handle and spout control points for the `y <= 0` half, row major.
const SWEPT: [[[f32; 3]; 16]; 4] = [
    // upper handle
    [
        [-1.6, 0.0, 2.025], [-1.6, -0.3, 2.025], [-1.5, -0.3, 2.25], [-1.5, 0.0, 2.25],
        [-2.3, 0.0, 2.025], [-2.3, -0.3, 2.025], [-2.5, -0.3, 2.25], [-2.5, 0.0, 2.25],
        [-2.7, 0.0, 2.025], [-2.7, -0.3, 2.025], [-3.0, -0.3, 2.25], [-3.0, 0.0, 2.25],
        [-2.7, 0.0, 1.8], [-2.7, -0.3, 1.8], [-3.0, -0.3, 1.8], [-3.0, 0.0, 1.8],
    ],
    // lower handle
    [
        [-2.7, 0.0, 1.8], [-2.7, -0.3, 1.8], [-3.0, -0.3, 1.8], [-3.0, 0.0, 1.8],
        [-2.7, 0.0, 1.575], [-2.7, -0.3, 1.575], [-3.0, -0.3, 1.35], [-3.0, 0.0, 1.35],
        [-2.5, 0.0, 1.125], [-2.5, -0.3, 1.125], [-2.65, -0.3, 0.9375], [-2.65, 0.0, 0.9375],
        [-2.0, 0.0, 0.9], [-2.0, -0.3, 0.9], [-1.9, -0.3, 0.6], [-1.9, 0.0, 0.6],
    ],
    // spout body
    [
        [1.7, 0.0, 1.425], [1.7, -0.66, 1.425], [1.7, -0.66, 0.6], [1.7, 0.0, 0.6],
        [2.6, 0.0, 1.425], [2.6, -0.66, 1.425], [3.1, -0.66, 0.825], [3.1, 0.0, 0.825],
        [2.3, 0.0, 2.1], [2.3, -0.25, 2.1], [2.4, -0.25, 2.025], [2.4, 0.0, 2.025],
        [2.7, 0.0, 2.4], [2.7, -0.25, 2.4], [3.3, -0.25, 2.4], [3.3, 0.0, 2.4],
    ],
    // spout tip
    [
        [2.7, 0.0, 2.4], [2.7, -0.25, 2.4], [3.3, -0.25, 2.4], [3.3, 0.0, 2.4],
        [2.8, 0.0, 2.475], [2.8, -0.25, 2.475], [3.525, -0.25, 2.49375], [3.525, 0.0, 2.49375],
        [2.9, 0.0, 2.475], [2.9, -0.15, 2.475], [3.45, -0.15, 2.5125], [3.45, 0.0, 2.5125],
        [2.8, 0.0, 2.4], [2.8, -0.15, 2.4], [3.2, -0.15, 2.4], [3.2, 0.0, 2.4],
    ],
];

type Patch = [Vec3; 16];

/// Teapot of unit height centered on the origin, spout along +X.
///
/// Each patch is evaluated on a `(subdivisions + 1)^2` grid with analytic
/// normals, so patches do not share vertices.
pub fn teapot(subdivisions: u32) -> Mesh {
    let steps = subdivisions.max(1);
    let mut mesh = Mesh::default();
    for patch in patches() {
        tessellate(&patch, steps, &mut mesh);
    }
    mesh
}

fn patches() -> Vec<Patch> {
    let mut patches = Vec::with_capacity(32);
    for profile in REVOLVED {
        for quadrant in 0..4 {
            patches.push(revolve(&profile, quadrant));
        }
    }
    for half in SWEPT {
        let patch = half.map(|[x, y, z]| to_y_up(Vec3::new(x, y, z)));
        patches.push(mirror(&patch));
        patches.push(patch);
    }
    patches
}

/// Sweeps a profile through one quarter turn, clockwise seen from above.
fn revolve(profile: &[[f32; 2]; 4], quadrant: u32) -> Patch {
    let mut patch = [Vec3::ZERO; 16];
    for (row, &[radius, height]) in profile.iter().enumerate() {
        let k = radius * CIRCLE_HANDLE;
        let ring = [
            Vec2::new(radius, 0.0),
            Vec2::new(radius, -k),
            Vec2::new(k, -radius),
            Vec2::new(0.0, -radius),
        ];
        for (col, point) in ring.into_iter().enumerate() {
            let point = (0..quadrant).fold(point, |p, _| Vec2::new(p.y, -p.x));
            patch[row * 4 + col] = to_y_up(Vec3::new(point.x, point.y, height));
        }
    }
    patch
}

/// Reflects a patch across the XZ plane of the data set, keeping its orientation.
fn mirror(patch: &Patch) -> Patch {
    let mut mirrored = [Vec3::ZERO; 16];
    for row in 0..4 {
        for col in 0..4 {
            let p = patch[row * 4 + (3 - col)];
            // Data-space Y became -Z in the converted patch.
            mirrored[row * 4 + col] = Vec3::new(p.x, p.y, -p.z);
        }
    }
    mirrored
}

fn to_y_up(p: Vec3) -> Vec3 {
    Vec3::new(p.x, p.z, -p.y)
}

fn tessellate(patch: &Patch, steps: u32, mesh: &mut Mesh) {
    let base = mesh.vertex_count() as u32;
    let center = Vec3::new(0.0, DATA_HEIGHT * 0.5, 0.0);
    for row in 0..=steps {
        let v = row as f32 / steps as f32;
        for col in 0..=steps {
            let u = col as f32 / steps as f32;
            let position = (evaluate(patch, u, v) - center) / DATA_HEIGHT;
            mesh.push_vertex(position, surface_normal(patch, u, v));
        }
    }

    let stride = steps + 1;
    for row in 0..steps {
        for col in 0..steps {
            let i00 = base + row * stride + col;
            let i10 = i00 + 1;
            let i01 = i00 + stride;
            let i11 = i01 + 1;
            mesh.indices
                .extend_from_slice(&[i00, i10, i11, i00, i11, i01]);
        }
    }
}

fn bernstein(t: f32) -> [f32; 4] {
    let s = 1.0 - t;
    [s * s * s, 3.0 * t * s * s, 3.0 * t * t * s, t * t * t]
}

fn bernstein_derivative(t: f32) -> [f32; 4] {
    let s = 1.0 - t;
    [
        -3.0 * s * s,
        3.0 * s * s - 6.0 * t * s,
        6.0 * t * s - 3.0 * t * t,
        3.0 * t * t,
    ]
}

fn evaluate(patch: &Patch, u: f32, v: f32) -> Vec3 {
    combine(patch, bernstein(u), bernstein(v))
}

fn combine(patch: &Patch, bu: [f32; 4], bv: [f32; 4]) -> Vec3 {
    let mut point = Vec3::ZERO;
    for row in 0..4 {
        for col in 0..4 {
            point += patch[row * 4 + col] * (bu[col] * bv[row]);
        }
    }
    point
}

/// Unit normal `dP/du x dP/dv`, which points out of the teapot for this data set.
///
/// Collapsed rows (the lid knob and bottom poles) have a vanishing tangent,
/// so the normal is taken slightly inside the patch there.
fn surface_normal(patch: &Patch, u: f32, v: f32) -> Vec3 {
    const NUDGE: f32 = 1e-3;
    let candidates = [
        (u, v),
        (u, v.clamp(NUDGE, 1.0 - NUDGE)),
        (u.clamp(NUDGE, 1.0 - NUDGE), v.clamp(NUDGE, 1.0 - NUDGE)),
    ];
    for (u, v) in candidates {
        let du = combine(patch, bernstein_derivative(u), bernstein(v));
        let dv = combine(patch, bernstein(u), bernstein_derivative(v));
        let normal = du.cross(dv);
        if normal.length_squared() > 1e-10 {
            return normal.normalize();
        }
    }
    Vec3::Y
}
