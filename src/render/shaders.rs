use bytemuck::{Pod, Zeroable};
use glam::{Mat3, Mat4};

use super::RecordedDraw;

pub const SHADOW_MAP_UNIFORM: &str = "uShadowMap";
pub const LIGHT_POSITION_UNIFORM: &str = "uLightPos";
pub const SHADOW_MATRIX_UNIFORM: &str = "uShadowMatrix";

/// Per-draw constants bound at `@group(0) @binding(0)` by every program.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub(crate) struct DrawUniforms {
    model: [[f32; 4]; 4],
    view: [[f32; 4]; 4],
    projection: [[f32; 4]; 4],
    shadow_matrix: [[f32; 4]; 4],
    /// View-space normal matrix.
    normal: [[f32; 4]; 3],
    color: [f32; 4],
    /// View-space light position.
    light_position: [f32; 4],
}

impl DrawUniforms {
    pub(crate) fn from_draw(draw: &RecordedDraw) -> Self {
        let normal = Mat3::from_mat4(draw.model_view()).inverse().transpose();
        let shadow_matrix = draw
            .uniforms
            .mat4(SHADOW_MATRIX_UNIFORM)
            .unwrap_or(Mat4::IDENTITY);
        let light_position = draw.uniforms.vec3(LIGHT_POSITION_UNIFORM).unwrap_or_default();
        Self {
            model: draw.model.to_cols_array_2d(),
            view: draw.view.to_cols_array_2d(),
            projection: draw.projection.to_cols_array_2d(),
            shadow_matrix: shadow_matrix.to_cols_array_2d(),
            normal: mat3_to_3x4(normal),
            color: draw.color.to_vec3().extend(1.0).into(),
            light_position: light_position.extend(1.0).into(),
        }
    }
}

fn mat3_to_3x4(matrix: Mat3) -> [[f32; 4]; 3] {
    let cols = matrix.to_cols_array();
    [
        [cols[0], cols[1], cols[2], 0.0],
        [cols[3], cols[4], cols[5], 0.0],
        [cols[6], cols[7], cols[8], 0.0],
    ]
}

/// Flat-color program used for the depth pass.
pub(crate) const STOCK_SHADER: &str = r#"
struct DrawUniforms {
    model: mat4x4<f32>,
    view: mat4x4<f32>,
    projection: mat4x4<f32>,
    shadow_matrix: mat4x4<f32>,
    normal: mat3x4<f32>,
    color: vec4<f32>,
    light_position: vec4<f32>,
}

@group(0) @binding(0)
var<uniform> uniforms: DrawUniforms;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
}

@vertex
fn vs_main(input: VertexInput) -> @builtin(position) vec4<f32> {
    return uniforms.projection * uniforms.view * uniforms.model * vec4<f32>(input.position, 1.0);
}

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return vec4<f32>(uniforms.color.rgb, 1.0);
}
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{Batch, BatchId, Color, ProgramId, ProgramUniforms, TEXTURE_UNITS};
    use glam::Vec3;

    fn draw(model: Mat4, view: Mat4, uniforms: ProgramUniforms) -> RecordedDraw {
        RecordedDraw {
            batch: Batch {
                id: BatchId(0),
                program: ProgramId(0),
            },
            model,
            view,
            projection: Mat4::IDENTITY,
            color: Color::new(0.4, 0.6, 0.9),
            viewport: None,
            polygon_offset: None,
            textures: [None; TEXTURE_UNITS],
            uniforms,
        }
    }

    #[test]
    fn uniform_block_matches_wgsl_layout() {
        // 4 mat4x4 + mat3x4 + 2 vec4
        assert_eq!(std::mem::size_of::<DrawUniforms>(), 4 * 64 + 48 + 2 * 16);
    }

    #[test]
    fn missing_uniforms_fall_back_to_neutral_values() {
        let uniforms = DrawUniforms::from_draw(&draw(
            Mat4::IDENTITY,
            Mat4::IDENTITY,
            ProgramUniforms::default(),
        ));
        assert_eq!(uniforms.shadow_matrix, Mat4::IDENTITY.to_cols_array_2d());
        assert_eq!(uniforms.light_position, [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(uniforms.color, [0.4, 0.6, 0.9, 1.0]);
    }

    #[test]
    fn normal_matrix_undoes_non_uniform_scale() {
        let model = Mat4::from_scale(Vec3::new(2.0, 1.0, 1.0));
        let uniforms =
            DrawUniforms::from_draw(&draw(model, Mat4::IDENTITY, ProgramUniforms::default()));
        assert_eq!(uniforms.normal[0], [0.5, 0.0, 0.0, 0.0]);
        assert_eq!(uniforms.normal[1], [0.0, 1.0, 0.0, 0.0]);
    }
}
