//! Graphics configuration surface used by the demo.
//!
//! Resources (depth textures, framebuffers, programs, batches) are created
//! through a [`GraphicsDevice`]. Per-frame state changes and draw calls go
//! through a [`FrameRecorder`], which snapshots the state of every draw so a
//! backend can encode the frame afterwards.

pub mod frame;
pub mod headless;
pub mod native;
mod shaders;
mod validate;

pub use frame::{
    FrameRecorder, ProgramUniforms, RecordedDraw, RecordedFrame, RecordedPass, RenderTarget,
    ScopedFramebuffer, ScopedTextureBind, TEXTURE_UNITS,
};
pub use headless::HeadlessDevice;
pub use native::Renderer;
pub use shaders::{LIGHT_POSITION_UNIFORM, SHADOW_MAP_UNIFORM, SHADOW_MATRIX_UNIFORM};

use anyhow::Result;
use glam::{Mat4, Vec3};
use thiserror::Error;

use crate::assets::{AssetDir, AssetError};
use crate::geometry::Mesh;

/// Handle to a depth texture owned by a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(pub(crate) u32);

/// Handle to a compiled shader program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramId(pub(crate) u32);

/// Handle to uploaded geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BatchId(pub(crate) u32);

macro_rules! handle_index {
    ($($handle:ty),*) => {
        $(impl $handle {
            pub fn index(self) -> usize {
                self.0 as usize
            }
        })*
    };
}

handle_index!(TextureId, ProgramId, BatchId);

/// Offscreen render target whose only attachment is a depth texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Framebuffer {
    pub(crate) id: u32,
    pub depth_attachment: TextureId,
    pub width: u32,
    pub height: u32,
}

impl Framebuffer {
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }
}

/// Geometry paired with the program it is drawn with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Batch {
    pub id: BatchId,
    pub program: ProgramId,
}

/// Linear RGB color.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const BLACK: Self = Self::new(0.0, 0.0, 0.0);
    pub const WHITE: Self = Self::new(1.0, 1.0, 1.0);

    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    pub fn to_vec3(self) -> Vec3 {
        Vec3::new(self.r, self.g, self.b)
    }
}

/// Pixel rectangle of the bound target that draws are mapped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn from_size((width, height): (u32, u32)) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }
}

/// Depth offset applied while rasterizing, in the `glPolygonOffset` sense.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolygonOffset {
    /// Scales with the polygon's depth slope.
    pub factor: f32,
    /// Constant offset in units of the smallest resolvable depth step.
    pub units: f32,
}

impl PolygonOffset {
    pub fn to_depth_bias(self) -> wgpu::DepthBiasState {
        wgpu::DepthBiasState {
            constant: self.units.round() as i32,
            slope_scale: self.factor,
            clamp: 0.0,
        }
    }
}

/// Value uploaded to a named program uniform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Int(i32),
    Vec3(Vec3),
    Mat4(Mat4),
}

/// Sampling and storage description of a depth texture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthTextureFormat {
    pub width: u32,
    pub height: u32,
    pub format: wgpu::TextureFormat,
    pub mag_filter: wgpu::FilterMode,
    pub min_filter: wgpu::FilterMode,
    pub wrap_s: wgpu::AddressMode,
    pub wrap_t: wgpu::AddressMode,
    /// Hardware depth comparison performed when sampling; `None` returns raw depth.
    pub compare: Option<wgpu::CompareFunction>,
}

impl DepthTextureFormat {
    pub fn new(width: u32, height: u32, format: wgpu::TextureFormat) -> Self {
        Self {
            width,
            height,
            format,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            wrap_s: wgpu::AddressMode::Repeat,
            wrap_t: wgpu::AddressMode::Repeat,
            compare: None,
        }
    }

    pub fn filter(mut self, min: wgpu::FilterMode, mag: wgpu::FilterMode) -> Self {
        self.min_filter = min;
        self.mag_filter = mag;
        self
    }

    pub fn wrap(mut self, s: wgpu::AddressMode, t: wgpu::AddressMode) -> Self {
        self.wrap_s = s;
        self.wrap_t = t;
        self
    }

    pub fn compare(mut self, function: Option<wgpu::CompareFunction>) -> Self {
        self.compare = function;
        self
    }

    /// Whether a program sampling with `sampling` can read this texture.
    pub fn supports(&self, sampling: DepthSampling) -> bool {
        match sampling {
            DepthSampling::Comparison => self.compare.is_some(),
            DepthSampling::Manual => {
                self.compare.is_none()
                    && self.min_filter == wgpu::FilterMode::Nearest
                    && self.mag_filter == wgpu::FilterMode::Nearest
            }
        }
    }
}

/// Features of the device that change how shadows are sampled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub comparison_sampling: bool,
}

impl Capabilities {
    pub const FULL: Self = Self {
        comparison_sampling: true,
    };
}

/// How a program reads the shadow map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DepthSampling {
    /// `sampler_comparison` with hardware depth test.
    Comparison,
    /// Plain sampler, comparison done in the shader.
    Manual,
}

/// Shadow shader variant, resolved once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderVariant {
    Full,
    Reduced,
}

impl ShaderVariant {
    pub fn select(capabilities: Capabilities, force_reduced: bool) -> Self {
        if force_reduced || !capabilities.comparison_sampling {
            Self::Reduced
        } else {
            Self::Full
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Reduced => "reduced",
        }
    }

    pub fn vertex_asset(self) -> &'static str {
        match self {
            Self::Full => "shadow_shader.vert.wgsl",
            Self::Reduced => "shadow_shader_reduced.vert.wgsl",
        }
    }

    pub fn fragment_asset(self) -> &'static str {
        match self {
            Self::Full => "shadow_shader.frag.wgsl",
            Self::Reduced => "shadow_shader_reduced.frag.wgsl",
        }
    }

    pub fn depth_sampling(self) -> DepthSampling {
        match self {
            Self::Full => DepthSampling::Comparison,
            Self::Reduced => DepthSampling::Manual,
        }
    }

    /// Shadow map format matching this variant's sampling path.
    pub fn shadow_map_format(self, width: u32, height: u32) -> DepthTextureFormat {
        let format = match self {
            Self::Full => DepthTextureFormat::new(width, height, wgpu::TextureFormat::Depth32Float)
                .filter(wgpu::FilterMode::Linear, wgpu::FilterMode::Linear)
                .compare(Some(wgpu::CompareFunction::LessEqual)),
            // Raw depth reads cannot be linearly filtered.
            Self::Reduced => {
                DepthTextureFormat::new(width, height, wgpu::TextureFormat::Depth16Unorm)
            }
        };
        format.wrap(
            wgpu::AddressMode::ClampToEdge,
            wgpu::AddressMode::ClampToEdge,
        )
    }
}

/// Failure to produce a usable shader program.
#[derive(Debug, Error)]
pub enum ShaderError {
    #[error("failed to load shader source: {0}")]
    Asset(#[from] AssetError),
    #[error("failed to compile shader program {name}: {message}")]
    Compile { name: String, message: String },
}

/// Vertex and fragment sources of a program.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgramSource {
    pub name: String,
    pub vertex: String,
    pub fragment: String,
    /// Set when the fragment stage reads a depth texture at `@group(1)`.
    pub depth_sampling: Option<DepthSampling>,
}

impl ProgramSource {
    /// Loads the shadow program sources for `variant` from the asset directory.
    pub fn shadow(assets: &AssetDir, variant: ShaderVariant) -> Result<Self, ShaderError> {
        Ok(Self {
            name: format!("shadow-{}", variant.name()),
            vertex: assets.load_string(variant.vertex_asset())?,
            fragment: assets.load_string(variant.fragment_asset())?,
            depth_sampling: Some(variant.depth_sampling()),
        })
    }
}

/// Creates GPU resources. Implemented by the wgpu renderer and the headless device.
pub trait GraphicsDevice {
    fn capabilities(&self) -> Capabilities;

    fn create_depth_texture(&mut self, format: &DepthTextureFormat) -> Result<TextureId>;

    /// Creates an offscreen target sized after its depth attachment.
    fn create_framebuffer(&mut self, depth_attachment: TextureId) -> Result<Framebuffer>;

    fn create_program(&mut self, source: &ProgramSource) -> Result<ProgramId, ShaderError>;

    /// Flat-color program without lighting or shadows.
    fn stock_program(&mut self) -> Result<ProgramId>;

    fn create_batch(&mut self, mesh: &Mesh, program: ProgramId) -> Result<Batch>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn variant_follows_capabilities() {
        let limited = Capabilities {
            comparison_sampling: false,
        };
        assert_eq!(ShaderVariant::select(Capabilities::FULL, false), ShaderVariant::Full);
        assert_eq!(ShaderVariant::select(Capabilities::FULL, true), ShaderVariant::Reduced);
        assert_eq!(ShaderVariant::select(limited, false), ShaderVariant::Reduced);
    }

    #[test]
    fn shadow_map_formats_match_their_sampling() {
        for variant in [ShaderVariant::Full, ShaderVariant::Reduced] {
            let format = variant.shadow_map_format(2048, 2048);
            assert!(format.format.is_depth_stencil_format());
            assert_eq!(format.wrap_s, wgpu::AddressMode::ClampToEdge);
            assert_eq!(format.wrap_t, wgpu::AddressMode::ClampToEdge);
            assert!(format.supports(variant.depth_sampling()));
        }
        let full = ShaderVariant::Full.shadow_map_format(2048, 2048);
        assert_eq!(full.format, wgpu::TextureFormat::Depth32Float);
        assert_eq!(full.compare, Some(wgpu::CompareFunction::LessEqual));
        assert!(!full.supports(DepthSampling::Manual));
    }

    #[test]
    fn polygon_offset_maps_to_depth_bias() {
        let bias = PolygonOffset {
            factor: 2.0,
            units: 2.0,
        }
        .to_depth_bias();
        assert_eq!(bias.constant, 2);
        assert_eq!(bias.slope_scale, 2.0);
    }

    #[test]
    fn shadow_source_loads_variant_files() {
        let dir = tempfile::tempdir().expect("temp dir");
        fs::write(dir.path().join("shadow_shader_reduced.vert.wgsl"), "vert").unwrap();
        fs::write(dir.path().join("shadow_shader_reduced.frag.wgsl"), "frag").unwrap();
        let assets = AssetDir::new(dir.path());

        let source = ProgramSource::shadow(&assets, ShaderVariant::Reduced).unwrap();
        assert_eq!(source.vertex, "vert");
        assert_eq!(source.fragment, "frag");
        assert_eq!(source.depth_sampling, Some(DepthSampling::Manual));

        let err = ProgramSource::shadow(&assets, ShaderVariant::Full).unwrap_err();
        assert!(matches!(err, ShaderError::Asset(AssetError::NotFound { .. })));
    }

    #[test]
    fn variants_share_the_vertex_stage() {
        let assets = AssetDir::new(crate::config::DEFAULT_ASSET_DIR);
        let body = |variant: ShaderVariant| {
            let code = assets.load_string(variant.vertex_asset()).unwrap();
            code.lines()
                .filter(|line| !line.starts_with("//"))
                .collect::<Vec<_>>()
                .join("\n")
        };
        assert_eq!(body(ShaderVariant::Full), body(ShaderVariant::Reduced));
    }
}
