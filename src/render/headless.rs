//! Device without a GPU, used when no window can be opened and by tests.

use anyhow::{anyhow, ensure, Result};

use super::shaders::STOCK_SHADER;
use super::validate::validate_program;
use super::{
    Batch, BatchId, Capabilities, DepthSampling, DepthTextureFormat, Framebuffer, GraphicsDevice,
    ProgramId, ProgramSource, ShaderError, TextureId,
};
use crate::geometry::Mesh;

/// Program metadata kept by the headless device.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgramInfo {
    pub name: String,
    pub depth_sampling: Option<DepthSampling>,
}

/// Geometry statistics of an uploaded batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchInfo {
    pub program: ProgramId,
    pub vertex_count: usize,
    pub triangle_count: usize,
}

/// Tracks resources and validates requests the way a GPU device would,
/// without rendering anything.
#[derive(Debug)]
pub struct HeadlessDevice {
    capabilities: Capabilities,
    textures: Vec<DepthTextureFormat>,
    framebuffers: u32,
    programs: Vec<ProgramInfo>,
    stock: Option<ProgramId>,
    batches: Vec<BatchInfo>,
}

impl Default for HeadlessDevice {
    fn default() -> Self {
        Self::new(Capabilities::FULL)
    }
}

impl HeadlessDevice {
    pub fn new(capabilities: Capabilities) -> Self {
        Self {
            capabilities,
            textures: Vec::new(),
            framebuffers: 0,
            programs: Vec::new(),
            stock: None,
            batches: Vec::new(),
        }
    }

    pub fn texture_format(&self, texture: TextureId) -> Option<&DepthTextureFormat> {
        self.textures.get(texture.index())
    }

    pub fn program(&self, program: ProgramId) -> Option<&ProgramInfo> {
        self.programs.get(program.index())
    }

    pub fn batch(&self, batch: Batch) -> Option<&BatchInfo> {
        self.batches.get(batch.id.index())
    }

    pub fn program_count(&self) -> usize {
        self.programs.len()
    }

    fn register_program(&mut self, info: ProgramInfo) -> ProgramId {
        let id = ProgramId(self.programs.len() as u32);
        self.programs.push(info);
        id
    }
}

impl GraphicsDevice for HeadlessDevice {
    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn create_depth_texture(&mut self, format: &DepthTextureFormat) -> Result<TextureId> {
        ensure!(
            format.width > 0 && format.height > 0,
            "depth texture must have a non-zero size"
        );
        ensure!(
            format.format.is_depth_stencil_format(),
            "{:?} is not a depth format",
            format.format
        );
        let id = TextureId(self.textures.len() as u32);
        self.textures.push(*format);
        Ok(id)
    }

    fn create_framebuffer(&mut self, depth_attachment: TextureId) -> Result<Framebuffer> {
        let format = self
            .texture_format(depth_attachment)
            .ok_or_else(|| anyhow!("unknown depth attachment {depth_attachment:?}"))?;
        let framebuffer = Framebuffer {
            id: self.framebuffers,
            depth_attachment,
            width: format.width,
            height: format.height,
        };
        self.framebuffers += 1;
        Ok(framebuffer)
    }

    fn create_program(&mut self, source: &ProgramSource) -> Result<ProgramId, ShaderError> {
        validate_program(source)?;
        if source.depth_sampling == Some(DepthSampling::Comparison)
            && !self.capabilities.comparison_sampling
        {
            return Err(ShaderError::Compile {
                name: source.name.clone(),
                message: "comparison samplers are not supported by this device".to_string(),
            });
        }
        Ok(self.register_program(ProgramInfo {
            name: source.name.clone(),
            depth_sampling: source.depth_sampling,
        }))
    }

    fn stock_program(&mut self) -> Result<ProgramId> {
        if let Some(id) = self.stock {
            return Ok(id);
        }
        let source = ProgramSource {
            name: "stock-color".to_string(),
            vertex: STOCK_SHADER.to_string(),
            fragment: STOCK_SHADER.to_string(),
            depth_sampling: None,
        };
        let id = self.create_program(&source)?;
        self.stock = Some(id);
        Ok(id)
    }

    fn create_batch(&mut self, mesh: &Mesh, program: ProgramId) -> Result<Batch> {
        ensure!(
            self.program(program).is_some(),
            "unknown program {program:?}"
        );
        ensure!(mesh.triangle_count() > 0, "cannot upload an empty mesh");
        let id = BatchId(self.batches.len() as u32);
        self.batches.push(BatchInfo {
            program,
            vertex_count: mesh.vertex_count(),
            triangle_count: mesh.triangle_count(),
        });
        Ok(Batch { id, program })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::cube;
    use crate::render::ShaderVariant;
    use glam::Vec3;

    const VERTEX: &str = "@vertex fn vs_main() -> @builtin(position) vec4<f32> {\n    return vec4<f32>(0.0);\n}\n";
    const FRAGMENT: &str = "@fragment fn fs_main() -> @location(0) vec4<f32> {\n    return vec4<f32>(1.0);\n}\n";

    fn source(vertex: &str, fragment: &str) -> ProgramSource {
        ProgramSource {
            name: "test".to_string(),
            vertex: vertex.to_string(),
            fragment: fragment.to_string(),
            depth_sampling: Some(DepthSampling::Manual),
        }
    }

    #[test]
    fn framebuffer_takes_size_of_attachment() {
        let mut device = HeadlessDevice::default();
        let format = ShaderVariant::Full.shadow_map_format(2048, 1024);
        let texture = device.create_depth_texture(&format).unwrap();
        let framebuffer = device.create_framebuffer(texture).unwrap();
        assert_eq!(framebuffer.size(), (2048, 1024));
        assert_eq!(framebuffer.aspect_ratio(), 2.0);
        assert!(device.create_framebuffer(TextureId(9)).is_err());
    }

    #[test]
    fn rejects_color_formats_for_depth_textures() {
        let mut device = HeadlessDevice::default();
        let format = DepthTextureFormat::new(16, 16, wgpu::TextureFormat::Rgba8Unorm);
        assert!(device.create_depth_texture(&format).is_err());
    }

    #[test]
    fn program_without_entry_point_fails_to_compile() {
        let mut device = HeadlessDevice::default();
        let err = device
            .create_program(&source(VERTEX, &FRAGMENT.replace("fs_main", "main")))
            .unwrap_err();
        match err {
            ShaderError::Compile { message, .. } => assert!(message.contains("fs_main")),
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(device.program_count(), 0);
    }

    #[test]
    fn garbage_with_entry_point_names_fails_to_compile() {
        let mut device = HeadlessDevice::default();
        let err = device
            .create_program(&source("fn vs_main ((( not wgsl", "}}} fn fs_main @@@"))
            .unwrap_err();
        assert!(matches!(err, ShaderError::Compile { .. }));
        assert_eq!(device.program_count(), 0);
    }

    #[test]
    fn comparison_programs_need_comparison_support() {
        let mut device = HeadlessDevice::new(Capabilities {
            comparison_sampling: false,
        });
        let mut comparison = source(VERTEX, FRAGMENT);
        comparison.depth_sampling = Some(DepthSampling::Comparison);
        assert!(device.create_program(&comparison).is_err());
        assert!(device.create_program(&source(VERTEX, FRAGMENT)).is_ok());
    }

    #[test]
    fn stock_program_is_shared() {
        let mut device = HeadlessDevice::default();
        let first = device.stock_program().unwrap();
        assert_eq!(device.stock_program().unwrap(), first);
        assert_eq!(device.program_count(), 1);
    }

    #[test]
    fn batches_record_geometry() {
        let mut device = HeadlessDevice::default();
        let program = device.stock_program().unwrap();
        let batch = device.create_batch(&cube(Vec3::ONE), program).unwrap();
        let info = device.batch(batch).unwrap();
        assert_eq!(info.triangle_count, 12);
        assert_eq!(info.program, program);
        assert!(device.create_batch(&Mesh::default(), program).is_err());
        assert!(device.create_batch(&cube(Vec3::ONE), ProgramId(5)).is_err());
    }
}
