use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use anyhow::{anyhow, ensure, Context, Result};
use log::{error, info};
use wgpu::util::DeviceExt;
use winit::dpi::PhysicalSize;
use winit::window::{Window, WindowId};

use super::shaders::{DrawUniforms, STOCK_SHADER};
use super::validate::{validate_program, FRAGMENT_ENTRY, VERTEX_ENTRY};
use super::{
    Batch, BatchId, Capabilities, Color, DepthSampling, DepthTextureFormat, Framebuffer,
    GraphicsDevice, ProgramId, ProgramSource, RecordedDraw, RecordedFrame, RecordedPass,
    RenderTarget, ShaderError, TextureId, Viewport, SHADOW_MAP_UNIFORM,
};
use crate::geometry::{Mesh, VERTEX_STRIDE};

/// GPU renderer backed by wgpu that executes recorded frames.
pub struct Renderer {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    size: PhysicalSize<u32>,
    depth: DepthBuffer,
    capabilities: Capabilities,
    draw_layout: wgpu::BindGroupLayout,
    textures: Vec<DepthTexture>,
    framebuffers: Vec<TextureId>,
    programs: Vec<Program>,
    stock_program: Option<ProgramId>,
    batches: Vec<MeshBuffers>,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
    failed_pipelines: HashSet<PipelineKey>,
    skipped_draws: HashSet<String>,
}

impl Renderer {
    /// Initializes the GPU renderer for the provided window.
    pub async fn new(window: Arc<Window>) -> Result<Self> {
        let size = window.inner_size();
        if size.width == 0 || size.height == 0 {
            return Err(anyhow!("window has zero area"));
        }

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            flags: wgpu::InstanceFlags::default(),
            memory_budget_thresholds: Default::default(),
            backend_options: Default::default(),
        });
        let surface = instance.create_surface(Arc::clone(&window))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("failed to acquire GPU adapter")?;
        let adapter_info = adapter.get_info();
        info!(
            "using adapter {} ({:?})",
            adapter_info.name, adapter_info.backend
        );
        let capabilities = Capabilities {
            comparison_sampling: adapter
                .get_downlevel_capabilities()
                .flags
                .contains(wgpu::DownlevelFlags::COMPARISON_SAMPLERS),
        };

        let device_descriptor = wgpu::DeviceDescriptor {
            label: Some("renderer-device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            experimental_features: Default::default(),
            memory_hints: Default::default(),
            trace: Default::default(),
        };
        let (device, queue) = adapter
            .request_device(&device_descriptor)
            .await
            .context("failed to create GPU device")?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|format| format.is_srgb())
            .copied()
            .or_else(|| surface_caps.formats.first().copied())
            .context("surface reports no supported formats")?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width,
            height: size.height,
            present_mode: wgpu::PresentMode::AutoVsync,
            desired_maximum_frame_latency: 2,
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
        };
        surface.configure(&device, &config);

        let depth = DepthBuffer::create(&device, config.width, config.height);

        let draw_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("draw-bind-layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: wgpu::BufferSize::new(
                        std::mem::size_of::<DrawUniforms>() as u64
                    ),
                },
                count: None,
            }],
        });

        Ok(Self {
            window,
            surface,
            device,
            queue,
            config,
            size,
            depth,
            capabilities,
            draw_layout,
            textures: Vec::new(),
            framebuffers: Vec::new(),
            programs: Vec::new(),
            stock_program: None,
            batches: Vec::new(),
            pipelines: HashMap::new(),
            failed_pipelines: HashSet::new(),
            skipped_draws: HashSet::new(),
        })
    }

    /// Returns the identifier of the window owned by the renderer.
    pub fn window_id(&self) -> WindowId {
        self.window.id()
    }

    /// Exposes the inner window for event handling.
    pub fn window(&self) -> &Window {
        &self.window
    }

    /// Window size in physical pixels.
    pub fn size(&self) -> PhysicalSize<u32> {
        self.size
    }

    /// Resizes the swap chain to match the new dimensions.
    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        self.size = new_size;
        self.config.width = new_size.width;
        self.config.height = new_size.height;
        self.surface.configure(&self.device, &self.config);
        self.depth = DepthBuffer::create(&self.device, new_size.width, new_size.height);
    }

    /// Encodes every recorded pass into one submission and presents it.
    pub fn render(&mut self, frame: &RecordedFrame) -> Result<(), wgpu::SurfaceError> {
        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("renderer-encoder"),
            });

        // Pipelines are built up front so encoding only needs shared borrows.
        let mut prepared = Vec::with_capacity(frame.passes.len());
        for pass in &frame.passes {
            let draws: Vec<_> = pass
                .draws
                .iter()
                .filter_map(|draw| self.prepare_draw(pass.target, draw))
                .collect();
            prepared.push(draws);
        }

        for (pass, draws) in frame.passes.iter().zip(&prepared) {
            self.encode_pass(&mut encoder, &view, pass, draws);
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }

    fn prepare_draw(&mut self, target: RenderTarget, draw: &RecordedDraw) -> Option<PreparedDraw> {
        let key = PipelineKey {
            program: draw.batch.program,
            target: self.target_kind(target)?,
            bias: draw.polygon_offset.map(|offset| {
                let bias = offset.to_depth_bias();
                (bias.constant, bias.slope_scale.to_bits())
            }),
        };
        if !self.ensure_pipeline(key) {
            return None;
        }

        let program = self.programs.get(draw.batch.program.index())?;
        let shadow_group = match (&program.shadow_layout, program.depth_sampling) {
            (Some(layout), Some(sampling)) => {
                Some(self.shadow_bind_group(layout, sampling, target, draw))
            }
            _ => None,
        };
        let shadow_group = match shadow_group.transpose() {
            Ok(group) => group,
            Err(reason) => {
                self.report_skipped(draw.batch.id, reason);
                return None;
            }
        };

        let buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("draw-uniform"),
                contents: bytemuck::bytes_of(&DrawUniforms::from_draw(draw)),
                usage: wgpu::BufferUsages::UNIFORM,
            });
        let draw_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("draw-bind-group"),
            layout: &self.draw_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
        });

        Some(PreparedDraw {
            key,
            batch: draw.batch.id,
            viewport: draw.viewport,
            draw_group,
            shadow_group,
        })
    }

    fn shadow_bind_group(
        &self,
        layout: &wgpu::BindGroupLayout,
        sampling: DepthSampling,
        target: RenderTarget,
        draw: &RecordedDraw,
    ) -> Result<wgpu::BindGroup, String> {
        let unit = draw.uniforms.int(SHADOW_MAP_UNIFORM).unwrap_or(0);
        let texture_id = usize::try_from(unit)
            .ok()
            .and_then(|unit| draw.textures.get(unit).copied().flatten())
            .ok_or_else(|| format!("no depth texture bound to unit {unit}"))?;
        if let RenderTarget::Offscreen(framebuffer) = target {
            if framebuffer.depth_attachment == texture_id {
                return Err(format!(
                    "depth texture {texture_id:?} is both sampled and rendered to"
                ));
            }
        }
        let texture = self
            .textures
            .get(texture_id.index())
            .ok_or_else(|| format!("unknown depth texture {texture_id:?}"))?;
        if !texture.format.supports(sampling) {
            return Err(format!(
                "depth texture {texture_id:?} cannot be sampled with {sampling:?}"
            ));
        }
        Ok(self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("shadow-bind-group"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&texture.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&texture.sampler),
                },
            ],
        }))
    }

    fn report_skipped(&mut self, batch: BatchId, reason: String) {
        let message = format!("skipping draw of {batch:?}: {reason}");
        if self.skipped_draws.insert(message.clone()) {
            error!("{message}");
        }
    }

    fn encode_pass(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        surface_view: &wgpu::TextureView,
        pass: &RecordedPass,
        draws: &[PreparedDraw],
    ) {
        let depth_load = match pass.clear {
            Some(_) => wgpu::LoadOp::Clear(1.0),
            None => wgpu::LoadOp::Load,
        };
        let (depth_view, extent, color_attachment) = match pass.target {
            RenderTarget::Window => {
                let load = match pass.clear {
                    Some(color) => wgpu::LoadOp::Clear(to_wgpu_color(color)),
                    None => wgpu::LoadOp::Load,
                };
                let attachment = wgpu::RenderPassColorAttachment {
                    view: surface_view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load,
                        store: wgpu::StoreOp::Store,
                    },
                };
                (
                    &self.depth.view,
                    (self.config.width, self.config.height),
                    Some(attachment),
                )
            }
            RenderTarget::Offscreen(framebuffer) => {
                match self.textures.get(framebuffer.depth_attachment.index()) {
                    Some(texture) => (&texture.view, framebuffer.size(), None),
                    None => {
                        error!("framebuffer {framebuffer:?} has no depth attachment");
                        return;
                    }
                }
            }
        };
        let color_attachments: Vec<_> = color_attachment.into_iter().map(Some).collect();

        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(match pass.target {
                RenderTarget::Window => "window-pass",
                RenderTarget::Offscreen(_) => "depth-pass",
            }),
            color_attachments: &color_attachments,
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: depth_load,
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        for draw in draws {
            let (Some(pipeline), Some(mesh)) = (
                self.pipelines.get(&draw.key),
                self.batches.get(draw.batch.index()),
            ) else {
                continue;
            };
            let viewport = clamp_viewport(draw.viewport, extent);
            render_pass.set_viewport(
                viewport.x as f32,
                viewport.y as f32,
                viewport.width as f32,
                viewport.height as f32,
                0.0,
                1.0,
            );
            render_pass.set_pipeline(pipeline);
            render_pass.set_bind_group(0, &draw.draw_group, &[]);
            if let Some(group) = &draw.shadow_group {
                render_pass.set_bind_group(1, group, &[]);
            }
            render_pass.set_vertex_buffer(0, mesh.vertex.slice(..));
            render_pass.set_index_buffer(mesh.index.slice(..), wgpu::IndexFormat::Uint32);
            render_pass.draw_indexed(0..mesh.index_count, 0, 0..1);
        }
    }

    fn target_kind(&self, target: RenderTarget) -> Option<TargetKind> {
        match target {
            RenderTarget::Window => Some(TargetKind::Window),
            RenderTarget::Offscreen(framebuffer) => self
                .textures
                .get(framebuffer.depth_attachment.index())
                .map(|texture| TargetKind::Depth(texture.format.format)),
        }
    }

    fn ensure_pipeline(&mut self, key: PipelineKey) -> bool {
        if self.pipelines.contains_key(&key) {
            return true;
        }
        if self.failed_pipelines.contains(&key) {
            return false;
        }
        match self.build_pipeline(&key) {
            Ok(pipeline) => {
                self.pipelines.insert(key, pipeline);
                true
            }
            Err(err) => {
                error!("failed to build pipeline {key:?}: {err:?}");
                self.failed_pipelines.insert(key);
                false
            }
        }
    }

    fn build_pipeline(&self, key: &PipelineKey) -> Result<wgpu::RenderPipeline> {
        let program = self
            .programs
            .get(key.program.index())
            .ok_or_else(|| anyhow!("unknown program {:?}", key.program))?;
        let (depth_format, color_targets) = match key.target {
            TargetKind::Window => (
                DepthBuffer::FORMAT,
                Some([Some(wgpu::ColorTargetState {
                    format: self.config.format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })]),
            ),
            // Depth-only targets skip the fragment stage.
            TargetKind::Depth(format) => (format, None),
        };
        let bias = key
            .bias
            .map(|(constant, slope)| wgpu::DepthBiasState {
                constant,
                slope_scale: f32::from_bits(slope),
                clamp: 0.0,
            })
            .unwrap_or_default();

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(&format!("{}-pipeline", program.name)),
                layout: Some(&program.layout),
                vertex: wgpu::VertexState {
                    module: &program.vertex,
                    entry_point: Some(VERTEX_ENTRY),
                    compilation_options: Default::default(),
                    buffers: &[vertex_layout()],
                },
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: None,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    ..Default::default()
                },
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: depth_format,
                    depth_write_enabled: true,
                    depth_compare: wgpu::CompareFunction::Less,
                    stencil: Default::default(),
                    bias,
                }),
                multisample: wgpu::MultisampleState::default(),
                fragment: color_targets.as_ref().map(|targets| wgpu::FragmentState {
                    module: &program.fragment,
                    entry_point: Some(FRAGMENT_ENTRY),
                    compilation_options: Default::default(),
                    targets: targets.as_slice(),
                }),
                multiview: None,
                cache: None,
            });
        match pollster::block_on(self.device.pop_error_scope()) {
            Some(err) => Err(anyhow!("{err}")),
            None => Ok(pipeline),
        }
    }

    fn compile_module(&self, label: &str, source: &str) -> Result<wgpu::ShaderModule, String> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            });
        match pollster::block_on(self.device.pop_error_scope()) {
            Some(err) => Err(err.to_string()),
            None => Ok(module),
        }
    }

    fn shadow_layout(&self, sampling: DepthSampling) -> wgpu::BindGroupLayout {
        let sampler = match sampling {
            DepthSampling::Comparison => wgpu::SamplerBindingType::Comparison,
            DepthSampling::Manual => wgpu::SamplerBindingType::NonFiltering,
        };
        self.device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("shadow-bind-layout"),
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            sample_type: wgpu::TextureSampleType::Depth,
                            view_dimension: wgpu::TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Sampler(sampler),
                        count: None,
                    },
                ],
            })
    }
}

impl GraphicsDevice for Renderer {
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
        self.textures
            .push(DepthTexture::create(&self.device, format, id));
        Ok(id)
    }

    fn create_framebuffer(&mut self, depth_attachment: TextureId) -> Result<Framebuffer> {
        let texture = self
            .textures
            .get(depth_attachment.index())
            .ok_or_else(|| anyhow!("unknown depth attachment {depth_attachment:?}"))?;
        let framebuffer = Framebuffer {
            id: self.framebuffers.len() as u32,
            depth_attachment,
            width: texture.format.width,
            height: texture.format.height,
        };
        self.framebuffers.push(depth_attachment);
        Ok(framebuffer)
    }

    fn create_program(&mut self, source: &ProgramSource) -> Result<ProgramId, ShaderError> {
        let compile_error = |message: String| ShaderError::Compile {
            name: source.name.clone(),
            message,
        };
        if source.depth_sampling == Some(DepthSampling::Comparison)
            && !self.capabilities.comparison_sampling
        {
            return Err(compile_error(
                "comparison samplers are not supported by this adapter".to_string(),
            ));
        }
        validate_program(source)?;
        let vertex = self
            .compile_module(&format!("{}-vertex", source.name), &source.vertex)
            .map_err(compile_error)?;
        let fragment = self
            .compile_module(&format!("{}-fragment", source.name), &source.fragment)
            .map_err(compile_error)?;

        let shadow_layout = source
            .depth_sampling
            .map(|sampling| self.shadow_layout(sampling));
        let mut bind_group_layouts = vec![&self.draw_layout];
        bind_group_layouts.extend(shadow_layout.as_ref());
        let layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(&format!("{}-layout", source.name)),
                bind_group_layouts: &bind_group_layouts,
                push_constant_ranges: &[],
            });

        let id = ProgramId(self.programs.len() as u32);
        self.programs.push(Program {
            name: source.name.clone(),
            vertex,
            fragment,
            layout,
            shadow_layout,
            depth_sampling: source.depth_sampling,
        });

        // Linking both stages against the window target surfaces interface mismatches now.
        let key = PipelineKey {
            program: id,
            target: TargetKind::Window,
            bias: None,
        };
        match self.build_pipeline(&key) {
            Ok(pipeline) => {
                self.pipelines.insert(key, pipeline);
                Ok(id)
            }
            Err(err) => {
                self.programs.pop();
                Err(compile_error(format!("{err:#}")))
            }
        }
    }

    fn stock_program(&mut self) -> Result<ProgramId> {
        if let Some(id) = self.stock_program {
            return Ok(id);
        }
        let id = self.create_program(&ProgramSource {
            name: "stock-color".to_string(),
            vertex: STOCK_SHADER.to_string(),
            fragment: STOCK_SHADER.to_string(),
            depth_sampling: None,
        })?;
        self.stock_program = Some(id);
        Ok(id)
    }

    fn create_batch(&mut self, mesh: &Mesh, program: ProgramId) -> Result<Batch> {
        ensure!(
            self.programs.get(program.index()).is_some(),
            "unknown program {program:?}"
        );
        ensure!(mesh.triangle_count() > 0, "cannot upload an empty mesh");
        let id = BatchId(self.batches.len() as u32);
        self.batches.push(MeshBuffers::from_mesh(
            &self.device,
            mesh,
            &format!("batch-{}", id.0),
        ));
        Ok(Batch { id, program })
    }
}

fn to_wgpu_color(color: Color) -> wgpu::Color {
    wgpu::Color {
        r: color.r as f64,
        g: color.g as f64,
        b: color.b as f64,
        a: 1.0,
    }
}

/// Limits a viewport to the target; `None` covers the whole target.
fn clamp_viewport(viewport: Option<Viewport>, (width, height): (u32, u32)) -> Viewport {
    let Some(viewport) = viewport else {
        return Viewport::from_size((width, height));
    };
    let x = viewport.x.min(width.saturating_sub(1));
    let y = viewport.y.min(height.saturating_sub(1));
    Viewport {
        x,
        y,
        width: viewport.width.clamp(1, width - x),
        height: viewport.height.clamp(1, height - y),
    }
}

fn vertex_layout() -> wgpu::VertexBufferLayout<'static> {
    const ATTRIBUTES: [wgpu::VertexAttribute; 2] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3];
    wgpu::VertexBufferLayout {
        array_stride: (VERTEX_STRIDE * std::mem::size_of::<f32>()) as u64,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &ATTRIBUTES,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum TargetKind {
    Window,
    Depth(wgpu::TextureFormat),
}

/// Identifies a pipeline variant; depth bias is baked into wgpu pipelines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PipelineKey {
    program: ProgramId,
    target: TargetKind,
    /// `(constant, slope_scale bits)`
    bias: Option<(i32, u32)>,
}

struct PreparedDraw {
    key: PipelineKey,
    batch: BatchId,
    viewport: Option<Viewport>,
    draw_group: wgpu::BindGroup,
    shadow_group: Option<wgpu::BindGroup>,
}

struct Program {
    name: String,
    vertex: wgpu::ShaderModule,
    fragment: wgpu::ShaderModule,
    layout: wgpu::PipelineLayout,
    shadow_layout: Option<wgpu::BindGroupLayout>,
    depth_sampling: Option<DepthSampling>,
}

struct MeshBuffers {
    vertex: wgpu::Buffer,
    index: wgpu::Buffer,
    index_count: u32,
}

impl MeshBuffers {
    fn from_mesh(device: &wgpu::Device, mesh: &Mesh, label: &str) -> Self {
        let vertex = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label}-vertices")),
            contents: bytemuck::cast_slice(&mesh.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label}-indices")),
            contents: bytemuck::cast_slice(&mesh.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self {
            vertex,
            index,
            index_count: mesh.indices.len() as u32,
        }
    }
}

/// Sampleable depth texture used as a framebuffer attachment.
struct DepthTexture {
    format: DepthTextureFormat,
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
    sampler: wgpu::Sampler,
}

impl DepthTexture {
    fn create(device: &wgpu::Device, format: &DepthTextureFormat, id: TextureId) -> Self {
        let label = format!("depth-texture-{}", id.0);
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(&label),
            size: wgpu::Extent3d {
                width: format.width.max(1),
                height: format.height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: format.format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some(&format!("{label}-sampler")),
            address_mode_u: format.wrap_s,
            address_mode_v: format.wrap_t,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: format.mag_filter,
            min_filter: format.min_filter,
            mipmap_filter: wgpu::FilterMode::Nearest,
            compare: format.compare,
            ..Default::default()
        });
        Self {
            format: *format,
            _texture: texture,
            view,
            sampler,
        }
    }
}

struct DepthBuffer {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl DepthBuffer {
    const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24Plus;

    fn create(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("depth-texture"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            _texture: texture,
            view,
        }
    }
}
