//! Immediate-mode graphics state and the per-frame draw list.

use std::collections::{BTreeMap, HashMap};
use std::ops::{Deref, DerefMut};

use glam::{Mat4, Vec3};
use log::{error, warn};

use super::shaders::{LIGHT_POSITION_UNIFORM, SHADOW_MAP_UNIFORM, SHADOW_MATRIX_UNIFORM};
use super::{Batch, Color, Framebuffer, PolygonOffset, ProgramId, TextureId, UniformValue, Viewport};

/// Uniform names understood by the shadow programs.
const KNOWN_UNIFORMS: [&str; 3] = [
    SHADOW_MAP_UNIFORM,
    LIGHT_POSITION_UNIFORM,
    SHADOW_MATRIX_UNIFORM,
];

/// Number of texture units tracked by the recorder.
pub const TEXTURE_UNITS: usize = 4;

/// Surface a pass renders into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderTarget {
    Window,
    Offscreen(Framebuffer),
}

/// Named uniform values set on one program.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgramUniforms {
    values: BTreeMap<String, UniformValue>,
}

impl ProgramUniforms {
    pub fn get(&self, name: &str) -> Option<UniformValue> {
        self.values.get(name).copied()
    }

    pub fn int(&self, name: &str) -> Option<i32> {
        match self.get(name)? {
            UniformValue::Int(value) => Some(value),
            _ => None,
        }
    }

    pub fn vec3(&self, name: &str) -> Option<Vec3> {
        match self.get(name)? {
            UniformValue::Vec3(value) => Some(value),
            _ => None,
        }
    }

    pub fn mat4(&self, name: &str) -> Option<Mat4> {
        match self.get(name)? {
            UniformValue::Mat4(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A draw call together with the state it was issued under.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedDraw {
    pub batch: Batch,
    pub model: Mat4,
    pub view: Mat4,
    pub projection: Mat4,
    pub color: Color,
    pub viewport: Option<Viewport>,
    pub polygon_offset: Option<PolygonOffset>,
    pub textures: [Option<TextureId>; TEXTURE_UNITS],
    pub uniforms: ProgramUniforms,
}

impl RecordedDraw {
    pub fn model_view(&self) -> Mat4 {
        self.view * self.model
    }
}

/// Consecutive draws into one target, optionally preceded by a clear.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedPass {
    pub target: RenderTarget,
    pub clear: Option<Color>,
    pub draws: Vec<RecordedDraw>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordedFrame {
    pub passes: Vec<RecordedPass>,
}

impl RecordedFrame {
    pub fn draw_count(&self) -> usize {
        self.passes.iter().map(|pass| pass.draws.len()).sum()
    }

    pub fn draws(&self) -> impl Iterator<Item = (&RecordedPass, &RecordedDraw)> {
        self.passes
            .iter()
            .flat_map(|pass| pass.draws.iter().map(move |draw| (pass, draw)))
    }
}

/// Tracks bound state the way a GL context does and records draws against it.
///
/// State persists across frames; only the recorded passes are reset by
/// [`FrameRecorder::begin_frame`].
#[derive(Debug)]
pub struct FrameRecorder {
    framebuffer: Option<Framebuffer>,
    textures: [Option<TextureId>; TEXTURE_UNITS],
    polygon_offset: Option<PolygonOffset>,
    viewport: Option<Viewport>,
    view: Mat4,
    projection: Mat4,
    uniforms: HashMap<ProgramId, ProgramUniforms>,
    passes: Vec<RecordedPass>,
}

impl Default for FrameRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameRecorder {
    pub fn new() -> Self {
        Self {
            framebuffer: None,
            textures: [None; TEXTURE_UNITS],
            polygon_offset: None,
            viewport: None,
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            uniforms: HashMap::new(),
            passes: Vec::new(),
        }
    }

    pub fn begin_frame(&mut self) {
        self.passes.clear();
    }

    pub fn finish_frame(&mut self) -> RecordedFrame {
        RecordedFrame {
            passes: std::mem::take(&mut self.passes),
        }
    }

    pub fn bound_framebuffer(&self) -> Option<Framebuffer> {
        self.framebuffer
    }

    /// Binds an offscreen target, or the window when `None`.
    pub fn bind_framebuffer(&mut self, framebuffer: Option<Framebuffer>) {
        self.framebuffer = framebuffer;
    }

    pub fn target(&self) -> RenderTarget {
        match self.framebuffer {
            Some(framebuffer) => RenderTarget::Offscreen(framebuffer),
            None => RenderTarget::Window,
        }
    }

    pub fn bound_texture(&self, unit: u8) -> Option<TextureId> {
        self.textures.get(unit as usize).copied().flatten()
    }

    pub fn bind_texture(&mut self, unit: u8, texture: Option<TextureId>) {
        match self.textures.get_mut(unit as usize) {
            Some(slot) => *slot = texture,
            None => error!("texture unit {unit} out of range (max {})", TEXTURE_UNITS - 1),
        }
    }

    pub fn polygon_offset(&self) -> Option<PolygonOffset> {
        self.polygon_offset
    }

    pub fn enable_polygon_offset(&mut self, offset: PolygonOffset) {
        self.polygon_offset = Some(offset);
    }

    pub fn disable_polygon_offset(&mut self) {
        self.polygon_offset = None;
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = Some(viewport);
    }

    /// Loads camera matrices; the model transform is supplied per draw.
    pub fn set_matrices(&mut self, view: Mat4, projection: Mat4) {
        self.view = view;
        self.projection = projection;
    }

    pub fn view_matrix(&self) -> Mat4 {
        self.view
    }

    pub fn projection_matrix(&self) -> Mat4 {
        self.projection
    }

    /// Clears the bound target, starting a new pass.
    pub fn clear(&mut self, color: Color) {
        self.passes.push(RecordedPass {
            target: self.target(),
            clear: Some(color),
            draws: Vec::new(),
        });
    }

    /// Sets a named uniform on `program`; names no program declares are ignored.
    pub fn uniform(&mut self, program: ProgramId, name: &str, value: UniformValue) {
        if !KNOWN_UNIFORMS.contains(&name) {
            warn!("ignoring unknown uniform {name} for {program:?}");
            return;
        }
        self.uniforms
            .entry(program)
            .or_default()
            .values
            .insert(name.to_string(), value);
    }

    pub fn uniforms(&self, program: ProgramId) -> Option<&ProgramUniforms> {
        self.uniforms.get(&program)
    }

    pub fn draw(&mut self, batch: Batch, model: Mat4, color: Color) {
        let draw = RecordedDraw {
            batch,
            model,
            view: self.view,
            projection: self.projection,
            color,
            viewport: self.viewport,
            polygon_offset: self.polygon_offset,
            textures: self.textures,
            uniforms: self.uniforms.get(&batch.program).cloned().unwrap_or_default(),
        };
        let target = self.target();
        match self.passes.last_mut() {
            Some(pass) if pass.target == target => pass.draws.push(draw),
            _ => self.passes.push(RecordedPass {
                target,
                clear: None,
                draws: vec![draw],
            }),
        }
    }
}

/// Binds a framebuffer for the guard's lifetime and restores the previous binding on drop.
pub struct ScopedFramebuffer<'a> {
    recorder: &'a mut FrameRecorder,
    previous: Option<Framebuffer>,
}

impl<'a> ScopedFramebuffer<'a> {
    pub fn new(recorder: &'a mut FrameRecorder, framebuffer: Framebuffer) -> Self {
        let previous = recorder.bound_framebuffer();
        recorder.bind_framebuffer(Some(framebuffer));
        Self { recorder, previous }
    }
}

impl Deref for ScopedFramebuffer<'_> {
    type Target = FrameRecorder;

    fn deref(&self) -> &FrameRecorder {
        self.recorder
    }
}

impl DerefMut for ScopedFramebuffer<'_> {
    fn deref_mut(&mut self) -> &mut FrameRecorder {
        self.recorder
    }
}

impl Drop for ScopedFramebuffer<'_> {
    fn drop(&mut self) {
        self.recorder.bind_framebuffer(self.previous);
    }
}

/// Binds a texture to a unit for the guard's lifetime.
pub struct ScopedTextureBind<'a> {
    recorder: &'a mut FrameRecorder,
    unit: u8,
    previous: Option<TextureId>,
}

impl<'a> ScopedTextureBind<'a> {
    pub fn new(recorder: &'a mut FrameRecorder, unit: u8, texture: TextureId) -> Self {
        let previous = recorder.bound_texture(unit);
        recorder.bind_texture(unit, Some(texture));
        Self {
            recorder,
            unit,
            previous,
        }
    }
}

impl Deref for ScopedTextureBind<'_> {
    type Target = FrameRecorder;

    fn deref(&self) -> &FrameRecorder {
        self.recorder
    }
}

impl DerefMut for ScopedTextureBind<'_> {
    fn deref_mut(&mut self) -> &mut FrameRecorder {
        self.recorder
    }
}

impl Drop for ScopedTextureBind<'_> {
    fn drop(&mut self) {
        self.recorder.bind_texture(self.unit, self.previous);
    }
}
