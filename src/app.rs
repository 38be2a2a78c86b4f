//! The shadow mapping demo: a teapot above a floor, lit by one shadow casting light.
//!
//! Every frame first renders scene depth from the light into an offscreen
//! target, then renders the scene from the orbiting viewer while the shadow
//! program compares each fragment against that depth map.

use anyhow::{Context, Result};
use glam::{Mat4, Vec3};
use log::{error, info};

use crate::assets::AssetDir;
use crate::camera::PerspectiveCamera;
use crate::config::Settings;
use crate::geometry::{cube, teapot};
use crate::input::{KeyBindings, KeyCode};
use crate::render::{
    Batch, Color, FrameRecorder, Framebuffer, GraphicsDevice, PolygonOffset, ProgramId,
    ProgramSource, ScopedFramebuffer, ScopedTextureBind, ShaderVariant, TextureId, UniformValue,
    Viewport, LIGHT_POSITION_UNIFORM, SHADOW_MAP_UNIFORM, SHADOW_MATRIX_UNIFORM,
};

pub const TEAPOT_SUBDIVISIONS: u32 = 8;
pub const FLOOR_SIZE: Vec3 = Vec3::new(10.0, 0.5, 10.0);
pub const FLOOR_OFFSET: Vec3 = Vec3::new(0.0, -2.0, 0.0);
pub const TEAPOT_COLOR: Color = Color::new(0.4, 0.6, 0.9);
pub const FLOOR_COLOR: Color = Color::new(0.7, 0.7, 0.7);
/// Offset applied while rendering the shadow map to avoid shadow acne.
pub const DEPTH_BIAS: PolygonOffset = PolygonOffset {
    factor: 2.0,
    units: 2.0,
};
pub const SHADOW_MAP_UNIT: u8 = 0;

const LIGHT_FOV_DEGREES: f32 = 100.0;
const LIGHT_CLIP: (f32, f32) = (0.5, 7.0);
const VIEWER_FOV_DEGREES: f32 = 60.0;
const VIEWER_CLIP: (f32, f32) = (0.5, 500.0);

/// Whether the frame loop keeps running after an input event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppControl {
    Continue,
    Exit,
}

/// Which program the scene is drawn with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchSet {
    /// Stock flat-color program, used for the depth pass.
    Plain,
    /// Shadow program, used for the color pass.
    Shadowed,
}

/// Teapot and floor geometry, each paired with both programs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneBatches {
    pub teapot: Batch,
    pub floor: Batch,
    pub teapot_shadowed: Batch,
    pub floor_shadowed: Batch,
}

impl SceneBatches {
    /// Returns `(teapot, floor)` for the requested set.
    pub fn select(&self, set: BatchSet) -> (Batch, Batch) {
        match set {
            BatchSet::Plain => (self.teapot, self.floor),
            BatchSet::Shadowed => (self.teapot_shadowed, self.floor_shadowed),
        }
    }
}

/// Viewer eye position after `elapsed` seconds.
pub fn viewer_eye(elapsed: f32) -> Vec3 {
    let swing = elapsed.sin();
    Vec3::new(5.0 * swing, 2.5 * swing + 2.0, 5.0)
}

/// Teapot rotation about the `(1, 1, 1)` axis, in radians.
pub fn teapot_rotation_angle(elapsed: f32) -> f32 {
    elapsed * 2.0
}

pub struct ShadowMappingApp {
    key_bindings: KeyBindings,
    light_position: Vec3,
    variant: ShaderVariant,
    shadow_map: TextureId,
    framebuffer: Framebuffer,
    shadow_program: ProgramId,
    batches: SceneBatches,
    camera: PerspectiveCamera,
    light_camera: PerspectiveCamera,
    elapsed: f32,
    window_size: (u32, u32),
    fullscreen: bool,
}

impl ShadowMappingApp {
    /// Creates the shadow map target, light camera, shadow program and scene batches.
    ///
    /// Fails when the shadow program cannot be loaded or compiled.
    pub fn setup<D: GraphicsDevice>(
        device: &mut D,
        assets: &AssetDir,
        settings: &Settings,
    ) -> Result<Self> {
        let variant =
            ShaderVariant::select(device.capabilities(), settings.force_reduced_shaders);
        info!(
            "using {} shadow shader variant from {}",
            variant.name(),
            assets.root().display()
        );

        let size = settings.shadow_map_size;
        let shadow_map = device
            .create_depth_texture(&variant.shadow_map_format(size, size))
            .context("failed to create shadow map")?;
        let framebuffer = device
            .create_framebuffer(shadow_map)
            .context("failed to create shadow framebuffer")?;

        let mut light_camera = PerspectiveCamera::default();
        light_camera.set_perspective(
            LIGHT_FOV_DEGREES,
            framebuffer.aspect_ratio(),
            LIGHT_CLIP.0,
            LIGHT_CLIP.1,
        );
        light_camera.look_at(settings.light_position, Vec3::ZERO);

        let shadow_program = match ProgramSource::shadow(assets, variant)
            .and_then(|source| device.create_program(&source))
        {
            Ok(program) => program,
            Err(err) => {
                error!("{err}");
                return Err(anyhow::Error::new(err).context("shadow shader setup failed"));
            }
        };
        let stock_program = device.stock_program()?;

        let teapot_mesh = teapot(TEAPOT_SUBDIVISIONS);
        let floor_mesh = cube(FLOOR_SIZE);
        let batches = SceneBatches {
            teapot: device.create_batch(&teapot_mesh, stock_program)?,
            floor: device.create_batch(&floor_mesh, stock_program)?,
            teapot_shadowed: device.create_batch(&teapot_mesh, shadow_program)?,
            floor_shadowed: device.create_batch(&floor_mesh, shadow_program)?,
        };

        let mut app = Self {
            key_bindings: settings.key_bindings,
            light_position: settings.light_position,
            variant,
            shadow_map,
            framebuffer,
            shadow_program,
            batches,
            camera: PerspectiveCamera::default(),
            light_camera,
            elapsed: 0.0,
            window_size: settings.window_size,
            fullscreen: false,
        };
        app.update(0.0, settings.window_size);
        Ok(app)
    }

    /// Advances the viewer camera to `elapsed` seconds for a window of `window_size` pixels.
    pub fn update(&mut self, elapsed: f32, window_size: (u32, u32)) {
        self.elapsed = elapsed;
        self.window_size = (window_size.0.max(1), window_size.1.max(1));
        let aspect = self.window_size.0 as f32 / self.window_size.1 as f32;
        self.camera
            .set_perspective(VIEWER_FOV_DEGREES, aspect, VIEWER_CLIP.0, VIEWER_CLIP.1);
        self.camera.look_at(viewer_eye(elapsed), Vec3::ZERO);
    }

    /// Records the depth pass followed by the shadowed color pass.
    pub fn draw(&self, gfx: &mut FrameRecorder) {
        self.render_depth_fbo(gfx);

        gfx.clear(Color::BLACK);
        gfx.set_matrices(self.camera.view_matrix(), self.camera.projection_matrix());
        gfx.set_viewport(Viewport::from_size(self.window_size));

        let mut gfx = ScopedTextureBind::new(gfx, SHADOW_MAP_UNIT, self.shadow_map);
        let light_position = gfx.view_matrix().transform_point3(self.light_position);
        gfx.uniform(
            self.shadow_program,
            SHADOW_MAP_UNIFORM,
            UniformValue::Int(SHADOW_MAP_UNIT as i32),
        );
        gfx.uniform(
            self.shadow_program,
            LIGHT_POSITION_UNIFORM,
            UniformValue::Vec3(light_position),
        );
        gfx.uniform(
            self.shadow_program,
            SHADOW_MATRIX_UNIFORM,
            UniformValue::Mat4(self.shadow_matrix()),
        );
        self.draw_scene(&mut gfx, BatchSet::Shadowed);
    }

    /// Renders scene depth from the light into the shadow map.
    pub fn render_depth_fbo(&self, gfx: &mut FrameRecorder) {
        gfx.enable_polygon_offset(DEPTH_BIAS);
        {
            let mut fbo = ScopedFramebuffer::new(gfx, self.framebuffer);
            fbo.set_viewport(Viewport::from_size(self.framebuffer.size()));
            fbo.clear(Color::BLACK);
            fbo.set_matrices(
                self.light_camera.view_matrix(),
                self.light_camera.projection_matrix(),
            );
            self.draw_scene(&mut fbo, BatchSet::Plain);
        }
        gfx.disable_polygon_offset();
    }

    pub fn draw_scene(&self, gfx: &mut FrameRecorder, set: BatchSet) {
        let (teapot, floor) = self.batches.select(set);
        let rotation = Mat4::from_axis_angle(
            Vec3::ONE.normalize(),
            teapot_rotation_angle(self.elapsed),
        );
        gfx.draw(teapot, rotation, TEAPOT_COLOR);
        gfx.draw(floor, Mat4::from_translation(FLOOR_OFFSET), FLOOR_COLOR);
    }

    pub fn key_down(&mut self, key: KeyCode) -> AppControl {
        if key == self.key_bindings.quit {
            AppControl::Exit
        } else if key == self.key_bindings.toggle_fullscreen {
            self.fullscreen = !self.fullscreen;
            AppControl::Continue
        } else {
            AppControl::Continue
        }
    }

    /// Light projection times light view.
    pub fn shadow_matrix(&self) -> Mat4 {
        self.light_camera.view_projection()
    }

    pub fn camera(&self) -> &PerspectiveCamera {
        &self.camera
    }

    pub fn light_camera(&self) -> &PerspectiveCamera {
        &self.light_camera
    }

    pub fn batches(&self) -> &SceneBatches {
        &self.batches
    }

    pub fn variant(&self) -> ShaderVariant {
        self.variant
    }

    pub fn framebuffer(&self) -> Framebuffer {
        self.framebuffer
    }

    pub fn shadow_map(&self) -> TextureId {
        self.shadow_map
    }

    pub fn shadow_program(&self) -> ProgramId {
        self.shadow_program
    }

    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    pub fn is_fullscreen(&self) -> bool {
        self.fullscreen
    }

    /// Adopts a fullscreen state changed outside the app, e.g. by the window manager.
    pub fn set_fullscreen(&mut self, fullscreen: bool) {
        self.fullscreen = fullscreen;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_ASSET_DIR;
    use crate::render::{
        Capabilities, HeadlessDevice, RecordedFrame, RenderTarget, ShaderError,
    };
    use std::fs;

    fn setup(device: &mut HeadlessDevice) -> ShadowMappingApp {
        ShadowMappingApp::setup(
            device,
            &AssetDir::new(DEFAULT_ASSET_DIR),
            &Settings::default(),
        )
        .expect("setup succeeds with bundled shaders")
    }

    fn record(app: &ShadowMappingApp, gfx: &mut FrameRecorder) -> RecordedFrame {
        gfx.begin_frame();
        app.draw(gfx);
        gfx.finish_frame()
    }

    fn assert_vec3_near(actual: Vec3, expected: Vec3) {
        assert!(
            (actual - expected).length() < 1e-5,
            "{actual:?} != {expected:?}"
        );
    }

    #[test]
    fn setup_creates_square_shadow_target() {
        let mut device = HeadlessDevice::default();
        let app = setup(&mut device);
        assert_eq!(app.variant(), ShaderVariant::Full);
        assert_eq!(app.framebuffer().size(), (2048, 2048));
        assert_eq!(app.framebuffer().depth_attachment, app.shadow_map());
        let format = device.texture_format(app.shadow_map()).unwrap();
        assert_eq!(format.format, wgpu::TextureFormat::Depth32Float);
        assert_eq!(format.compare, Some(wgpu::CompareFunction::LessEqual));

        let light = app.light_camera();
        assert_eq!(light.fov_degrees(), 100.0);
        assert_eq!(light.aspect(), 1.0);
        assert_eq!(light.clip_planes(), (0.5, 7.0));
        assert_eq!(light.eye(), Vec3::new(0.0, 5.0, 1.0));
        assert_eq!(light.target(), Vec3::ZERO);
    }

    #[test]
    fn limited_devices_get_reduced_variant() {
        let mut device = HeadlessDevice::new(Capabilities {
            comparison_sampling: false,
        });
        let app = setup(&mut device);
        assert_eq!(app.variant(), ShaderVariant::Reduced);
        let format = device.texture_format(app.shadow_map()).unwrap();
        assert_eq!(format.format, wgpu::TextureFormat::Depth16Unorm);
        assert_eq!(format.compare, None);
    }

    #[test]
    fn batches_pair_geometry_with_both_programs() {
        let mut device = HeadlessDevice::default();
        let app = setup(&mut device);
        let batches = app.batches();
        assert_eq!(batches.teapot_shadowed.program, app.shadow_program());
        assert_eq!(batches.floor_shadowed.program, app.shadow_program());
        assert_ne!(batches.teapot.program, app.shadow_program());
        assert_eq!(batches.teapot.program, batches.floor.program);
        assert_eq!(device.batch(batches.floor).unwrap().triangle_count, 12);
        assert_eq!(
            device.batch(batches.teapot).unwrap().vertex_count,
            device.batch(batches.teapot_shadowed).unwrap().vertex_count
        );
    }

    #[test]
    fn missing_shader_aborts_setup() {
        let dir = tempfile::tempdir().expect("temp dir");
        let mut device = HeadlessDevice::default();
        let err = ShadowMappingApp::setup(
            &mut device,
            &AssetDir::new(dir.path()),
            &Settings::default(),
        )
        .err()
        .expect("setup fails without shaders");
        assert!(matches!(
            err.downcast_ref::<ShaderError>(),
            Some(ShaderError::Asset(_))
        ));
    }

    #[test]
    fn uncompilable_shader_aborts_setup() {
        let dir = tempfile::tempdir().expect("temp dir");
        let full = ShaderVariant::Full;
        fs::write(dir.path().join(full.vertex_asset()), "fn vs_main ((( not wgsl").unwrap();
        fs::write(dir.path().join(full.fragment_asset()), "}}} fn fs_main @@@").unwrap();
        let mut device = HeadlessDevice::default();
        let err = ShadowMappingApp::setup(
            &mut device,
            &AssetDir::new(dir.path()),
            &Settings::default(),
        )
        .err()
        .expect("setup fails with a broken shader");
        assert!(matches!(
            err.downcast_ref::<ShaderError>(),
            Some(ShaderError::Compile { .. })
        ));
    }

    #[test]
    fn viewer_orbits_the_origin() {
        let mut device = HeadlessDevice::default();
        let mut app = setup(&mut device);
        for t in [0.0, 0.5, 1.0, 2.5, 10.0] {
            app.update(t, (1024, 768));
            let expected = Vec3::new(5.0 * t.sin(), 2.0 + 2.5 * t.sin(), 5.0);
            assert_vec3_near(app.camera().eye(), expected);
            assert_eq!(app.camera().target(), Vec3::ZERO);
            assert_eq!(app.camera().fov_degrees(), 60.0);
            assert_eq!(app.camera().clip_planes(), (0.5, 500.0));
        }
    }

    #[test]
    fn initial_frame_state() {
        let mut device = HeadlessDevice::default();
        let mut app = setup(&mut device);
        app.update(0.0, (1024, 768));
        assert_vec3_near(app.camera().eye(), Vec3::new(0.0, 2.0, 5.0));
        assert_eq!(teapot_rotation_angle(app.elapsed()), 0.0);
        assert!((app.camera().aspect() - 1024.0 / 768.0).abs() < 1e-6);
    }

    #[test]
    fn light_camera_and_shadow_matrix_stay_fixed() {
        let mut device = HeadlessDevice::default();
        let mut app = setup(&mut device);
        let mut gfx = FrameRecorder::new();
        let light_view = app.light_camera().view_matrix();
        let light_projection = app.light_camera().projection_matrix();

        for frame in 0..3 {
            app.update(frame as f32 * 0.7, (800, 600));
            let recorded = record(&app, &mut gfx);
            assert_eq!(app.light_camera().view_matrix(), light_view);
            assert_eq!(app.light_camera().projection_matrix(), light_projection);
            for (pass, draw) in recorded.draws() {
                match pass.target {
                    RenderTarget::Offscreen(_) => {
                        assert_eq!(draw.view, light_view);
                        assert_eq!(draw.projection, light_projection);
                    }
                    RenderTarget::Window => assert_eq!(
                        draw.uniforms.mat4(SHADOW_MATRIX_UNIFORM),
                        Some(light_projection * light_view)
                    ),
                }
            }
        }
    }

    #[test]
    fn depth_pass_precedes_color_pass() {
        let mut device = HeadlessDevice::default();
        let app = setup(&mut device);
        let mut gfx = FrameRecorder::new();
        let frame = record(&app, &mut gfx);

        assert_eq!(frame.passes.len(), 2);
        let depth = &frame.passes[0];
        let color = &frame.passes[1];
        assert_eq!(depth.target, RenderTarget::Offscreen(app.framebuffer()));
        assert_eq!(depth.clear, Some(Color::BLACK));
        assert_eq!(color.target, RenderTarget::Window);
        assert!(color.clear.is_some());

        let plain = [app.batches().teapot, app.batches().floor];
        let shadowed = [app.batches().teapot_shadowed, app.batches().floor_shadowed];
        assert_eq!(depth.draws.iter().map(|d| d.batch).collect::<Vec<_>>(), plain);
        assert_eq!(color.draws.iter().map(|d| d.batch).collect::<Vec<_>>(), shadowed);
        for draw in &depth.draws {
            assert_eq!(draw.polygon_offset, Some(DEPTH_BIAS));
            assert_eq!(draw.viewport, Some(Viewport::from_size((2048, 2048))));
            assert_eq!(draw.textures[SHADOW_MAP_UNIT as usize], None);
        }
        for draw in &color.draws {
            assert_eq!(draw.polygon_offset, None);
            assert_eq!(draw.viewport, Some(Viewport::from_size((1024, 768))));
            assert_eq!(draw.textures[SHADOW_MAP_UNIT as usize], Some(app.shadow_map()));
        }
    }

    #[test]
    fn frame_leaves_bindings_restored() {
        let mut device = HeadlessDevice::default();
        let app = setup(&mut device);
        let mut gfx = FrameRecorder::new();
        record(&app, &mut gfx);
        assert_eq!(gfx.bound_framebuffer(), None);
        assert_eq!(gfx.bound_texture(SHADOW_MAP_UNIT), None);
        assert_eq!(gfx.polygon_offset(), None);
    }

    #[test]
    fn color_pass_uploads_shadow_uniforms() {
        let mut device = HeadlessDevice::default();
        let mut app = setup(&mut device);
        app.update(1.3, (1024, 768));
        let mut gfx = FrameRecorder::new();
        let frame = record(&app, &mut gfx);

        let draw = &frame.passes[1].draws[0];
        let view = app.camera().view_matrix();
        assert_eq!(draw.uniforms.int(SHADOW_MAP_UNIFORM), Some(0));
        assert_vec3_near(
            draw.uniforms.vec3(LIGHT_POSITION_UNIFORM).unwrap(),
            view.transform_point3(Vec3::new(0.0, 5.0, 1.0)),
        );
        assert_eq!(
            draw.uniforms.mat4(SHADOW_MATRIX_UNIFORM),
            Some(app.shadow_matrix())
        );
        // The depth pass program never receives shadow uniforms.
        assert!(frame.passes[0].draws[0].uniforms.is_empty());
    }

    #[test]
    fn scene_transforms_follow_time() {
        let mut device = HeadlessDevice::default();
        let mut app = setup(&mut device);
        app.update(0.75, (1024, 768));
        let mut gfx = FrameRecorder::new();
        app.draw_scene(&mut gfx, BatchSet::Shadowed);
        let frame = gfx.finish_frame();
        let draws: Vec<_> = frame.draws().map(|(_, draw)| draw).collect();

        let expected = Mat4::from_axis_angle(Vec3::ONE.normalize(), 1.5);
        assert!(draws[0].model.abs_diff_eq(expected, 1e-6));
        assert_eq!(draws[0].color, TEAPOT_COLOR);
        assert_eq!(draws[1].model, Mat4::from_translation(Vec3::new(0.0, -2.0, 0.0)));
        assert_eq!(draws[1].color, FLOOR_COLOR);
    }

    #[test]
    fn keys_quit_and_toggle_fullscreen() {
        let mut device = HeadlessDevice::default();
        let mut app = setup(&mut device);
        let camera = app.camera().clone();

        assert_eq!(app.key_down(KeyCode::Character('F')), AppControl::Continue);
        assert!(app.is_fullscreen());
        assert_eq!(app.key_down(KeyCode::Character('F')), AppControl::Continue);
        assert!(!app.is_fullscreen());
        assert_eq!(app.key_down(KeyCode::Character('Q')), AppControl::Continue);
        assert_eq!(app.camera(), &camera);
        assert_eq!(app.key_down(KeyCode::ESCAPE), AppControl::Exit);
    }

    #[test]
    fn toggle_follows_fullscreen_left_externally() {
        let mut device = HeadlessDevice::default();
        let mut app = setup(&mut device);
        app.key_down(KeyCode::Character('F'));
        assert!(app.is_fullscreen());

        // The window manager dropped fullscreen; one press re-enters it.
        app.set_fullscreen(false);
        app.key_down(KeyCode::Character('F'));
        assert!(app.is_fullscreen());
    }
}
