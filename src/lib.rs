//! Basic two-pass shadow mapping, rendered with wgpu.
//!
//! The scene is first drawn from the light into a depth-only offscreen
//! target, then from an orbiting viewer while a shadow program compares each
//! fragment against that depth map. Frame orchestration is recorded through
//! [`FrameRecorder`] so it runs the same against the GPU renderer and the
//! headless device used by tests and display-less machines.

pub mod app;
pub mod assets;
pub mod camera;
pub mod config;
pub mod geometry;
pub mod input;
pub mod render;

pub use app::{AppControl, BatchSet, SceneBatches, ShadowMappingApp};
pub use assets::{AssetDir, AssetError};
pub use camera::PerspectiveCamera;
pub use config::Settings;
pub use geometry::Mesh;
pub use input::{KeyBindings, KeyCode, NamedKey};
pub use render::{
    FrameRecorder, GraphicsDevice, HeadlessDevice, RecordedFrame, Renderer, ShaderError,
    ShaderVariant,
};
