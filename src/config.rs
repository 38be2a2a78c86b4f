use std::path::PathBuf;

use glam::Vec3;

use crate::input::KeyBindings;

/// Asset directory shipped next to the crate manifest.
pub const DEFAULT_ASSET_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/assets");

/// Startup configuration for the demo.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub title: String,
    /// Initial window size in logical pixels.
    pub window_size: (u32, u32),
    /// Edge length of the square shadow map.
    pub shadow_map_size: u32,
    pub light_position: Vec3,
    pub key_bindings: KeyBindings,
    pub asset_dir: PathBuf,
    /// Use the reduced shader variant even when comparison sampling is available.
    pub force_reduced_shaders: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            title: "Shadow Mapping Basic".to_string(),
            window_size: (1024, 768),
            shadow_map_size: 2048,
            light_position: Vec3::new(0.0, 5.0, 1.0),
            key_bindings: KeyBindings::default(),
            asset_dir: PathBuf::from(DEFAULT_ASSET_DIR),
            force_reduced_shaders: false,
        }
    }
}
