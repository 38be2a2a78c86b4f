use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Failure to read a file from the asset directory.
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("asset {name} not found in {}", dir.display())]
    NotFound { name: String, dir: PathBuf },
    #[error("unable to read asset {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("asset {} is not valid UTF-8", path.display())]
    NotUtf8 { path: PathBuf },
}

/// Read-only view of the directory holding shader sources.
#[derive(Debug, Clone)]
pub struct AssetDir {
    root: PathBuf,
}

impl AssetDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves an asset name relative to the directory root.
    pub fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Reads a text asset such as a shader source file.
    pub fn load_string(&self, name: &str) -> Result<String, AssetError> {
        let path = self.path(name);
        let bytes = fs::read(&path).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => AssetError::NotFound {
                name: name.to_string(),
                dir: self.root.clone(),
            },
            _ => AssetError::Io {
                path: path.clone(),
                source,
            },
        })?;
        String::from_utf8(bytes).map_err(|_| AssetError::NotUtf8 { path })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn loads_text_assets() {
        let dir = tempfile::tempdir().expect("temp dir");
        fs::write(dir.path().join("shader.wgsl"), "fn vs_main() {}").expect("write asset");
        let assets = AssetDir::new(dir.path());
        assert_eq!(assets.load_string("shader.wgsl").unwrap(), "fn vs_main() {}");
    }

    #[test]
    fn missing_asset_reports_name_and_directory() {
        let dir = tempfile::tempdir().expect("temp dir");
        let assets = AssetDir::new(dir.path());
        let err = assets.load_string("missing.wgsl").unwrap_err();
        assert!(matches!(err, AssetError::NotFound { ref name, .. } if name == "missing.wgsl"));
        assert!(err.to_string().contains("missing.wgsl"));
    }

    #[test]
    fn binary_asset_is_rejected() {
        let dir = tempfile::tempdir().expect("temp dir");
        fs::write(dir.path().join("blob.bin"), [0xff, 0xfe, 0x00]).expect("write asset");
        let assets = AssetDir::new(dir.path());
        assert!(matches!(
            assets.load_string("blob.bin"),
            Err(AssetError::NotUtf8 { .. })
        ));
    }
}
