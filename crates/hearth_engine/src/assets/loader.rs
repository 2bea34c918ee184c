//! Asset loaders
//!
//! A loader turns raw file bytes into a source description. Descriptors for
//! models and sprites are RON documents; textures and audio are kept as
//! opaque bytes, decoding them is the device's and the audio backend's job.

use super::AssetError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;
use std::path::Path;
use std::sync::Arc;

/// Converts file contents into an asset source
pub trait AssetLoader<T>: Send + Sync {
    /// Parse `bytes` read from `path`
    fn load(&self, path: &Path, bytes: &[u8]) -> Result<T, AssetError>;
}

/// One mesh of a model description
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeshSource {
    /// Number of indices drawn
    pub index_count: u32,
    /// Texture path, relative to the asset root
    #[serde(default)]
    pub texture: Option<String>,
}

/// Model description
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSource {
    /// Display name
    pub name: String,
    /// Meshes in draw order
    pub meshes: Vec<MeshSource>,
}

/// Sprite description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpriteSource {
    /// Texture path, relative to the asset root
    pub texture: String,
    /// Size in pixels
    pub size: [f32; 2],
    /// Normalized texture rectangle (u0, v0, u1, v1)
    #[serde(default = "full_rect")]
    pub uv_rect: [f32; 4],
}

fn full_rect() -> [f32; 4] {
    [0.0, 0.0, 1.0, 1.0]
}

/// Encoded texture contents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureSource {
    /// Encoded image bytes
    pub bytes: Arc<[u8]>,
}

/// Encoded audio clip
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioData {
    /// Clip name (file stem)
    pub name: String,
    /// Encoded audio bytes
    pub bytes: Arc<[u8]>,
}

/// Loader for RON descriptors
pub struct RonLoader<T>(PhantomData<fn() -> T>);

impl<T> Default for RonLoader<T> {
    fn default() -> Self {
        Self(PhantomData)
    }
}

impl<T: DeserializeOwned> AssetLoader<T> for RonLoader<T> {
    fn load(&self, path: &Path, bytes: &[u8]) -> Result<T, AssetError> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| AssetError::InvalidData(format!("{}: {e}", path.display())))?;
        ron::from_str(text).map_err(|e| AssetError::LoadFailed(format!("{}: {e}", path.display())))
    }
}

/// Keeps texture files as opaque bytes
#[derive(Debug, Default)]
pub struct RawTextureLoader;

impl AssetLoader<TextureSource> for RawTextureLoader {
    fn load(&self, path: &Path, bytes: &[u8]) -> Result<TextureSource, AssetError> {
        if bytes.is_empty() {
            return Err(AssetError::InvalidData(format!("{} is empty", path.display())));
        }
        Ok(TextureSource { bytes: bytes.into() })
    }
}

/// Keeps audio files as opaque bytes
#[derive(Debug, Default)]
pub struct RawAudioLoader;

impl AssetLoader<AudioData> for RawAudioLoader {
    fn load(&self, path: &Path, bytes: &[u8]) -> Result<AudioData, AssetError> {
        let name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .ok_or_else(|| AssetError::UnsupportedFormat(path.display().to_string()))?;
        Ok(AudioData {
            name: name.to_string(),
            bytes: bytes.into(),
        })
    }
}
