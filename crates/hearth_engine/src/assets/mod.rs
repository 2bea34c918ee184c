//! Asset management system
//!
//! [`AssetManager`] loads models, textures, sprites and audio clips through
//! pluggable [`AssetLoader`]s, caches them by path and hands out ids. GPU
//! handles for meshes and textures are allocated here; uploading the data is
//! up to the graphics device. The manager is stored as a world resource so
//! the draw system can resolve model ids.

pub mod loader;

pub use loader::{
    AssetLoader, AudioData, MeshSource, ModelSource, RawAudioLoader, RawTextureLoader, RonLoader, SpriteSource,
    TextureSource,
};

use crate::ecs::{Component, Entity, World};
use crate::foundation::math::Vec2;
use crate::render::{MeshHandle, ModelComponent, Sprite, TextureHandle};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Id of a loaded model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModelId(pub u32);

/// Id of a loaded sprite
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpriteId(pub u32);

/// Id of a loaded audio clip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AudioId(pub u32);

/// Asset loading errors
#[derive(Error, Debug)]
pub enum AssetError {
    /// Asset not found
    #[error("Asset not found: {0}")]
    NotFound(String),

    /// Failed to load asset
    #[error("Failed to load asset: {0}")]
    LoadFailed(String),

    /// Invalid asset data
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Unsupported asset format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// IO error during asset loading
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// One drawable mesh of a model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshData {
    /// Geometry handle
    pub mesh: MeshHandle,
    /// Number of indices drawn
    pub index_count: u32,
    /// Material texture
    pub texture: Option<TextureHandle>,
}

/// A loaded model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelData {
    /// Display name
    pub name: String,
    /// Meshes in draw order
    pub meshes: Vec<MeshData>,
}

/// A loaded texture
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureData {
    /// Display name
    pub name: String,
    /// GPU handle
    pub handle: TextureHandle,
    /// Size of the encoded data
    pub byte_len: usize,
}

/// A loaded sprite
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpriteData {
    /// Texture sampled by the sprite
    pub texture: TextureHandle,
    /// Size in pixels
    pub size: Vec2,
    /// Normalized texture rectangle
    pub uv_rect: [f32; 4],
}

impl SpriteData {
    /// Sprite instance centered at `position`
    pub fn sprite(&self, position: Vec2) -> Sprite {
        Sprite::new(self.texture, position, self.size).with_uv_rect(self.uv_rect)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum AssetKind {
    Model,
    Texture,
    Sprite,
    Audio,
}

/// Asset management system
pub struct AssetManager {
    root: PathBuf,
    model_loader: Box<dyn AssetLoader<ModelSource>>,
    texture_loader: Box<dyn AssetLoader<TextureSource>>,
    sprite_loader: Box<dyn AssetLoader<SpriteSource>>,
    audio_loader: Box<dyn AssetLoader<AudioData>>,
    models: Vec<ModelData>,
    textures: HashMap<TextureHandle, TextureData>,
    sprites: Vec<SpriteData>,
    audio: Vec<AudioData>,
    by_path: HashMap<(AssetKind, PathBuf), u32>,
    next_mesh: u32,
    next_texture: u32,
    cube: ModelId,
}

impl Component for AssetManager {}

impl std::fmt::Debug for AssetManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetManager")
            .field("root", &self.root)
            .field("models", &self.models.len())
            .field("textures", &self.textures.len())
            .field("sprites", &self.sprites.len())
            .field("audio", &self.audio.len())
            .finish_non_exhaustive()
    }
}

impl Default for AssetManager {
    fn default() -> Self {
        Self::new()
    }
}

impl AssetManager {
    /// Asset manager rooted at the working directory
    pub fn new() -> Self {
        Self::with_root(".")
    }

    /// Asset manager resolving relative paths against `root`
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        let mut manager = Self {
            root: root.into(),
            model_loader: Box::new(RonLoader::<ModelSource>::default()),
            texture_loader: Box::new(RawTextureLoader),
            sprite_loader: Box::new(RonLoader::<SpriteSource>::default()),
            audio_loader: Box::new(RawAudioLoader),
            models: Vec::new(),
            textures: HashMap::new(),
            sprites: Vec::new(),
            audio: Vec::new(),
            by_path: HashMap::new(),
            next_mesh: 0,
            next_texture: 0,
            cube: ModelId(0),
        };
        let mesh = manager.allocate_mesh();
        manager.cube = manager.push_model(ModelData {
            name: "cube".to_string(),
            meshes: vec![MeshData {
                mesh,
                index_count: 36,
                texture: None,
            }],
        });
        manager
    }

    /// Builder pattern: Replace the model loader
    pub fn with_model_loader(mut self, loader: impl AssetLoader<ModelSource> + 'static) -> Self {
        self.model_loader = Box::new(loader);
        self
    }

    /// Builder pattern: Replace the texture loader
    pub fn with_texture_loader(mut self, loader: impl AssetLoader<TextureSource> + 'static) -> Self {
        self.texture_loader = Box::new(loader);
        self
    }

    /// Asset root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The built-in unit cube
    pub fn cube(&self) -> ModelId {
        self.cube
    }

    /// Number of loaded models, the built-in cube included
    pub fn model_count(&self) -> usize {
        self.models.len()
    }

    fn allocate_mesh(&mut self) -> MeshHandle {
        let handle = MeshHandle(self.next_mesh);
        self.next_mesh += 1;
        handle
    }

    fn allocate_texture(&mut self) -> TextureHandle {
        let handle = TextureHandle(self.next_texture);
        self.next_texture += 1;
        handle
    }

    fn push_model(&mut self, model: ModelData) -> ModelId {
        self.models.push(model);
        ModelId(self.models.len() as u32 - 1)
    }

    fn read(&self, path: &Path) -> Result<Vec<u8>, AssetError> {
        let full = self.root.join(path);
        if !full.exists() {
            return Err(AssetError::NotFound(full.display().to_string()));
        }
        Ok(std::fs::read(full)?)
    }

    fn cached(&self, kind: AssetKind, path: &Path) -> Option<u32> {
        self.by_path.get(&(kind, path.to_path_buf())).copied()
    }

    /// Load a model description and its textures
    pub fn load_model(&mut self, path: impl AsRef<Path>) -> Result<ModelId, AssetError> {
        let path = path.as_ref();
        if let Some(id) = self.cached(AssetKind::Model, path) {
            return Ok(ModelId(id));
        }
        let bytes = self.read(path)?;
        let source = self.model_loader.load(path, &bytes)?;
        let id = self.insert_model(source)?;
        self.by_path.insert((AssetKind::Model, path.to_path_buf()), id.0);
        log::debug!("loaded model {} as {id:?}", path.display());
        Ok(id)
    }

    /// Add a model built in memory, loading the textures it references
    pub fn insert_model(&mut self, source: ModelSource) -> Result<ModelId, AssetError> {
        if source.meshes.is_empty() {
            return Err(AssetError::InvalidData(format!("model {} has no meshes", source.name)));
        }
        let mut meshes = Vec::with_capacity(source.meshes.len());
        for mesh in &source.meshes {
            let texture = mesh.texture.as_ref().map(|path| self.load_texture(path)).transpose()?;
            meshes.push(MeshData {
                mesh: self.allocate_mesh(),
                index_count: mesh.index_count,
                texture,
            });
        }
        Ok(self.push_model(ModelData {
            name: source.name,
            meshes,
        }))
    }

    /// Load a texture
    pub fn load_texture(&mut self, path: impl AsRef<Path>) -> Result<TextureHandle, AssetError> {
        let path = path.as_ref();
        if let Some(id) = self.cached(AssetKind::Texture, path) {
            return Ok(TextureHandle(id));
        }
        let bytes = self.read(path)?;
        let source = self.texture_loader.load(path, &bytes)?;
        let handle = self.insert_texture(&path.display().to_string(), &source);
        self.by_path.insert((AssetKind::Texture, path.to_path_buf()), handle.0);
        Ok(handle)
    }

    /// Add a texture built in memory
    pub fn insert_texture(&mut self, name: &str, source: &TextureSource) -> TextureHandle {
        let handle = self.allocate_texture();
        self.textures.insert(
            handle,
            TextureData {
                name: name.to_string(),
                handle,
                byte_len: source.bytes.len(),
            },
        );
        handle
    }

    /// Load a sprite description and its texture
    pub fn load_sprite(&mut self, path: impl AsRef<Path>) -> Result<SpriteId, AssetError> {
        let path = path.as_ref();
        if let Some(id) = self.cached(AssetKind::Sprite, path) {
            return Ok(SpriteId(id));
        }
        let bytes = self.read(path)?;
        let source = self.sprite_loader.load(path, &bytes)?;
        let texture = self.load_texture(&source.texture)?;
        let id = self.insert_sprite(SpriteData {
            texture,
            size: Vec2::new(source.size[0], source.size[1]),
            uv_rect: source.uv_rect,
        });
        self.by_path.insert((AssetKind::Sprite, path.to_path_buf()), id.0);
        Ok(id)
    }

    /// Add a sprite built in memory
    pub fn insert_sprite(&mut self, sprite: SpriteData) -> SpriteId {
        self.sprites.push(sprite);
        SpriteId(self.sprites.len() as u32 - 1)
    }

    /// Load an audio clip
    pub fn load_audio(&mut self, path: impl AsRef<Path>) -> Result<AudioId, AssetError> {
        let path = path.as_ref();
        if let Some(id) = self.cached(AssetKind::Audio, path) {
            return Ok(AudioId(id));
        }
        let bytes = self.read(path)?;
        let clip = self.audio_loader.load(path, &bytes)?;
        self.audio.push(clip);
        let id = AudioId(self.audio.len() as u32 - 1);
        self.by_path.insert((AssetKind::Audio, path.to_path_buf()), id.0);
        Ok(id)
    }

    /// Get a model
    pub fn get_model_data(&self, id: ModelId) -> Option<&ModelData> {
        self.models.get(id.0 as usize)
    }

    /// Get a texture
    pub fn get_texture_data(&self, handle: TextureHandle) -> Option<&TextureData> {
        self.textures.get(&handle)
    }

    /// Get a sprite
    pub fn get_sprite_data(&self, id: SpriteId) -> Option<&SpriteData> {
        self.sprites.get(id.0 as usize)
    }

    /// Get an audio clip
    pub fn get_audio_data(&self, id: AudioId) -> Option<&AudioData> {
        self.audio.get(id.0 as usize)
    }
}

/// Load a model and attach it to `entity`
///
/// A missing or broken model is not fatal: the failure is logged and the
/// entity is left without a model. Returns whether the model was attached.
pub fn attach_model(world: &World, entity: Entity, assets: &mut AssetManager, path: impl AsRef<Path>) -> bool {
    let path = path.as_ref();
    let id = match assets.load_model(path) {
        Ok(id) => id,
        Err(error) => {
            log::warn!("not attaching {} to {entity}: {error}", path.display());
            return false;
        }
    };
    match world.insert(entity, ModelComponent::new(id)) {
        Ok(_) => true,
        Err(error) => {
            log::warn!("not attaching {} to {entity}: {error}", path.display());
            false
        }
    }
}
