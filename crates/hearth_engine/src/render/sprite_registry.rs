//! Persistent sprite registry and sprite batching
//!
//! Sprites added to the registry persist across frames until erased. The
//! registry keeps its draw order sorted by [`sprite_order`]; updates only
//! flag entries dirty, and [`SpriteSceneData::reorder`] moves the dirty
//! entries back into place before drawing. Consecutive sprites sharing a
//! texture and blend mode form one instanced batch.

use super::device::TextureHandle;
use super::SceneError;
use crate::foundation::math::Vec2;
use bytemuck::{Pod, Zeroable};
use slotmap::SlotMap;
use std::cmp::Ordering;

slotmap::new_key_type! {
    /// Identifier of a sprite in the persistent registry
    pub struct SpriteSceneId;
}

/// A screen-space sprite
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sprite {
    /// Texture sampled by the sprite
    pub texture: TextureHandle,
    /// Center in pixels
    pub position: Vec2,
    /// Width and height in pixels
    pub size: Vec2,
    /// Rotation around the center in radians
    pub rotation: f32,
    /// Distance from the viewer; larger is farther
    pub depth: f32,
    /// RGBA multiplier
    pub color: [f32; 4],
    /// Normalized texture rectangle (u0, v0, u1, v1)
    pub uv_rect: [f32; 4],
    /// Drawn with alpha blending
    pub alpha: bool,
}

impl Sprite {
    /// Opaque sprite covering the whole texture
    pub fn new(texture: TextureHandle, position: Vec2, size: Vec2) -> Self {
        Self {
            texture,
            position,
            size,
            rotation: 0.0,
            depth: 0.0,
            color: [1.0; 4],
            uv_rect: [0.0, 0.0, 1.0, 1.0],
            alpha: false,
        }
    }

    /// Builder pattern: Set depth
    pub fn with_depth(mut self, depth: f32) -> Self {
        self.depth = depth;
        self
    }

    /// Builder pattern: Enable alpha blending
    pub fn with_alpha(mut self) -> Self {
        self.alpha = true;
        self
    }

    /// Builder pattern: Set rotation
    pub fn with_rotation(mut self, rotation: f32) -> Self {
        self.rotation = rotation;
        self
    }

    /// Builder pattern: Set color
    pub fn with_color(mut self, color: [f32; 4]) -> Self {
        self.color = color;
        self
    }

    /// Builder pattern: Set texture rectangle
    pub fn with_uv_rect(mut self, uv_rect: [f32; 4]) -> Self {
        self.uv_rect = uv_rect;
        self
    }

    fn sort_key_eq(&self, other: &Sprite) -> bool {
        self.texture == other.texture && self.alpha == other.alpha && self.depth.total_cmp(&other.depth).is_eq()
    }

    /// GPU instance data
    pub fn instance(&self) -> SpriteInstance {
        SpriteInstance {
            position_size: [self.position.x, self.position.y, self.size.x, self.size.y],
            rotation_depth: [self.rotation, self.depth, 0.0, 0.0],
            color: self.color,
            uv_rect: self.uv_rect,
        }
    }
}

/// Draw order of sprites
///
/// Opaque sprites come before alpha-blended ones. Opaque sprites are grouped
/// by texture, then drawn front to back. Alpha sprites are drawn back to
/// front, ties grouped by texture.
pub fn sprite_order(a: &Sprite, b: &Sprite) -> Ordering {
    match (a.alpha, b.alpha) {
        (false, true) => Ordering::Less,
        (true, false) => Ordering::Greater,
        (false, false) => a.texture.cmp(&b.texture).then(a.depth.total_cmp(&b.depth)),
        (true, true) => b.depth.total_cmp(&a.depth).then(a.texture.cmp(&b.texture)),
    }
}

/// Whether a sequence is in draw order
pub fn is_sorted(sprites: &[Sprite]) -> bool {
    sprites.windows(2).all(|pair| sprite_order(&pair[0], &pair[1]) != Ordering::Greater)
}

/// A run of sprites drawn with one instanced draw
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpriteBatch {
    /// Texture shared by the run
    pub texture: TextureHandle,
    /// Blend mode shared by the run
    pub alpha: bool,
    /// Index of the first sprite
    pub start: usize,
    /// Number of sprites
    pub count: usize,
}

/// Split an ordered sprite list into runs of equal texture and blend mode
pub fn build_batches(sprites: &[Sprite]) -> Vec<SpriteBatch> {
    let mut batches: Vec<SpriteBatch> = Vec::new();
    for (index, sprite) in sprites.iter().enumerate() {
        match batches.last_mut() {
            Some(batch) if batch.texture == sprite.texture && batch.alpha == sprite.alpha => batch.count += 1,
            _ => batches.push(SpriteBatch {
                texture: sprite.texture,
                alpha: sprite.alpha,
                start: index,
                count: 1,
            }),
        }
    }
    batches
}

/// GPU layout of one sprite instance
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct SpriteInstance {
    /// Center xy, size zw
    pub position_size: [f32; 4],
    /// x rotation, y depth
    pub rotation_depth: [f32; 4],
    /// RGBA multiplier
    pub color: [f32; 4],
    /// Texture rectangle
    pub uv_rect: [f32; 4],
}

#[derive(Debug)]
struct SpriteEntry {
    sprite: Sprite,
    dirty: bool,
}

/// Persistent sprites in draw order
#[derive(Debug)]
pub struct SpriteSceneData {
    sprites: SlotMap<SpriteSceneId, SpriteEntry>,
    order: Vec<SpriteSceneId>,
    capacity: usize,
    dirty_count: usize,
}

impl Default for SpriteSceneData {
    fn default() -> Self {
        Self::with_capacity(1024)
    }
}

impl SpriteSceneData {
    /// Create a registry holding at most `capacity` sprites
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            sprites: SlotMap::with_capacity_and_key(capacity.min(4096)),
            order: Vec::new(),
            capacity,
            dirty_count: 0,
        }
    }

    /// Maximum number of sprites
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of registered sprites
    pub fn len(&self) -> usize {
        self.sprites.len()
    }

    /// Whether no sprite is registered
    pub fn is_empty(&self) -> bool {
        self.sprites.is_empty()
    }

    /// Number of sprites waiting for [`reorder`](Self::reorder)
    pub fn dirty_count(&self) -> usize {
        self.dirty_count
    }

    /// Register a sprite
    pub fn add(&mut self, sprite: Sprite) -> Result<SpriteSceneId, SceneError> {
        if self.sprites.len() >= self.capacity {
            log::error!("sprite registry is full ({} sprites)", self.capacity);
            return Err(SceneError::SpriteRegistryFull { capacity: self.capacity });
        }
        let id = self.sprites.insert(SpriteEntry { sprite, dirty: true });
        self.order.push(id);
        self.dirty_count += 1;
        Ok(id)
    }

    /// Replace a sprite; only changes to texture, blend mode or depth require reordering
    pub fn update(&mut self, id: SpriteSceneId, sprite: Sprite) -> Result<(), SceneError> {
        let entry = self.sprites.get_mut(id).ok_or(SceneError::UnknownSprite(id))?;
        if !entry.dirty && !entry.sprite.sort_key_eq(&sprite) {
            entry.dirty = true;
            self.dirty_count += 1;
        }
        entry.sprite = sprite;
        Ok(())
    }

    /// Remove a sprite
    pub fn erase(&mut self, id: SpriteSceneId) -> Result<Sprite, SceneError> {
        let entry = self.sprites.remove(id).ok_or(SceneError::UnknownSprite(id))?;
        if entry.dirty {
            self.dirty_count -= 1;
        }
        // Removing an element keeps the remaining order valid
        self.order.retain(|other| *other != id);
        Ok(entry.sprite)
    }

    /// Get a sprite
    pub fn get(&self, id: SpriteSceneId) -> Option<&Sprite> {
        self.sprites.get(id).map(|entry| &entry.sprite)
    }

    /// Move dirty sprites back into draw order, returning how many moved
    ///
    /// Clean sprites are already mutually ordered, so the dirty ones are
    /// pulled out, sorted among themselves and merged back in. The result
    /// matches inserting each dirty sprite into place one at a time: clean
    /// sprites keep their relative order, `sort_by` is stable so dirty ties
    /// keep registry order, and a dirty sprite lands after clean sprites it
    /// compares equal to.
    pub fn reorder(&mut self) -> usize {
        if self.dirty_count == 0 {
            return 0;
        }

        let sprites = &self.sprites;
        let (mut dirty, clean): (Vec<SpriteSceneId>, Vec<SpriteSceneId>) =
            self.order.iter().copied().partition(|id| sprites[*id].dirty);
        dirty.sort_by(|a, b| sprite_order(&sprites[*a].sprite, &sprites[*b].sprite));

        let moved = dirty.len();
        let mut merged = Vec::with_capacity(self.order.len());
        let mut dirty = dirty.into_iter().peekable();
        for id in clean {
            while let Some(next) = dirty.next_if(|next| {
                sprite_order(&sprites[*next].sprite, &sprites[id].sprite) == Ordering::Less
            }) {
                merged.push(next);
            }
            merged.push(id);
        }
        merged.extend(dirty);

        self.order = merged;
        for entry in self.sprites.values_mut() {
            entry.dirty = false;
        }
        self.dirty_count = 0;
        log::trace!("reordered {moved} sprites");
        moved
    }

    /// Sprites in current registry order
    pub fn iter_ordered(&self) -> impl Iterator<Item = (SpriteSceneId, &Sprite)> + '_ {
        self.order.iter().map(move |id| (*id, &self.sprites[*id].sprite))
    }

    /// Reorder, then copy the sprites out in draw order
    pub fn sorted_sprites(&mut self) -> Vec<Sprite> {
        self.reorder();
        self.iter_ordered().map(|(_, sprite)| *sprite).collect()
    }

    /// Whether the registry is in draw order
    pub fn is_sorted(&self) -> bool {
        let sprites: Vec<Sprite> = self.iter_ordered().map(|(_, sprite)| *sprite).collect();
        is_sorted(&sprites)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn sprite(texture: u32, depth: f32, alpha: bool) -> Sprite {
        let sprite = Sprite::new(TextureHandle(texture), Vec2::zeros(), Vec2::new(16.0, 16.0)).with_depth(depth);
        if alpha {
            sprite.with_alpha()
        } else {
            sprite
        }
    }

    #[test]
    fn test_order_opaque_before_alpha() {
        assert_eq!(sprite_order(&sprite(9, 9.0, false), &sprite(0, 0.0, true)), Ordering::Less);
        // Opaque: texture first, then front to back
        assert_eq!(sprite_order(&sprite(1, 5.0, false), &sprite(2, 1.0, false)), Ordering::Less);
        assert_eq!(sprite_order(&sprite(1, 1.0, false), &sprite(1, 5.0, false)), Ordering::Less);
        // Alpha: back to front
        assert_eq!(sprite_order(&sprite(1, 5.0, true), &sprite(0, 1.0, true)), Ordering::Less);
    }

    #[test]
    fn test_registry_sorted_after_random_edits() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut registry = SpriteSceneData::with_capacity(256);
        let mut ids = Vec::new();

        for _ in 0..100 {
            let id = registry
                .add(sprite(rng.gen_range(0..4), rng.gen_range(0.0..10.0), rng.gen_bool(0.3)))
                .unwrap();
            ids.push(id);
        }
        registry.reorder();
        assert!(registry.is_sorted());

        for round in 0..20 {
            for _ in 0..10 {
                let id = ids[rng.gen_range(0..ids.len())];
                registry
                    .update(id, sprite(rng.gen_range(0..4), rng.gen_range(0.0..10.0), rng.gen_bool(0.3)))
                    .unwrap();
            }
            if round % 3 == 0 {
                let id = ids.swap_remove(rng.gen_range(0..ids.len()));
                registry.erase(id).unwrap();
            }
            registry.reorder();
            assert!(registry.is_sorted(), "unsorted after round {round}");
            assert_eq!(registry.dirty_count(), 0);
        }
        assert_eq!(registry.len(), ids.len());
    }

    #[test]
    fn test_update_without_key_change_stays_clean() {
        let mut registry = SpriteSceneData::default();
        let id = registry.add(sprite(1, 1.0, false)).unwrap();
        registry.reorder();

        let moved = sprite(1, 1.0, false).with_color([1.0, 0.0, 0.0, 1.0]);
        registry.update(id, moved).unwrap();

        assert_eq!(registry.dirty_count(), 0);
        assert_eq!(registry.get(id).map(|s| s.color), Some([1.0, 0.0, 0.0, 1.0]));
    }

    #[test]
    fn test_registry_capacity() {
        let mut registry = SpriteSceneData::with_capacity(2);
        registry.add(sprite(0, 0.0, false)).unwrap();
        registry.add(sprite(0, 0.0, false)).unwrap();

        let result = registry.add(sprite(0, 0.0, false));
        assert!(matches!(result, Err(SceneError::SpriteRegistryFull { capacity: 2 })));
    }

    #[test]
    fn test_erase_unknown_sprite() {
        let mut registry = SpriteSceneData::default();
        let id = registry.add(sprite(0, 0.0, false)).unwrap();
        registry.erase(id).unwrap();

        assert!(matches!(registry.erase(id), Err(SceneError::UnknownSprite(_))));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_batches_split_on_texture_and_blend() {
        let sprites = [
            sprite(1, 0.0, false),
            sprite(1, 1.0, false),
            sprite(2, 0.0, false),
            sprite(2, 5.0, true),
            sprite(2, 4.0, true),
            sprite(1, 3.0, true),
        ];
        assert!(is_sorted(&sprites));

        let batches = build_batches(&sprites);

        let shape: Vec<(u32, bool, usize)> = batches.iter().map(|b| (b.texture.0, b.alpha, b.count)).collect();
        assert_eq!(shape, vec![(1, false, 2), (2, false, 1), (2, true, 2), (1, true, 1)]);
        assert_eq!(batches[3].start, 5);
    }
}
