//! Audio system
//!
//! Playback goes through [`AudioBackend`]; decoding and mixing are the
//! backend's business. [`MusicPlayer`] is a world resource that owns the
//! backend and remembers the background track, so asking for the track that
//! is already playing does not restart it.

use crate::assets::{AssetManager, AudioData, AudioId};
use crate::ecs::Component;
use std::collections::HashMap;
use thiserror::Error;

/// Handle of a playing sound
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SoundHandle(pub u32);

/// Audio errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AudioError {
    /// The clip id is not loaded
    #[error("audio clip {0:?} is not loaded")]
    ClipNotFound(AudioId),

    /// The handle does not name a playing sound
    #[error("unknown sound {0:?}")]
    UnknownSound(SoundHandle),

    /// Backend-specific failure
    #[error("audio backend error: {0}")]
    Backend(String),
}

/// Audio output
pub trait AudioBackend: Send + Sync {
    /// Start playing a clip
    fn play(&mut self, clip: &AudioData, looping: bool, volume: f32) -> Result<SoundHandle, AudioError>;

    /// Stop a sound
    fn stop(&mut self, handle: SoundHandle) -> Result<(), AudioError>;

    /// Set the volume of a sound
    fn set_volume(&mut self, handle: SoundHandle, volume: f32) -> Result<(), AudioError>;

    /// Whether a sound is still playing
    fn is_playing(&self, handle: SoundHandle) -> bool;

    /// Stop every sound
    fn stop_all(&mut self);
}

/// Backend that plays nothing but keeps track of what would be playing
#[derive(Debug, Default)]
pub struct NullAudioBackend {
    next_handle: u32,
    playing: HashMap<SoundHandle, (String, f32)>,
}

impl NullAudioBackend {
    /// Create the backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sounds currently playing
    pub fn playing_count(&self) -> usize {
        self.playing.len()
    }
}

impl AudioBackend for NullAudioBackend {
    fn play(&mut self, clip: &AudioData, _looping: bool, volume: f32) -> Result<SoundHandle, AudioError> {
        let handle = SoundHandle(self.next_handle);
        self.next_handle += 1;
        self.playing.insert(handle, (clip.name.clone(), volume.clamp(0.0, 1.0)));
        log::trace!("playing {} as {handle:?}", clip.name);
        Ok(handle)
    }

    fn stop(&mut self, handle: SoundHandle) -> Result<(), AudioError> {
        self.playing.remove(&handle).map(|_| ()).ok_or(AudioError::UnknownSound(handle))
    }

    fn set_volume(&mut self, handle: SoundHandle, volume: f32) -> Result<(), AudioError> {
        let (_, current) = self.playing.get_mut(&handle).ok_or(AudioError::UnknownSound(handle))?;
        *current = volume.clamp(0.0, 1.0);
        Ok(())
    }

    fn is_playing(&self, handle: SoundHandle) -> bool {
        self.playing.contains_key(&handle)
    }

    fn stop_all(&mut self) {
        self.playing.clear();
    }
}

#[derive(Debug, Clone, Copy)]
struct PlayingTrack {
    clip: AudioId,
    handle: SoundHandle,
}

/// Background music and one-shot sounds
pub struct MusicPlayer {
    backend: Box<dyn AudioBackend>,
    current: Option<PlayingTrack>,
    volume: f32,
}

impl Component for MusicPlayer {}

impl std::fmt::Debug for MusicPlayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MusicPlayer")
            .field("current", &self.current)
            .field("volume", &self.volume)
            .finish_non_exhaustive()
    }
}

impl Default for MusicPlayer {
    fn default() -> Self {
        Self::new(Box::new(NullAudioBackend::new()))
    }
}

impl MusicPlayer {
    /// Create a player on top of a backend
    pub fn new(backend: Box<dyn AudioBackend>) -> Self {
        Self {
            backend,
            current: None,
            volume: 0.6,
        }
    }

    /// Start looping a background track
    ///
    /// Returns `false` when that track is already playing, in which case it
    /// keeps playing from where it is. Any other track is stopped first.
    pub fn play_music(&mut self, assets: &AssetManager, clip: AudioId) -> Result<bool, AudioError> {
        if let Some(current) = self.current {
            if current.clip == clip && self.backend.is_playing(current.handle) {
                return Ok(false);
            }
        }
        let data = assets.get_audio_data(clip).ok_or(AudioError::ClipNotFound(clip))?;
        self.stop_music();

        let handle = self.backend.play(data, true, self.volume)?;
        self.current = Some(PlayingTrack { clip, handle });
        log::info!("music: {}", data.name);
        Ok(true)
    }

    /// Stop the background track; returns whether one was playing
    pub fn stop_music(&mut self) -> bool {
        match self.current.take() {
            Some(track) => {
                if let Err(error) = self.backend.stop(track.handle) {
                    log::debug!("music already stopped: {error}");
                }
                true
            }
            None => false,
        }
    }

    /// Background track currently playing
    pub fn current_track(&self) -> Option<AudioId> {
        self.current
            .filter(|track| self.backend.is_playing(track.handle))
            .map(|track| track.clip)
    }

    /// Change the background volume
    pub fn set_volume(&mut self, volume: f32) -> Result<(), AudioError> {
        self.volume = volume.clamp(0.0, 1.0);
        match self.current {
            Some(track) => self.backend.set_volume(track.handle, self.volume),
            None => Ok(()),
        }
    }

    /// Play a one-shot sound effect
    pub fn play_sound(&mut self, assets: &AssetManager, clip: AudioId) -> Result<SoundHandle, AudioError> {
        let data = assets.get_audio_data(clip).ok_or(AudioError::ClipNotFound(clip))?;
        self.backend.play(data, false, 1.0)
    }

    /// The playback backend
    pub fn backend(&self) -> &dyn AudioBackend {
        self.backend.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn assets_with_clips() -> (AssetManager, AudioId, AudioId) {
        static COUNTER: AtomicU32 = AtomicU32::new(0);
        let dir = std::env::temp_dir().join(format!(
            "hearth_audio_{}_{}",
            std::process::id(),
            COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("menu.ogg"), [1u8; 8]).unwrap();
        std::fs::write(dir.join("table.ogg"), [2u8; 8]).unwrap();
        let mut assets = AssetManager::with_root(&dir);
        let menu = assets.load_audio("menu.ogg").unwrap();
        let table = assets.load_audio("table.ogg").unwrap();
        (assets, menu, table)
    }

    #[test]
    fn test_same_track_is_not_restarted() {
        let (assets, menu, _) = assets_with_clips();
        let mut player = MusicPlayer::default();

        assert!(player.play_music(&assets, menu).unwrap());
        assert!(!player.play_music(&assets, menu).unwrap());
        assert_eq!(player.current_track(), Some(menu));
    }

    #[test]
    fn test_switching_tracks_stops_the_previous_one() {
        let (assets, menu, table) = assets_with_clips();
        let mut player = MusicPlayer::default();

        player.play_music(&assets, menu).unwrap();
        player.play_music(&assets, table).unwrap();

        assert_eq!(player.current_track(), Some(table));
        assert!(player.stop_music());
        assert!(!player.stop_music());
        assert_eq!(player.current_track(), None);
    }

    #[test]
    fn test_unknown_clip() {
        let assets = AssetManager::new();
        let mut player = MusicPlayer::default();

        assert_eq!(player.play_music(&assets, AudioId(42)), Err(AudioError::ClipNotFound(AudioId(42))));
    }
}
