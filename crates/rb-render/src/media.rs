//! Playable media bookkeeping for `video` shapes.
//!
//! A video materializes as a media frame plus an overlay text drawable. The
//! overlay reads "Loading video..." until the media metadata arrives, then
//! "Press PLAY..."; it is removed the first time playback starts. While
//! playing, the media clock advances every frame.

use crate::contract::{Group, MediaInfo, MediaPhase};
use rb_core::ShapeId;
use std::time::Duration;

pub const LOADING_TEXT: &str = "Loading video...";
pub const READY_TEXT: &str = "Press PLAY...";
pub const FAILED_TEXT: &str = "Video unavailable";
pub const OVERLAY_FONT_SIZE: f32 = 24.0;

#[derive(Debug, Clone)]
pub struct MediaState {
    pub id: ShapeId,
    pub group: Group,
    pub order: usize,
    pub phase: MediaPhase,
    pub playing: bool,
    pub position: Duration,
    /// Overlay text, while the overlay exists.
    pub overlay: Option<String>,
}

impl MediaState {
    pub fn new(id: ShapeId, group: Group, order: usize) -> Self {
        Self {
            id,
            group,
            order,
            phase: MediaPhase::Loading,
            playing: false,
            position: Duration::ZERO,
            overlay: Some(LOADING_TEXT.to_string()),
        }
    }

    /// Metadata arrived (or failed). Returns the new overlay text when the
    /// overlay is still showing.
    pub fn metadata(&mut self, ok: bool) -> Option<&str> {
        self.phase = if ok { MediaPhase::Ready } else { MediaPhase::Failed };
        let text = if ok { READY_TEXT } else { FAILED_TEXT };
        let overlay = self.overlay.as_mut()?;
        *overlay = text.to_string();
        Some(text)
    }

    /// Start playback. Returns whether the overlay should be removed.
    pub fn play(&mut self) -> bool {
        if self.phase == MediaPhase::Failed {
            return false;
        }
        self.playing = true;
        self.overlay.take().is_some()
    }

    pub fn pause(&mut self) {
        self.playing = false;
    }

    /// Advance the media clock; returns whether anything moved.
    pub fn advance(&mut self, dt: Duration) -> bool {
        if self.playing {
            self.position += dt;
        }
        self.playing
    }

    pub fn info(&self) -> MediaInfo {
        MediaInfo {
            id: self.id,
            phase: self.phase,
            playing: self.playing,
            position: self.position,
            overlay_text: self.overlay.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn media() -> MediaState {
        MediaState::new(ShapeId::intern("cam"), Group::Base, 0)
    }

    #[test]
    fn overlay_lifecycle() {
        let mut m = media();
        assert_eq!(m.overlay.as_deref(), Some(LOADING_TEXT));
        assert_eq!(m.metadata(true), Some(READY_TEXT));
        assert!(m.play());
        assert_eq!(m.overlay, None);
        // Second play has no overlay left to remove.
        m.pause();
        assert!(!m.play());
    }

    #[test]
    fn clock_runs_only_while_playing() {
        let mut m = media();
        assert!(!m.advance(Duration::from_millis(16)));
        m.play();
        m.advance(Duration::from_millis(16));
        m.advance(Duration::from_millis(16));
        m.pause();
        m.advance(Duration::from_millis(16));
        assert_eq!(m.position, Duration::from_millis(32));
    }

    #[test]
    fn failed_media_does_not_play() {
        let mut m = media();
        assert_eq!(m.metadata(false), Some(FAILED_TEXT));
        assert!(!m.play());
        assert!(!m.playing);
    }
}
