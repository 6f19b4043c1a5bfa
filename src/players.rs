//! File-backed and composite sources: still image, image sequence, playlist.

use crate::{
    clock::TickSubscriber,
    core::{MixConfig, Tick},
    error::{MixError, MixResult},
    frame::Frame,
    fx::EffectSettings,
    source::{Source, SourceCore},
};

/// A single static image, typically used as a program cover or logo.
pub struct StillSource {
    core: SourceCore,
    pattern: Frame,
}

impl StillSource {
    /// `frame` must already be at the configured resolution; the asset
    /// loaders resize at load time, the engine never does.
    pub fn new(config: &MixConfig, frame: Frame) -> MixResult<Self> {
        if !frame.matches(config.width, config.height) {
            return Err(MixError::validation(format!(
                "still is {}x{}, mixer runs at {}x{}",
                frame.width(),
                frame.height(),
                config.width,
                config.height
            )));
        }
        Ok(Self {
            core: SourceCore::new(config),
            pattern: frame,
        })
    }

    /// Load and resize an image file into a still source.
    pub fn from_path(config: &MixConfig, path: &std::path::Path) -> MixResult<Self> {
        let frame = crate::assets::load_frame(path, config.width, config.height)?;
        Self::new(config, frame)
    }
}

impl TickSubscriber for StillSource {
    fn on_tick(&mut self, _tick: Tick) {
        let raw = self.pattern.clone();
        self.core.publish(&raw);
    }
}

impl Source for StillSource {
    fn current_frame(&self) -> Frame {
        self.core.frame()
    }

    fn fx(&self) -> &EffectSettings {
        self.core.fx_settings()
    }

    fn set_fx(&mut self, settings: EffectSettings) {
        self.core.set_fx_settings(settings);
    }
}

/// Plays an ordered frame sequence, one frame per tick.
///
/// A looped sequence wraps around; a non-looped one holds its last frame and
/// stops playing. `rewind` restarts from the first frame.
pub struct SequenceSource {
    core: SourceCore,
    frames: Vec<Frame>,
    index: usize,
    looped: bool,
    playing: bool,
}

impl SequenceSource {
    pub fn new(config: &MixConfig, frames: Vec<Frame>, looped: bool) -> MixResult<Self> {
        if frames.is_empty() {
            return Err(MixError::validation("sequence must have at least one frame"));
        }
        for (i, f) in frames.iter().enumerate() {
            if !f.matches(config.width, config.height) {
                return Err(MixError::validation(format!(
                    "sequence frame {i} is {}x{}, mixer runs at {}x{}",
                    f.width(),
                    f.height(),
                    config.width,
                    config.height
                )));
            }
        }
        Ok(Self {
            core: SourceCore::new(config),
            frames,
            index: 0,
            looped,
            playing: true,
        })
    }

    /// Load a directory of image files, sorted by name.
    pub fn from_dir(config: &MixConfig, dir: &std::path::Path, looped: bool) -> MixResult<Self> {
        let frames = crate::assets::load_sequence_dir(dir, config.width, config.height)?;
        Self::new(config, frames, looped)
    }

    pub fn play(&mut self) {
        self.playing = true;
    }

    pub fn pause(&mut self) {
        self.playing = false;
    }

    pub fn rewind(&mut self) {
        self.index = 0;
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }
}

impl TickSubscriber for SequenceSource {
    fn on_tick(&mut self, _tick: Tick) {
        let raw = self.frames[self.index].clone();
        self.core.publish(&raw);
        if self.playing {
            if self.index + 1 < self.frames.len() {
                self.index += 1;
            } else if self.looped {
                self.index = 0;
            } else {
                self.playing = false;
            }
        }
    }
}

impl Source for SequenceSource {
    fn current_frame(&self) -> Frame {
        self.core.frame()
    }

    fn fx(&self) -> &EffectSettings {
        self.core.fx_settings()
    }

    fn set_fx(&mut self, settings: EffectSettings) {
        self.core.set_fx_settings(settings);
    }
}

/// Rotates through child sources, giving each a fixed number of ticks.
///
/// Only the active child is refreshed; effect settings forwarded through
/// `set_fx` reach every child so the look stays consistent across the
/// rotation.
pub struct PlaylistSource {
    entries: Vec<Box<dyn Source>>,
    ticks_per_entry: u64,
    elapsed: u64,
    active: usize,
}

impl PlaylistSource {
    pub fn new(entries: Vec<Box<dyn Source>>, ticks_per_entry: u64) -> MixResult<Self> {
        if entries.is_empty() {
            return Err(MixError::validation("playlist must have at least one entry"));
        }
        if ticks_per_entry == 0 {
            return Err(MixError::validation("ticks_per_entry must be > 0"));
        }
        Ok(Self {
            entries,
            ticks_per_entry,
            elapsed: 0,
            active: 0,
        })
    }

    pub fn active_index(&self) -> usize {
        self.active
    }
}

impl TickSubscriber for PlaylistSource {
    fn on_tick(&mut self, tick: Tick) {
        self.entries[self.active].on_tick(tick);
        self.elapsed += 1;
        if self.elapsed >= self.ticks_per_entry {
            self.elapsed = 0;
            self.active = (self.active + 1) % self.entries.len();
        }
    }
}

impl Source for PlaylistSource {
    fn current_frame(&self) -> Frame {
        self.entries[self.active].current_frame()
    }

    fn fx(&self) -> &EffectSettings {
        self.entries[self.active].fx()
    }

    fn set_fx(&mut self, settings: EffectSettings) {
        for entry in &mut self.entries {
            entry.set_fx(settings.clone());
        }
    }
}
