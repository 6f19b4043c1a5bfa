//! Stinger animation playback.
//!
//! A stinger is a pre-rendered fill+matte frame sequence overlaid on program
//! during a transition. Somewhere mid-animation, when the overlay covers the
//! screen, the bus performs the actual cut; the [`StingerCue::Switch`] cue
//! marks that frame.

use crate::{
    error::{MixError, MixResult},
    frame::{Frame, Matte},
};

/// Cues emitted while a stinger plays out.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StingerCue {
    /// The cut point: swap preview and program under the overlay now.
    Switch,
    /// The last frame was shown; the overlay is done.
    Completed,
}

/// A loaded stinger animation: fill frames with their transparency mattes and
/// the frame index at which the program switch happens.
pub struct StingerSequence {
    frames: Vec<(Frame, Matte)>,
    switch_index: usize,
    index: usize,
    looped: bool,
    playing: bool,
    switch_fired: bool,
}

impl StingerSequence {
    /// `switch_index` defaults to the midpoint when `None`. All frames must
    /// share one resolution with their mattes. A looped sequence rewinds its
    /// playhead on completion so the next play starts hot.
    pub fn new(
        frames: Vec<(Frame, Matte)>,
        switch_index: Option<usize>,
        looped: bool,
    ) -> MixResult<Self> {
        if frames.is_empty() {
            return Err(MixError::validation("stinger must have at least one frame"));
        }
        let (w, h) = (frames[0].0.width(), frames[0].0.height());
        for (i, (fill, matte)) in frames.iter().enumerate() {
            if !fill.matches(w, h) || !matte.matches(w, h) {
                return Err(MixError::validation(format!(
                    "stinger frame {i} resolution mismatch"
                )));
            }
        }
        let switch_index = match switch_index {
            Some(s) if s >= frames.len() => {
                return Err(MixError::validation(format!(
                    "switch index {s} out of range for {} frames",
                    frames.len()
                )));
            }
            Some(s) => s,
            None => frames.len() / 2,
        };
        Ok(Self {
            frames,
            switch_index,
            index: 0,
            looped,
            playing: false,
            switch_fired: false,
        })
    }

    /// Load fill and matte from an RGBA image directory, sorted by name.
    pub fn from_dir(
        dir: &std::path::Path,
        width: u32,
        height: u32,
        switch_index: Option<usize>,
        looped: bool,
    ) -> MixResult<Self> {
        let frames = crate::assets::load_stinger_dir(dir, width, height)?;
        Self::new(frames, switch_index, looped)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        false // constructor rejects empty sequences
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Rewind and start a play-through. The switch cue re-arms on every start.
    pub fn start(&mut self) {
        self.index = 0;
        self.playing = true;
        self.switch_fired = false;
    }

    /// Abort playback, leaving the playhead where it is. `start` re-arms.
    pub fn stop(&mut self) {
        self.playing = false;
    }

    /// Fill and matte for the frame the playhead is on.
    pub fn current(&self) -> (&Frame, &Matte) {
        let (fill, matte) = &self.frames[self.index];
        (fill, matte)
    }

    /// Step the playhead one frame. Returns `Switch` exactly once per
    /// play-through when the cut point is reached, `Completed` when the last
    /// frame has been shown, `None` otherwise or when idle.
    pub fn advance(&mut self) -> Option<StingerCue> {
        if !self.playing {
            return None;
        }
        if !self.switch_fired && self.index >= self.switch_index {
            self.switch_fired = true;
            return Some(StingerCue::Switch);
        }
        if self.index + 1 >= self.frames.len() {
            self.playing = false;
            if self.looped {
                self.index = 0;
            }
            return Some(StingerCue::Completed);
        }
        self.index += 1;
        None
    }
}
