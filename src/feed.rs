//! External frame ingestion.
//!
//! A capture thread (camera, NDI receiver, screen grabber) pushes frames into
//! a [`FrameFeed`]; a [`FeedSource`] on the mixer side drains the latest frame
//! once per tick. The feed is a latest-wins mailbox, not a queue: if the
//! producer outpaces the clock, intermediate frames are dropped.

use std::sync::{Arc, Mutex};

use crate::{
    clock::TickSubscriber,
    core::{MixConfig, Tick},
    frame::Frame,
    fx::EffectSettings,
    source::{Source, SourceCore},
};

/// Cloneable producer handle for pushing frames from another thread.
#[derive(Clone, Default)]
pub struct FrameFeed {
    slot: Arc<Mutex<Option<Frame>>>,
}

impl FrameFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace whatever frame is pending. Never blocks the mixer side for
    /// longer than the swap.
    pub fn push(&self, frame: Frame) {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = Some(frame);
        }
    }

    fn take(&self) -> Option<Frame> {
        self.slot.lock().ok().and_then(|mut slot| slot.take())
    }
}

/// Mixer-side source backed by a [`FrameFeed`].
///
/// If no new frame arrived since the previous tick the last good frame is
/// republished, so a stalled producer freezes rather than flickers to black.
/// Wrong-resolution frames are dropped with a warning.
pub struct FeedSource {
    core: SourceCore,
    feed: FrameFeed,
    last_good: Frame,
}

impl FeedSource {
    pub fn new(config: &MixConfig, feed: FrameFeed) -> Self {
        Self {
            core: SourceCore::new(config),
            feed,
            last_good: Frame::black(config.width, config.height),
        }
    }
}

impl TickSubscriber for FeedSource {
    fn on_tick(&mut self, _tick: Tick) {
        if let Some(frame) = self.feed.take() {
            if frame.matches(self.core.width(), self.core.height()) {
                self.last_good = frame;
            } else {
                tracing::warn!(
                    got_w = frame.width(),
                    got_h = frame.height(),
                    want_w = self.core.width(),
                    want_h = self.core.height(),
                    "feed frame has wrong resolution; keeping previous frame"
                );
            }
        }
        let raw = self.last_good.clone();
        self.core.publish(&raw);
    }
}

impl Source for FeedSource {
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
