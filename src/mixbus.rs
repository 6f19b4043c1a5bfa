//! The transition engine.
//!
//! A [`MixBus`] holds two non-owning source slots, preview and program, and
//! produces one composited program frame per tick. Transitions advance a fade
//! position monotonically from 0 to 1; at completion the slots swap and the
//! fade resets, so the bus is always idle-at-zero between transitions.
//!
//! The bus subscribes to the clock's composite phase, which runs after every
//! source has refreshed, so a tick's output is always built from that tick's
//! frames.

use crate::{
    clock::TickSubscriber,
    composite::{self, WipeDirection},
    core::{MixConfig, Tick},
    error::{MixError, MixResult},
    frame::Frame,
    source::SourceHandle,
    stinger::{StingerCue, StingerSequence},
};

/// Which transition the next auto take runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    /// No transition armed; auto takes are refused.
    None,
    #[default]
    Mix,
    WipeLeft,
    WipeRight,
    WipeTop,
    WipeBottom,
    Stinger,
    Still,
    /// Recognized but not implemented; arming it reports an event.
    Dip,
    /// Recognized but not implemented; arming it reports an event.
    Dve,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MixEventKind {
    /// A still transition was requested with no cover frame configured.
    NoStillConfigured,
    /// The armed transition kind cannot run (unimplemented, or no stinger
    /// animation is loaded).
    TransitionUnavailable,
    /// A bus slot pointed at a source that no longer exists; the slot was
    /// cleared and degrades to black.
    SourceUnavailable,
}

/// Operator-visible notification drained through [`MixBus::take_events`].
#[derive(Clone, Debug)]
pub struct MixEvent {
    pub kind: MixEventKind,
    pub context: String,
}

/// Both bus pictures for one tick.
#[derive(Clone, Debug)]
pub struct MixOutput {
    pub program: Frame,
    pub preview: Frame,
}

pub struct MixBus {
    width: u32,
    height: u32,
    feather: u32,
    preview: Option<SourceHandle>,
    program: Option<SourceHandle>,
    kind: TransitionKind,
    fade: f32,
    step: f32,
    mixing: bool,
    still_cover: Option<Frame>,
    stinger: Option<StingerSequence>,
    events: Vec<MixEvent>,
    output: MixOutput,
}

impl MixBus {
    pub fn new(config: &MixConfig) -> Self {
        let black = Frame::black(config.width, config.height);
        Self {
            width: config.width,
            height: config.height,
            feather: config.wipe_feather,
            preview: None,
            program: None,
            kind: TransitionKind::default(),
            fade: 0.0,
            step: 0.0,
            mixing: false,
            still_cover: None,
            stinger: None,
            events: Vec::new(),
            output: MixOutput {
                program: black.clone(),
                preview: black,
            },
        }
    }

    pub fn set_preview(&mut self, handle: Option<SourceHandle>) {
        self.preview = handle;
    }

    pub fn set_program(&mut self, handle: Option<SourceHandle>) {
        self.program = handle;
    }

    pub fn set_transition(&mut self, kind: TransitionKind) {
        self.kind = kind;
    }

    pub fn transition(&self) -> TransitionKind {
        self.kind
    }

    pub fn fade(&self) -> f32 {
        self.fade
    }

    pub fn is_mixing(&self) -> bool {
        self.mixing
    }

    /// Configure the cover frame for still transitions.
    pub fn set_still(&mut self, frame: Frame) -> MixResult<()> {
        if !frame.matches(self.width, self.height) {
            return Err(MixError::validation(format!(
                "still cover is {}x{}, bus runs at {}x{}",
                frame.width(),
                frame.height(),
                self.width,
                self.height
            )));
        }
        self.still_cover = Some(frame);
        Ok(())
    }

    /// Configure the stinger animation used by stinger transitions.
    pub fn set_stinger(&mut self, stinger: StingerSequence) -> MixResult<()> {
        let (fill, _) = stinger.current();
        if !fill.matches(self.width, self.height) {
            return Err(MixError::validation(format!(
                "stinger is {}x{}, bus runs at {}x{}",
                fill.width(),
                fill.height(),
                self.width,
                self.height
            )));
        }
        self.stinger = Some(stinger);
        Ok(())
    }

    /// Hard cut: swap preview and program immediately. Aborts any running
    /// transition and resets the fade, so the next take starts clean.
    pub fn cut(&mut self) {
        std::mem::swap(&mut self.preview, &mut self.program);
        self.fade = 0.0;
        self.mixing = false;
        if let Some(stinger) = &mut self.stinger {
            stinger.stop();
        }
        tracing::debug!("cut");
    }

    /// Begin an auto take over `duration_ticks` ticks using the armed
    /// transition. A take already in flight is left alone. Kinds that cannot
    /// run report a [`MixEvent`] and leave the bus idle.
    pub fn start_transition(&mut self, duration_ticks: u64) -> MixResult<()> {
        if duration_ticks == 0 {
            return Err(MixError::validation("transition duration must be > 0 ticks"));
        }
        if self.mixing {
            tracing::debug!("transition already running; start ignored");
            return Ok(());
        }

        match self.kind {
            TransitionKind::None | TransitionKind::Dip | TransitionKind::Dve => {
                self.events.push(MixEvent {
                    kind: MixEventKind::TransitionUnavailable,
                    context: format!("{:?} transition is not available", self.kind),
                });
                return Ok(());
            }
            TransitionKind::Still if self.still_cover.is_none() => {
                self.events.push(MixEvent {
                    kind: MixEventKind::NoStillConfigured,
                    context: "still transition armed with no cover frame".into(),
                });
                return Ok(());
            }
            TransitionKind::Stinger => {
                let Some(stinger) = &mut self.stinger else {
                    self.events.push(MixEvent {
                        kind: MixEventKind::TransitionUnavailable,
                        context: "no stinger animation loaded".into(),
                    });
                    return Ok(());
                };
                stinger.start();
            }
            _ => {}
        }

        self.fade = 0.0;
        self.step = 1.0 / duration_ticks as f32;
        self.mixing = true;
        tracing::debug!(kind = ?self.kind, duration_ticks, "transition started");
        Ok(())
    }

    /// Arm and fire the stinger in one step. Duration is frame-driven, so
    /// none is taken.
    pub fn start_stinger(&mut self) -> MixResult<()> {
        self.set_transition(TransitionKind::Stinger);
        self.start_transition(1)
    }

    /// Drain queued operator notifications.
    pub fn take_events(&mut self) -> Vec<MixEvent> {
        std::mem::take(&mut self.events)
    }

    /// Both bus pictures as composited on the last tick.
    pub fn output(&self) -> MixOutput {
        self.output.clone()
    }

    /// Resolve a slot to its current frame. A dead handle clears the slot and
    /// reports [`MixEventKind::SourceUnavailable`] once; empty slots are black.
    fn slot_frame(&mut self, slot_is_program: bool) -> Frame {
        let slot = if slot_is_program {
            &mut self.program
        } else {
            &mut self.preview
        };
        match slot.as_ref().and_then(|h| h.upgrade()) {
            Some(rc) => rc.borrow().current_frame(),
            None => {
                if slot.take().is_some() {
                    let name = if slot_is_program { "program" } else { "preview" };
                    tracing::warn!(slot = name, "assigned source is gone; showing black");
                    self.events.push(MixEvent {
                        kind: MixEventKind::SourceUnavailable,
                        context: format!("{name} source is gone"),
                    });
                }
                Frame::black(self.width, self.height)
            }
        }
    }

    fn composite(&self, preview: &Frame, program: &Frame) -> Frame {
        match self.kind {
            TransitionKind::Mix => composite::crossfade(preview, program, self.fade),
            TransitionKind::WipeLeft => {
                composite::wipe(preview, program, self.fade, self.feather, WipeDirection::FromLeft)
            }
            TransitionKind::WipeRight => composite::wipe(
                preview,
                program,
                self.fade,
                self.feather,
                WipeDirection::FromRight,
            ),
            TransitionKind::WipeTop => {
                composite::wipe(preview, program, self.fade, self.feather, WipeDirection::FromTop)
            }
            TransitionKind::WipeBottom => composite::wipe(
                preview,
                program,
                self.fade,
                self.feather,
                WipeDirection::FromBottom,
            ),
            TransitionKind::Still => {
                // Two-leg take through the cover: program -> cover -> preview.
                let cover = self
                    .still_cover
                    .clone()
                    .unwrap_or_else(|| Frame::black(self.width, self.height));
                if self.fade < 0.5 {
                    composite::crossfade(&cover, program, self.fade * 2.0)
                } else {
                    composite::crossfade(preview, &cover, (self.fade - 0.5) * 2.0)
                }
            }
            TransitionKind::Stinger
            | TransitionKind::None
            | TransitionKind::Dip
            | TransitionKind::Dve => program.clone(),
        }
    }

    fn finish_transition(&mut self) {
        std::mem::swap(&mut self.preview, &mut self.program);
        self.fade = 0.0;
        self.mixing = false;
        tracing::debug!("transition complete");
    }
}

impl TickSubscriber for MixBus {
    fn on_tick(&mut self, _tick: Tick) {
        let preview = self.slot_frame(false);
        let program = self.slot_frame(true);

        let out_program = if self.mixing && self.kind == TransitionKind::Stinger {
            // Frame-driven: the animation decides when to switch and finish.
            let cue = self
                .stinger
                .as_mut()
                .and_then(StingerSequence::advance);
            match cue {
                Some(StingerCue::Switch) => {
                    std::mem::swap(&mut self.preview, &mut self.program);
                }
                Some(StingerCue::Completed) => {
                    self.fade = 0.0;
                    self.mixing = false;
                    tracing::debug!("stinger complete");
                }
                None => {}
            }
            // The swap above changes which source is program for the rest of
            // the animation.
            let base = self.slot_frame(true);
            if self.mixing {
                if let Some(stinger) = &self.stinger {
                    let (fill, matte) = stinger.current();
                    composite::key_blend(fill, matte, &base)
                } else {
                    base
                }
            } else {
                base
            }
        } else if self.mixing {
            self.fade = (self.fade + self.step).min(1.0);
            let frame = self.composite(&preview, &program);
            if self.fade >= 1.0 {
                self.finish_transition();
            }
            frame
        } else {
            program.clone()
        };

        // The preview picture tracks the preview slot even mid-transition.
        let out_preview = self.slot_frame(false);
        self.output = MixOutput {
            program: out_program,
            preview: out_preview,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        clock::FrameClock,
        core::TickRate,
        frame::Matte,
        generators::ColorSource,
        source::SourceRegistry,
    };

    const RED: [u8; 3] = [200, 0, 0];
    const BLUE: [u8; 3] = [0, 0, 200];

    fn cfg() -> MixConfig {
        MixConfig {
            width: 8,
            height: 8,
            wipe_feather: 0,
            ..MixConfig::default()
        }
    }

    struct Rig {
        clock: FrameClock,
        registry: SourceRegistry,
        bus: MixBus,
        red_id: crate::source::SourceId,
        blue_id: crate::source::SourceId,
    }

    fn rig() -> Rig {
        let cfg = cfg();
        let mut clock = FrameClock::new(TickRate::default());
        let mut registry = SourceRegistry::new();
        let red_id = registry.add(&mut clock, ColorSource::new(&cfg, RED));
        let blue_id = registry.add(&mut clock, ColorSource::new(&cfg, BLUE));

        let mut bus = MixBus::new(&cfg);
        bus.set_program(registry.handle(red_id));
        bus.set_preview(registry.handle(blue_id));
        Rig {
            clock,
            registry,
            bus,
            red_id,
            blue_id,
        }
    }

    // The bus is not clock-subscribed in these tests; tick sources then the
    // bus by hand so ordering matches the composite phase.
    fn tick(rig: &mut Rig) {
        rig.clock.tick();
        rig.bus.on_tick(rig.clock.current_tick());
    }

    #[test]
    fn idle_bus_passes_program_through() {
        let mut r = rig();
        tick(&mut r);
        assert_eq!(r.bus.output().program.px(0, 0), RED);
        assert_eq!(r.bus.output().preview.px(0, 0), BLUE);
        assert!(!r.bus.is_mixing());
    }

    #[test]
    fn cut_swaps_slots_immediately() {
        let mut r = rig();
        tick(&mut r);
        r.bus.cut();
        tick(&mut r);
        assert_eq!(r.bus.output().program.px(0, 0), BLUE);
        assert_eq!(r.bus.output().preview.px(0, 0), RED);
    }

    #[test]
    fn double_cut_is_a_net_no_op() {
        let mut r = rig();
        tick(&mut r);
        r.bus.cut();
        r.bus.cut();
        tick(&mut r);
        assert_eq!(r.bus.output().program.px(0, 0), RED);
        assert_eq!(r.bus.output().preview.px(0, 0), BLUE);
    }

    #[test]
    fn mix_fades_monotonically_and_swaps_at_completion() {
        let mut r = rig();
        tick(&mut r);
        r.bus.start_transition(4).unwrap();

        let mut last_fade = 0.0;
        let mut reds = Vec::new();
        for _ in 0..4 {
            tick(&mut r);
            if r.bus.is_mixing() {
                assert!(r.bus.fade() > last_fade);
                last_fade = r.bus.fade();
            }
            reds.push(r.bus.output().program.px(0, 0)[0]);
        }
        // Program red channel decays toward blue's 0.
        assert!(reds.windows(2).all(|w| w[1] <= w[0]));
        assert_eq!(*reds.last().unwrap(), 0);
        assert!(!r.bus.is_mixing());
        assert_eq!(r.bus.fade(), 0.0);

        // Slots swapped: preview is the old program.
        tick(&mut r);
        assert_eq!(r.bus.output().program.px(0, 0), BLUE);
        assert_eq!(r.bus.output().preview.px(0, 0), RED);
    }

    #[test]
    fn cut_mid_transition_resets_fade() {
        let mut r = rig();
        tick(&mut r);
        r.bus.start_transition(10).unwrap();
        tick(&mut r);
        tick(&mut r);
        assert!(r.bus.is_mixing());
        r.bus.cut();
        assert!(!r.bus.is_mixing());
        assert_eq!(r.bus.fade(), 0.0);
        tick(&mut r);
        assert_eq!(r.bus.output().program.px(0, 0), BLUE);
    }

    #[test]
    fn wipe_left_reveals_preview_from_the_left() {
        let mut r = rig();
        r.bus.set_transition(TransitionKind::WipeLeft);
        tick(&mut r);
        r.bus.start_transition(2).unwrap();
        tick(&mut r); // fade 0.5, boundary at width/2
        let out = r.bus.output().program;
        assert_eq!(out.px(0, 0), BLUE);
        assert_eq!(out.px(7, 0), RED);
    }

    #[test]
    fn unavailable_kinds_report_events_and_stay_idle() {
        let mut r = rig();
        for kind in [TransitionKind::None, TransitionKind::Dip, TransitionKind::Dve] {
            r.bus.set_transition(kind);
            r.bus.start_transition(4).unwrap();
            assert!(!r.bus.is_mixing());
        }
        let events = r.bus.take_events();
        assert_eq!(events.len(), 3);
        assert!(events
            .iter()
            .all(|e| e.kind == MixEventKind::TransitionUnavailable));
        assert!(r.bus.take_events().is_empty());
    }

    #[test]
    fn still_without_cover_reports_once_and_stays_idle() {
        let mut r = rig();
        r.bus.set_transition(TransitionKind::Still);
        r.bus.start_transition(4).unwrap();
        assert!(!r.bus.is_mixing());
        let events = r.bus.take_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, MixEventKind::NoStillConfigured);
    }

    #[test]
    fn still_transition_passes_through_the_cover() {
        let mut r = rig();
        r.bus.set_transition(TransitionKind::Still);
        r.bus.set_still(Frame::solid(8, 8, [0, 255, 0])).unwrap();
        tick(&mut r);
        r.bus.start_transition(4).unwrap();
        tick(&mut r);
        tick(&mut r); // fade 0.5: second leg starts at the cover
        let px = r.bus.output().program.px(0, 0);
        assert_eq!(px, [0, 255, 0]);
        tick(&mut r);
        tick(&mut r);
        assert!(!r.bus.is_mixing());
        tick(&mut r);
        assert_eq!(r.bus.output().program.px(0, 0), BLUE);
    }

    #[test]
    fn zero_duration_is_rejected() {
        let mut r = rig();
        assert!(r.bus.start_transition(0).is_err());
    }

    #[test]
    fn stinger_switches_under_the_overlay() {
        let mut r = rig();
        let frames: Vec<(Frame, Matte)> = (0..4)
            .map(|_| (Frame::solid(8, 8, [255, 255, 255]), Matte::opaque(8, 8)))
            .collect();
        r.bus
            .set_stinger(StingerSequence::new(frames, Some(2), false).unwrap())
            .unwrap();
        r.bus.set_transition(TransitionKind::Stinger);
        tick(&mut r);
        r.bus.start_transition(1).unwrap();

        // Fully opaque overlay hides the switch.
        for _ in 0..3 {
            tick(&mut r);
            assert_eq!(r.bus.output().program.px(0, 0), [255, 255, 255]);
        }
        while r.bus.is_mixing() {
            tick(&mut r);
        }
        tick(&mut r);
        assert_eq!(r.bus.output().program.px(0, 0), BLUE);
        assert_eq!(r.bus.output().preview.px(0, 0), RED);
    }

    #[test]
    fn stinger_without_animation_reports_event() {
        let mut r = rig();
        r.bus.set_transition(TransitionKind::Stinger);
        r.bus.start_transition(4).unwrap();
        assert!(!r.bus.is_mixing());
        let events = r.bus.take_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, MixEventKind::TransitionUnavailable);
    }

    #[test]
    fn dropped_source_degrades_to_black_with_event() {
        let mut r = rig();
        tick(&mut r);
        r.registry.remove(&mut r.clock, r.red_id);
        r.registry.remove(&mut r.clock, r.blue_id);
        tick(&mut r);
        assert_eq!(r.bus.output().program, Frame::black(8, 8));
        assert!(r
            .bus
            .take_events()
            .iter()
            .any(|e| e.kind == MixEventKind::SourceUnavailable));
    }
}
