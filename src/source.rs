use std::{
    cell::RefCell,
    collections::HashMap,
    rc::{Rc, Weak},
};

use crate::{
    clock::{FrameClock, SubscriptionId, TickPhase, TickSubscriber},
    core::MixConfig,
    error::{MixError, MixResult},
    frame::Frame,
    fx::{EffectSettings, FxChain},
};

/// A video input: anything that refreshes an internal frame buffer once per
/// tick and exposes it on demand.
///
/// `on_tick` (from [`TickSubscriber`]) is the per-tick refresh. `current_frame`
/// is a non-blocking read of the last refreshed frame and never triggers
/// capture or decoding itself; before the first refresh it returns black at
/// the configured resolution.
pub trait Source: TickSubscriber {
    fn current_frame(&self) -> Frame;
    fn fx(&self) -> &EffectSettings;
    fn set_fx(&mut self, settings: EffectSettings);
}

/// Non-owning reference to a registered source. The mix bus holds these;
/// a dropped source simply stops upgrading and the bus degrades to black.
pub type SourceHandle = Weak<RefCell<dyn Source>>;

/// Registry-assigned source identifier, stable for the source's lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct SourceId(u64);

/// Owns every live source and its clock subscription.
///
/// Ownership is deliberately one-directional: the registry owns sources, the
/// mix bus only borrows them through [`SourceHandle`]s, so swapping what is
/// "in program" never destroys anything and removing a source mid-transition
/// cannot dangle.
#[derive(Default)]
pub struct SourceRegistry {
    sources: HashMap<SourceId, Rc<RefCell<dyn Source>>>,
    subscriptions: HashMap<SourceId, SubscriptionId>,
    next_id: u64,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a source and subscribe it to the clock's refresh phase.
    pub fn add<S: Source + 'static>(&mut self, clock: &mut FrameClock, source: S) -> SourceId {
        let rc = Rc::new(RefCell::new(source));
        let dyn_rc: Rc<RefCell<dyn TickSubscriber>> = Rc::clone(&rc) as _;
        let sub = clock.subscribe(TickPhase::Refresh, Rc::downgrade(&dyn_rc));

        let id = SourceId(self.next_id);
        self.next_id += 1;
        self.sources.insert(id, rc);
        self.subscriptions.insert(id, sub);
        tracing::debug!(?id, "source registered");
        id
    }

    /// Stop a source: unsubscribe it from the clock and release it. Returns
    /// `false` for an unknown id.
    pub fn remove(&mut self, clock: &mut FrameClock, id: SourceId) -> bool {
        let existed = self.sources.remove(&id).is_some();
        if let Some(sub) = self.subscriptions.remove(&id) {
            clock.unsubscribe(sub);
        }
        if existed {
            tracing::debug!(?id, "source removed");
        }
        existed
    }

    /// Non-owning handle for bus assignment.
    pub fn handle(&self, id: SourceId) -> Option<SourceHandle> {
        self.sources.get(&id).map(Rc::downgrade)
    }

    /// Shared access to a source, e.g. for effect toggles from the UI layer.
    pub fn get(&self, id: SourceId) -> Option<Rc<RefCell<dyn Source>>> {
        self.sources.get(&id).map(Rc::clone)
    }

    /// Replace a source's effect settings. Convenience over [`get`].
    ///
    /// [`get`]: SourceRegistry::get
    pub fn set_fx(&self, id: SourceId, settings: EffectSettings) -> MixResult<()> {
        let rc = self
            .get(id)
            .ok_or_else(|| MixError::validation(format!("unknown source id {id:?}")))?;
        rc.borrow_mut().set_fx(settings);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

/// Shared plumbing for source implementations: the configured resolution, the
/// last published frame and the per-source effect chain.
///
/// Implementations build a raw frame each tick and call [`publish`], which
/// runs the effect pipeline exactly once per tick; `current_frame` then stays
/// a plain read.
///
/// [`publish`]: SourceCore::publish
#[derive(Clone, Debug)]
pub struct SourceCore {
    width: u32,
    height: u32,
    frame: Frame,
    fx: FxChain,
}

impl SourceCore {
    pub fn new(config: &MixConfig) -> Self {
        Self {
            width: config.width,
            height: config.height,
            frame: Frame::black(config.width, config.height),
            fx: FxChain::default(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Run the effect pipeline over `raw` and make the result the current
    /// frame. A wrong-resolution `raw` is replaced by black rather than
    /// propagated.
    pub fn publish(&mut self, raw: &Frame) {
        if !raw.matches(self.width, self.height) {
            tracing::warn!(
                got_w = raw.width(),
                got_h = raw.height(),
                want_w = self.width,
                want_h = self.height,
                "source produced wrong-resolution frame; publishing black"
            );
            self.frame = Frame::black(self.width, self.height);
            return;
        }
        self.frame = self.fx.apply(raw);
    }

    pub fn frame(&self) -> Frame {
        self.frame.clone()
    }

    pub fn fx_settings(&self) -> &EffectSettings {
        self.fx.settings()
    }

    pub fn set_fx_settings(&mut self, settings: EffectSettings) {
        self.fx.set_settings(settings);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Tick, TickRate};

    struct CountingSource {
        core: SourceCore,
        refreshes: u64,
    }

    impl CountingSource {
        fn new(config: &MixConfig) -> Self {
            Self {
                core: SourceCore::new(config),
                refreshes: 0,
            }
        }
    }

    impl TickSubscriber for CountingSource {
        fn on_tick(&mut self, _tick: Tick) {
            self.refreshes += 1;
            let raw = Frame::solid(self.core.width(), self.core.height(), [1, 2, 3]);
            self.core.publish(&raw);
        }
    }

    impl Source for CountingSource {
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

    fn small_config() -> MixConfig {
        MixConfig {
            width: 8,
            height: 8,
            wipe_feather: 2,
            ..MixConfig::default()
        }
    }

    #[test]
    fn current_frame_is_black_before_first_refresh() {
        let cfg = small_config();
        let src = CountingSource::new(&cfg);
        assert_eq!(src.current_frame(), Frame::black(8, 8));
    }

    #[test]
    fn registered_sources_refresh_on_tick() {
        let cfg = small_config();
        let mut clock = FrameClock::new(TickRate::default());
        let mut registry = SourceRegistry::new();
        let id = registry.add(&mut clock, CountingSource::new(&cfg));

        clock.tick();
        clock.tick();

        let rc = registry.get(id).unwrap();
        assert_eq!(rc.borrow().current_frame().px(0, 0), [1, 2, 3]);
        registry.handle(id).unwrap().upgrade().unwrap();
    }

    #[test]
    fn removed_sources_stop_refreshing_and_handles_dangle() {
        let cfg = small_config();
        let mut clock = FrameClock::new(TickRate::default());
        let mut registry = SourceRegistry::new();
        let id = registry.add(&mut clock, CountingSource::new(&cfg));
        let handle = registry.handle(id).unwrap();

        assert!(registry.remove(&mut clock, id));
        assert!(!registry.remove(&mut clock, id));
        assert!(handle.upgrade().is_none());
        clock.tick(); // must not panic with the source gone
        assert!(registry.is_empty());
    }

    #[test]
    fn publish_rejects_wrong_resolution() {
        let cfg = small_config();
        let mut core = SourceCore::new(&cfg);
        core.publish(&Frame::solid(4, 4, [9, 9, 9]));
        assert_eq!(core.frame(), Frame::black(8, 8));
    }

    #[test]
    fn set_fx_reaches_the_source() {
        let cfg = small_config();
        let mut clock = FrameClock::new(TickRate::default());
        let mut registry = SourceRegistry::new();
        let id = registry.add(&mut clock, CountingSource::new(&cfg));

        let settings = EffectSettings {
            invert: true,
            ..EffectSettings::default()
        };
        registry.set_fx(id, settings).unwrap();
        clock.tick();

        let rc = registry.get(id).unwrap();
        assert_eq!(rc.borrow().current_frame().px(0, 0), [254, 253, 252]);
        assert!(registry.set_fx(SourceId(999), EffectSettings::default()).is_err());
    }
}
