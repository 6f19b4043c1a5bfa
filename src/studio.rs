//! Top-level wiring: one clock, one source registry, one mix bus.
//!
//! The [`Studio`] is the seam a control surface talks to. Commands apply
//! synchronously between ticks; the tick itself stays a pure
//! refresh-then-composite pass.

use std::{cell::RefCell, rc::Rc};

use crate::{
    clock::{FrameClock, TickPhase, TickSubscriber},
    core::{MixConfig, Tick},
    error::{MixError, MixResult},
    frame::Frame,
    fx::EffectSettings,
    mixbus::{MixBus, MixEvent, MixOutput, TransitionKind},
    source::{Source, SourceId, SourceRegistry},
    stinger::StingerSequence,
};

/// The two bus assignment slots.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BusSlot {
    Preview,
    Program,
}

/// Operator commands, applied synchronously outside the tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlCommand {
    Assign { slot: BusSlot, source: SourceId },
    Cut,
    SetTransition(TransitionKind),
    StartTransition { duration_ticks: u64 },
    StartStinger,
}

pub struct Studio {
    config: MixConfig,
    clock: FrameClock,
    registry: SourceRegistry,
    bus: Rc<RefCell<MixBus>>,
}

impl Studio {
    pub fn new(config: MixConfig) -> MixResult<Self> {
        config.validate()?;
        let mut clock = FrameClock::new(config.rate);
        let bus = Rc::new(RefCell::new(MixBus::new(&config)));
        let dyn_bus: Rc<RefCell<dyn TickSubscriber>> = Rc::clone(&bus) as _;
        clock.subscribe(TickPhase::Composite, Rc::downgrade(&dyn_bus));
        Ok(Self {
            config,
            clock,
            registry: SourceRegistry::new(),
            bus,
        })
    }

    pub fn config(&self) -> &MixConfig {
        &self.config
    }

    /// Register a source; it starts refreshing on the next tick.
    pub fn add_source<S: Source + 'static>(&mut self, source: S) -> SourceId {
        self.registry.add(&mut self.clock, source)
    }

    pub fn remove_source(&mut self, id: SourceId) -> bool {
        self.registry.remove(&mut self.clock, id)
    }

    pub fn set_source_fx(&self, id: SourceId, settings: EffectSettings) -> MixResult<()> {
        self.registry.set_fx(id, settings)
    }

    pub fn set_still(&self, frame: Frame) -> MixResult<()> {
        self.bus.borrow_mut().set_still(frame)
    }

    pub fn set_stinger(&self, stinger: StingerSequence) -> MixResult<()> {
        self.bus.borrow_mut().set_stinger(stinger)
    }

    /// Apply one operator command. Unknown source ids are validation errors;
    /// everything else either acts or queues a [`MixEvent`].
    pub fn apply(&mut self, command: ControlCommand) -> MixResult<()> {
        let mut bus = self.bus.borrow_mut();
        match command {
            ControlCommand::Assign { slot, source } => {
                let handle = self
                    .registry
                    .handle(source)
                    .ok_or_else(|| MixError::validation(format!("unknown source id {source:?}")))?;
                match slot {
                    BusSlot::Preview => bus.set_preview(Some(handle)),
                    BusSlot::Program => bus.set_program(Some(handle)),
                }
            }
            ControlCommand::Cut => bus.cut(),
            ControlCommand::SetTransition(kind) => bus.set_transition(kind),
            ControlCommand::StartTransition { duration_ticks } => {
                bus.start_transition(duration_ticks)?;
            }
            ControlCommand::StartStinger => bus.start_stinger()?,
        }
        Ok(())
    }

    /// The configured default auto-take length in ticks.
    pub fn default_transition_ticks(&self) -> u64 {
        self.config.default_transition_ticks()
    }

    /// One cooperative step: refresh every source, then composite.
    pub fn tick(&mut self) -> Tick {
        self.clock.tick()
    }

    /// Drive in real time at the configured rate, running late on overruns.
    pub fn run_for_ticks(&mut self, ticks: u64) {
        self.clock.run_for_ticks(ticks);
    }

    pub fn output(&self) -> MixOutput {
        self.bus.borrow().output()
    }

    pub fn take_events(&self) -> Vec<MixEvent> {
        self.bus.borrow_mut().take_events()
    }

    pub fn is_mixing(&self) -> bool {
        self.bus.borrow().is_mixing()
    }
}
