use std::{
    cell::RefCell,
    rc::Weak,
    time::{Duration, Instant},
};

use crate::core::{Tick, TickRate};

/// Anything driven by the frame clock. Sources refresh their frame here; the
/// mix bus advances its transition state and composites.
///
/// `on_tick` must not block and must not panic: the clock offers no
/// per-subscriber isolation, so a stalled subscriber stalls the whole tick.
pub trait TickSubscriber {
    fn on_tick(&mut self, tick: Tick);
}

/// Phase of a tick. All `Refresh` subscribers run before any `Composite`
/// subscriber, so the mixer always reads frames refreshed on the same tick
/// regardless of subscription order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickPhase {
    Refresh,
    Composite,
}

/// Handle returned by [`FrameClock::subscribe`], used to unsubscribe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type SubscriberSlot = (SubscriptionId, Weak<RefCell<dyn TickSubscriber>>);

/// The periodic tick source every source and the mixer subscribe to.
///
/// Scheduling is single-threaded and cooperative: one call to [`tick`]
/// synchronously invokes every live subscriber, refresh phase first, in
/// subscription order within each phase. Subscribers are held weakly; a
/// dropped subscriber is pruned on the next tick, which is how stopping a
/// source detaches it from the clock.
///
/// Overrun policy is run-late: a tick that takes longer than the interval
/// delays the next deadline. No catch-up ticks are injected and none are
/// dropped, so tick-counted durations (transitions) stay exact and merely
/// stretch in wall time.
///
/// [`tick`]: FrameClock::tick
pub struct FrameClock {
    rate: TickRate,
    current: Tick,
    refresh: Vec<SubscriberSlot>,
    composite: Vec<SubscriberSlot>,
    next_id: u64,
    overruns: u64,
}

impl FrameClock {
    pub fn new(rate: TickRate) -> Self {
        Self {
            rate,
            current: Tick(0),
            refresh: Vec::new(),
            composite: Vec::new(),
            next_id: 0,
            overruns: 0,
        }
    }

    pub fn rate(&self) -> TickRate {
        self.rate
    }

    /// The most recently completed tick.
    pub fn current_tick(&self) -> Tick {
        self.current
    }

    /// Total ticks that missed their wall-clock deadline so far.
    pub fn overruns(&self) -> u64 {
        self.overruns
    }

    pub fn subscribe(
        &mut self,
        phase: TickPhase,
        subscriber: Weak<RefCell<dyn TickSubscriber>>,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        match phase {
            TickPhase::Refresh => self.refresh.push((id, subscriber)),
            TickPhase::Composite => self.composite.push((id, subscriber)),
        }
        id
    }

    /// Remove a subscriber. Returns `false` when the id is unknown (already
    /// removed, or pruned after its subscriber was dropped).
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.refresh.len() + self.composite.len();
        self.refresh.retain(|(sid, _)| *sid != id);
        self.composite.retain(|(sid, _)| *sid != id);
        before != self.refresh.len() + self.composite.len()
    }

    /// Advance the clock by one tick and run both phases synchronously.
    pub fn tick(&mut self) -> Tick {
        let tick = self.current.next();
        self.current = tick;
        Self::drive(&mut self.refresh, tick);
        Self::drive(&mut self.composite, tick);
        tick
    }

    fn drive(slots: &mut Vec<SubscriberSlot>, tick: Tick) {
        slots.retain(|(_, weak)| match weak.upgrade() {
            Some(subscriber) => {
                subscriber.borrow_mut().on_tick(tick);
                true
            }
            None => false,
        });
    }

    /// Drive the clock in real time for `ticks` ticks, sleeping between
    /// deadlines and running late on overruns.
    pub fn run_for_ticks(&mut self, ticks: u64) {
        let interval = self.rate.interval();
        let mut deadline = Instant::now();
        let mut in_overrun = false;
        for _ in 0..ticks {
            self.tick();
            deadline += interval;
            let now = Instant::now();
            if now > deadline {
                self.overruns += 1;
                if !in_overrun {
                    tracing::warn!(
                        tick = self.current.0,
                        late_ms = (now - deadline).as_millis() as u64,
                        "tick overran its interval; running late"
                    );
                    in_overrun = true;
                }
                deadline = now;
            } else {
                in_overrun = false;
                std::thread::sleep(deadline - now);
            }
        }
    }

    /// Nominal tick interval at the configured rate.
    pub fn interval(&self) -> Duration {
        self.rate.interval()
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;

    struct Probe {
        label: &'static str,
        log: Rc<RefCell<Vec<(&'static str, u64)>>>,
    }

    impl TickSubscriber for Probe {
        fn on_tick(&mut self, tick: Tick) {
            self.log.borrow_mut().push((self.label, tick.0));
        }
    }

    fn probe(
        label: &'static str,
        log: &Rc<RefCell<Vec<(&'static str, u64)>>>,
    ) -> Rc<RefCell<Probe>> {
        Rc::new(RefCell::new(Probe {
            label,
            log: Rc::clone(log),
        }))
    }

    fn weak_of(p: &Rc<RefCell<Probe>>) -> Weak<RefCell<dyn TickSubscriber>> {
        let rc: Rc<RefCell<dyn TickSubscriber>> = Rc::clone(p) as _;
        Rc::downgrade(&rc)
    }

    #[test]
    fn refresh_phase_runs_before_composite_phase() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mixer = probe("mixer", &log);
        let source = probe("source", &log);

        let mut clock = FrameClock::new(TickRate::default());
        // Subscribe the composite-phase probe first; it must still run last.
        clock.subscribe(TickPhase::Composite, weak_of(&mixer));
        clock.subscribe(TickPhase::Refresh, weak_of(&source));

        clock.tick();
        clock.tick();

        assert_eq!(
            *log.borrow(),
            vec![("source", 1), ("mixer", 1), ("source", 2), ("mixer", 2)]
        );
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let a = probe("a", &log);
        let b = probe("b", &log);

        let mut clock = FrameClock::new(TickRate::default());
        clock.subscribe(TickPhase::Refresh, weak_of(&a));
        clock.subscribe(TickPhase::Refresh, weak_of(&b));

        clock.tick();
        drop(a);
        clock.tick();

        assert_eq!(*log.borrow(), vec![("a", 1), ("b", 1), ("b", 2)]);
    }

    #[test]
    fn unsubscribe_detaches_and_reports() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let a = probe("a", &log);

        let mut clock = FrameClock::new(TickRate::default());
        let id = clock.subscribe(TickPhase::Refresh, weak_of(&a));

        assert!(clock.unsubscribe(id));
        assert!(!clock.unsubscribe(id));
        clock.tick();
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn ticks_are_monotonic_from_one() {
        let mut clock = FrameClock::new(TickRate::new(120).unwrap());
        assert_eq!(clock.current_tick(), Tick(0));
        assert_eq!(clock.tick(), Tick(1));
        assert_eq!(clock.tick(), Tick(2));
        assert_eq!(clock.current_tick(), Tick(2));
    }
}
