#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Trigger intake and the system-wide forced sequence.
//!
//! An accepted trigger suspends autonomy, forces every level through the
//! configured phases in order, and finally returns the levels to baseline and
//! restores autonomy. Phase boundaries are deadlines in accumulated simulated
//! time, so the sequence advances exactly with the tick stream rather than
//! with wall-clock timers.
//!
//! Triggers arriving while a sequence runs, or within the cooldown window of
//! the previous accepted trigger, are dropped. A short activation flag is
//! raised on acceptance for visual feedback and clears on its own after the
//! configured flash duration.
//!
//! While a sequence runs, a level whose state changes from outside the
//! sequence (a manual override, most commonly into a terminal state) is
//! treated as superseded: later phases and the final baseline return leave it
//! alone instead of resurrecting it.

use std::time::Duration;

use trophic_core::{
    Command, Event, LevelId, Registry, StateId, StateRole, StateView, TransitionCause,
};

/// Pure system that owns trigger debouncing and sequence progression.
#[derive(Debug, Default)]
pub struct Sequence {
    elapsed: Duration,
    pending_trigger: bool,
    last_accepted: Option<Duration>,
    flash_until: Option<Duration>,
    active: Option<ActiveSequence>,
}

#[derive(Debug)]
struct ActiveSequence {
    phase: usize,
    deadline: Duration,
    superseded: Vec<bool>,
}

impl Sequence {
    /// Creates a new controller with no pending trigger and no sequence.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an external trigger; it is judged on the next `handle` call.
    pub fn request_trigger(&mut self) {
        self.pending_trigger = true;
    }

    /// Whether a forced sequence is currently in progress.
    #[must_use]
    pub fn active(&self) -> bool {
        self.active.is_some()
    }

    /// Whether the activation flash is currently raised.
    #[must_use]
    pub fn flash(&self) -> bool {
        self.flash_until
            .is_some_and(|until| self.elapsed < until)
    }

    /// Consumes events and the current state view to drive the sequence.
    pub fn handle(
        &mut self,
        events: &[Event],
        registry: &Registry,
        states: &StateView,
        out: &mut Vec<Command>,
    ) {
        for event in events {
            match event {
                Event::TimeAdvanced { dt, .. } => {
                    self.elapsed = self.elapsed.saturating_add(*dt);
                    self.advance_phases(registry, out);
                    if self.flash_until.is_some_and(|until| self.elapsed >= until) {
                        self.flash_until = None;
                    }
                }
                Event::StateChanged { level, cause, .. }
                    if *cause != TransitionCause::Sequence =>
                {
                    self.mark_superseded(*level);
                }
                _ => {}
            }
        }

        if self.pending_trigger {
            self.pending_trigger = false;
            self.judge_trigger(registry, states, out);
        }
    }

    /// Feeds state changes from between-tick inputs into the supersede
    /// guard. Unlike `handle`, this neither advances time nor judges a
    /// pending trigger.
    pub fn observe(&mut self, events: &[Event]) {
        for event in events {
            if let Event::StateChanged { level, cause, .. } = event {
                if *cause != TransitionCause::Sequence {
                    self.mark_superseded(*level);
                }
            }
        }
    }

    fn mark_superseded(&mut self, level: LevelId) {
        if let Some(active) = self.active.as_mut() {
            if let Some(flag) = active.superseded.get_mut(level.get() as usize) {
                *flag = true;
            }
        }
    }

    /// Clears all trigger and sequence state, including the cooldown window.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    fn judge_trigger(&mut self, registry: &Registry, states: &StateView, out: &mut Vec<Command>) {
        if self.active.is_some() {
            log::debug!("trigger dropped: sequence already in progress");
            return;
        }
        let plan = registry.sequence();
        if let Some(last) = self.last_accepted {
            if self.elapsed.saturating_sub(last) < plan.trigger_cooldown {
                log::debug!("trigger dropped: cooldown window still open");
                return;
            }
        }
        if plan.require_all_baseline && !all_baseline(registry, states) {
            log::debug!("trigger dropped: not every level is at baseline");
            return;
        }

        log::info!("trigger accepted at t={:?}", self.elapsed);
        self.last_accepted = Some(self.elapsed);
        self.flash_until = Some(self.elapsed + plan.flash_duration);

        let Some(first) = plan.phases.first() else {
            return;
        };
        out.push(Command::SetAutonomy { enabled: false });
        force_all(registry, first.state, out);
        self.active = Some(ActiveSequence {
            phase: 0,
            deadline: self.elapsed + first.dwell,
            superseded: vec![false; registry.level_count()],
        });
    }

    fn advance_phases(&mut self, registry: &Registry, out: &mut Vec<Command>) {
        let plan = registry.sequence();
        while let Some(active) = self.active.as_mut() {
            if self.elapsed < active.deadline {
                break;
            }
            let next = active.phase + 1;
            if let Some(phase) = plan.phases.get(next) {
                force_surviving(registry, phase.state, &active.superseded, out);
                active.phase = next;
                active.deadline += phase.dwell;
            } else {
                force_surviving(registry, registry.baseline(), &active.superseded, out);
                out.push(Command::SetAutonomy { enabled: true });
                self.active = None;
            }
        }
    }
}

fn all_baseline(registry: &Registry, states: &StateView) -> bool {
    registry.level_ids().all(|level| {
        states
            .state(level)
            .is_some_and(|state| registry.role(state) == StateRole::Baseline)
    })
}

fn force_all(registry: &Registry, to: StateId, out: &mut Vec<Command>) {
    for level in registry.level_ids() {
        out.push(Command::ForceState {
            level,
            to,
            cause: TransitionCause::Sequence,
        });
    }
}

fn force_surviving(
    registry: &Registry,
    to: StateId,
    superseded: &[bool],
    out: &mut Vec<Command>,
) {
    for level in registry.level_ids() {
        if superseded.get(level.get() as usize).copied().unwrap_or(false) {
            continue;
        }
        out.push(Command::ForceState {
            level,
            to,
            cause: TransitionCause::Sequence,
        });
    }
}

/// Debounce filter for polled hardware buttons.
///
/// Fires exactly once per sustained press after the press has been held for
/// the minimum duration; releasing rearms the filter.
#[derive(Debug)]
pub struct PressFilter {
    min_press: Duration,
    held: Duration,
    fired: bool,
}

impl PressFilter {
    /// Creates a filter requiring the provided sustained press.
    #[must_use]
    pub const fn new(min_press: Duration) -> Self {
        Self {
            min_press,
            held: Duration::ZERO,
            fired: false,
        }
    }

    /// Feeds one poll sample; returns true on the edge where the press
    /// qualifies.
    pub fn sample(&mut self, pressed: bool, dt: Duration) -> bool {
        if !pressed {
            self.held = Duration::ZERO;
            self.fired = false;
            return false;
        }
        self.held = self.held.saturating_add(dt);
        if !self.fired && self.held >= self.min_press {
            self.fired = true;
            return true;
        }
        false
    }
}
