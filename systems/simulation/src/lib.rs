#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Value simulator that sells the illusion of a live sensor feed.
//!
//! Every retarget interval the system draws a fresh waypoint for each channel
//! as `uniform(0, 100)` scaled by a state-dependent multiplier, and emits a
//! [`Command::SetChannelTargets`] batch. The smoothing toward those waypoints
//! happens in the world on every tick; this system only decides where the
//! values are headed next.

use std::time::Duration;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use trophic_core::{
    config::StateMultipliers, ChannelKind, ChannelTarget, Command, Event, Registry, StateRole,
    StateView,
};

/// Configuration parameters required to construct the simulator.
#[derive(Clone, Copy, Debug)]
pub struct Config {
    retarget_interval: Duration,
    rng_seed: u64,
}

impl Config {
    /// Creates a new configuration using the provided cadence and seed.
    #[must_use]
    pub const fn new(retarget_interval: Duration, rng_seed: u64) -> Self {
        Self {
            retarget_interval,
            rng_seed,
        }
    }
}

/// Pure system that periodically regenerates channel waypoint targets.
#[derive(Debug)]
pub struct Simulation {
    retarget_interval: Duration,
    accumulator: Duration,
    rng: ChaCha8Rng,
}

impl Simulation {
    /// Creates a new simulator using the supplied configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            retarget_interval: config.retarget_interval,
            accumulator: Duration::ZERO,
            rng: ChaCha8Rng::seed_from_u64(config.rng_seed),
        }
    }

    /// Consumes events and immutable views to emit retarget commands.
    pub fn handle(
        &mut self,
        events: &[Event],
        registry: &Registry,
        states: &StateView,
        out: &mut Vec<Command>,
    ) {
        if self.retarget_interval.is_zero() {
            return;
        }

        let mut accumulated = Duration::ZERO;
        for event in events {
            if let Event::TimeAdvanced { dt, .. } = event {
                accumulated = accumulated.saturating_add(*dt);
            }
        }

        if accumulated.is_zero() {
            return;
        }

        self.accumulator = self.accumulator.saturating_add(accumulated);
        while self.accumulator >= self.retarget_interval {
            self.accumulator -= self.retarget_interval;
            out.push(Command::SetChannelTargets {
                targets: self.draw_targets(registry, states),
            });
        }
    }

    /// Resets the cadence accumulator and drops any partial interval.
    pub fn reset(&mut self) {
        self.accumulator = Duration::ZERO;
    }

    fn draw_targets(&mut self, registry: &Registry, states: &StateView) -> Vec<ChannelTarget> {
        let multipliers = &registry.tuning().multipliers;
        let mut targets = Vec::with_capacity(registry.points().count());

        for point in registry.points() {
            let state = states
                .state(point.level())
                .unwrap_or_else(|| registry.baseline());
            let kind = registry
                .channel(point)
                .map_or(ChannelKind::Standard, |descriptor| descriptor.kind);
            let multiplier = state_multiplier(registry.role(state), kind, multipliers);
            let base: f64 = self.rng.gen_range(0.0..100.0);
            targets.push(ChannelTarget {
                point,
                target: base * multiplier,
            });
        }

        targets
    }
}

fn state_multiplier(role: StateRole, kind: ChannelKind, multipliers: &StateMultipliers) -> f64 {
    match role {
        StateRole::Baseline => multipliers.baseline,
        StateRole::Elevated => match kind {
            ChannelKind::Surge => multipliers.elevated_surge,
            _ => multipliers.elevated,
        },
        StateRole::Terminal => match kind {
            ChannelKind::Residual => multipliers.terminal_residual,
            _ => multipliers.terminal,
        },
        StateRole::Cooldown => multipliers.cooldown,
    }
}
