#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative state management for the Trophic engine.
//!
//! The world owns every level's current state and every channel's numbers.
//! All mutation flows through [`apply`], which executes one [`Command`] at a
//! time and pushes resulting [`Event`] values for systems and subscribers.
//! State changes are atomic with respect to one command; each level carries a
//! generation counter that bumps on every committed change so that deferred
//! effects scheduled against an older state can be detected and dropped.

use std::time::Duration;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use trophic_core::{
    Command, Event, LevelId, PointId, Registry, StateId, TransitionCause,
};

/// Represents the authoritative Trophic world state.
#[derive(Debug)]
pub struct World {
    registry: Registry,
    levels: Vec<LevelCell>,
    autonomy: bool,
    tick_index: u64,
    elapsed: Duration,
}

impl World {
    /// Creates a new world with every level at baseline and every channel at
    /// zero. Lerp rates are drawn once from the configured range using the
    /// provided seed and stay immutable for the lifetime of the run.
    #[must_use]
    pub fn new(registry: Registry, seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let tuning = registry.tuning();
        let (rate_min, rate_max) = (tuning.lerp_rate_min, tuning.lerp_rate_max);
        let baseline = registry.baseline();

        let levels = registry
            .levels()
            .iter()
            .map(|descriptor| {
                let channels = descriptor.channels.len();
                let rates = (0..channels)
                    .map(|_| rng.gen_range(rate_min..=rate_max))
                    .collect();
                LevelCell {
                    state: baseline,
                    generation: 0,
                    values: vec![0.0; channels],
                    targets: vec![0.0; channels],
                    rates,
                }
            })
            .collect();

        Self {
            registry,
            levels,
            autonomy: true,
            tick_index: 0,
            elapsed: Duration::ZERO,
        }
    }

    fn cell_mut(&mut self, level: LevelId) -> Option<&mut LevelCell> {
        self.levels.get_mut(level.get() as usize)
    }

    fn set_target(&mut self, point: PointId, target: f64) {
        let channel = point.channel().get() as usize;
        if let Some(cell) = self.cell_mut(point.level()) {
            if let Some(slot) = cell.targets.get_mut(channel) {
                *slot = target;
            }
        }
    }

    fn set_value(&mut self, point: PointId, value: f64) {
        let channel = point.channel().get() as usize;
        if let Some(cell) = self.cell_mut(point.level()) {
            if let Some(slot) = cell.values.get_mut(channel) {
                *slot = value;
            }
        }
    }

    fn commit(
        &mut self,
        level: LevelId,
        to: StateId,
        cause: TransitionCause,
        forced: bool,
        out_events: &mut Vec<Event>,
    ) {
        let tick = self.tick_index;
        let Some(cell) = self.cell_mut(level) else {
            return;
        };
        let from = cell.state;
        cell.state = to;
        cell.generation = cell.generation.saturating_add(1);
        let generation = cell.generation;
        out_events.push(Event::StateChanged {
            level,
            from,
            to,
            cause,
            forced,
            generation,
            tick,
        });
    }
}

/// Applies the provided command to the world, mutating state deterministically.
pub fn apply(world: &mut World, command: Command, out_events: &mut Vec<Event>) {
    match command {
        Command::Tick { dt } => {
            world.tick_index = world.tick_index.saturating_add(1);
            world.elapsed = world.elapsed.saturating_add(dt);

            for cell in &mut world.levels {
                for index in 0..cell.values.len() {
                    let current = cell.values[index];
                    let target = cell.targets[index];
                    let rate = cell.rates[index];
                    cell.values[index] = current + (target - current) * rate;
                }
            }

            out_events.push(Event::TimeAdvanced {
                dt,
                tick: world.tick_index,
            });
        }
        Command::SetChannelTargets { targets } => {
            for entry in targets {
                world.set_target(entry.point, entry.target);
            }
        }
        Command::ApplyInfluence { writes } => {
            for entry in writes {
                world.set_value(entry.point, entry.value);
            }
        }
        Command::InjectSpike { point, value } => {
            world.set_target(point, value);
        }
        Command::RequestTransition { level, to, cause } => {
            let Some(from) = world
                .levels
                .get(level.get() as usize)
                .map(|cell| cell.state)
            else {
                return;
            };

            if !world.registry.allows(from, to) {
                log::warn!(
                    "invalid transition: {} {} -> {}",
                    world.registry.level_name(level).unwrap_or("?"),
                    world.registry.state_name(from).unwrap_or("?"),
                    world.registry.state_name(to).unwrap_or("?"),
                );
                out_events.push(Event::TransitionRejected {
                    level,
                    from,
                    to,
                    cause,
                    tick: world.tick_index,
                });
                return;
            }

            world.commit(level, to, cause, false, out_events);
        }
        Command::ForceState { level, to, cause } => {
            world.commit(level, to, cause, true, out_events);
        }
        Command::SetAutonomy { enabled } => {
            if world.autonomy != enabled {
                world.autonomy = enabled;
                out_events.push(Event::AutonomyChanged { enabled });
            }
        }
        Command::Reset => {
            let baseline = world.registry.baseline();
            for cell in &mut world.levels {
                cell.state = baseline;
                cell.generation = cell.generation.saturating_add(1);
                cell.values.fill(0.0);
                cell.targets.fill(0.0);
            }
            world.autonomy = true;
            world.elapsed = Duration::ZERO;
            out_events.push(Event::WorldReset);
        }
    }
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use super::World;
    use trophic_core::{
        ChannelId, ChannelSnapshot, ChannelView, LevelId, PointId, Registry, StateId,
        StateSnapshot, StateView,
    };

    /// Provides read-only access to the compiled registry backing the world.
    #[must_use]
    pub fn registry(world: &World) -> &Registry {
        &world.registry
    }

    /// Reports whether autonomous evaluation is currently enabled.
    #[must_use]
    pub fn autonomy(world: &World) -> bool {
        world.autonomy
    }

    /// Index of the most recently completed tick.
    #[must_use]
    pub fn tick_index(world: &World) -> u64 {
        world.tick_index
    }

    /// Returns the state currently held by the provided level, if it exists.
    #[must_use]
    pub fn state(world: &World, level: LevelId) -> Option<StateId> {
        world
            .levels
            .get(level.get() as usize)
            .map(|cell| cell.state)
    }

    /// Captures a read-only view of every level's current state.
    #[must_use]
    pub fn state_view(world: &World) -> StateView {
        let snapshots = world
            .levels
            .iter()
            .enumerate()
            .map(|(index, cell)| StateSnapshot {
                level: LevelId::new(index as u16),
                state: cell.state,
                generation: cell.generation,
            })
            .collect();
        StateView::from_snapshots(snapshots)
    }

    /// Captures a read-only view of every channel's current numbers.
    #[must_use]
    pub fn channel_view(world: &World) -> ChannelView {
        let mut snapshots = Vec::new();
        for (level, cell) in world.levels.iter().enumerate() {
            for index in 0..cell.values.len() {
                snapshots.push(ChannelSnapshot {
                    point: PointId::new(
                        LevelId::new(level as u16),
                        ChannelId::new(index as u16),
                    ),
                    value: cell.values[index],
                    target: cell.targets[index],
                    rate: cell.rates[index],
                });
            }
        }
        ChannelView::from_snapshots(snapshots)
    }

    /// Returns the smoothed value of the provided channel, defaulting to 0.
    #[must_use]
    pub fn value_or_zero(world: &World, point: PointId) -> f64 {
        world
            .levels
            .get(point.level().get() as usize)
            .and_then(|cell| cell.values.get(point.channel().get() as usize))
            .copied()
            .unwrap_or(0.0)
    }
}

#[derive(Clone, Debug)]
struct LevelCell {
    state: StateId,
    generation: u64,
    values: Vec<f64>,
    targets: Vec<f64>,
    rates: Vec<f64>,
}
