#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Trophic engine.
//!
//! This crate defines the message surface that connects adapters, the
//! authoritative world, and pure systems. Adapters submit [`Command`] values
//! describing desired mutations, the world executes those commands via its
//! `apply` entry point, and then broadcasts [`Event`] values for systems to
//! react to deterministically. Systems consume event streams, query immutable
//! snapshots, and respond exclusively with new command batches.
//!
//! It also owns the externally supplied [`config::EngineConfig`] and its
//! compiled, id-resolved form, [`registry::Registry`].

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub mod config;
pub mod presets;
pub mod registry;

pub use config::{ConfigError, EngineConfig};
pub use registry::Registry;

/// Identifier of a biological level within the registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LevelId(u16);

impl LevelId {
    /// Creates a new level identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u16) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u16 {
        self.0
    }
}

/// Identifier of a data-point channel within its owning level.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChannelId(u16);

impl ChannelId {
    /// Creates a new channel identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u16) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u16 {
        self.0
    }
}

/// Fully qualified address of one numeric data-point channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PointId {
    level: LevelId,
    channel: ChannelId,
}

impl PointId {
    /// Creates a new point address from its level and channel parts.
    #[must_use]
    pub const fn new(level: LevelId, channel: ChannelId) -> Self {
        Self { level, channel }
    }

    /// Level that owns the channel.
    #[must_use]
    pub const fn level(&self) -> LevelId {
        self.level
    }

    /// Channel index within the owning level.
    #[must_use]
    pub const fn channel(&self) -> ChannelId {
        self.channel
    }
}

/// Identifier of a state within the configured state table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StateId(u8);

impl StateId {
    /// Creates a new state identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u8) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u8 {
        self.0
    }
}

/// Role a state plays within the transition graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StateRole {
    /// Resting state eligible for autonomous activation.
    Baseline,
    /// Heightened state entered through activation or a sequence.
    Elevated,
    /// Timed recovery state used by cyclic configurations.
    Cooldown,
    /// Absorbing state with no outgoing edges.
    Terminal,
}

/// Semantic category of a channel, used when scaling generated targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelKind {
    /// Ordinary channel with no special treatment.
    Standard,
    /// Fear/energy-like channel amplified while the level is elevated.
    Surge,
    /// Decay indicator held at a small nonzero value in the terminal state.
    Residual,
}

/// How a coupling rule combines its influence with the target value.
///
/// `Add` and `Multiply` are reapplied every frame and therefore compound for
/// as long as the source condition holds; they model continuous influence,
/// not a one-time patch. Only `Set` is idempotent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CombineMode {
    /// Adds the influence to the current value.
    Add,
    /// Multiplies the current value by the influence.
    Multiply,
    /// Overwrites the current value with the influence.
    Set,
}

/// Origin of a requested or committed state change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TransitionCause {
    /// Threshold rule fired during autonomous evaluation.
    Autonomous,
    /// Threshold rule stopped holding and auto-revert is enabled.
    Reversion,
    /// Phase of a triggered system-wide sequence.
    Sequence,
    /// External debug or operator override.
    Manual,
}

/// New waypoint target assigned to a single channel.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChannelTarget {
    /// Channel receiving the target.
    pub point: PointId,
    /// Waypoint the channel's value will smooth toward.
    pub target: f64,
}

/// Direct overwrite of a single channel's current value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChannelWrite {
    /// Channel receiving the write.
    pub point: PointId,
    /// Value the channel displays after the write.
    pub value: f64,
}

/// Commands that express all permissible world mutations.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Advances the simulation clock and smooths every channel.
    Tick {
        /// Duration of simulated time that elapsed since the previous tick.
        dt: Duration,
    },
    /// Assigns fresh waypoint targets produced by the value simulator.
    SetChannelTargets {
        /// Targets to install, one entry per regenerated channel.
        targets: Vec<ChannelTarget>,
    },
    /// Overwrites channel values with the output of the coupling pass.
    ApplyInfluence {
        /// Adjusted values, one entry per touched channel.
        writes: Vec<ChannelWrite>,
    },
    /// Spikes a channel's target in response to an external stimulus.
    InjectSpike {
        /// Channel whose target is spiked.
        point: PointId,
        /// Target value the channel will smooth toward.
        value: f64,
    },
    /// Requests a graph-validated state transition for a level.
    RequestTransition {
        /// Level attempting to change state.
        level: LevelId,
        /// State the level should enter.
        to: StateId,
        /// Origin of the request.
        cause: TransitionCause,
    },
    /// Forces a level into a state, bypassing graph validation.
    ForceState {
        /// Level whose state is overridden.
        level: LevelId,
        /// State the level is placed into.
        to: StateId,
        /// Origin of the override.
        cause: TransitionCause,
    },
    /// Enables or suspends autonomous threshold evaluation.
    SetAutonomy {
        /// Whether autonomous evaluation may run.
        enabled: bool,
    },
    /// Returns every level to baseline and clears channel values.
    Reset,
}

/// Events broadcast by the world after processing commands.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// Indicates that the simulation clock advanced.
    TimeAdvanced {
        /// Duration of simulated time that elapsed in the tick.
        dt: Duration,
        /// Index of the tick that just completed.
        tick: u64,
    },
    /// Confirms that a level committed a state change.
    StateChanged {
        /// Level whose state changed.
        level: LevelId,
        /// State the level held before the change.
        from: StateId,
        /// State the level holds after the change.
        to: StateId,
        /// Origin of the change.
        cause: TransitionCause,
        /// Whether graph validation was bypassed.
        forced: bool,
        /// Level generation after the change; increases monotonically.
        generation: u64,
        /// Tick index at which the change committed.
        tick: u64,
    },
    /// Reports that a requested transition was rejected by the graph.
    TransitionRejected {
        /// Level whose request was rejected.
        level: LevelId,
        /// State the level currently holds.
        from: StateId,
        /// State the request asked for.
        to: StateId,
        /// Origin of the rejected request.
        cause: TransitionCause,
        /// Tick index at which the rejection occurred.
        tick: u64,
    },
    /// Announces that autonomous evaluation was enabled or suspended.
    AutonomyChanged {
        /// Whether autonomous evaluation may run.
        enabled: bool,
    },
    /// Confirms that the world returned to its initial state.
    WorldReset,
}

/// Immutable record of one level's state used for queries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StateSnapshot {
    /// Level the snapshot describes.
    pub level: LevelId,
    /// State the level currently holds.
    pub state: StateId,
    /// Level generation; bumps on every committed state change.
    pub generation: u64,
}

/// Read-only snapshot of every level's current state.
#[derive(Clone, Debug, Default)]
pub struct StateView {
    snapshots: Vec<StateSnapshot>,
}

impl StateView {
    /// Creates a new state view from the provided snapshots.
    #[must_use]
    pub fn from_snapshots(mut snapshots: Vec<StateSnapshot>) -> Self {
        snapshots.sort_by_key(|snapshot| snapshot.level);
        Self { snapshots }
    }

    /// Iterator over the captured snapshots in deterministic order.
    pub fn iter(&self) -> impl Iterator<Item = &StateSnapshot> {
        self.snapshots.iter()
    }

    /// Returns the state held by the provided level, if known.
    #[must_use]
    pub fn state(&self, level: LevelId) -> Option<StateId> {
        self.find(level).map(|snapshot| snapshot.state)
    }

    /// Returns the generation of the provided level, if known.
    #[must_use]
    pub fn generation(&self, level: LevelId) -> Option<u64> {
        self.find(level).map(|snapshot| snapshot.generation)
    }

    /// Consumes the view, yielding the underlying snapshots.
    #[must_use]
    pub fn into_vec(self) -> Vec<StateSnapshot> {
        self.snapshots
    }

    fn find(&self, level: LevelId) -> Option<&StateSnapshot> {
        self.snapshots
            .binary_search_by_key(&level, |snapshot| snapshot.level)
            .ok()
            .map(|index| &self.snapshots[index])
    }
}

/// Immutable record of one channel's numbers used for queries.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChannelSnapshot {
    /// Channel the snapshot describes.
    pub point: PointId,
    /// Smoothed value currently displayed.
    pub value: f64,
    /// Waypoint the value is smoothing toward.
    pub target: f64,
    /// Smoothing coefficient, fixed for the channel's lifetime.
    pub rate: f64,
}

/// Read-only snapshot of every channel's current numbers.
#[derive(Clone, Debug, Default)]
pub struct ChannelView {
    snapshots: Vec<ChannelSnapshot>,
}

impl ChannelView {
    /// Creates a new channel view from the provided snapshots.
    #[must_use]
    pub fn from_snapshots(mut snapshots: Vec<ChannelSnapshot>) -> Self {
        snapshots.sort_by_key(|snapshot| snapshot.point);
        Self { snapshots }
    }

    /// Iterator over the captured snapshots in deterministic order.
    pub fn iter(&self) -> impl Iterator<Item = &ChannelSnapshot> {
        self.snapshots.iter()
    }

    /// Returns the smoothed value of the provided channel, defaulting to 0.
    #[must_use]
    pub fn value_or_zero(&self, point: PointId) -> f64 {
        self.find(point).map_or(0.0, |snapshot| snapshot.value)
    }

    /// Returns the full snapshot of the provided channel, if known.
    #[must_use]
    pub fn snapshot(&self, point: PointId) -> Option<&ChannelSnapshot> {
        self.find(point)
    }

    /// Consumes the view, yielding the underlying snapshots.
    #[must_use]
    pub fn into_vec(self) -> Vec<ChannelSnapshot> {
        self.snapshots
    }

    fn find(&self, point: PointId) -> Option<&ChannelSnapshot> {
        self.snapshots
            .binary_search_by_key(&point, |snapshot| snapshot.point)
            .ok()
            .map(|index| &self.snapshots[index])
    }
}
