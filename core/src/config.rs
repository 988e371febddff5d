//! Externally supplied configuration consumed by the engine.
//!
//! The configuration refers to levels, channels and states by name; the
//! [`crate::registry::Registry`] compiles it into id-resolved form and
//! rejects wiring mistakes with a [`ConfigError`] before the engine runs.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{ChannelKind, CombineMode, StateRole};

/// Complete description of one engine run, supplied by the host.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Biological levels in display order, each with its named channels.
    pub levels: Vec<LevelConfig>,
    /// State table and valid-transition graph shared by every level.
    pub states: StateGraphConfig,
    /// Per-level autonomous activation rules; levels without an entry never
    /// activate on their own.
    pub activation: Vec<ActivationConfig>,
    /// Cross-level influence rules applied every frame.
    pub coupling: Vec<CouplingConfig>,
    /// Scalar knobs for smoothing, cadences and target generation.
    pub tuning: Tuning,
    /// Trigger-driven system-wide sequence plan.
    pub sequence: SequenceConfig,
}

/// One biological level and the data points it displays.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LevelConfig {
    /// Unique display name, e.g. `predator`.
    pub name: String,
    /// Named channels owned by the level, in display order.
    pub channels: Vec<ChannelConfig>,
}

/// One named data-point channel.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Display name, unique within the owning level.
    pub name: String,
    /// Semantic category that drives state multipliers.
    pub kind: ChannelKind,
}

impl ChannelConfig {
    /// Convenience constructor for an ordinary channel.
    #[must_use]
    pub fn standard(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            kind: ChannelKind::Standard,
        }
    }

    /// Convenience constructor for a surge channel.
    #[must_use]
    pub fn surge(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            kind: ChannelKind::Surge,
        }
    }

    /// Convenience constructor for a residual channel.
    #[must_use]
    pub fn residual(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            kind: ChannelKind::Residual,
        }
    }
}

/// State table plus the valid-transition edge list.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StateGraphConfig {
    /// Closed set of states shared by all levels; exactly one baseline.
    pub states: Vec<StateConfig>,
    /// Directed edges permitted by [`crate::Command::RequestTransition`].
    pub edges: Vec<EdgeConfig>,
}

/// One state in the shared table.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StateConfig {
    /// Display name, e.g. `NORMAL`.
    pub name: String,
    /// Role the state plays in the graph.
    pub role: StateRole,
}

impl StateConfig {
    /// Creates a named state with the provided role.
    #[must_use]
    pub fn new(name: &str, role: StateRole) -> Self {
        Self {
            name: name.to_owned(),
            role,
        }
    }
}

/// One permitted transition between two named states.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EdgeConfig {
    /// State the transition leaves.
    pub from: String,
    /// State the transition enters.
    pub to: String,
}

impl EdgeConfig {
    /// Creates an edge from one named state to another.
    #[must_use]
    pub fn new(from: &str, to: &str) -> Self {
        Self {
            from: from.to_owned(),
            to: to.to_owned(),
        }
    }
}

/// Autonomous activation rule for one level: a conjunction of clauses.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ActivationConfig {
    /// Level the rule belongs to.
    pub level: String,
    /// Clauses that must all hold for the level to activate. An empty list
    /// never activates.
    pub all: Vec<ClauseConfig>,
}

/// One threshold comparison over a named data point.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClauseConfig {
    /// Level owning the inspected channel; `None` means the rule's own level.
    pub level: Option<String>,
    /// Channel name inspected by the clause.
    pub channel: String,
    /// Direction of the comparison.
    pub comparison: Comparison,
    /// Threshold the value is compared against.
    pub threshold: f64,
}

impl ClauseConfig {
    /// Clause that holds while the own-level channel exceeds the threshold.
    #[must_use]
    pub fn above(channel: &str, threshold: f64) -> Self {
        Self {
            level: None,
            channel: channel.to_owned(),
            comparison: Comparison::Above,
            threshold,
        }
    }

    /// Clause that holds while the own-level channel stays below the threshold.
    #[must_use]
    pub fn below(channel: &str, threshold: f64) -> Self {
        Self {
            level: None,
            channel: channel.to_owned(),
            comparison: Comparison::Below,
            threshold,
        }
    }
}

/// Direction of a threshold comparison.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Comparison {
    /// Holds while `value > threshold`.
    Above,
    /// Holds while `value < threshold`.
    Below,
}

/// Cross-level influence applied while the source holds a given state.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CouplingConfig {
    /// Level whose state gates the rule.
    pub source: String,
    /// State the source must hold for the rule to apply.
    pub source_state: String,
    /// Level owning the perturbed channel.
    pub target_level: String,
    /// Channel perturbed by the rule.
    pub target_channel: String,
    /// Magnitude of the influence.
    pub influence: f64,
    /// How the influence combines with the current value.
    pub mode: CombineMode,
}

impl CouplingConfig {
    /// Creates an additive coupling rule, the common case.
    #[must_use]
    pub fn add(
        source: &str,
        source_state: &str,
        target_level: &str,
        target_channel: &str,
        influence: f64,
    ) -> Self {
        Self {
            source: source.to_owned(),
            source_state: source_state.to_owned(),
            target_level: target_level.to_owned(),
            target_channel: target_channel.to_owned(),
            influence,
            mode: CombineMode::Add,
        }
    }
}

/// Scalar knobs for smoothing, cadences and target generation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tuning {
    /// Whether an elevated level reverts to baseline once its rule stops
    /// holding; when disabled, elevated is sticky until an external trigger.
    pub auto_revert: bool,
    /// Ticks between autonomous evaluations; decimation keeps transitions
    /// legible and filters transient smoothing noise.
    pub evaluation_stride: u32,
    /// Simulated time between waypoint regenerations.
    pub retarget_interval: Duration,
    /// Lower bound of the per-channel lerp-rate draw.
    pub lerp_rate_min: f64,
    /// Upper bound of the per-channel lerp-rate draw.
    pub lerp_rate_max: f64,
    /// State-dependent scaling applied to generated targets.
    pub multipliers: StateMultipliers,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            auto_revert: false,
            evaluation_stride: 30,
            retarget_interval: Duration::from_millis(800),
            lerp_rate_min: 0.02,
            lerp_rate_max: 0.30,
            multipliers: StateMultipliers::default(),
        }
    }
}

/// Scaling factors applied to the uniform target draw per state role.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct StateMultipliers {
    /// Factor while the level rests at baseline.
    pub baseline: f64,
    /// Factor for ordinary channels while elevated.
    pub elevated: f64,
    /// Factor for surge channels while elevated.
    pub elevated_surge: f64,
    /// Factor for ordinary channels in the terminal state.
    pub terminal: f64,
    /// Factor for residual channels in the terminal state.
    pub terminal_residual: f64,
    /// Factor while the level recovers in a cooldown state.
    pub cooldown: f64,
}

impl Default for StateMultipliers {
    fn default() -> Self {
        Self {
            baseline: 0.7,
            elevated: 1.2,
            elevated_surge: 1.5,
            terminal: 0.1,
            terminal_residual: 0.3,
            cooldown: 0.5,
        }
    }
}

/// Trigger-driven system-wide sequence plan.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SequenceConfig {
    /// Phases entered in order on a trigger; after the final phase's dwell
    /// every level returns to baseline.
    pub phases: Vec<PhaseConfig>,
    /// Window after an accepted trigger during which further triggers are
    /// ignored.
    pub trigger_cooldown: Duration,
    /// How long the activation flag stays raised for visual feedback,
    /// independent of the sequence length.
    pub flash_duration: Duration,
    /// Minimum sustained press required from polled hardware buttons.
    pub min_press: Duration,
    /// Whether a trigger is only accepted while every level sits at baseline.
    pub require_all_baseline: bool,
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self {
            phases: Vec::new(),
            trigger_cooldown: Duration::from_secs(1),
            flash_duration: Duration::from_secs(2),
            min_press: Duration::from_millis(50),
            require_all_baseline: true,
        }
    }
}

/// One phase of the triggered sequence.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PhaseConfig {
    /// State every level is forced into when the phase begins.
    pub state: String,
    /// How long the phase lasts before the next one begins.
    pub dwell: Duration,
}

impl PhaseConfig {
    /// Creates a phase forcing the named state for the provided dwell.
    #[must_use]
    pub fn new(state: &str, dwell: Duration) -> Self {
        Self {
            state: state.to_owned(),
            dwell,
        }
    }
}

/// Wiring mistakes detected while compiling an [`EngineConfig`].
#[derive(Clone, Debug, PartialEq, Error)]
pub enum ConfigError {
    /// The level list is empty.
    #[error("configuration defines no levels")]
    NoLevels,
    /// The state table is empty.
    #[error("configuration defines no states")]
    NoStates,
    /// Two levels share a name.
    #[error("duplicate level name `{0}`")]
    DuplicateLevel(String),
    /// Two channels of one level share a name.
    #[error("duplicate channel `{channel}` on level `{level}`")]
    DuplicateChannel {
        /// Level owning the colliding channels.
        level: String,
        /// Name shared by the colliding channels.
        channel: String,
    },
    /// Two states share a name.
    #[error("duplicate state name `{0}`")]
    DuplicateState(String),
    /// A rule, edge or phase references a level that does not exist.
    #[error("unknown level `{0}`")]
    UnknownLevel(String),
    /// A rule references a channel that does not exist on its level.
    #[error("unknown channel `{channel}` on level `{level}`")]
    UnknownChannel {
        /// Level the reference named.
        level: String,
        /// Channel the reference named.
        channel: String,
    },
    /// An edge, rule or phase references a state that does not exist.
    #[error("unknown state `{0}`")]
    UnknownState(String),
    /// The state table must contain exactly one baseline state.
    #[error("state table must contain exactly one baseline state")]
    BaselineCount,
    /// The state table needs at least one elevated state for activation.
    #[error("state table contains no elevated state")]
    NoElevatedState,
    /// A terminal state may not have outgoing edges.
    #[error("terminal state `{0}` has an outgoing edge")]
    TerminalOutgoing(String),
    /// The lerp-rate range must satisfy `0 < min <= max <= 1`.
    #[error("invalid lerp-rate range {min}..={max}")]
    InvalidLerpRange {
        /// Configured lower bound.
        min: f64,
        /// Configured upper bound.
        max: f64,
    },
    /// The evaluation stride must be at least one tick.
    #[error("evaluation stride must be nonzero")]
    ZeroStride,
    /// The retarget interval must be nonzero.
    #[error("retarget interval must be nonzero")]
    ZeroRetargetInterval,
    /// A sequence phase dwell must be nonzero.
    #[error("sequence phase `{0}` has a zero dwell")]
    ZeroDwell(String),
}
