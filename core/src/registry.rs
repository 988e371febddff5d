//! Compiled, id-resolved form of the engine configuration.
//!
//! Compilation resolves every name reference up front so that rule
//! evaluation never encounters a missing level, channel or state at
//! runtime; any dangling reference is a setup bug surfaced as a
//! [`ConfigError`] before the world is constructed.

use std::time::Duration;

use crate::config::{
    Comparison, ConfigError, EngineConfig, SequenceConfig, StateGraphConfig, Tuning,
};
use crate::{ChannelId, ChannelKind, CombineMode, LevelId, PointId, StateId, StateRole};

/// Immutable description of one level and its channels.
#[derive(Clone, Debug, PartialEq)]
pub struct LevelDescriptor {
    /// Display name of the level.
    pub name: String,
    /// Channels owned by the level, indexed by [`ChannelId`].
    pub channels: Vec<ChannelDescriptor>,
}

/// Immutable description of one channel.
#[derive(Clone, Debug, PartialEq)]
pub struct ChannelDescriptor {
    /// Display name of the channel.
    pub name: String,
    /// Semantic category used when scaling generated targets.
    pub kind: ChannelKind,
}

/// Immutable description of one state in the shared table.
#[derive(Clone, Debug, PartialEq)]
pub struct StateDescriptor {
    /// Display name of the state.
    pub name: String,
    /// Role the state plays in the graph.
    pub role: StateRole,
}

/// One resolved threshold comparison.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Clause {
    /// Channel inspected by the clause.
    pub point: PointId,
    /// Direction of the comparison.
    pub comparison: Comparison,
    /// Threshold the value is compared against.
    pub threshold: f64,
}

impl Clause {
    /// Evaluates the clause against a single value.
    #[must_use]
    pub fn holds(&self, value: f64) -> bool {
        match self.comparison {
            Comparison::Above => value > self.threshold,
            Comparison::Below => value < self.threshold,
        }
    }
}

/// One resolved cross-level influence rule.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CouplingRule {
    /// Level whose state gates the rule.
    pub source: LevelId,
    /// State the source must hold for the rule to apply.
    pub source_state: StateId,
    /// Channel perturbed by the rule.
    pub target: PointId,
    /// Magnitude of the influence.
    pub influence: f64,
    /// How the influence combines with the current value.
    pub mode: CombineMode,
}

/// One resolved phase of the triggered sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Phase {
    /// State every level is forced into when the phase begins.
    pub state: StateId,
    /// How long the phase lasts before the next one begins.
    pub dwell: Duration,
}

/// Resolved sequence plan consumed by the trigger controller.
#[derive(Clone, Debug, PartialEq)]
pub struct SequencePlan {
    /// Phases entered in order on a trigger.
    pub phases: Vec<Phase>,
    /// Window after an accepted trigger during which triggers are ignored.
    pub trigger_cooldown: Duration,
    /// How long the activation flag stays raised.
    pub flash_duration: Duration,
    /// Minimum sustained press required from polled hardware buttons.
    pub min_press: Duration,
    /// Whether a trigger requires every level to sit at baseline.
    pub require_all_baseline: bool,
}

/// Compiled, validated registry backing one engine run.
#[derive(Clone, Debug, PartialEq)]
pub struct Registry {
    levels: Vec<LevelDescriptor>,
    states: Vec<StateDescriptor>,
    edges: Vec<Vec<StateId>>,
    baseline: StateId,
    elevated: StateId,
    activation: Vec<Vec<Clause>>,
    coupling: Vec<CouplingRule>,
    tuning: Tuning,
    sequence: SequencePlan,
}

impl Registry {
    /// Compiles and validates an [`EngineConfig`].
    pub fn compile(config: &EngineConfig) -> Result<Self, ConfigError> {
        let levels = compile_levels(config)?;
        let (states, edges, baseline, elevated) = compile_states(&config.states)?;

        let mut activation: Vec<Vec<Clause>> = vec![Vec::new(); levels.len()];
        for rule in &config.activation {
            let level = resolve_level(&levels, &rule.level)?;
            let mut clauses = Vec::with_capacity(rule.all.len());
            for clause in &rule.all {
                let owner = match &clause.level {
                    Some(name) => resolve_level(&levels, name)?,
                    None => level,
                };
                let point = resolve_point(&levels, owner, &clause.channel)?;
                clauses.push(Clause {
                    point,
                    comparison: clause.comparison,
                    threshold: clause.threshold,
                });
            }
            activation[level.get() as usize] = clauses;
        }

        let mut coupling = Vec::with_capacity(config.coupling.len());
        for rule in &config.coupling {
            let source = resolve_level(&levels, &rule.source)?;
            let source_state = resolve_state(&states, &rule.source_state)?;
            let target_level = resolve_level(&levels, &rule.target_level)?;
            let target = resolve_point(&levels, target_level, &rule.target_channel)?;
            coupling.push(CouplingRule {
                source,
                source_state,
                target,
                influence: rule.influence,
                mode: rule.mode,
            });
        }

        let tuning = validate_tuning(&config.tuning)?;
        let sequence = compile_sequence(&config.sequence, &states)?;

        Ok(Self {
            levels,
            states,
            edges,
            baseline,
            elevated,
            activation,
            coupling,
            tuning,
            sequence,
        })
    }

    /// Descriptors of every level, indexed by [`LevelId`].
    #[must_use]
    pub fn levels(&self) -> &[LevelDescriptor] {
        &self.levels
    }

    /// Number of configured levels.
    #[must_use]
    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// Every level identifier in ascending order.
    pub fn level_ids(&self) -> impl Iterator<Item = LevelId> {
        (0..self.levels.len() as u16).map(LevelId::new)
    }

    /// Every channel address in deterministic (level, channel) order.
    pub fn points(&self) -> impl Iterator<Item = PointId> + '_ {
        self.levels.iter().enumerate().flat_map(|(level, descriptor)| {
            (0..descriptor.channels.len() as u16).map(move |channel| {
                PointId::new(LevelId::new(level as u16), ChannelId::new(channel))
            })
        })
    }

    /// Display name of the provided level, if it exists.
    #[must_use]
    pub fn level_name(&self, level: LevelId) -> Option<&str> {
        self.levels
            .get(level.get() as usize)
            .map(|descriptor| descriptor.name.as_str())
    }

    /// Descriptor of the provided channel, if it exists.
    #[must_use]
    pub fn channel(&self, point: PointId) -> Option<&ChannelDescriptor> {
        self.levels
            .get(point.level().get() as usize)
            .and_then(|descriptor| descriptor.channels.get(point.channel().get() as usize))
    }

    /// Display name of the provided state, if it exists.
    #[must_use]
    pub fn state_name(&self, state: StateId) -> Option<&str> {
        self.states
            .get(state.get() as usize)
            .map(|descriptor| descriptor.name.as_str())
    }

    /// Role of the provided state; unknown states report `Terminal` so that
    /// callers never treat them as eligible for evaluation.
    #[must_use]
    pub fn role(&self, state: StateId) -> StateRole {
        self.states
            .get(state.get() as usize)
            .map_or(StateRole::Terminal, |descriptor| descriptor.role)
    }

    /// The unique baseline state.
    #[must_use]
    pub const fn baseline(&self) -> StateId {
        self.baseline
    }

    /// The elevated state entered by autonomous activation.
    #[must_use]
    pub const fn elevated(&self) -> StateId {
        self.elevated
    }

    /// Reports whether the graph permits the provided transition. A terminal
    /// state has no outgoing edges, so nothing leaves it.
    #[must_use]
    pub fn allows(&self, from: StateId, to: StateId) -> bool {
        if self.role(from) == StateRole::Terminal {
            return false;
        }
        self.edges
            .get(from.get() as usize)
            .is_some_and(|targets| targets.contains(&to))
    }

    /// Activation clauses of the provided level; empty means never activate.
    #[must_use]
    pub fn activation(&self, level: LevelId) -> &[Clause] {
        self.activation
            .get(level.get() as usize)
            .map_or(&[], |clauses| clauses.as_slice())
    }

    /// Coupling rules in configuration order.
    #[must_use]
    pub fn coupling(&self) -> &[CouplingRule] {
        &self.coupling
    }

    /// Scalar tuning knobs.
    #[must_use]
    pub const fn tuning(&self) -> &Tuning {
        &self.tuning
    }

    /// Resolved sequence plan.
    #[must_use]
    pub const fn sequence(&self) -> &SequencePlan {
        &self.sequence
    }

    /// Resolves a level by display name.
    #[must_use]
    pub fn level_id(&self, name: &str) -> Option<LevelId> {
        self.levels
            .iter()
            .position(|descriptor| descriptor.name == name)
            .map(|index| LevelId::new(index as u16))
    }

    /// Resolves a state by display name.
    #[must_use]
    pub fn state_id(&self, name: &str) -> Option<StateId> {
        self.states
            .iter()
            .position(|descriptor| descriptor.name == name)
            .map(|index| StateId::new(index as u8))
    }

    /// Resolves a channel address from level and channel display names.
    #[must_use]
    pub fn point(&self, level: &str, channel: &str) -> Option<PointId> {
        let level_id = self.level_id(level)?;
        let descriptor = &self.levels[level_id.get() as usize];
        descriptor
            .channels
            .iter()
            .position(|candidate| candidate.name == channel)
            .map(|index| PointId::new(level_id, ChannelId::new(index as u16)))
    }
}

fn compile_levels(config: &EngineConfig) -> Result<Vec<LevelDescriptor>, ConfigError> {
    if config.levels.is_empty() {
        return Err(ConfigError::NoLevels);
    }

    let mut levels = Vec::with_capacity(config.levels.len());
    for level in &config.levels {
        if config
            .levels
            .iter()
            .filter(|candidate| candidate.name == level.name)
            .count()
            > 1
        {
            return Err(ConfigError::DuplicateLevel(level.name.clone()));
        }

        let mut channels = Vec::with_capacity(level.channels.len());
        for channel in &level.channels {
            if level
                .channels
                .iter()
                .filter(|candidate| candidate.name == channel.name)
                .count()
                > 1
            {
                return Err(ConfigError::DuplicateChannel {
                    level: level.name.clone(),
                    channel: channel.name.clone(),
                });
            }
            channels.push(ChannelDescriptor {
                name: channel.name.clone(),
                kind: channel.kind,
            });
        }
        levels.push(LevelDescriptor {
            name: level.name.clone(),
            channels,
        });
    }
    Ok(levels)
}

type CompiledStates = (Vec<StateDescriptor>, Vec<Vec<StateId>>, StateId, StateId);

fn compile_states(config: &StateGraphConfig) -> Result<CompiledStates, ConfigError> {
    if config.states.is_empty() {
        return Err(ConfigError::NoStates);
    }

    let mut states = Vec::with_capacity(config.states.len());
    for state in &config.states {
        if config
            .states
            .iter()
            .filter(|candidate| candidate.name == state.name)
            .count()
            > 1
        {
            return Err(ConfigError::DuplicateState(state.name.clone()));
        }
        states.push(StateDescriptor {
            name: state.name.clone(),
            role: state.role,
        });
    }

    let baselines: Vec<usize> = states
        .iter()
        .enumerate()
        .filter(|(_, descriptor)| descriptor.role == StateRole::Baseline)
        .map(|(index, _)| index)
        .collect();
    let [baseline] = baselines.as_slice() else {
        return Err(ConfigError::BaselineCount);
    };
    let baseline = StateId::new(*baseline as u8);

    let elevated = states
        .iter()
        .position(|descriptor| descriptor.role == StateRole::Elevated)
        .map(|index| StateId::new(index as u8))
        .ok_or(ConfigError::NoElevatedState)?;

    let mut edges: Vec<Vec<StateId>> = vec![Vec::new(); states.len()];
    for edge in &config.edges {
        let from = resolve_state(&states, &edge.from)?;
        let to = resolve_state(&states, &edge.to)?;
        if states[from.get() as usize].role == StateRole::Terminal {
            return Err(ConfigError::TerminalOutgoing(edge.from.clone()));
        }
        let targets = &mut edges[from.get() as usize];
        if !targets.contains(&to) {
            targets.push(to);
        }
    }

    Ok((states, edges, baseline, elevated))
}

fn validate_tuning(tuning: &Tuning) -> Result<Tuning, ConfigError> {
    if tuning.evaluation_stride == 0 {
        return Err(ConfigError::ZeroStride);
    }
    if tuning.retarget_interval.is_zero() {
        return Err(ConfigError::ZeroRetargetInterval);
    }
    let (min, max) = (tuning.lerp_rate_min, tuning.lerp_rate_max);
    if !(min > 0.0 && min <= max && max <= 1.0) {
        return Err(ConfigError::InvalidLerpRange { min, max });
    }
    Ok(tuning.clone())
}

fn compile_sequence(
    config: &SequenceConfig,
    states: &[StateDescriptor],
) -> Result<SequencePlan, ConfigError> {
    let mut phases = Vec::with_capacity(config.phases.len());
    for phase in &config.phases {
        let state = resolve_state(states, &phase.state)?;
        if phase.dwell.is_zero() {
            return Err(ConfigError::ZeroDwell(phase.state.clone()));
        }
        phases.push(Phase {
            state,
            dwell: phase.dwell,
        });
    }
    Ok(SequencePlan {
        phases,
        trigger_cooldown: config.trigger_cooldown,
        flash_duration: config.flash_duration,
        min_press: config.min_press,
        require_all_baseline: config.require_all_baseline,
    })
}

fn resolve_level(levels: &[LevelDescriptor], name: &str) -> Result<LevelId, ConfigError> {
    levels
        .iter()
        .position(|descriptor| descriptor.name == name)
        .map(|index| LevelId::new(index as u16))
        .ok_or_else(|| ConfigError::UnknownLevel(name.to_owned()))
}

fn resolve_point(
    levels: &[LevelDescriptor],
    level: LevelId,
    channel: &str,
) -> Result<PointId, ConfigError> {
    let descriptor = &levels[level.get() as usize];
    descriptor
        .channels
        .iter()
        .position(|candidate| candidate.name == channel)
        .map(|index| PointId::new(level, ChannelId::new(index as u16)))
        .ok_or_else(|| ConfigError::UnknownChannel {
            level: descriptor.name.clone(),
            channel: channel.to_owned(),
        })
}

fn resolve_state(states: &[StateDescriptor], name: &str) -> Result<StateId, ConfigError> {
    states
        .iter()
        .position(|descriptor| descriptor.name == name)
        .map(|index| StateId::new(index as u8))
        .ok_or_else(|| ConfigError::UnknownState(name.to_owned()))
}

#[cfg(test)]
mod tests {
    use super::Registry;
    use crate::config::{
        ActivationConfig, ClauseConfig, ConfigError, CouplingConfig, EdgeConfig, EngineConfig,
        LevelConfig, PhaseConfig, SequenceConfig, StateConfig, StateGraphConfig, Tuning,
    };
    use crate::{config::ChannelConfig, StateRole};
    use std::time::Duration;

    fn two_level_config() -> EngineConfig {
        EngineConfig {
            levels: vec![
                LevelConfig {
                    name: "predator".to_owned(),
                    channels: vec![
                        ChannelConfig::standard("Hunger"),
                        ChannelConfig::surge("Energy"),
                    ],
                },
                LevelConfig {
                    name: "flock".to_owned(),
                    channels: vec![ChannelConfig::surge("Collective Energy")],
                },
            ],
            states: StateGraphConfig {
                states: vec![
                    StateConfig::new("NORMAL", StateRole::Baseline),
                    StateConfig::new("EXCITED", StateRole::Elevated),
                    StateConfig::new("DEAD", StateRole::Terminal),
                ],
                edges: vec![
                    EdgeConfig::new("NORMAL", "EXCITED"),
                    EdgeConfig::new("EXCITED", "NORMAL"),
                    EdgeConfig::new("NORMAL", "DEAD"),
                    EdgeConfig::new("EXCITED", "DEAD"),
                ],
            },
            activation: vec![ActivationConfig {
                level: "predator".to_owned(),
                all: vec![ClauseConfig::above("Hunger", 80.0)],
            }],
            coupling: vec![CouplingConfig::add(
                "predator",
                "EXCITED",
                "flock",
                "Collective Energy",
                15.0,
            )],
            tuning: Tuning::default(),
            sequence: SequenceConfig {
                phases: vec![PhaseConfig::new("EXCITED", Duration::from_secs(8))],
                ..SequenceConfig::default()
            },
        }
    }

    #[test]
    fn compiles_a_valid_configuration() {
        let registry = Registry::compile(&two_level_config()).expect("compile");
        assert_eq!(registry.level_count(), 2);
        assert_eq!(registry.points().count(), 3);
        assert_eq!(registry.state_name(registry.baseline()), Some("NORMAL"));
        assert_eq!(registry.state_name(registry.elevated()), Some("EXCITED"));

        let predator = registry.level_id("predator").expect("predator");
        assert_eq!(registry.activation(predator).len(), 1);
        assert_eq!(registry.coupling().len(), 1);
        let hunger = registry.point("predator", "Hunger").expect("hunger");
        assert_eq!(registry.activation(predator)[0].point, hunger);
    }

    #[test]
    fn terminal_state_has_no_outgoing_edges() {
        let registry = Registry::compile(&two_level_config()).expect("compile");
        let dead = registry.state_id("DEAD").expect("dead");
        let normal = registry.state_id("NORMAL").expect("normal");
        let excited = registry.state_id("EXCITED").expect("excited");

        assert!(registry.allows(normal, excited));
        assert!(registry.allows(excited, dead));
        assert!(!registry.allows(dead, normal));
        assert!(!registry.allows(dead, excited));
    }

    #[test]
    fn rejects_unknown_channel_in_activation_rule() {
        let mut config = two_level_config();
        config.activation[0].all = vec![ClauseConfig::above("Bloodlust", 10.0)];
        assert_eq!(
            Registry::compile(&config),
            Err(ConfigError::UnknownChannel {
                level: "predator".to_owned(),
                channel: "Bloodlust".to_owned(),
            }),
        );
    }

    #[test]
    fn rejects_coupling_against_missing_level() {
        let mut config = two_level_config();
        config.coupling[0].target_level = "swarm".to_owned();
        assert_eq!(
            Registry::compile(&config),
            Err(ConfigError::UnknownLevel("swarm".to_owned())),
        );
    }

    #[test]
    fn rejects_edges_leaving_a_terminal_state() {
        let mut config = two_level_config();
        config
            .states
            .edges
            .push(EdgeConfig::new("DEAD", "NORMAL"));
        assert_eq!(
            Registry::compile(&config),
            Err(ConfigError::TerminalOutgoing("DEAD".to_owned())),
        );
    }

    #[test]
    fn rejects_multiple_baseline_states() {
        let mut config = two_level_config();
        config
            .states
            .states
            .push(StateConfig::new("CALM", StateRole::Baseline));
        assert_eq!(Registry::compile(&config), Err(ConfigError::BaselineCount));
    }

    #[test]
    fn rejects_invalid_lerp_range() {
        let mut config = two_level_config();
        config.tuning.lerp_rate_min = 0.5;
        config.tuning.lerp_rate_max = 0.1;
        assert!(matches!(
            Registry::compile(&config),
            Err(ConfigError::InvalidLerpRange { .. }),
        ));
    }

    #[test]
    fn rejects_zero_dwell_phases() {
        let mut config = two_level_config();
        config.sequence.phases[0].dwell = Duration::ZERO;
        assert_eq!(
            Registry::compile(&config),
            Err(ConfigError::ZeroDwell("EXCITED".to_owned())),
        );
    }

    #[test]
    fn rejects_duplicate_channel_names() {
        let mut config = two_level_config();
        config.levels[0]
            .channels
            .push(ChannelConfig::standard("Hunger"));
        assert!(matches!(
            Registry::compile(&config),
            Err(ConfigError::DuplicateChannel { .. }),
        ));
    }
}
