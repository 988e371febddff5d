#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Autonomous threshold evaluation.
//!
//! Every evaluation cycle the system inspects each level's activation rule, a
//! conjunction of threshold clauses over smoothed channel values. A baseline
//! level whose clauses all hold requests the shared elevated state; with
//! auto-revert enabled, an elevated level whose clauses stop holding requests
//! baseline again. Evaluation is decimated to one pass per stride of ticks so
//! that transitions track sustained conditions rather than smoothing noise.
//!
//! The system goes quiet while autonomy is suspended, which is how a running
//! trigger sequence keeps threshold rules from fighting its forced states.

use trophic_core::{
    registry::Clause, ChannelView, Command, Event, Registry, StateRole, StateView,
    TransitionCause,
};

/// Configuration parameters required to construct the evaluator.
#[derive(Clone, Copy, Debug)]
pub struct Config {
    evaluation_stride: u32,
}

impl Config {
    /// Creates a new configuration evaluating every `evaluation_stride` ticks.
    #[must_use]
    pub const fn new(evaluation_stride: u32) -> Self {
        Self { evaluation_stride }
    }
}

/// Pure system that turns sustained threshold conditions into transitions.
#[derive(Debug)]
pub struct Activation {
    stride: u32,
    counter: u32,
}

impl Activation {
    /// Creates a new evaluator using the supplied configuration.
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self {
            stride: config.evaluation_stride,
            counter: 0,
        }
    }

    /// Consumes events and immutable views to emit transition requests.
    pub fn handle(
        &mut self,
        events: &[Event],
        registry: &Registry,
        states: &StateView,
        channels: &ChannelView,
        autonomy: bool,
        out: &mut Vec<Command>,
    ) {
        if self.stride == 0 {
            return;
        }

        for event in events {
            if !matches!(event, Event::TimeAdvanced { .. }) {
                continue;
            }
            self.counter += 1;
            if self.counter < self.stride {
                continue;
            }
            self.counter = 0;
            if autonomy {
                evaluate(registry, states, channels, out);
            }
        }
    }

    /// Resets the evaluation cadence counter.
    pub fn reset(&mut self) {
        self.counter = 0;
    }
}

fn evaluate(
    registry: &Registry,
    states: &StateView,
    channels: &ChannelView,
    out: &mut Vec<Command>,
) {
    for level in registry.level_ids() {
        let Some(state) = states.state(level) else {
            continue;
        };
        let clauses = registry.activation(level);
        if clauses.is_empty() {
            continue;
        }

        match registry.role(state) {
            StateRole::Baseline if all_hold(clauses, channels) => {
                out.push(Command::RequestTransition {
                    level,
                    to: registry.elevated(),
                    cause: TransitionCause::Autonomous,
                });
            }
            StateRole::Elevated
                if registry.tuning().auto_revert && !all_hold(clauses, channels) =>
            {
                out.push(Command::RequestTransition {
                    level,
                    to: registry.baseline(),
                    cause: TransitionCause::Reversion,
                });
            }
            _ => {}
        }
    }
}

fn all_hold(clauses: &[Clause], channels: &ChannelView) -> bool {
    clauses
        .iter()
        .all(|clause| clause.holds(channels.value_or_zero(clause.point)))
}

#[cfg(test)]
mod tests {
    use super::{Activation, Config};
    use std::time::Duration;
    use trophic_core::config::{
        ActivationConfig, ChannelConfig, ClauseConfig, EdgeConfig, EngineConfig, LevelConfig,
        SequenceConfig, StateConfig, StateGraphConfig, Tuning,
    };
    use trophic_core::{
        ChannelSnapshot, ChannelView, Command, Event, Registry, StateRole, StateSnapshot,
        StateView, TransitionCause,
    };

    const STRIDE: u32 = 30;

    fn config(auto_revert: bool) -> EngineConfig {
        EngineConfig {
            levels: vec![
                LevelConfig {
                    name: "predator".to_owned(),
                    channels: vec![ChannelConfig::standard("Hunger")],
                },
                LevelConfig {
                    name: "flock".to_owned(),
                    channels: vec![
                        ChannelConfig::standard("Cohesion"),
                        ChannelConfig::standard("Variance"),
                    ],
                },
            ],
            states: StateGraphConfig {
                states: vec![
                    StateConfig::new("NORMAL", StateRole::Baseline),
                    StateConfig::new("EXCITED", StateRole::Elevated),
                ],
                edges: vec![
                    EdgeConfig::new("NORMAL", "EXCITED"),
                    EdgeConfig::new("EXCITED", "NORMAL"),
                ],
            },
            activation: vec![
                ActivationConfig {
                    level: "predator".to_owned(),
                    all: vec![ClauseConfig::above("Hunger", 80.0)],
                },
                ActivationConfig {
                    level: "flock".to_owned(),
                    all: vec![
                        ClauseConfig::below("Cohesion", 50.0),
                        ClauseConfig::above("Variance", 50.0),
                    ],
                },
            ],
            coupling: Vec::new(),
            tuning: Tuning {
                auto_revert,
                ..Tuning::default()
            },
            sequence: SequenceConfig::default(),
        }
    }

    fn states_for(registry: &Registry, assignments: &[(&str, &str)]) -> StateView {
        StateView::from_snapshots(
            assignments
                .iter()
                .map(|(level, state)| StateSnapshot {
                    level: registry.level_id(level).expect("level"),
                    state: registry.state_id(state).expect("state"),
                    generation: 0,
                })
                .collect(),
        )
    }

    fn channels_for(registry: &Registry, values: &[(&str, &str, f64)]) -> ChannelView {
        ChannelView::from_snapshots(
            values
                .iter()
                .map(|(level, channel, value)| ChannelSnapshot {
                    point: registry.point(level, channel).expect("point"),
                    value: *value,
                    target: *value,
                    rate: 0.1,
                })
                .collect(),
        )
    }

    fn tick_events(count: u32) -> Vec<Event> {
        (0..count)
            .map(|tick| Event::TimeAdvanced {
                dt: Duration::from_millis(16),
                tick: u64::from(tick) + 1,
            })
            .collect()
    }

    #[test]
    fn evaluation_is_decimated_to_the_configured_stride() {
        let registry = Registry::compile(&config(false)).expect("compile");
        let states = states_for(&registry, &[("predator", "NORMAL"), ("flock", "NORMAL")]);
        let channels = channels_for(&registry, &[("predator", "Hunger", 95.0)]);
        let mut activation = Activation::new(Config::new(STRIDE));
        let mut out = Vec::new();

        activation.handle(
            &tick_events(STRIDE - 1),
            &registry,
            &states,
            &channels,
            true,
            &mut out,
        );
        assert!(out.is_empty());

        activation.handle(&tick_events(1), &registry, &states, &channels, true, &mut out);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn hungry_predator_requests_the_elevated_state() {
        let registry = Registry::compile(&config(false)).expect("compile");
        let predator = registry.level_id("predator").expect("level");
        let states = states_for(&registry, &[("predator", "NORMAL"), ("flock", "NORMAL")]);
        let channels = channels_for(&registry, &[("predator", "Hunger", 85.0)]);
        let mut activation = Activation::new(Config::new(STRIDE));
        let mut out = Vec::new();

        activation.handle(&tick_events(STRIDE), &registry, &states, &channels, true, &mut out);

        assert_eq!(
            out,
            vec![Command::RequestTransition {
                level: predator,
                to: registry.elevated(),
                cause: TransitionCause::Autonomous,
            }],
        );
    }

    #[test]
    fn conjunction_requires_every_clause_to_hold() {
        let registry = Registry::compile(&config(false)).expect("compile");
        let states = states_for(&registry, &[("predator", "NORMAL"), ("flock", "NORMAL")]);
        // Cohesion is low but variance is not high enough.
        let channels = channels_for(
            &registry,
            &[("flock", "Cohesion", 30.0), ("flock", "Variance", 45.0)],
        );
        let mut activation = Activation::new(Config::new(STRIDE));
        let mut out = Vec::new();

        activation.handle(&tick_events(STRIDE), &registry, &states, &channels, true, &mut out);

        assert!(out.is_empty());
    }

    #[test]
    fn elevated_levels_stay_sticky_without_auto_revert() {
        let registry = Registry::compile(&config(false)).expect("compile");
        let states = states_for(&registry, &[("predator", "EXCITED"), ("flock", "NORMAL")]);
        let channels = channels_for(&registry, &[("predator", "Hunger", 10.0)]);
        let mut activation = Activation::new(Config::new(STRIDE));
        let mut out = Vec::new();

        activation.handle(&tick_events(STRIDE), &registry, &states, &channels, true, &mut out);

        assert!(out.is_empty());
    }

    #[test]
    fn auto_revert_requests_baseline_once_the_rule_stops_holding() {
        let registry = Registry::compile(&config(true)).expect("compile");
        let predator = registry.level_id("predator").expect("level");
        let states = states_for(&registry, &[("predator", "EXCITED"), ("flock", "NORMAL")]);
        let channels = channels_for(&registry, &[("predator", "Hunger", 10.0)]);
        let mut activation = Activation::new(Config::new(STRIDE));
        let mut out = Vec::new();

        activation.handle(&tick_events(STRIDE), &registry, &states, &channels, true, &mut out);

        assert_eq!(
            out,
            vec![Command::RequestTransition {
                level: predator,
                to: registry.baseline(),
                cause: TransitionCause::Reversion,
            }],
        );
    }

    #[test]
    fn suspended_autonomy_silences_evaluation() {
        let registry = Registry::compile(&config(false)).expect("compile");
        let states = states_for(&registry, &[("predator", "NORMAL"), ("flock", "NORMAL")]);
        let channels = channels_for(&registry, &[("predator", "Hunger", 95.0)]);
        let mut activation = Activation::new(Config::new(STRIDE));
        let mut out = Vec::new();

        activation.handle(&tick_events(STRIDE), &registry, &states, &channels, false, &mut out);

        assert!(out.is_empty());
    }
}
