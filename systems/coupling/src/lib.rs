#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Cross-level coupling engine.
//!
//! On every tick the engine walks the registry's coupling rules in
//! configuration order. Every rule whose source level currently holds the
//! gating state perturbs its target channel, and the adjusted values are
//! emitted as a single [`Command::ApplyInfluence`] batch. Rules are applied
//! against a working copy of the touched values, so a later rule observes the
//! writes of earlier ones within the same pass.
//!
//! `Add` and `Multiply` rules compound across frames for as long as their
//! source condition holds. That is the intended behavior: sustained predator
//! excitement keeps pumping energy into the flock rather than applying a
//! one-time offset.

use trophic_core::{
    ChannelView, ChannelWrite, CombineMode, Command, Event, PointId, Registry, StateView,
};

/// Pure system that propagates state-gated influence between levels.
#[derive(Debug, Default)]
pub struct Coupling;

impl Coupling {
    /// Creates a new coupling engine.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Consumes events and immutable views to emit influence commands.
    pub fn handle(
        &mut self,
        events: &[Event],
        registry: &Registry,
        states: &StateView,
        channels: &ChannelView,
        out: &mut Vec<Command>,
    ) {
        for event in events {
            if !matches!(event, Event::TimeAdvanced { .. }) {
                continue;
            }
            let writes = run_pass(registry, states, channels);
            if !writes.is_empty() {
                out.push(Command::ApplyInfluence { writes });
            }
        }
    }
}

/// Applies every matching rule against a working copy of the touched values.
fn run_pass(
    registry: &Registry,
    states: &StateView,
    channels: &ChannelView,
) -> Vec<ChannelWrite> {
    let mut scratch: Vec<ChannelWrite> = Vec::new();

    for rule in registry.coupling() {
        if states.state(rule.source) != Some(rule.source_state) {
            continue;
        }

        let current = scratch_value(&scratch, channels, rule.target);
        let adjusted = match rule.mode {
            CombineMode::Add => current + rule.influence,
            CombineMode::Multiply => current * rule.influence,
            CombineMode::Set => rule.influence,
        };
        upsert(&mut scratch, rule.target, adjusted);
    }

    scratch
}

fn scratch_value(scratch: &[ChannelWrite], channels: &ChannelView, point: PointId) -> f64 {
    scratch
        .iter()
        .find(|write| write.point == point)
        .map_or_else(|| channels.value_or_zero(point), |write| write.value)
}

fn upsert(scratch: &mut Vec<ChannelWrite>, point: PointId, value: f64) {
    match scratch.iter_mut().find(|write| write.point == point) {
        Some(write) => write.value = value,
        None => scratch.push(ChannelWrite { point, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::Coupling;
    use std::time::Duration;
    use trophic_core::config::{
        ChannelConfig, CouplingConfig, EdgeConfig, EngineConfig, LevelConfig, SequenceConfig,
        StateConfig, StateGraphConfig, Tuning,
    };
    use trophic_core::{
        ChannelSnapshot, ChannelView, Command, Event, Registry, StateRole, StateSnapshot,
        StateView,
    };

    fn registry() -> Registry {
        let config = EngineConfig {
            levels: vec![
                LevelConfig {
                    name: "predator".to_owned(),
                    channels: vec![ChannelConfig::standard("Hunger")],
                },
                LevelConfig {
                    name: "flock".to_owned(),
                    channels: vec![ChannelConfig::surge("Collective Energy")],
                },
                LevelConfig {
                    name: "individual".to_owned(),
                    channels: vec![ChannelConfig::surge("Fear Level")],
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
            activation: Vec::new(),
            coupling: vec![
                CouplingConfig::add("predator", "EXCITED", "flock", "Collective Energy", 15.0),
                CouplingConfig::add("flock", "EXCITED", "individual", "Fear Level", 20.0),
            ],
            tuning: Tuning::default(),
            sequence: SequenceConfig::default(),
        };
        Registry::compile(&config).expect("compile")
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

    fn one_tick() -> Vec<Event> {
        vec![Event::TimeAdvanced {
            dt: Duration::from_millis(16),
            tick: 1,
        }]
    }

    #[test]
    fn influence_lands_on_the_very_first_frame() {
        let registry = registry();
        let states = states_for(
            &registry,
            &[
                ("predator", "EXCITED"),
                ("flock", "NORMAL"),
                ("individual", "NORMAL"),
            ],
        );
        let channels = channels_for(&registry, &[("flock", "Collective Energy", 40.0)]);
        let energy = registry.point("flock", "Collective Energy").expect("point");
        let mut coupling = Coupling::new();
        let mut out = Vec::new();

        coupling.handle(&one_tick(), &registry, &states, &channels, &mut out);

        let [Command::ApplyInfluence { writes }] = out.as_slice() else {
            panic!("expected one influence batch");
        };
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].point, energy);
        assert!((writes[0].value - 55.0).abs() < f64::EPSILON);
    }

    #[test]
    fn one_batch_is_emitted_per_frame() {
        let registry = registry();
        let states = states_for(
            &registry,
            &[
                ("predator", "EXCITED"),
                ("flock", "NORMAL"),
                ("individual", "NORMAL"),
            ],
        );
        let channels = channels_for(&registry, &[("flock", "Collective Energy", 40.0)]);
        let mut coupling = Coupling::new();
        let mut out = Vec::new();

        let events: Vec<Event> = (0..3)
            .map(|tick| Event::TimeAdvanced {
                dt: Duration::from_millis(16),
                tick: tick + 1,
            })
            .collect();
        coupling.handle(&events, &registry, &states, &channels, &mut out);

        assert_eq!(out.len(), 3);
    }

    #[test]
    fn rules_whose_source_is_not_in_the_gating_state_are_skipped() {
        let registry = registry();
        let states = states_for(
            &registry,
            &[
                ("predator", "NORMAL"),
                ("flock", "NORMAL"),
                ("individual", "NORMAL"),
            ],
        );
        let channels = channels_for(&registry, &[("flock", "Collective Energy", 40.0)]);
        let mut coupling = Coupling::new();
        let mut out = Vec::new();

        coupling.handle(&one_tick(), &registry, &states, &channels, &mut out);

        assert!(out.is_empty());
    }

    #[test]
    fn later_rules_observe_writes_from_earlier_ones() {
        // Both the predator and the flock are excited, so the fear write must
        // land in the same batch as the energy write.
        let registry = registry();
        let states = states_for(
            &registry,
            &[
                ("predator", "EXCITED"),
                ("flock", "EXCITED"),
                ("individual", "NORMAL"),
            ],
        );
        let channels = channels_for(
            &registry,
            &[
                ("flock", "Collective Energy", 40.0),
                ("individual", "Fear Level", 10.0),
            ],
        );
        let fear = registry.point("individual", "Fear Level").expect("point");
        let mut coupling = Coupling::new();
        let mut out = Vec::new();

        coupling.handle(&one_tick(), &registry, &states, &channels, &mut out);

        let [Command::ApplyInfluence { writes }] = out.as_slice() else {
            panic!("expected one influence batch");
        };
        assert_eq!(writes.len(), 2);
        let fear_write = writes
            .iter()
            .find(|write| write.point == fear)
            .expect("fear write");
        assert!((fear_write.value - 30.0).abs() < f64::EPSILON);
    }

    #[test]
    fn set_rules_are_idempotent_across_frames() {
        let mut config = EngineConfig {
            levels: vec![
                LevelConfig {
                    name: "predator".to_owned(),
                    channels: vec![ChannelConfig::standard("Hunger")],
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
                ],
                edges: vec![EdgeConfig::new("NORMAL", "EXCITED")],
            },
            activation: Vec::new(),
            coupling: vec![CouplingConfig::add(
                "predator",
                "EXCITED",
                "flock",
                "Collective Energy",
                90.0,
            )],
            tuning: Tuning::default(),
            sequence: SequenceConfig::default(),
        };
        config.coupling[0].mode = trophic_core::CombineMode::Set;
        let registry = Registry::compile(&config).expect("compile");

        let states = states_for(&registry, &[("predator", "EXCITED"), ("flock", "NORMAL")]);
        let channels = channels_for(&registry, &[("flock", "Collective Energy", 40.0)]);
        let mut coupling = Coupling::new();

        for _ in 0..3 {
            let mut out = Vec::new();
            coupling.handle(&one_tick(), &registry, &states, &channels, &mut out);
            let [Command::ApplyInfluence { writes }] = out.as_slice() else {
                panic!("expected one influence batch");
            };
            assert!((writes[0].value - 90.0).abs() < f64::EPSILON);
        }
    }
}
