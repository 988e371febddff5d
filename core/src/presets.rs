//! Ready-made configurations for the two installation variants.

use std::time::Duration;

use crate::config::{
    ActivationConfig, ChannelConfig, ClauseConfig, CouplingConfig, EdgeConfig, EngineConfig,
    LevelConfig, PhaseConfig, SequenceConfig, StateConfig, StateGraphConfig, Tuning,
};
use crate::StateRole;

/// The five-level installation: predator down to molecular scale, with a
/// three-state graph whose `DEAD` state is terminal. Elevated levels are
/// sticky until a trigger or manual override; the predator-activation
/// sequence forces every level excited for eight seconds.
#[must_use]
pub fn installation() -> EngineConfig {
    EngineConfig {
        levels: vec![
            LevelConfig {
                name: "predator".to_owned(),
                channels: vec![
                    ChannelConfig::standard("Hunger"),
                    ChannelConfig::surge("Energy"),
                    ChannelConfig::standard("Tilt/Orientation"),
                    ChannelConfig::standard("Prey Proximity"),
                    ChannelConfig::standard("Sensory Confidence"),
                    ChannelConfig::standard("Success Probability"),
                ],
            },
            LevelConfig {
                name: "flock".to_owned(),
                channels: vec![
                    ChannelConfig::surge("Collective Energy"),
                    ChannelConfig::standard("Cohesion"),
                    ChannelConfig::standard("Variance"),
                    ChannelConfig::standard("Obstacles"),
                    ChannelConfig::standard("Signal Propagation Delay"),
                ],
            },
            LevelConfig {
                name: "individual".to_owned(),
                channels: vec![
                    ChannelConfig::standard("Experience Level"),
                    ChannelConfig::surge("Fear Level"),
                    ChannelConfig::standard("Fatigue"),
                    ChannelConfig::standard("Calories Expended"),
                    ChannelConfig::standard("Neighbor Proximity"),
                    ChannelConfig::standard("Reaction Latency"),
                    ChannelConfig::standard("Survival Probability"),
                ],
            },
            LevelConfig {
                name: "muscle".to_owned(),
                channels: vec![
                    ChannelConfig::surge("Force Production"),
                    ChannelConfig::standard("Electrical Activation"),
                    ChannelConfig::standard("Intracellular Calcium"),
                    ChannelConfig::standard("Stiffness"),
                    ChannelConfig::residual("Lactic Acid"),
                    ChannelConfig::residual("Heat"),
                ],
            },
            LevelConfig {
                name: "microscopic".to_owned(),
                channels: vec![
                    ChannelConfig::standard("Cross-bridge Attach/Detach"),
                    ChannelConfig::surge("ATP Consumption"),
                    ChannelConfig::standard("Binding Probability"),
                    ChannelConfig::standard("Molecular Fatigue"),
                    ChannelConfig::standard("Thermal Noise"),
                ],
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
            ActivationConfig {
                level: "individual".to_owned(),
                all: vec![ClauseConfig::above("Fear Level", 40.0)],
            },
            ActivationConfig {
                level: "muscle".to_owned(),
                all: vec![ClauseConfig::above("Electrical Activation", 60.0)],
            },
            ActivationConfig {
                level: "microscopic".to_owned(),
                all: vec![ClauseConfig::above("ATP Consumption", 70.0)],
            },
        ],
        coupling: vec![
            CouplingConfig::add("predator", "EXCITED", "flock", "Collective Energy", 15.0),
            CouplingConfig::add("predator", "EXCITED", "individual", "Fear Level", 20.0),
            CouplingConfig::add("flock", "EXCITED", "individual", "Neighbor Proximity", -10.0),
            CouplingConfig::add("flock", "EXCITED", "muscle", "Force Production", 10.0),
            CouplingConfig::add("individual", "EXCITED", "muscle", "Electrical Activation", 15.0),
            CouplingConfig::add("individual", "EXCITED", "muscle", "Lactic Acid", 8.0),
            CouplingConfig::add("muscle", "EXCITED", "microscopic", "ATP Consumption", 12.0),
            CouplingConfig::add(
                "muscle",
                "EXCITED",
                "microscopic",
                "Cross-bridge Attach/Detach",
                10.0,
            ),
            CouplingConfig::add("microscopic", "EXCITED", "muscle", "Heat", 5.0),
        ],
        tuning: Tuning::default(),
        sequence: SequenceConfig {
            phases: vec![PhaseConfig::new("EXCITED", Duration::from_secs(8))],
            ..SequenceConfig::default()
        },
    }
}

/// The cyclic "physiological" variant: `CALM → EXCITED → RECOVERING → CALM`,
/// no terminal state, driven entirely by the trigger controller.
#[must_use]
pub fn physiological() -> EngineConfig {
    EngineConfig {
        levels: vec![
            LevelConfig {
                name: "predator".to_owned(),
                channels: vec![
                    ChannelConfig::surge("Strike Readiness"),
                    ChannelConfig::standard("Focus"),
                    ChannelConfig::standard("Altitude"),
                ],
            },
            LevelConfig {
                name: "flock".to_owned(),
                channels: vec![
                    ChannelConfig::surge("Collective Energy"),
                    ChannelConfig::standard("Cohesion"),
                    ChannelConfig::standard("Turning Rate"),
                ],
            },
            LevelConfig {
                name: "heart".to_owned(),
                channels: vec![
                    ChannelConfig::surge("Heart Rate"),
                    ChannelConfig::standard("Stroke Volume"),
                    ChannelConfig::standard("Electrical Activation"),
                ],
            },
            LevelConfig {
                name: "swarm".to_owned(),
                channels: vec![
                    ChannelConfig::standard("Recruitment"),
                    ChannelConfig::standard("Synchrony"),
                    ChannelConfig::standard("Signal Density"),
                ],
            },
            LevelConfig {
                name: "myosin".to_owned(),
                channels: vec![
                    ChannelConfig::surge("ATP Turnover"),
                    ChannelConfig::standard("Cross-bridge Cycling"),
                    ChannelConfig::residual("Heat"),
                ],
            },
        ],
        states: StateGraphConfig {
            states: vec![
                StateConfig::new("CALM", StateRole::Baseline),
                StateConfig::new("EXCITED", StateRole::Elevated),
                StateConfig::new("RECOVERING", StateRole::Cooldown),
            ],
            edges: vec![
                EdgeConfig::new("CALM", "EXCITED"),
                EdgeConfig::new("EXCITED", "RECOVERING"),
                EdgeConfig::new("RECOVERING", "CALM"),
            ],
        },
        activation: Vec::new(),
        coupling: vec![
            CouplingConfig::add("predator", "EXCITED", "flock", "Collective Energy", 15.0),
            CouplingConfig::add("heart", "EXCITED", "myosin", "ATP Turnover", 10.0),
        ],
        tuning: Tuning::default(),
        sequence: SequenceConfig {
            phases: vec![
                PhaseConfig::new("EXCITED", Duration::from_secs(6)),
                PhaseConfig::new("RECOVERING", Duration::from_secs(4)),
            ],
            ..SequenceConfig::default()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::{installation, physiological};
    use crate::registry::Registry;
    use crate::StateRole;

    #[test]
    fn installation_preset_compiles() {
        let registry = Registry::compile(&installation()).expect("compile");
        assert_eq!(registry.level_count(), 5);
        assert_eq!(registry.coupling().len(), 9);
        assert!(registry.point("predator", "Hunger").is_some());
        assert!(registry.point("microscopic", "ATP Consumption").is_some());

        let dead = registry.state_id("DEAD").expect("dead");
        assert_eq!(registry.role(dead), StateRole::Terminal);
    }

    #[test]
    fn physiological_preset_cycles_without_terminal() {
        let registry = Registry::compile(&physiological()).expect("compile");
        let calm = registry.state_id("CALM").expect("calm");
        let excited = registry.state_id("EXCITED").expect("excited");
        let recovering = registry.state_id("RECOVERING").expect("recovering");

        assert!(registry.allows(calm, excited));
        assert!(registry.allows(excited, recovering));
        assert!(registry.allows(recovering, calm));
        assert_eq!(registry.sequence().phases.len(), 2);
        assert!(registry
            .level_ids()
            .all(|level| registry.activation(level).is_empty()));
    }
}
