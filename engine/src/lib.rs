#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Facade wiring the world and the pure systems into one tick driver.
//!
//! A single [`Engine::tick`] call advances the clock, lets each system react
//! to the tick's events, and publishes every committed state change to
//! subscribers. The fixed order is: apply `Tick`, then simulation, coupling,
//! activation and sequence, each seeing the world as left by its
//! predecessors. External inputs (triggers, spikes, manual transitions) are
//! safe between ticks; transitions apply synchronously, spikes take effect
//! from the next tick's smoothing.
//!
//! The world itself never reads the wall clock; transition records are
//! stamped with `SystemTime` here, at publication, so the same seed and tick
//! stream always reproduces the same simulation.

use std::collections::VecDeque;
use std::time::{Duration, SystemTime};

use trophic_core::{
    ChannelView, Command, ConfigError, EngineConfig, Event, LevelId, Registry, StateId,
    StateView, TransitionCause,
};
use trophic_system_activation::Activation;
use trophic_system_coupling::Coupling;
use trophic_system_sequence::Sequence;
use trophic_system_simulation::Simulation;
use trophic_world::{apply, query, World};

pub use trophic_system_sequence::PressFilter;

/// Committed state change as delivered to subscribers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransitionRecord {
    /// Level whose state changed.
    pub level: LevelId,
    /// State the level held before the change.
    pub from: StateId,
    /// State the level holds after the change.
    pub to: StateId,
    /// Origin of the change.
    pub cause: TransitionCause,
    /// Whether graph validation was bypassed.
    pub forced: bool,
    /// Level generation after the change.
    pub generation: u64,
    /// Tick index at which the change committed.
    pub tick: u64,
    /// Wall-clock time at publication.
    pub timestamp: SystemTime,
}

/// Handle identifying one registered subscriber.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Callback invoked once per committed state change, in registration order.
/// Returning `false` unsubscribes the handler; the removal is queued until
/// the current delivery pass completes.
pub type TransitionHandler = Box<dyn FnMut(&TransitionRecord) -> bool>;

struct Subscriber {
    id: SubscriptionId,
    handler: TransitionHandler,
}

const HISTORY_LIMIT: usize = 64;

/// Owns the world, the systems and the subscriber list for one run.
pub struct Engine {
    registry: Registry,
    world: World,
    simulation: Simulation,
    coupling: Coupling,
    activation: Activation,
    sequence: Sequence,
    subscribers: Vec<Subscriber>,
    next_subscription: u64,
    history: VecDeque<TransitionRecord>,
}

impl Engine {
    /// Compiles the configuration and builds a ready-to-tick engine.
    pub fn new(config: &EngineConfig, seed: u64) -> Result<Self, ConfigError> {
        let registry = Registry::compile(config)?;
        let tuning = registry.tuning();

        let simulation = Simulation::new(trophic_system_simulation::Config::new(
            tuning.retarget_interval,
            seed.wrapping_add(1),
        ));
        let activation = Activation::new(trophic_system_activation::Config::new(
            tuning.evaluation_stride,
        ));
        let world = World::new(registry.clone(), seed);

        Ok(Self {
            registry,
            world,
            simulation,
            coupling: Coupling::new(),
            activation,
            sequence: Sequence::new(),
            subscribers: Vec::new(),
            next_subscription: 0,
            history: VecDeque::with_capacity(HISTORY_LIMIT),
        })
    }

    /// Advances the simulation by one tick of `dt` simulated time.
    pub fn tick(&mut self, dt: Duration) {
        let mut events = Vec::new();
        let mut commands = Vec::new();
        apply(&mut self.world, Command::Tick { dt }, &mut events);

        let states = query::state_view(&self.world);
        self.simulation
            .handle(&events, &self.registry, &states, &mut commands);
        self.drain(&mut commands, &mut events);

        let states = query::state_view(&self.world);
        let channels = query::channel_view(&self.world);
        self.coupling
            .handle(&events, &self.registry, &states, &channels, &mut commands);
        self.drain(&mut commands, &mut events);

        let states = query::state_view(&self.world);
        let channels = query::channel_view(&self.world);
        let autonomy = query::autonomy(&self.world);
        self.activation.handle(
            &events,
            &self.registry,
            &states,
            &channels,
            autonomy,
            &mut commands,
        );
        self.drain(&mut commands, &mut events);

        let states = query::state_view(&self.world);
        self.sequence
            .handle(&events, &self.registry, &states, &mut commands);
        self.drain(&mut commands, &mut events);

        self.publish(&events);
    }

    /// Records an external trigger, judged on the next tick.
    pub fn trigger(&mut self) {
        self.sequence.request_trigger();
    }

    /// Spikes a channel's target by display name. Returns false when the
    /// level or channel does not exist.
    pub fn inject_spike(&mut self, level: &str, channel: &str, value: f64) -> bool {
        let Some(point) = self.registry.point(level, channel) else {
            log::warn!("spike dropped: unknown channel {level}/{channel}");
            return false;
        };
        let mut events = Vec::new();
        apply(
            &mut self.world,
            Command::InjectSpike { point, value },
            &mut events,
        );
        self.route_external(&events);
        true
    }

    /// Requests a graph-validated transition by display names. Returns true
    /// only when the transition committed.
    pub fn transition(&mut self, level: &str, state: &str) -> bool {
        let Some((level, to)) = self.resolve(level, state) else {
            return false;
        };
        let mut events = Vec::new();
        apply(
            &mut self.world,
            Command::RequestTransition {
                level,
                to,
                cause: TransitionCause::Manual,
            },
            &mut events,
        );
        let committed = events
            .iter()
            .any(|event| matches!(event, Event::StateChanged { .. }));
        self.route_external(&events);
        committed
    }

    /// Forces a level into a state by display names, bypassing the graph.
    /// Returns false when the level or state does not exist.
    pub fn force_state(&mut self, level: &str, state: &str) -> bool {
        let Some((level, to)) = self.resolve(level, state) else {
            return false;
        };
        let mut events = Vec::new();
        apply(
            &mut self.world,
            Command::ForceState {
                level,
                to,
                cause: TransitionCause::Manual,
            },
            &mut events,
        );
        self.route_external(&events);
        true
    }

    /// Returns the whole installation to its initial state. Subscribers stay
    /// registered; the transition history is cleared.
    pub fn reset(&mut self) {
        let mut events = Vec::new();
        apply(&mut self.world, Command::Reset, &mut events);
        self.simulation.reset();
        self.activation.reset();
        self.sequence.reset();
        self.history.clear();
    }

    /// Registers a subscriber invoked for every committed state change.
    pub fn subscribe(&mut self, handler: TransitionHandler) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.subscribers.push(Subscriber { id, handler });
        id
    }

    /// Removes a subscriber; removing twice is a no-op. Returns whether the
    /// subscription existed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|subscriber| subscriber.id != id);
        self.subscribers.len() != before
    }

    /// Read-only view of every level's current state.
    #[must_use]
    pub fn states(&self) -> StateView {
        query::state_view(&self.world)
    }

    /// Read-only view of every channel's current numbers.
    #[must_use]
    pub fn values(&self) -> ChannelView {
        query::channel_view(&self.world)
    }

    /// Recent transition records, oldest first, bounded in length.
    pub fn history(&self) -> impl Iterator<Item = &TransitionRecord> {
        self.history.iter()
    }

    /// Whether the activation flash is currently raised.
    #[must_use]
    pub fn activation_flag(&self) -> bool {
        self.sequence.flash()
    }

    /// Whether a forced sequence is currently in progress.
    #[must_use]
    pub fn sequence_active(&self) -> bool {
        self.sequence.active()
    }

    /// Whether autonomous threshold evaluation is currently enabled.
    #[must_use]
    pub fn autonomy(&self) -> bool {
        query::autonomy(&self.world)
    }

    /// Index of the most recently completed tick.
    #[must_use]
    pub fn tick_index(&self) -> u64 {
        query::tick_index(&self.world)
    }

    /// The compiled registry backing this run.
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    fn resolve(&self, level: &str, state: &str) -> Option<(LevelId, StateId)> {
        let Some(level_id) = self.registry.level_id(level) else {
            log::warn!("unknown level `{level}`");
            return None;
        };
        let Some(state_id) = self.registry.state_id(state) else {
            log::warn!("unknown state `{state}`");
            return None;
        };
        Some((level_id, state_id))
    }

    fn drain(&mut self, commands: &mut Vec<Command>, events: &mut Vec<Event>) {
        for command in commands.drain(..) {
            apply(&mut self.world, command, events);
        }
    }

    /// Routes events from between-tick inputs: the sequence controller must
    /// observe manual overrides for its supersede guard, and subscribers get
    /// the records without waiting for the next tick. A pending trigger is
    /// left alone here; it is judged on the next tick only.
    fn route_external(&mut self, events: &[Event]) {
        self.sequence.observe(events);
        self.publish(events);
    }

    fn publish(&mut self, events: &[Event]) {
        for event in events {
            let Event::StateChanged {
                level,
                from,
                to,
                cause,
                forced,
                generation,
                tick,
            } = event
            else {
                continue;
            };
            let record = TransitionRecord {
                level: *level,
                from: *from,
                to: *to,
                cause: *cause,
                forced: *forced,
                generation: *generation,
                tick: *tick,
                timestamp: SystemTime::now(),
            };

            if self.history.len() == HISTORY_LIMIT {
                let _ = self.history.pop_front();
            }
            self.history.push_back(record);

            let mut cancelled: Vec<SubscriptionId> = Vec::new();
            for subscriber in &mut self.subscribers {
                if !(subscriber.handler)(&record) {
                    cancelled.push(subscriber.id);
                }
            }
            if !cancelled.is_empty() {
                self.subscribers
                    .retain(|subscriber| !cancelled.contains(&subscriber.id));
            }
        }
    }
}
