#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Headless command-line adapter that runs the Trophic engine.
//!
//! Runs a fixed number of ticks against a chosen preset, with triggers and
//! channel spikes scripted onto specific ticks. Every committed transition is
//! printed as it happens and a state/value summary closes the run.

use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use trophic_core::{presets, EngineConfig, Registry};
use trophic_engine::Engine;

#[derive(Parser, Debug)]
#[command(name = "trophic", about = "Headless driver for the Trophic engine")]
struct Args {
    /// Configuration preset to run.
    #[arg(long, value_enum, default_value_t = Preset::Installation)]
    preset: Preset,

    /// Seed for lerp-rate and target generation.
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Number of ticks to simulate.
    #[arg(long, default_value_t = 600)]
    ticks: u64,

    /// Simulated ticks per second.
    #[arg(long, default_value_t = 60.0)]
    fps: f64,

    /// Ticks at which to fire the external trigger (repeatable).
    #[arg(long = "trigger-at")]
    trigger_at: Vec<u64>,

    /// Scripted spikes as `tick:level:channel:value` (repeatable).
    #[arg(long = "spike")]
    spikes: Vec<SpikeSpec>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Preset {
    /// Five-level installation with a terminal state.
    Installation,
    /// Cyclic calm/excited/recovering variant.
    Physiological,
}

#[derive(Clone, Debug)]
struct SpikeSpec {
    tick: u64,
    level: String,
    channel: String,
    value: f64,
}

impl FromStr for SpikeSpec {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = raw.splitn(4, ':').collect();
        let [tick, level, channel, value] = parts.as_slice() else {
            return Err(format!("expected tick:level:channel:value, got `{raw}`"));
        };
        Ok(Self {
            tick: tick
                .parse()
                .map_err(|_| format!("invalid tick in `{raw}`"))?,
            level: (*level).to_owned(),
            channel: (*channel).to_owned(),
            value: value
                .parse()
                .map_err(|_| format!("invalid value in `{raw}`"))?,
        })
    }
}

fn config_for(preset: Preset) -> EngineConfig {
    match preset {
        Preset::Installation => presets::installation(),
        Preset::Physiological => presets::physiological(),
    }
}

fn print_summary(engine: &Engine) {
    let registry = engine.registry();
    let states = engine.states();
    let values = engine.values();

    println!("--- final state after tick {} ---", engine.tick_index());
    for level in registry.level_ids() {
        let level_name = registry.level_name(level).unwrap_or("?");
        let state_name = states
            .state(level)
            .and_then(|state| registry.state_name(state))
            .unwrap_or("?");
        println!("{level_name}: {state_name}");

        for snapshot in values.iter().filter(|snapshot| snapshot.point.level() == level) {
            let channel_name = registry
                .channel(snapshot.point)
                .map_or("?", |descriptor| descriptor.name.as_str());
            println!(
                "  {channel_name:<28} {:>7.2} -> {:>7.2} (rate {:.3})",
                snapshot.value, snapshot.target, snapshot.rate,
            );
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    anyhow::ensure!(args.fps > 0.0, "fps must be positive");
    let dt = Duration::from_secs_f64(1.0 / args.fps);

    let config = config_for(args.preset);
    let mut engine = Engine::new(&config, args.seed)
        .context("failed to compile the selected preset")?;

    let names: Registry = engine.registry().clone();
    let _ = engine.subscribe(Box::new(move |record| {
        println!(
            "tick {:>6}  {:<12} {} -> {}  ({:?}{})",
            record.tick,
            names.level_name(record.level).unwrap_or("?"),
            names.state_name(record.from).unwrap_or("?"),
            names.state_name(record.to).unwrap_or("?"),
            record.cause,
            if record.forced { ", forced" } else { "" },
        );
        true
    }));

    for tick in 1..=args.ticks {
        if args.trigger_at.contains(&tick) {
            log::info!("scripted trigger at tick {tick}");
            engine.trigger();
        }
        for spike in args.spikes.iter().filter(|spike| spike.tick == tick) {
            if !engine.inject_spike(&spike.level, &spike.channel, spike.value) {
                anyhow::bail!(
                    "spike refers to unknown channel {}/{}",
                    spike.level,
                    spike.channel,
                );
            }
        }
        engine.tick(dt);
    }

    print_summary(&engine);
    Ok(())
}
