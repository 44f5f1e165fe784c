use std::fs;

use anyhow::Context;
use crossbeam_channel::unbounded;
use stochastic_engine::{
    ChannelOutput, EngineConfig, EngineContext, StochasticEngine, SwingGroove, TransportState,
};
use stochastic_shared::{ProjectSettings, StochasticTrack};
use tracing::info;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: headless_run <ticks> [config.json] [track.json]";

/// First twelve steps gated with falling weights, for runs without a track file.
fn demo_track() -> StochasticTrack {
    let mut track = StochasticTrack::default();
    let sequence = track.sequence_mut(0);
    for index in 0..12 {
        let step = sequence.step_mut(index);
        step.set_gate(true);
        step.set_note(index as i32);
        step.set_gate_probability(5);
        step.set_note_variation_probability(7 - (index as i32 % 8));
    }
    sequence.set_rest_probability(1);
    track
}

fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut args = std::env::args().skip(1);
    let ticks: u32 = args
        .next()
        .context(USAGE)?
        .parse()
        .context("tick count must be a positive integer")?;

    let config = match args.next() {
        Some(path) => {
            let json =
                fs::read_to_string(&path).with_context(|| format!("reading config {path}"))?;
            EngineConfig::from_json(&json).with_context(|| format!("loading config {path}"))?
        }
        None => EngineConfig::default(),
    };
    let mut track = match args.next() {
        Some(path) => {
            let json =
                fs::read_to_string(&path).with_context(|| format!("reading track {path}"))?;
            StochasticTrack::from_json(&json).with_context(|| format!("loading track {path}"))?
        }
        None => demo_track(),
    };

    info!(ticks, seed = config.seed, track = %track.name, "starting headless run");

    let (tx, rx) = unbounded();
    let mut output = ChannelOutput::new(tx);
    let mut engine = StochasticEngine::new(0, &config)?;
    let project = ProjectSettings::default();
    let groove = SwingGroove::new(config.ppqn);
    let transport = TransportState {
        running: true,
        ..TransportState::for_config(&config)
    };
    // One update per 16th note.
    let update_interval = (config.ppqn / 4).max(1);

    for tick in 0..ticks {
        let mut ctx = EngineContext {
            transport,
            project: &project,
            groove: &groove,
            output: &mut output,
        };
        engine.tick(tick, &mut track, &mut ctx, None);
        if tick % update_interval == 0 {
            engine.update(0.01, &track, &mut ctx);
        }

        for event in rx.try_iter() {
            info!(tick, event = %serde_json::to_string(&event)?, "output");
        }
    }

    info!(
        current_step = engine.current_step(),
        outcome = ?engine.last_outcome(),
        "headless run finished"
    );
    Ok(())
}
