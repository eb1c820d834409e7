//! edit-bench - drives a synthetic editing session
//!
//! Creates a signal, runs the built-in plugins on worker threads, deletes
//! and inserts ranges, walks the undo history back and forth and reports
//! timings and undo memory along the way.
//!
//! Usage: `edit-bench [--tracks N] [--seconds N] [--config FILE] [--play]`

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};

use waveforge_core::config::{self, EditorConfig};
use waveforge_core::events::PlaybackEvent;
use waveforge_core::playback::{
    MemoryCapture, MemoryDeviceFactory, PlaybackController, PlaybackDeviceRegistry, PlaybackMethod,
};
use waveforge_core::plugin::{PluginManager, PluginRegistry};
use waveforge_core::signal::{lock_manager, NonInteractive, SharedSignalManager, SignalManager};
use waveforge_core::types::{Sample, SAMPLE_MAX};

const RATE: u64 = 44100;

struct Args {
    tracks: usize,
    seconds: u64,
    config: Option<std::path::PathBuf>,
    play: bool,
}

fn parse_args() -> Result<Args> {
    let mut args = Args {
        tracks: 2,
        seconds: 60,
        config: None,
        play: false,
    };
    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--tracks" => {
                let value = iter.next().context("--tracks needs a value")?;
                args.tracks = value.parse().with_context(|| format!("invalid track count '{value}'"))?;
            }
            "--seconds" => {
                let value = iter.next().context("--seconds needs a value")?;
                args.seconds = value.parse().with_context(|| format!("invalid duration '{value}'"))?;
            }
            "--config" => {
                args.config = Some(iter.next().context("--config needs a path")?.into());
            }
            "--play" => args.play = true,
            other => bail!("unknown argument '{other}'"),
        }
    }
    if args.tracks == 0 {
        bail!("at least one track is needed");
    }
    Ok(args)
}

fn report(manager: &SharedSignalManager, step: &str, started: Instant) {
    let m = lock_manager(manager);
    log::info!(
        "{:<24} {:>8.1} ms  length {:>9}  undo {:>6.1} MiB  undo steps {}",
        step,
        started.elapsed().as_secs_f64() * 1000.0,
        m.length(),
        m.undo_memory() as f64 / (1024.0 * 1024.0),
        m.undo_manager().undo_descriptions().len()
    );
}

/// Fill every track with a sine, a different frequency per track
fn fill_signal(manager: &SharedSignalManager) {
    let m = lock_manager(manager);
    let length = m.length() as usize;
    for index in 0..m.tracks() {
        let Some(track) = m.track(index) else {
            continue;
        };
        let freq = 220.0 * (index + 1) as f64;
        let samples: Vec<Sample> = (0..length)
            .map(|n| {
                let t = n as f64 / RATE as f64;
                ((2.0 * std::f64::consts::PI * freq * t).sin() * SAMPLE_MAX as f64 * 0.5) as Sample
            })
            .collect();
        track.write_samples(0, &samples);
    }
}

fn run_plugin(plugins: &mut PluginManager, manager: &SharedSignalManager, name: &str, params: &[&str]) -> Result<()> {
    let started = Instant::now();
    plugins.execute(name, params.iter().map(|p| p.to_string()).collect())?;
    for (plugin, result) in plugins.sync() {
        result.with_context(|| format!("plugin '{plugin}' failed"))?;
    }
    report(manager, name, started);
    Ok(())
}

fn play(manager: &SharedSignalManager, config: &EditorConfig) -> Result<()> {
    let capture = MemoryCapture::new();
    capture.limit(1);
    let mut registry = PlaybackDeviceRegistry::new();
    registry.register(Arc::new(MemoryDeviceFactory::new(capture.clone())));

    let mut controller = PlaybackController::new(manager.clone(), Arc::new(registry));
    let params = config.playback.params(RATE).with_device("");
    controller.set_device(PlaybackMethod::Memory, params);
    let events = controller.subscribe();

    let started = Instant::now();
    controller.playback_start();
    loop {
        match events.recv_timeout(Duration::from_secs(60)) {
            Ok(PlaybackEvent::Stopped) => break,
            Ok(_) => {}
            Err(e) => bail!("playback did not finish: {e}"),
        }
    }
    log::info!(
        "{:<24} {:>8.1} ms  {} frames",
        "playback (memory)",
        started.elapsed().as_secs_f64() * 1000.0,
        capture.written()
    );
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = parse_args()?;
    let config_path = args.config.clone().unwrap_or_else(config::default_config_path);
    let config: EditorConfig = config::load_config(&config_path);

    let manager = SignalManager::with_undo_limit(Arc::new(NonInteractive::default()), config.undo.limit_bytes())
        .into_shared();
    let length = args.seconds * RATE;

    let started = Instant::now();
    lock_manager(&manager).new_signal(length, RATE, 16, args.tracks);
    fill_signal(&manager);
    report(&manager, "new signal", started);

    let mut plugins = PluginManager::new(
        Arc::new(PluginRegistry::with_builtin()),
        manager.clone(),
        Arc::new(PlaybackDeviceRegistry::with_builtin()),
    )
    .with_timeouts(config.plugins.shutdown_timeout(), config.plugins.pause_sleep());

    run_plugin(&mut plugins, &manager, "amplify", &["0.8"])?;
    run_plugin(&mut plugins, &manager, "noise", &["0.05"])?;
    run_plugin(&mut plugins, &manager, "reverse", &[])?;

    let started = Instant::now();
    {
        let mut m = lock_manager(&manager);
        m.select_range(length / 4, length / 2);
        if !m.delete_selection() {
            bail!("delete was declined");
        }
    }
    report(&manager, "delete half", started);

    lock_manager(&manager).select_range(0, 0);
    let silence = (RATE * 5).to_string();
    run_plugin(&mut plugins, &manager, "zero", &["insert", silence.as_str()])?;

    if args.play {
        play(&manager, &config)?;
    }

    let started = Instant::now();
    let mut undone = 0;
    while lock_manager(&manager).undo() {
        undone += 1;
    }
    report(&manager, &format!("undo x{undone}"), started);

    let started = Instant::now();
    let mut redone = 0;
    while lock_manager(&manager).redo() {
        redone += 1;
    }
    report(&manager, &format!("redo x{redone}"), started);

    plugins.unload_unused();
    Ok(())
}
