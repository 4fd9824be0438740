//! Headless runner
//!
//! Builds the demo scene on the headless device and renders the configured
//! number of frames, paced to `target_fps`. `EMBER_CONFIG` points at a
//! TOML config file.

use std::time::Instant;

use ember_engine::{DemoScene, Engine, EngineConfig, Result};
use ember_render::HeadlessDevice;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(err) = run() {
        log::error!("{}", err);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let config = match std::env::var("EMBER_CONFIG") {
        Ok(path) => EngineConfig::load(path)?,
        Err(_) => {
            log::info!("EMBER_CONFIG not set, using defaults");
            EngineConfig::default()
        }
    };

    let mut engine = Engine::new(config, HeadlessDevice::new())?;
    let demo = DemoScene::build(&mut engine)?;

    let frames = engine.config().target_frames.max(1);
    let frame_interval = engine.config().frame_interval();
    let mut draw_calls = 0;
    for frame in 0..frames {
        let started = Instant::now();
        demo.animate(&mut engine, frame)?;
        let stats = engine.run_frame()?;
        draw_calls += stats.draw_calls;
        log::debug!(
            "Frame {}: {} passes, {} draws, {} shadow maps",
            stats.frame,
            stats.passes_executed,
            stats.draw_calls,
            stats.shadow_maps
        );

        // Frame pacing
        if let Some(interval) = frame_interval {
            let elapsed = started.elapsed();
            if elapsed < interval {
                std::thread::sleep(interval - elapsed);
            }
        }
    }

    let renderer = engine.renderer();
    log::info!(
        "Rendered {} frames, {} draws; draw list {:?}; lights {:?}; shadows {:?}",
        frames,
        draw_calls,
        renderer.draw_list().stats(),
        renderer.lights().stats(),
        renderer.shadows().stats()
    );

    let device = engine.shutdown();
    log::info!("Presented {} frames", device.presented_frames());
    Ok(())
}
