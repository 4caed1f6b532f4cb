// SPDX-License-Identifier: GPL-3.0-only

//! Command-line operations

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::warn;

use depthcam::config::Config;
use depthcam::constants::{PROBE_SETS, WARMUP_SETS};
use depthcam::diagnostics;
use depthcam::errors::SessionError;
use depthcam::presets::VisualPreset;
use depthcam::render;
use depthcam::session::manager::{Session, SessionManager};
use depthcam::session::types::DeviceDescriptor;
use depthcam::storage;
use depthcam::terminal;

/// List connected depth cameras and their stream modes
pub fn list() -> Result<(), Box<dyn std::error::Error>> {
    let manager = SessionManager::with_default_backend();
    let devices = manager.enumerate()?;

    if devices.is_empty() {
        println!("No depth cameras found.");
        return Ok(());
    }

    println!("Found {} depth camera(s):\n", devices.len());
    for (index, device) in devices.iter().enumerate() {
        println!("{}. {}", index + 1, device);
        println!("   Product line: {}", or_unknown(&device.product_line));
        println!("   Firmware:     {}", or_unknown(&device.firmware_version));
        println!("   Connection:   {}", or_unknown(&device.connection_type));
        for node in &device.nodes {
            println!("   {} stream via {}", node.kind, node.path);
        }

        let profiles = manager.stream_profiles(device);
        if !profiles.is_empty() {
            println!("   Stream modes:");
            for profile in profiles.iter().take(12) {
                println!("     {}", profile);
            }
            if profiles.len() > 12 {
                println!("     ... and {} more", profiles.len() - 12);
            }
        }
        println!();
    }

    Ok(())
}

/// Run the full diagnostic and print the narrative report
pub fn diagnose() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load();
    let manager = SessionManager::with_default_backend();

    let report = diagnostics::run(
        &manager,
        &config.candidate_configurations(),
        PROBE_SETS,
        config.frame_timeout(),
    );
    println!("{}", report);

    if report.passed() {
        Ok(())
    } else {
        Err("diagnostic failed".into())
    }
}

/// Negotiate a session and sample a few frame sets
pub fn probe() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load();
    let manager = SessionManager::with_default_backend();
    let mut session = connect(&manager, &config)?;

    println!(
        "Streaming {} from {}",
        session.configuration(),
        session.device()
    );

    let mut received = 0;
    for iteration in 1..=PROBE_SETS {
        match session.acquire_frames(config.frame_timeout()) {
            Ok(set) => {
                received += 1;
                for frame in set.iter() {
                    println!(
                        "  set {}: {} {}x{} seq {} ({} bytes)",
                        iteration,
                        frame.kind,
                        frame.width,
                        frame.height,
                        frame.sequence,
                        frame.len()
                    );
                }
            }
            Err(SessionError::AcquisitionTimeout) => {
                println!("  set {}: timed out waiting for frames", iteration);
            }
            Err(e) => {
                session.stop();
                return Err(e.into());
            }
        }
    }
    session.stop();

    if received > 0 {
        println!("\nPASSED: received {}/{} frame sets.", received, PROBE_SETS);
        Ok(())
    } else {
        Err("no frame sets received".into())
    }
}

/// Capture one composed view and save it as a PNG
pub fn snapshot(output: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load();
    let manager = SessionManager::with_default_backend();
    let mut session = connect(&manager, &config)?;

    // Discard the first sets so auto-exposure can settle.
    for _ in 0..WARMUP_SETS {
        match session.acquire_frames(config.frame_timeout()) {
            Ok(_) | Err(SessionError::AcquisitionTimeout) => {}
            Err(e) => {
                session.stop();
                return Err(e.into());
            }
        }
    }

    let set = match session.acquire_frames(config.frame_timeout()) {
        Ok(set) => set,
        Err(e) => {
            session.stop();
            return Err(e.into());
        }
    };
    session.stop();

    let view = render::compose(&set).ok_or("no depth frame in the captured set")?;

    let path = match output {
        Some(path) if path.extension().is_some() => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            view.save(&path)?;
            path
        }
        Some(dir) => storage::save_snapshot(&dir, &view)?,
        None => {
            let dir = config.save_dir.clone().unwrap_or_else(storage::default_save_dir);
            storage::save_snapshot(&dir, &view)?
        }
    };
    println!("Saved snapshot to {}", path.display());
    Ok(())
}

/// Live half-block viewer in the terminal
pub fn view() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load();
    let manager = SessionManager::with_default_backend();
    let session = connect(&manager, &config)?;
    let save_dir = config.save_dir.clone().unwrap_or_else(storage::default_save_dir);
    terminal::run(session, save_dir)
}

/// Periodically sample depth at the frame center until interrupted
pub fn monitor(interval_ms: u64) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load();
    let manager = SessionManager::with_default_backend();
    let mut session = connect(&manager, &config)?;

    let running = Arc::new(AtomicBool::new(true));
    let running_handler = Arc::clone(&running);
    ctrlc::set_handler(move || {
        running_handler.store(false, Ordering::SeqCst);
    })?;

    println!(
        "Monitoring {} (Ctrl+C to stop)",
        session.device()
    );

    let mut samples = 0u64;
    let mut timeouts = 0u64;
    while running.load(Ordering::SeqCst) {
        match session.acquire_frames(config.frame_timeout()) {
            Ok(set) => {
                samples += 1;
                if let Some(depth) = set.depth() {
                    let center = depth
                        .depth_at(depth.width / 2, depth.height / 2)
                        .unwrap_or(0);
                    println!(
                        "seq {:>6}  center distance {:.3} m",
                        depth.sequence,
                        center as f64 * 0.001
                    );
                }
            }
            Err(SessionError::AcquisitionTimeout) => {
                timeouts += 1;
                println!("still waiting for frames...");
            }
            Err(e) => {
                warn!(error = %e, "Monitor acquisition error");
                println!("error: {}", e);
                // Timeouts keep sampling; a broken pipeline ends the run.
                if !e.is_recoverable() {
                    break;
                }
            }
        }
        std::thread::sleep(Duration::from_millis(interval_ms));
    }
    session.stop();

    println!("\nStopped: {} samples, {} timeouts.", samples, timeouts);
    Ok(())
}

/// Apply a depth visual preset to the first (or preferred) device
pub fn preset(preset: VisualPreset) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load();
    let manager = SessionManager::with_default_backend();

    let devices = manager.enumerate()?;
    if devices.is_empty() {
        return Err(SessionError::NoDeviceFound.into());
    }
    let device = pick_device(&devices, config.preferred_serial.as_deref());

    manager.apply_preset(device, preset)?;
    println!("Applied preset '{}' to {}", preset, device);
    Ok(())
}

/// Print the effective configuration and where it lives
pub fn config(init: bool) -> Result<(), Box<dyn std::error::Error>> {
    let path = Config::config_path().ok_or("no config directory available")?;
    let config = Config::load();

    if init && !path.exists() {
        config.save()?;
        println!("Wrote default configuration to {}", path.display());
    } else if path.exists() {
        println!("Config file: {}", path.display());
    } else {
        println!(
            "Config file: {} (not present; defaults in effect)",
            path.display()
        );
    }
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

fn or_unknown(value: &str) -> &str {
    if value.is_empty() { "unknown" } else { value }
}

fn pick_device<'a>(
    devices: &'a [DeviceDescriptor],
    preferred_serial: Option<&str>,
) -> &'a DeviceDescriptor {
    if let Some(serial) = preferred_serial {
        if let Some(device) = devices.iter().find(|d| d.serial == serial) {
            return device;
        }
        warn!(serial = serial, "Preferred device not connected; using the first device");
    }
    &devices[0]
}

/// Shared connect path: enumerate, pick, negotiate with fallbacks.
/// Prints the failure trail when every candidate is rejected.
fn connect(
    manager: &SessionManager,
    config: &Config,
) -> Result<Session, Box<dyn std::error::Error>> {
    match manager.connect_first(
        &config.candidate_configurations(),
        config.preferred_serial.as_deref(),
    ) {
        Ok(session) => Ok(session),
        Err(SessionError::Negotiation(failure)) => {
            eprintln!("{}", failure);
            Err(SessionError::Negotiation(failure).into())
        }
        Err(e) => Err(e.into()),
    }
}
