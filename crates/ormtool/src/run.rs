use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use ormconfig::ToolConfig;
use ormpack::{
    JobController, MemoryTextures, PackLayout, PackedOutputs, PackingRequest, PreviewSlot,
    PreviewStore,
};
use serde::Serialize;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::cli::PackArgs;
use crate::meter::ProgressMeter;
use crate::paths::resolve_config_file;

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        // stdout is reserved for reports and `--json` output.
        .with_writer(io::stderr)
        .init();
}

pub fn load_config(explicit: Option<&Path>) -> Result<(PathBuf, ToolConfig)> {
    let path = resolve_config_file(explicit)?;
    if explicit.is_some() && !path.exists() {
        return Err(anyhow!("configuration file {} does not exist", path.display()));
    }
    let config = ToolConfig::load_or_default(&path)
        .with_context(|| format!("failed to load configuration from {}", path.display()))?;
    debug!(path = %path.display(), "configuration resolved");
    Ok((path, config))
}

/// Command-line flags take precedence over the configuration file.
pub fn build_request(args: &PackArgs, config: &ToolConfig) -> PackingRequest {
    PackingRequest::new(&args.ao, &args.roughness, &args.metallic)
        .with_unreal_output(
            args.unreal_out
                .clone()
                .unwrap_or_else(|| config.outputs.unreal.clone()),
        )
        .with_unity_output(
            args.unity_out
                .clone()
                .unwrap_or_else(|| config.outputs.unity.clone()),
        )
        .with_targets(
            config.targets.unreal && !args.no_unreal,
            config.targets.unity && !args.no_unity,
        )
}

pub fn run_pack(args: PackArgs, config_path: Option<&Path>) -> Result<()> {
    let (_, config) = load_config(config_path)?;
    let request = build_request(&args, &config);
    if request.unreal_output == request.unity_output && request.pack_unreal && request.pack_unity {
        return Err(anyhow!(
            "unreal and unity outputs both point at {}",
            request.unreal_output.display()
        ));
    }
    if request.targets().is_empty() {
        warn!("no output target selected; nothing will be written");
    }

    let textures = Arc::new(MemoryTextures::new());
    let store = Arc::new(PreviewStore::new(textures));
    let mut controller = JobController::new().with_preview(Arc::clone(&store));
    controller
        .start(request.clone())
        .context("failed to start packing job")?;
    info!(
        ao = %request.ao.display(),
        roughness = %request.roughness.display(),
        metallic = %request.metallic.display(),
        "packing started"
    );

    let show_meter = !args.quiet && !args.json;
    let mut meter = ProgressMeter::new(config.progress.smoothing);
    let mut stderr = io::stderr();
    let mut last_tick = Instant::now();
    while controller.is_running() {
        thread::sleep(config.progress.poll_interval);
        let now = Instant::now();
        meter.update(controller.progress(), now - last_tick);
        last_tick = now;
        if show_meter {
            meter.render(&mut stderr)?;
        }
    }

    let outcome = controller
        .wait()
        .ok_or_else(|| anyhow!("packing job finished without reporting a result"))?;
    if show_meter {
        meter.complete();
        meter.render(&mut stderr)?;
        writeln!(stderr)?;
    }
    let outputs = outcome.context("packing failed")?;

    for (slot, path) in [
        (PreviewSlot::Ao, &request.ao),
        (PreviewSlot::Roughness, &request.roughness),
        (PreviewSlot::Metallic, &request.metallic),
    ] {
        if let Err(err) = store.set_from_file(slot, path) {
            warn!(slot = slot.label(), "failed to load source preview: {err}");
        }
    }

    let report = PackReport::new(&outputs, &store);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

pub fn run_where(config_path: Option<&Path>) -> Result<()> {
    let (path, config) = load_config(config_path)?;
    let status = if path.exists() { "" } else { " (not present, using defaults)" };
    println!("Configuration file: {}{status}", path.display());
    println!();
    print!("{}", config.to_toml_string()?);
    Ok(())
}

#[derive(Debug, Serialize)]
struct PackReport {
    width: u32,
    height: u32,
    elapsed_ms: u128,
    outputs: Vec<OutputReport>,
    previews: Vec<PreviewReport>,
}

#[derive(Debug, Serialize)]
struct OutputReport {
    layout: PackLayout,
    path: PathBuf,
}

#[derive(Debug, Serialize)]
struct PreviewReport {
    slot: &'static str,
    source: PathBuf,
    width: u32,
    height: u32,
}

impl PackReport {
    fn new(outputs: &PackedOutputs, store: &PreviewStore) -> Self {
        Self {
            width: outputs.width,
            height: outputs.height,
            elapsed_ms: outputs.elapsed.as_millis(),
            outputs: outputs
                .written
                .iter()
                .map(|output| OutputReport {
                    layout: output.layout,
                    path: output.path.clone(),
                })
                .collect(),
            previews: PreviewSlot::ALL
                .into_iter()
                .filter_map(|slot| {
                    store.info(slot).map(|info| PreviewReport {
                        slot: slot.label(),
                        source: info.source,
                        width: info.width,
                        height: info.height,
                    })
                })
                .collect(),
        }
    }
}

fn print_report(report: &PackReport) {
    if report.outputs.is_empty() {
        println!("No textures written.");
        return;
    }
    println!(
        "Packed {}x{} in {} ms:",
        report.width, report.height, report.elapsed_ms
    );
    for output in &report.outputs {
        println!("  {:<7} {}", output.layout.label(), output.path.display());
    }
}
