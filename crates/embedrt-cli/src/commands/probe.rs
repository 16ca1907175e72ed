//! Probe command - load a model, report its bindings and release it.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::Args;
use console::style;
use tracing::{debug, info};

use embedrt_core::{DefaultBackend, ExecutionProvider, Model};

use super::config::load_config;

/// Arguments for the probe command.
#[derive(Args)]
pub struct ProbeArgs {
    /// Path to the ONNX model (default: from config)
    #[arg(short, long)]
    model: Option<PathBuf>,

    /// Execution provider: cpu, cuda, tensorrt, coreml (default: from config)
    #[arg(short, long)]
    provider: Option<ExecutionProvider>,

    /// Give up if loading takes longer than this many seconds
    #[arg(long, default_value = "60")]
    timeout_secs: u64,
}

struct ProbeReport {
    inputs: Vec<String>,
    outputs: Vec<String>,
    provider: ExecutionProvider,
}

pub async fn run(args: ProbeArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let mut session = load_config(config_path)?.session;
    if let Some(model) = args.model {
        session.model_path = model;
    }
    if let Some(provider) = args.provider {
        session.provider = provider;
    }

    if !session.model_path.exists() {
        anyhow::bail!("Model file not found: {}", session.model_path.display());
    }

    debug!("Probing {} on {}", session.model_path.display(), session.provider);
    let model_path = session.model_path.clone();
    let started = Instant::now();

    // Session creation blocks, so keep it off the async runtime.
    let load = tokio::task::spawn_blocking(move || {
        let model = Model::<DefaultBackend>::from_config(&session)?;
        let report = ProbeReport {
            inputs: model.input_names().to_vec(),
            outputs: model.output_names().to_vec(),
            provider: model.provider(),
        };
        model.release();
        Ok::<_, embedrt_core::InferenceError>(report)
    });

    let report = tokio::time::timeout(Duration::from_secs(args.timeout_secs), load)
        .await
        .map_err(|_| anyhow::anyhow!("Model load timed out after {}s", args.timeout_secs))???;
    info!("Probe finished in {}ms", started.elapsed().as_millis());

    println!("{} Loaded {}", style("✓").green(), model_path.display());
    println!("  Provider: {}", report.provider);
    println!("  Inputs:   {}", report.inputs.join(", "));
    println!("  Outputs:  {}", report.outputs.join(", "));

    Ok(())
}
