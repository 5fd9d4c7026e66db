use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cough_pipeline::audio::AudioFormat;
use cough_pipeline::config::PipelineConfig;
use cough_pipeline::pipeline::{CoughPipeline, PreprocessReport};
use cough_pipeline::testing::SyntheticCough;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

/// Exit code when `--strict-onset` is set and no onset crossed the threshold.
const EXIT_ONSET_NOT_FOUND: u8 = 3;

#[derive(Parser, Debug)]
#[command(
    name = "cough_cli",
    about = "Cough recording preprocessing and classification"
)]
struct Cli {
    /// JSON pipeline configuration; falls back to COUGH_CONFIG, then the
    /// reference values
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run every preprocessing stage and print a report
    Features {
        #[arg(long)]
        input: PathBuf,
        /// Also write the report and the full feature tensor to this file
        #[arg(long)]
        output: Option<PathBuf>,
        /// Exit with status 3 when no onset is detected
        #[arg(long)]
        strict_onset: bool,
    },
    /// Preprocess and classify through a TF-Serving endpoint
    Classify {
        #[arg(long)]
        input: PathBuf,
        /// Predict URL; falls back to the config file, then COUGH_INFERENCE_URL
        #[arg(long)]
        endpoint: Option<String>,
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
    /// Serve the HTTP API (requires the `http` feature)
    Serve {
        /// Listen address; falls back to COUGH_HTTP_ADDR, then 0.0.0.0:5003
        #[arg(long)]
        addr: Option<String>,
        #[arg(long)]
        endpoint: Option<String>,
        /// Caller-level timeout for one request
        #[arg(long, default_value_t = 30_000)]
        request_timeout_ms: u64,
    },
    /// Print the effective configuration as JSON
    DumpConfig,
    /// Write a deterministic synthetic cough recording as 16-bit WAV
    Synth {
        #[arg(long)]
        output: PathBuf,
        #[arg(long, default_value_t = 16_000)]
        sample_rate: u32,
        #[arg(long, default_value_t = 500)]
        lead_in_ms: u32,
        /// Write digital silence instead of a cough
        #[arg(long)]
        silent: bool,
        #[arg(long, default_value_t = 0)]
        seed: u64,
    },
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    // An explicit --config must parse; a deployment-wide COUGH_CONFIG falls
    // back to defaults with a warning.
    let config = match (&cli.config, std::env::var_os("COUGH_CONFIG")) {
        (Some(path), _) => PipelineConfig::from_json_file(path)?,
        (None, Some(path)) => PipelineConfig::load_from_file(path),
        (None, None) => PipelineConfig::default(),
    };

    match cli.command {
        Commands::Features {
            input,
            output,
            strict_onset,
        } => run_features(config, &input, output, strict_onset),
        Commands::Classify {
            input,
            endpoint,
            timeout_ms,
        } => run_classify(config, &input, endpoint, timeout_ms),
        Commands::Serve {
            addr,
            endpoint,
            request_timeout_ms,
        } => run_serve(config, addr, endpoint, request_timeout_ms),
        Commands::Synth {
            output,
            sample_rate,
            lead_in_ms,
            silent,
            seed,
        } => run_synth(&output, sample_rate, lead_in_ms, silent, seed),
        Commands::DumpConfig => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(ExitCode::from(0))
        }
    }
}

/// Apply the endpoint precedence: flag, then config file, then environment.
fn resolve_endpoint(config: &mut PipelineConfig, flag: Option<String>) {
    if let Some(endpoint) = flag {
        config.inference.endpoint = Some(endpoint);
    } else if config.inference.endpoint.is_none() {
        config.inference.endpoint = std::env::var("COUGH_INFERENCE_URL").ok();
    }
}

fn run_features(
    config: PipelineConfig,
    input: &Path,
    output_path: Option<PathBuf>,
    strict_onset: bool,
) -> Result<ExitCode> {
    let pipeline = CoughPipeline::from_config(PipelineConfig {
        inference: Default::default(),
        ..config
    })?;
    let output = pipeline
        .extract_features_path(input, AudioFormat::Wav)
        .with_context(|| format!("preprocessing {}", input.display()))?;

    let input_name = input.display().to_string();
    println!(
        "{}",
        serde_json::to_string_pretty(&FeaturesPayload {
            input: &input_name,
            report: &output.report,
            tensor: None,
        })?
    );

    if let Some(path) = output_path {
        let nested = output.features.to_nested();
        let json = serde_json::to_string(&FeaturesPayload {
            input: &input_name,
            report: &output.report,
            tensor: Some(&nested),
        })?;
        fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
    }

    if strict_onset && !output.report.onset.detected {
        eprintln!("No onset detected in {}", input.display());
        return Ok(ExitCode::from(EXIT_ONSET_NOT_FOUND));
    }
    Ok(ExitCode::from(0))
}

fn run_classify(
    mut config: PipelineConfig,
    input: &Path,
    endpoint: Option<String>,
    timeout_ms: Option<u64>,
) -> Result<ExitCode> {
    resolve_endpoint(&mut config, endpoint);
    if let Some(timeout_ms) = timeout_ms {
        config.inference.timeout_ms = timeout_ms;
    }
    let pipeline = CoughPipeline::from_config(config)?;
    let classification = pipeline
        .classify_path(input, AudioFormat::Wav)
        .with_context(|| format!("classifying {}", input.display()))?;

    println!("{}", serde_json::to_string_pretty(&classification)?);
    Ok(ExitCode::from(0))
}

fn run_synth(
    output: &Path,
    sample_rate: u32,
    lead_in_ms: u32,
    silent: bool,
    seed: u64,
) -> Result<ExitCode> {
    let mut spec = SyntheticCough {
        sample_rate,
        lead_in_ms,
        seed,
        ..Default::default()
    };
    if silent {
        spec.burst_amplitude = 0.0;
        spec.noise_amplitude = 0.0;
    }
    spec.write_wav_file(output)
        .with_context(|| format!("writing {}", output.display()))?;
    eprintln!(
        "Wrote {} ({} Hz, burst at {:.3} s)",
        output.display(),
        sample_rate,
        spec.onset_secs()
    );
    Ok(ExitCode::from(0))
}

#[cfg(feature = "http")]
fn run_serve(
    mut config: PipelineConfig,
    addr: Option<String>,
    endpoint: Option<String>,
    request_timeout_ms: u64,
) -> Result<ExitCode> {
    use cough_pipeline::http;
    use std::sync::Arc;
    use std::time::Duration;

    resolve_endpoint(&mut config, endpoint);
    let addr = match addr {
        Some(value) => value
            .parse()
            .with_context(|| format!("parsing listen address {}", value))?,
        None => http::resolve_addr(),
    };
    let pipeline = Arc::new(CoughPipeline::from_config(config)?);
    http::serve_blocking(pipeline, addr, Duration::from_millis(request_timeout_ms))?;
    Ok(ExitCode::from(0))
}

#[cfg(not(feature = "http"))]
fn run_serve(
    _config: PipelineConfig,
    _addr: Option<String>,
    _endpoint: Option<String>,
    _request_timeout_ms: u64,
) -> Result<ExitCode> {
    anyhow::bail!("cough_cli was built without the `http` feature; rebuild with --features http")
}

#[derive(Serialize)]
struct FeaturesPayload<'a> {
    input: &'a str,
    report: &'a PreprocessReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    tensor: Option<&'a Vec<Vec<Vec<f32>>>>,
}
