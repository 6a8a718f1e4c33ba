//! Command-line driver for the recognition dispatch layer.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`RecognitionConfig`] from disk (returns default on first run).
//! 3. Build an [`EngineSelector`] over the unlinked native recognizer.
//! 4. Dispatch one request from the command line and print the
//!    `{data, runtime}` pair as JSON, or the failure message + code.
//!
//! Without a linked native engine, `--engine auto` exercises the backend
//! path and `--engine on-device` demonstrates the capability failure.

use std::sync::Arc;

use anyhow::{bail, Context, Result};

use ecolens_recognition::config::RecognitionConfig;
use ecolens_recognition::recognition::{
    EnginePreference, EngineSelector, RecognitionRequest, UnlinkedRecognizer,
};

// ---------------------------------------------------------------------------
// Argument parsing
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct CliArgs {
    engine: EnginePreference,
    base_url: String,
    token: String,
    label: Option<String>,
    image_data: Option<String>,
    hint: Option<f64>,
}

impl Default for CliArgs {
    fn default() -> Self {
        Self {
            engine: EnginePreference::Auto,
            base_url: "http://localhost:3000".into(),
            token: String::new(),
            label: None,
            image_data: None,
            hint: None,
        }
    }
}

const USAGE: &str = "\
Usage: ecolens-recognition [options]

Options:
  --engine <auto|on-device|backend>   Engine preference (default: auto)
  --base-url <url>                    Backend base URL (default: http://localhost:3000)
  --token <token>                     Bearer token for the backend
  --label <text>                      Pre-detected item label
  --image-data <encoded>              Text-encoded image payload
  --hint <0..1>                       Confidence hint for the label
  -h, --help                          Show this help";

fn next_value(iter: &mut impl Iterator<Item = String>, flag: &str) -> Result<String> {
    iter.next()
        .with_context(|| format!("missing value for {flag}"))
}

fn parse_args(mut iter: impl Iterator<Item = String>) -> Result<CliArgs> {
    let mut args = CliArgs::default();
    while let Some(flag) = iter.next() {
        match flag.as_str() {
            "--engine" => args.engine = next_value(&mut iter, "--engine")?.parse()?,
            "--base-url" => args.base_url = next_value(&mut iter, "--base-url")?,
            "--token" => args.token = next_value(&mut iter, "--token")?,
            "--label" => args.label = Some(next_value(&mut iter, "--label")?),
            "--image-data" => args.image_data = Some(next_value(&mut iter, "--image-data")?),
            "--hint" => {
                args.hint = Some(
                    next_value(&mut iter, "--hint")?
                        .parse()
                        .context("--hint expects a number")?,
                )
            }
            "-h" | "--help" => {
                println!("{USAGE}");
                std::process::exit(0);
            }
            other => bail!("unknown flag: {other} (try --help)"),
        }
    }
    Ok(args)
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let args = parse_args(std::env::args().skip(1))?;
    let config = RecognitionConfig::load()?;
    log::info!(
        "Dispatching with engine preference '{}' against {}",
        args.engine,
        args.base_url
    );

    let selector = EngineSelector::from_config(
        Arc::new(UnlinkedRecognizer),
        &args.base_url,
        &args.token,
        &config,
    );

    let request = RecognitionRequest {
        detected_label: args.label,
        image_data: args.image_data,
        confidence_hint: args.hint,
    };

    match selector.recognize(&request, args.engine).await {
        Ok(recognition) => {
            println!("{}", serde_json::to_string_pretty(&recognition)?);
            Ok(())
        }
        Err(err) => {
            match err.code() {
                Some(code) => eprintln!("Recognition failed [{code}]: {err}"),
                None => eprintln!("Recognition failed: {err}"),
            }
            std::process::exit(1);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
