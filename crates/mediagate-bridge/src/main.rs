//! `mediagate`
//!
//! Runs one web capability request through the authorization bridge and
//! prints the resulting decision as JSON. The OS side is either simulated
//! (scripted answers) or interactive (questions on the terminal).

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use mediagate_bridge::permission::{AuthorizationCoordinator, result_channel};
use mediagate_bridge::platform::{OsPermissionSubsystem, ScriptedAnswer, SimulatedOs, TerminalOs};
use mediagate_bridge::web::WebPermissionHandler;
use mediagate_core::OsPermission;
use mediagate_core::web::WebCapabilityRequest;

#[derive(Parser, Debug)]
#[command(name = "mediagate")]
#[command(version, about = "mediagate - authorize web media capability requests against OS permissions")]
struct Args {
    /// Web request as JSON, e.g. '{"resources":["video-capture"]}'
    #[arg(long, conflicts_with = "resources")]
    request: Option<String>,

    /// Comma-separated resource identifiers (alternative to --request)
    #[arg(long, value_delimiter = ',')]
    resources: Vec<String>,

    /// OS permissions already granted (camera, microphone)
    #[arg(long, value_delimiter = ',')]
    granted: Vec<OsPermission>,

    /// Scripted prompt answer per permission, e.g. camera=grant
    #[arg(long, value_parser = parse_answer)]
    answer: Vec<(OsPermission, ScriptedAnswer)>,

    /// Answer for permissions without a scripted one
    #[arg(long, default_value = "ignore")]
    default_answer: ScriptedAnswer,

    /// Delay before scripted answers are delivered
    #[arg(long, default_value_t = 0)]
    answer_delay_ms: u64,

    /// Ask on the terminal instead of using scripted answers
    #[arg(long, conflicts_with_all = ["answer", "default_answer", "answer_delay_ms"])]
    interactive: bool,

    /// Seconds to wait for the OS prompt result (overrides config)
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Project directory holding .mediagate/settings.json
    #[arg(long)]
    project_dir: Option<PathBuf>,

    /// Log level filter (e.g. "info", "debug", "warn"; overrides config)
    #[arg(long, env = "MEDIAGATE_LOG_LEVEL")]
    log_level: Option<String>,

    /// Output logs as JSON (for structured log aggregation).
    #[arg(long, env = "MEDIAGATE_LOG_JSON")]
    log_json: bool,

    /// OpenTelemetry OTLP endpoint for traces and metrics export
    /// (e.g. `http://localhost:4317`). Requires the `metrics` feature.
    #[cfg(feature = "metrics")]
    #[arg(long, env = "MEDIAGATE_METRICS_ENDPOINT")]
    metrics_endpoint: Option<String>,
}

fn parse_answer(s: &str) -> Result<(OsPermission, ScriptedAnswer), String> {
    let (perm, answer) = s
        .split_once('=')
        .ok_or_else(|| format!("expected PERMISSION=ANSWER, got '{s}'"))?;
    let perm = perm.parse::<OsPermission>().map_err(|e| e.to_string())?;
    Ok((perm, answer.parse()?))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = mediagate_core::config::load_config(args.project_dir.as_deref())?;
    if let Some(secs) = args.timeout_secs {
        config.bridge.prompt_timeout_secs = secs;
    }
    if let Some(level) = &args.log_level {
        config.log.level.clone_from(level);
    }
    config.log.json |= args.log_json;

    #[cfg(feature = "metrics")]
    let metrics_endpoint = args.metrics_endpoint.as_deref();
    #[cfg(not(feature = "metrics"))]
    let metrics_endpoint: Option<&str> = None;

    // Hold the guard so the OTel pipeline stays alive until shutdown below.
    let level = &config.log.level;
    let log_filter =
        format!("mediagate={level},mediagate_bridge={level},mediagate_core={level}");
    let metrics_guard = mediagate_core::tracing_init::init_tracing_with_metrics(
        &log_filter,
        config.log.json,
        metrics_endpoint,
    );

    let request = match &args.request {
        Some(json) => serde_json::from_str::<WebCapabilityRequest>(json)
            .context("Invalid --request JSON")?,
        None if args.resources.is_empty() => {
            anyhow::bail!("No resources given; pass --request or --resources")
        }
        None => WebCapabilityRequest::new(args.resources.iter().cloned()),
    };

    info!(
        version = env!("CARGO_PKG_VERSION"),
        resources = ?request.resources,
        interactive = args.interactive,
        prompt_timeout_secs = config.bridge.prompt_timeout_secs,
        "Starting mediagate"
    );

    let (results_tx, results_rx) = result_channel();
    let os: Arc<dyn OsPermissionSubsystem> = if args.interactive {
        let os = args
            .granted
            .iter()
            .fold(TerminalOs::new(results_tx), |os, p| os.with_granted(*p));
        Arc::new(os)
    } else {
        let os = SimulatedOs::new(results_tx);
        for permission in &args.granted {
            os.set_granted(*permission, true);
        }
        os.answer_all(args.default_answer);
        for (permission, answer) in &args.answer {
            os.answer(*permission, *answer);
        }
        os.set_answer_delay(Duration::from_millis(args.answer_delay_ms));
        Arc::new(os)
    };

    let coordinator = Arc::new(AuthorizationCoordinator::start(
        os,
        results_rx,
        config.bridge.clone().into(),
    ));
    let handler = WebPermissionHandler::new(coordinator);
    let decision = handler.handle(&request).await;

    let mut out = std::io::stdout().lock();
    serde_json::to_writer(&mut out, &decision)?;
    writeln!(out)?;

    info!(granted = decision.is_grant(), "Request resolved");

    shutdown_metrics(metrics_guard);
    Ok(())
}

#[cfg(feature = "metrics")]
fn shutdown_metrics(guard: Option<mediagate_core::metrics::MetricsGuard>) {
    if let Some(guard) = guard
        && let Err(e) = guard.shutdown()
    {
        tracing::warn!(error = %e, "Failed to flush OpenTelemetry data");
    }
}

#[cfg(not(feature = "metrics"))]
const fn shutdown_metrics(_guard: Option<()>) {}
