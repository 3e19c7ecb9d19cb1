//! Elevo Workspace Reconciler
//!
//! Reads a reconciliation request as JSON on stdin and writes the response
//! payload as JSON on stdout. Logs go to stderr.

use std::io::{Read, Write};

use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use workspace_reconciler::config::LogFormat;
use workspace_reconciler::domain::types::{ReconcileContext, ReconcileRequest};
use workspace_reconciler::infra::logger::TracingLogger;
use workspace_reconciler::service::desired_config_generator::LegacyDesiredConfigGenerator;
use workspace_reconciler::service::{response_payload_builder, response_payload_observer};
use workspace_reconciler::Config;

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::load()?;

    // stdout carries the payload, so logs always go to stderr
    let filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();
    match config.log_format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(filter)
            .init(),
        LogFormat::Text => tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(filter)
            .init(),
    }

    let mut input = String::new();
    std::io::stdin().read_to_string(&mut input)?;
    let request: ReconcileRequest = serde_json::from_str(&input)?;

    info!(
        agent_id = request.agent_id,
        update_type = request.update_type.as_str(),
        workspaces = request.workspaces.len(),
        "Reconciling workspaces"
    );

    let logger = TracingLogger;
    let generator = LegacyDesiredConfigGenerator::new(&logger);
    let context = ReconcileContext::new(
        request.agent_id,
        request.update_type,
        request.workspaces,
        config.settings(),
    )
    .with_observe_config_to_apply(config.observe_config_to_apply);

    let context = response_payload_builder::build(context, &generator, &logger)
        .map_err(|e| anyhow::anyhow!("Reconciliation failed (code {}): {}", e.code(), e))?;
    response_payload_observer::observe(&context, &logger);

    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer(&mut stdout, &context.response_payload)?;
    writeln!(stdout)?;

    Ok(())
}
