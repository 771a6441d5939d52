use anyhow::Result;
use purbank_session::cli::{start, telemetry};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse arguments and set up tracing
    let action = start()?;

    let result = action.execute().await;

    telemetry::shutdown_tracer();

    result
}
