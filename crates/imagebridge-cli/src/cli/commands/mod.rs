//! CLI command handlers. Each command is in its own file.

mod call;
mod config_path;
mod generate;
mod schema;

pub use call::run_call;
pub use config_path::run_config_path;
pub use generate::{run_generate, GenerateOpts};
pub use schema::run_schema;

use anyhow::Result;
use imagebridge_core::config::BridgeConfig;
use imagebridge_core::tool::{ToolCall, ToolHandler, ToolResponse};
use tokio_util::sync::CancellationToken;

/// Run one tool call with Ctrl-C wired to cancellation, print the JSON result,
/// and turn an error payload into a non-zero exit.
pub(crate) async fn execute(cfg: &BridgeConfig, call: &ToolCall) -> Result<()> {
    let handler = ToolHandler::from_config(cfg)?;
    let cancel = CancellationToken::new();
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("interrupt received; cancelling");
                cancel.cancel();
            }
        })
    };

    let resp = handler.handle(call, &cancel).await;
    watcher.abort();

    println!("{}", serde_json::to_string_pretty(&resp)?);
    check(&resp)
}

fn check(resp: &ToolResponse) -> Result<()> {
    if resp.is_error {
        anyhow::bail!("{}", resp.text().unwrap_or("tool call failed"));
    }
    Ok(())
}
