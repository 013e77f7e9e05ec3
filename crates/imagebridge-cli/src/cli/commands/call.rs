//! `imagebridge call <json>` – run a raw tool call.

use anyhow::{Context, Result};
use imagebridge_core::config::BridgeConfig;
use imagebridge_core::tool::ToolCall;

pub async fn run_call(cfg: &BridgeConfig, json: &str) -> Result<()> {
    let call: ToolCall = serde_json::from_str(json)
        .context("tool call must be JSON like {\"name\":..,\"arguments\":{..}}")?;
    super::execute(cfg, &call).await
}
