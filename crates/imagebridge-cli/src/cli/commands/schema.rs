//! `imagebridge schema` – print the tool descriptor.

use anyhow::Result;
use imagebridge_core::tool;

pub fn run_schema() -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&tool::tool_definition())?);
    Ok(())
}
