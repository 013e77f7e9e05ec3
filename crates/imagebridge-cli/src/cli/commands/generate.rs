//! `imagebridge generate --prompt ...` – generate images from flags.

use anyhow::Result;
use clap::Args;
use imagebridge_core::config::BridgeConfig;
use imagebridge_core::tool::{ToolCall, TOOL_NAME};
use serde_json::{json, Map, Value};

#[derive(Debug, Clone, Args)]
pub struct GenerateOpts {
    /// What to draw.
    #[arg(long, short)]
    pub prompt: String,
    /// What to keep out of the image.
    #[arg(long)]
    pub negative_prompt: Option<String>,
    /// Aspect ratio, e.g. 1x1, 16x9.
    #[arg(long)]
    pub aspect_ratio: Option<String>,
    /// Number of images (1-8).
    #[arg(long, short = 'n')]
    pub num_images: Option<i64>,
    /// FLASH, TURBO, DEFAULT or QUALITY.
    #[arg(long)]
    pub rendering_speed: Option<String>,
    /// AUTO, ON or OFF.
    #[arg(long)]
    pub magic_prompt: Option<String>,
    /// AUTO, GENERAL, REALISTIC, DESIGN or FICTION.
    #[arg(long)]
    pub style_type: Option<String>,
    #[arg(long)]
    pub seed: Option<i64>,
    /// Relay image URLs instead of downloading them.
    #[arg(long)]
    pub no_save: bool,
}

impl GenerateOpts {
    /// Tool arguments for these flags; unset flags are left to the tool's defaults.
    pub fn to_arguments(&self) -> Value {
        let mut args = Map::new();
        args.insert("prompt".into(), json!(self.prompt));
        let optional = [
            ("negative_prompt", self.negative_prompt.as_ref().map(|v| json!(v))),
            ("aspect_ratio", self.aspect_ratio.as_ref().map(|v| json!(v))),
            ("num_images", self.num_images.map(|v| json!(v))),
            ("rendering_speed", self.rendering_speed.as_ref().map(|v| json!(v))),
            ("magic_prompt", self.magic_prompt.as_ref().map(|v| json!(v))),
            ("style_type", self.style_type.as_ref().map(|v| json!(v))),
            ("seed", self.seed.map(|v| json!(v))),
        ];
        for (key, value) in optional {
            if let Some(v) = value {
                args.insert(key.into(), v);
            }
        }
        if self.no_save {
            args.insert("save".into(), json!(false));
        }
        Value::Object(args)
    }
}

pub async fn run_generate(cfg: &BridgeConfig, opts: GenerateOpts) -> Result<()> {
    let call = ToolCall {
        name: TOOL_NAME.to_string(),
        arguments: opts.to_arguments(),
    };
    super::execute(cfg, &call).await
}
