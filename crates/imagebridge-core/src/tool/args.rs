//! `generate_image` argument parsing and validation.

use serde::Deserialize;
use serde_json::Value;

use crate::image_api::GenerateRequest;

pub const MAX_PROMPT_CHARS: usize = 10_000;
pub const MAX_IMAGES: i64 = 8;
pub const MAX_SEED: i64 = 2_147_483_647;

pub const ASPECT_RATIOS: &[&str] = &[
    "1x1", "1x2", "2x1", "1x3", "3x1", "2x3", "3x2", "3x4", "4x3", "4x5", "5x4", "9x16",
    "16x9", "10x16", "16x10",
];
pub const RENDERING_SPEEDS: &[&str] = &["FLASH", "TURBO", "DEFAULT", "QUALITY"];
pub const MAGIC_PROMPT_MODES: &[&str] = &["AUTO", "ON", "OFF"];
pub const STYLE_TYPES: &[&str] = &["AUTO", "GENERAL", "REALISTIC", "DESIGN", "FICTION"];

#[derive(Debug, thiserror::Error)]
pub enum ArgsError {
    #[error("{0}")]
    Malformed(#[from] serde_json::Error),
    #[error("`{field}` {reason}")]
    Invalid { field: &'static str, reason: String },
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ArgsError {
    ArgsError::Invalid {
        field,
        reason: reason.into(),
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawArgs {
    prompt: String,
    #[serde(default)]
    negative_prompt: Option<String>,
    #[serde(default)]
    aspect_ratio: Option<String>,
    #[serde(default)]
    num_images: Option<i64>,
    #[serde(default)]
    rendering_speed: Option<String>,
    #[serde(default)]
    magic_prompt: Option<String>,
    #[serde(default)]
    style_type: Option<String>,
    #[serde(default)]
    seed: Option<i64>,
    #[serde(default)]
    save: Option<bool>,
}

/// Validated arguments of one `generate_image` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateArgs {
    pub prompt: String,
    pub negative_prompt: Option<String>,
    pub aspect_ratio: String,
    pub num_images: u8,
    pub rendering_speed: String,
    pub magic_prompt: Option<String>,
    pub style_type: Option<String>,
    pub seed: Option<u32>,
    /// Save images locally (when storage is enabled). Defaults to true.
    pub save: bool,
}

/// Uppercase `value` and check it against `allowed`.
fn one_of(field: &'static str, value: &str, allowed: &[&str]) -> Result<String, ArgsError> {
    let v = value.trim().to_ascii_uppercase();
    if allowed.contains(&v.as_str()) {
        Ok(v)
    } else {
        Err(invalid(
            field,
            format!("must be one of {}, got {:?}", allowed.join(", "), value),
        ))
    }
}

fn bounded_text(field: &'static str, value: &str) -> Result<String, ArgsError> {
    if value.chars().count() > MAX_PROMPT_CHARS {
        return Err(invalid(
            field,
            format!("must be at most {MAX_PROMPT_CHARS} characters"),
        ));
    }
    Ok(value.trim().to_string())
}

impl GenerateArgs {
    pub fn from_value(value: Value) -> Result<Self, ArgsError> {
        let raw: RawArgs = serde_json::from_value(value)?;

        let prompt = bounded_text("prompt", &raw.prompt)?;
        if prompt.is_empty() {
            return Err(invalid("prompt", "must not be empty"));
        }
        let negative_prompt = raw
            .negative_prompt
            .as_deref()
            .map(|p| bounded_text("negative_prompt", p))
            .transpose()?
            .filter(|p| !p.is_empty());

        let aspect_ratio = match raw.aspect_ratio.as_deref().map(str::trim) {
            None => "1x1".to_string(),
            Some(r) if ASPECT_RATIOS.contains(&r) => r.to_string(),
            Some(r) => {
                return Err(invalid(
                    "aspect_ratio",
                    format!("must be one of {}, got {:?}", ASPECT_RATIOS.join(", "), r),
                ))
            }
        };

        let num_images = match raw.num_images {
            None => 1,
            Some(n) if (1..=MAX_IMAGES).contains(&n) => n as u8,
            Some(n) => {
                return Err(invalid(
                    "num_images",
                    format!("must be between 1 and {MAX_IMAGES}, got {n}"),
                ))
            }
        };

        let rendering_speed = match raw.rendering_speed.as_deref() {
            None => "DEFAULT".to_string(),
            Some(s) => one_of("rendering_speed", s, RENDERING_SPEEDS)?,
        };
        let magic_prompt = raw
            .magic_prompt
            .as_deref()
            .map(|s| one_of("magic_prompt", s, MAGIC_PROMPT_MODES))
            .transpose()?;
        let style_type = raw
            .style_type
            .as_deref()
            .map(|s| one_of("style_type", s, STYLE_TYPES))
            .transpose()?;

        let seed = match raw.seed {
            None => None,
            Some(s) if (0..=MAX_SEED).contains(&s) => Some(s as u32),
            Some(s) => {
                return Err(invalid(
                    "seed",
                    format!("must be between 0 and {MAX_SEED}, got {s}"),
                ))
            }
        };

        Ok(Self {
            prompt,
            negative_prompt,
            aspect_ratio,
            num_images,
            rendering_speed,
            magic_prompt,
            style_type,
            seed,
            save: raw.save.unwrap_or(true),
        })
    }

    pub fn to_request(&self) -> GenerateRequest {
        GenerateRequest {
            prompt: self.prompt.clone(),
            negative_prompt: self.negative_prompt.clone(),
            aspect_ratio: self.aspect_ratio.clone(),
            num_images: self.num_images,
            rendering_speed: self.rendering_speed.clone(),
            magic_prompt: self.magic_prompt.clone(),
            style_type: self.style_type.clone(),
            seed: self.seed,
        }
    }
}
