use serde_json::{json, Value};

use super::args::{
    ASPECT_RATIOS, MAGIC_PROMPT_MODES, MAX_IMAGES, MAX_PROMPT_CHARS, MAX_SEED, RENDERING_SPEEDS,
    STYLE_TYPES,
};

pub const TOOL_NAME: &str = "generate_image";

/// MCP tool descriptor for `generate_image` (name, description, JSON input schema).
pub fn tool_definition() -> Value {
    json!({
        "name": TOOL_NAME,
        "description": "Generate images from a text prompt with the Ideogram API. \
                        Returns local file paths when saving is enabled, otherwise image URLs.",
        "inputSchema": {
            "type": "object",
            "properties": {
                "prompt": {
                    "type": "string",
                    "description": "What to draw.",
                    "minLength": 1,
                    "maxLength": MAX_PROMPT_CHARS
                },
                "negative_prompt": {
                    "type": "string",
                    "description": "What to keep out of the image.",
                    "maxLength": MAX_PROMPT_CHARS
                },
                "aspect_ratio": { "type": "string", "enum": ASPECT_RATIOS, "default": "1x1" },
                "num_images": {
                    "type": "integer",
                    "minimum": 1,
                    "maximum": MAX_IMAGES,
                    "default": 1
                },
                "rendering_speed": { "type": "string", "enum": RENDERING_SPEEDS, "default": "DEFAULT" },
                "magic_prompt": { "type": "string", "enum": MAGIC_PROMPT_MODES },
                "style_type": { "type": "string", "enum": STYLE_TYPES },
                "seed": { "type": "integer", "minimum": 0, "maximum": MAX_SEED },
                "save": {
                    "type": "boolean",
                    "description": "Save images locally when storage is enabled.",
                    "default": true
                }
            },
            "required": ["prompt"],
            "additionalProperties": false
        }
    })
}
