use serde::{Deserialize, Serialize};

/// One generate call as sent upstream. Built from validated tool arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateRequest {
    pub prompt: String,
    pub negative_prompt: Option<String>,
    pub aspect_ratio: String,
    pub num_images: u8,
    pub rendering_speed: String,
    pub magic_prompt: Option<String>,
    pub style_type: Option<String>,
    pub seed: Option<u32>,
}

impl GenerateRequest {
    /// Multipart form fields, in send order. Optional fields are left out when unset.
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![
            ("prompt", self.prompt.clone()),
            ("aspect_ratio", self.aspect_ratio.clone()),
            ("num_images", self.num_images.to_string()),
            ("rendering_speed", self.rendering_speed.clone()),
        ];
        if let Some(v) = &self.negative_prompt {
            fields.push(("negative_prompt", v.clone()));
        }
        if let Some(v) = &self.magic_prompt {
            fields.push(("magic_prompt", v.clone()));
        }
        if let Some(v) = &self.style_type {
            fields.push(("style_type", v.clone()));
        }
        if let Some(v) = self.seed {
            fields.push(("seed", v.to_string()));
        }
        fields
    }
}

/// Body of a successful generate response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateResponse {
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub data: Vec<GeneratedImage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedImage {
    /// Short-lived download URL; absent when the image was withheld as unsafe.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub resolution: Option<String>,
    #[serde(default = "default_true")]
    pub is_image_safe: bool,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub style_type: Option<String>,
}

fn default_true() -> bool {
    true
}
