//! The `generate_image` tool: arguments, descriptor, result payload and handler.
//!
//! The handler is the only caller of the retry core. It validates arguments
//! before any upstream traffic, turns every retry outcome into a
//! [`ToolResponse`] and calls storage only after a successful generate.

mod args;
mod definition;
mod handler;
mod response;

pub use args::{
    ArgsError, GenerateArgs, ASPECT_RATIOS, MAGIC_PROMPT_MODES, MAX_IMAGES, MAX_PROMPT_CHARS,
    MAX_SEED, RENDERING_SPEEDS, STYLE_TYPES,
};
pub use definition::{tool_definition, TOOL_NAME};
pub use handler::{failure_message, ToolCall, ToolHandler};
pub use response::{Content, ToolResponse};
