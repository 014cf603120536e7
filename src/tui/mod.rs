//! Terminal presentation: dashboard rendering and startup prompts.

pub mod prompt;
pub mod render;

pub use render::{render_dashboard, RenderOptions};
