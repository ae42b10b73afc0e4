//! Text helpers shared by the remote mapping and the CLI output.

mod text;

pub use text::{sanitize_text, truncate_to_width};
