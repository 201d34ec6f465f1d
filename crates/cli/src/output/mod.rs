mod format;
pub mod spinner;
mod table;
pub mod theme;

pub use format::{outcome_message, print_error, print_json, print_outcome, print_success, OutputMode};
pub use table::build_table;
