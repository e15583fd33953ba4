pub mod commands;
pub mod handlers;

// Re-export commonly used handler functions for convenience
pub use commands::{CLAP_STYLING, command_argument_builder};
pub use handlers::{TargetSource, build_options, normalize_target, print_summary, read_target_file};
