pub mod browser;
pub mod error;
pub mod gemini;
pub mod options;
pub mod report;
pub mod runner;

use colored::Colorize;

pub use error::CoreError;
pub use options::{AiSource, ScanOptions, ScanType};
pub use runner::{Components, RunSummary, Runner};

const BANNER: &str = r#"
      _     _                 _
     (_)___| |__  _   _ _ __ | |_ ___ _ __
     | / __| '_ \| | | | '_ \| __/ _ \ '__|
     | \__ \ | | | |_| | | | | ||  __/ |
    _/ |___/_| |_|\__,_|_| |_|\__\___|_|
   |__/
"#;

pub fn print_banner() {
    eprintln!("{}", BANNER.bright_cyan().bold());
    eprintln!(
        "    {} {}\n",
        "JS endpoint exposure & SPA route access scanner".bright_white(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
}
