use clap::ArgMatches;
use colored::Colorize;
use jshunter_core::{AiSource, RunSummary, ScanOptions, ScanType};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::warn;
use url::Url;

/// Where the target list comes from. `--file` wins over `--url`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetSource {
    Url(Url),
    File(PathBuf),
}

impl TargetSource {
    pub fn from_matches(matches: &ArgMatches) -> Option<Self> {
        matches
            .get_one::<String>("file")
            .map(|p| Self::File(expand_path(p)))
            .or_else(|| matches.get_one::<Url>("url").cloned().map(Self::Url))
    }

    pub fn read(&self) -> Result<Vec<String>, String> {
        match self {
            Self::Url(url) => Ok(vec![url.to_string()]),
            Self::File(path) => read_target_file(path),
        }
    }
}

/// One target per line. Blank lines and `#` comments are skipped, lines that
/// are not URLs are logged and dropped.
pub fn read_target_file(path: &Path) -> Result<Vec<String>, String> {
    let file = File::open(path).map_err(|e| format!("Cannot open targets file {}: {}", path.display(), e))?;

    let mut targets = Vec::new();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| format!("{}:{}: {}", path.display(), index + 1, e))?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match normalize_target(line) {
            Some(target) => targets.push(target),
            None => warn!("{}:{}: '{}' is not a URL, skipped", path.display(), index + 1, line),
        }
    }

    if targets.is_empty() {
        return Err(format!("{} holds no usable targets", path.display()));
    }
    Ok(targets)
}

/// Bare `host[:port][/path]` gets an `http://` scheme.
pub fn normalize_target(raw: &str) -> Option<String> {
    let with_host = |url: Url| url.has_host().then_some(url);

    Url::parse(raw)
        .ok()
        .and_then(with_host)
        .or_else(|| Url::parse(&format!("http://{}", raw)).ok().and_then(with_host))
        .map(String::from)
}

fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}

/// Turn parsed command line flags into scan options
pub fn build_options(matches: &ArgMatches) -> Result<ScanOptions, String> {
    let targets = TargetSource::from_matches(matches)
        .ok_or_else(|| "No targets: pass --url or --file".to_string())?
        .read()?;

    let scan_type = matches
        .get_one::<String>("scan-type")
        .map(|s| ScanType::from_str(s).ok_or_else(|| format!("Unknown scan type '{}'", s)))
        .transpose()?
        .unwrap_or(ScanType::Both);

    let ai = match matches.get_one::<String>("ai") {
        Some(source) => AiSource::from_str(source).ok_or_else(|| format!("Unknown AI source '{}'", source))?,
        None => None,
    };

    let defaults = ScanOptions::default();
    let options = ScanOptions {
        targets,
        scan_type,
        threads: matches.get_one::<usize>("threads").copied().unwrap_or(defaults.threads),
        tabs: matches.get_one::<usize>("tabs").copied().unwrap_or(defaults.tabs),
        timeout_secs: matches
            .get_one::<u64>("timeout")
            .copied()
            .unwrap_or(defaults.timeout_secs),
        proxy: matches.get_one::<String>("proxy").cloned(),
        headless: matches.get_flag("headless"),
        ai,
        ai_timeout_secs: matches
            .get_one::<u64>("ai-timeout")
            .copied()
            .unwrap_or(defaults.ai_timeout_secs),
        env_file: matches.get_one::<String>("env").map(|p| expand_path(p)),
        report_dir: matches
            .get_one::<String>("report-dir")
            .map(|p| expand_path(p))
            .unwrap_or(defaults.report_dir),
        output: matches.get_one::<String>("output").map(|p| expand_path(p)),
        debug: matches.get_flag("debug"),
        show_progress: !matches.get_flag("quiet"),
    };

    options.validate().map_err(|e| e.to_string())?;
    Ok(options)
}

fn print_divider() {
    eprintln!("{}", "═".repeat(60).bright_blue().bold());
}

pub fn print_summary(summary: &RunSummary) {
    eprintln!();
    print_divider();
    eprintln!("{}", "  SCAN COMPLETE".bright_white().bold());
    print_divider();
    eprintln!(
        "  {} Endpoints probed: {}",
        "→".blue(),
        summary.endpoints.to_string().bright_white()
    );
    eprintln!(
        "  {} Sensitive findings: {}",
        "→".blue(),
        summary.secrets.to_string().yellow()
    );
    eprintln!(
        "  {} Broken routes: {}",
        "→".blue(),
        summary.broken_routes.to_string().red().bold()
    );
    for report in &summary.reports {
        eprintln!("  {} Report: {}", "✓".green().bold(), report.display());
    }
}
