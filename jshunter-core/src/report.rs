// Result sinks: console lines, markdown reports, JSON lines

use crate::error::Result;
use chrono::Local;
use colored::Colorize;
use indicatif::ProgressBar;
use jshunter_scanner::ScanResult;
use jshunter_scanner::result::{BrokenRouteResult, EndpointProbeResult, SensitiveFindingResult};
use jshunter_scanner::session::host_folder;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Consumes every result of a run, once each.
pub trait ResultWriter: Send {
    fn write(&mut self, result: &ScanResult) -> Result<()>;

    /// Flush buffered output. Returns the report files written.
    fn close(&mut self) -> Result<Vec<PathBuf>>;
}

/// Table of contents plus detail sections for one markdown report.
#[derive(Debug, Default, Clone)]
pub struct MarkdownBuffer {
    pub title: String,
    pub toc: String,
    pub detail: String,
}

impl MarkdownBuffer {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.toc.is_empty()
    }

    pub fn add_item(&mut self, heading: &str, body: &str) {
        self.toc.push_str(&format!("- [{}](#{})\n", heading, markdown_anchor(heading)));
        self.detail.push_str(&format!("#### {}\n{}\n\n", heading, body));
    }

    pub fn render(&self) -> String {
        format!(
            "## {}\n### TABLE_OF_CONTENT\n{}\n### DETAIL\n{}",
            self.title, self.toc, self.detail
        )
    }
}

/// GitHub-style heading anchor.
pub fn markdown_anchor(heading: &str) -> String {
    heading
        .to_lowercase()
        .chars()
        .filter_map(|c| match c {
            ' ' => Some('-'),
            c if c.is_alphanumeric() || c == '-' || c == '_' => Some(c),
            _ => None,
        })
        .collect()
}

pub fn format_result_line(result: &ScanResult) -> String {
    let label = match result {
        ScanResult::EndpointProbe(_) => result.label().green().bold(),
        ScanResult::SensitiveFinding(_) => result.label().red().bold(),
        ScanResult::BrokenRoute(_) => result.label().yellow().bold(),
    };

    let body = match result {
        ScanResult::EndpointProbe(r) => format!(
            "{} [{}] [{}] [{}]",
            r.url,
            r.method,
            colorize_status(r.status_code),
            r.content_length
        ),
        ScanResult::SensitiveFinding(r) => format!("{} [{}]", r.url, r.message),
        ScanResult::BrokenRoute(r) => format!("{} -> {}", r.route_url, r.observed_href),
    };

    format!("[{}] {}", label, body)
}

fn colorize_status(status: u16) -> String {
    let s = status.to_string();
    match status {
        200..=299 => s.green().to_string(),
        300..=399 => s.cyan().to_string(),
        400..=499 => s.yellow().to_string(),
        500..=599 => s.red().to_string(),
        _ => s,
    }
}

/// Console output plus markdown reports under `report_dir`:
///
/// - `vue_reports/<host>/report.md` for broken routes, linking the
///   screenshots in `vue_reports/<host>/resources/`
/// - `endpoint_reports/<timestamp>.md` for probes and secrets
pub struct ReportWriter {
    report_dir: PathBuf,
    route_reports: BTreeMap<String, MarkdownBuffer>,
    endpoint_report: MarkdownBuffer,
    sensitive_report: MarkdownBuffer,
    jsonl: Option<BufWriter<File>>,
    progress: Option<ProgressBar>,
}

impl ReportWriter {
    pub fn new(report_dir: &Path, output: Option<&Path>) -> Result<Self> {
        let jsonl = match output {
            Some(path) => {
                if let Some(parent) = path.parent()
                    && !parent.as_os_str().is_empty()
                {
                    fs::create_dir_all(parent)?;
                }
                Some(BufWriter::new(File::create(path)?))
            }
            None => None,
        };

        Ok(Self {
            report_dir: report_dir.to_path_buf(),
            route_reports: BTreeMap::new(),
            endpoint_report: MarkdownBuffer::new("Endpoint Req Report"),
            sensitive_report: MarkdownBuffer::new("Sensitive Findings"),
            jsonl,
            progress: None,
        })
    }

    /// Print through the spinner so lines don't tear it.
    pub fn with_progress_bar(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    fn print(&self, line: String) {
        match self.progress {
            Some(ref pb) => pb.println(line),
            None => println!("{}", line),
        }
    }

    fn add_endpoint(&mut self, r: &EndpointProbeResult) {
        let heading = format!("{} [{}] [{}]", r.url, r.method, r.status_code);
        let mut body = format!(
            "- Path: `{}`\n- Method: {}\n- Status: {}\n- Content-Length: {}\n\n````\nHTTP {}\n",
            r.path, r.method, r.status_code, r.content_length, r.status_code
        );
        for (name, value) in &r.response_headers {
            body.push_str(&format!("{}: {}\n", name, value));
        }
        if !r.body_excerpt.is_empty() {
            body.push('\n');
            body.push_str(&r.body_excerpt);
            body.push('\n');
        }
        body.push_str("````");
        self.endpoint_report.add_item(&heading, &body);
    }

    fn add_sensitive(&mut self, r: &SensitiveFindingResult) {
        let heading = format!("{} [{}]", r.url, r.message);
        self.sensitive_report
            .add_item(&heading, &format!("- Source: {}\n- Match: `{}`", r.url, r.message));
    }

    fn add_route(&mut self, r: &BrokenRouteResult) {
        let host = host_folder(&r.parent_url);
        let buffer = self
            .route_reports
            .entry(host)
            .or_insert_with(|| MarkdownBuffer::new(&r.parent_url));

        // Screenshots sit next to the report under resources/
        let image = match r.screenshot.file_name() {
            Some(name) => format!("resources/{}", name.to_string_lossy()),
            None => r.screenshot.display().to_string(),
        };
        buffer.add_item(
            &r.route_url,
            &format!("- Landed on: {}\n\n![]({})", r.observed_href, image),
        );
    }

    fn write_route_reports(&self) -> Result<Vec<PathBuf>> {
        let mut written = Vec::new();
        for (host, buffer) in &self.route_reports {
            if buffer.is_empty() {
                continue;
            }
            let folder = self.report_dir.join("vue_reports").join(host);
            fs::create_dir_all(&folder)?;
            let path = folder.join("report.md");
            fs::write(&path, buffer.render())?;
            info!("Route report location: {}", path.display());
            written.push(path);
        }
        Ok(written)
    }

    fn write_endpoint_report(&self) -> Result<Option<PathBuf>> {
        if self.endpoint_report.is_empty() && self.sensitive_report.is_empty() {
            return Ok(None);
        }

        let folder = self.report_dir.join("endpoint_reports");
        fs::create_dir_all(&folder)?;
        let path = folder.join(format!("{}.md", Local::now().format("%Y%m%d_%H%M%S")));

        let mut content = String::new();
        if !self.endpoint_report.is_empty() {
            content.push_str(&self.endpoint_report.render());
        }
        if !self.sensitive_report.is_empty() {
            content.push_str(&self.sensitive_report.render());
        }
        fs::write(&path, content)?;
        info!("Endpoint report location: {}", path.display());
        Ok(Some(path))
    }
}

impl ResultWriter for ReportWriter {
    fn write(&mut self, result: &ScanResult) -> Result<()> {
        self.print(format_result_line(result));

        match result {
            ScanResult::EndpointProbe(r) => self.add_endpoint(r),
            ScanResult::SensitiveFinding(r) => self.add_sensitive(r),
            ScanResult::BrokenRoute(r) => self.add_route(r),
        }

        if let Some(ref mut jsonl) = self.jsonl {
            let line = serde_json::to_string(result).map_err(std::io::Error::other)?;
            writeln!(jsonl, "{}", line)?;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<Vec<PathBuf>> {
        let mut written = self.write_route_reports()?;
        if let Some(path) = self.write_endpoint_report()? {
            written.push(path);
        }

        let vue_reports = self.report_dir.join("vue_reports");
        if vue_reports.is_dir() {
            remove_empty_route_folders(&vue_reports)?;
        }

        if let Some(ref mut jsonl) = self.jsonl {
            jsonl.flush()?;
        }
        Ok(written)
    }
}

/// Remove per-host route folders that hold no files, e.g. targets whose
/// routes were all guarded.
pub fn remove_empty_route_folders(vue_reports: &Path) -> Result<usize> {
    let mut removed = 0;
    for entry in fs::read_dir(vue_reports)? {
        let path = entry?.path();
        if path.is_dir() && !contains_files(&path)? {
            if let Err(e) = fs::remove_dir_all(&path) {
                warn!("Can not remove {}: {}", path.display(), e);
                continue;
            }
            removed += 1;
        }
    }
    Ok(removed)
}

fn contains_files(dir: &Path) -> Result<bool> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() || (path.is_dir() && contains_files(&path)?) {
            return Ok(true);
        }
    }
    Ok(false)
}
