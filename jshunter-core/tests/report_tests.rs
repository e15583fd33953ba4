// Tests for the result writer and markdown reports

use jshunter_core::report::{
    MarkdownBuffer, ReportWriter, ResultWriter, format_result_line, markdown_anchor,
    remove_empty_route_folders,
};
use jshunter_scanner::ScanResult;
use jshunter_scanner::result::{BrokenRouteResult, EndpointProbeResult, SensitiveFindingResult};
use std::fs;
use tempfile::TempDir;

fn endpoint(url: &str, status: u16) -> ScanResult {
    ScanResult::EndpointProbe(EndpointProbeResult {
        url: url.to_string(),
        path: "/api/user".to_string(),
        method: "GET".to_string(),
        status_code: status,
        content_length: 42,
        response_headers: vec![("content-type".to_string(), "application/json".to_string())],
        body_excerpt: r#"{"id":1,"role":"admin"}"#.to_string(),
    })
}

fn broken_route(dir: &TempDir, n: u32) -> ScanResult {
    ScanResult::BrokenRoute(BrokenRouteResult {
        parent_url: "http://example.com:8080/".to_string(),
        route_url: format!("http://example.com:8080/#/admin{}", n),
        observed_href: format!("http://example.com:8080/#/admin{}", n),
        screenshot: dir
            .path()
            .join("vue_reports/example.com_8080/resources")
            .join(format!("{}.png", n)),
    })
}

// ============================================================================
// Markdown Buffer Tests
// ============================================================================

#[test]
fn test_markdown_anchor() {
    assert_eq!(markdown_anchor("Hello World"), "hello-world");
    assert_eq!(markdown_anchor("http://a.com/x [GET]"), "httpacomx-get");
}

#[test]
fn test_markdown_buffer_render() {
    let mut buffer = MarkdownBuffer::new("http://a.com/");
    assert!(buffer.is_empty());

    buffer.add_item("First", "body one");
    buffer.add_item("Second", "body two");
    let rendered = buffer.render();

    assert!(rendered.starts_with("## http://a.com/\n### TABLE_OF_CONTENT\n"));
    assert!(rendered.contains("- [First](#first)\n- [Second](#second)\n"));
    assert!(rendered.contains("#### Second\nbody two"));
}

// ============================================================================
// Console Line Tests
// ============================================================================

#[test]
fn test_format_result_line() {
    colored::control::set_override(false);

    assert_eq!(
        format_result_line(&endpoint("http://a.com/api/user", 200)),
        "[ENDPOINT] http://a.com/api/user [GET] [200] [42]"
    );
    let secret = ScanResult::SensitiveFinding(SensitiveFindingResult {
        url: "http://a.com/app.js".to_string(),
        message: "Alibaba Cloud: LTAI5tAbCdEfGhIjKlMn".to_string(),
    });
    assert_eq!(
        format_result_line(&secret),
        "[SENSITIVE] http://a.com/app.js [Alibaba Cloud: LTAI5tAbCdEfGhIjKlMn]"
    );
}

// ============================================================================
// Report Writer Tests
// ============================================================================

#[test]
fn test_writer_route_report() {
    let dir = TempDir::new().unwrap();
    let resources = dir.path().join("vue_reports/example.com_8080/resources");
    fs::create_dir_all(&resources).unwrap();
    fs::write(resources.join("1.png"), b"png").unwrap();

    let mut writer = ReportWriter::new(dir.path(), None).unwrap();
    writer.write(&broken_route(&dir, 1)).unwrap();
    let reports = writer.close().unwrap();

    let report = dir.path().join("vue_reports/example.com_8080/report.md");
    assert_eq!(reports, vec![report.clone()]);

    let content = fs::read_to_string(report).unwrap();
    assert!(content.starts_with("## http://example.com:8080/"));
    assert!(content.contains("![](resources/1.png)"));
}

#[test]
fn test_writer_endpoint_report() {
    let dir = TempDir::new().unwrap();
    let mut writer = ReportWriter::new(dir.path(), None).unwrap();
    writer.write(&endpoint("http://a.com/api/user", 403)).unwrap();

    let reports = writer.close().unwrap();
    assert_eq!(reports.len(), 1);
    assert!(reports[0].starts_with(dir.path().join("endpoint_reports")));

    let content = fs::read_to_string(&reports[0]).unwrap();
    assert!(content.contains("## Endpoint Req Report"));
    assert!(content.contains("#### http://a.com/api/user [GET] [403]"));
}

#[test]
fn test_writer_endpoint_report_dumps_response() {
    let dir = TempDir::new().unwrap();
    let mut writer = ReportWriter::new(dir.path(), None).unwrap();
    writer.write(&endpoint("http://a.com/api/user", 200)).unwrap();

    let reports = writer.close().unwrap();
    let content = fs::read_to_string(&reports[0]).unwrap();
    assert!(content.contains("````\nHTTP 200\ncontent-type: application/json\n"));
    assert!(content.contains(r#"{"id":1,"role":"admin"}"#));
}

#[test]
fn test_writer_nothing_to_report() {
    let dir = TempDir::new().unwrap();
    let mut writer = ReportWriter::new(dir.path(), None).unwrap();
    assert!(writer.close().unwrap().is_empty());
    assert!(!dir.path().join("endpoint_reports").exists());
}

#[test]
fn test_writer_jsonl_output() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("out/results.jsonl");

    let mut writer = ReportWriter::new(dir.path(), Some(&output)).unwrap();
    writer.write(&endpoint("http://a.com/api/a", 200)).unwrap();
    writer.write(&endpoint("http://a.com/api/b", 500)).unwrap();
    writer.close().unwrap();

    let content = fs::read_to_string(output).unwrap();
    let lines: Vec<serde_json::Value> = content
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["type"], "endpoint_probe");
    assert_eq!(lines[1]["status_code"], 500);
}

#[test]
fn test_empty_route_folders_removed_on_close() {
    let dir = TempDir::new().unwrap();
    let guarded = dir.path().join("vue_reports/guarded.com/resources");
    fs::create_dir_all(&guarded).unwrap();

    let mut writer = ReportWriter::new(dir.path(), None).unwrap();
    writer.close().unwrap();

    assert!(!dir.path().join("vue_reports/guarded.com").exists());
}

#[test]
fn test_remove_empty_route_folders_keeps_findings() {
    let dir = TempDir::new().unwrap();
    let vue_reports = dir.path().join("vue_reports");
    fs::create_dir_all(vue_reports.join("empty.com/resources")).unwrap();
    fs::create_dir_all(vue_reports.join("found.com/resources")).unwrap();
    fs::write(vue_reports.join("found.com/resources/1.png"), b"png").unwrap();

    assert_eq!(remove_empty_route_folders(&vue_reports).unwrap(), 1);
    assert!(vue_reports.join("found.com/resources/1.png").exists());
    assert!(!vue_reports.join("empty.com").exists());
}
