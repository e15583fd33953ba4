// Tests for scan options parsing and validation

use jshunter_core::{AiSource, CoreError, ScanOptions, ScanType};
use std::path::PathBuf;
use std::time::Duration;

fn options_with_target() -> ScanOptions {
    ScanOptions {
        targets: vec!["http://example.com".to_string()],
        ..ScanOptions::default()
    }
}

#[test]
fn test_scan_type_from_str() {
    assert_eq!(ScanType::from_str("endpoints"), Some(ScanType::Endpoints));
    assert_eq!(ScanType::from_str("ROUTES"), Some(ScanType::Routes));
    assert_eq!(ScanType::from_str("both"), Some(ScanType::Both));
    assert_eq!(ScanType::from_str("everything"), None);
}

#[test]
fn test_scan_type_includes() {
    assert!(ScanType::Both.includes_endpoints());
    assert!(ScanType::Both.includes_routes());
    assert!(ScanType::Endpoints.includes_endpoints());
    assert!(!ScanType::Endpoints.includes_routes());
    assert!(!ScanType::Routes.includes_endpoints());
}

#[test]
fn test_ai_source_from_str() {
    assert_eq!(AiSource::from_str("gemini"), Some(Some(AiSource::Gemini)));
    assert_eq!(AiSource::from_str("none"), Some(None));
    assert_eq!(AiSource::from_str("gpt"), None);
}

#[test]
fn test_defaults() {
    let options = ScanOptions::default();
    assert_eq!(options.scan_type, ScanType::Both);
    assert_eq!(options.threads, 30);
    assert_eq!(options.tabs, 10);
    assert_eq!(options.timeout_secs, 10);
    assert_eq!(options.ai_timeout_secs, 120);
    assert_eq!(options.report_dir, PathBuf::from("reports"));
    assert!(!options.headless);
    assert!(options.ai.is_none());
}

#[test]
fn test_validate_requires_target() {
    let err = ScanOptions::default().validate().unwrap_err();
    assert!(matches!(err, CoreError::InvalidOptions(_)));
}

#[test]
fn test_validate_rejects_empty_pools() {
    let options = ScanOptions {
        threads: 0,
        ..options_with_target()
    };
    assert!(options.validate().is_err());

    let options = ScanOptions {
        tabs: 0,
        ..options_with_target()
    };
    assert!(options.validate().is_err());

    assert!(options_with_target().validate().is_ok());
}

#[test]
fn test_scan_settings_carry_options() {
    let options = ScanOptions {
        threads: 5,
        tabs: 2,
        timeout_secs: 3,
        proxy: Some("http://127.0.0.1:8080".to_string()),
        ai_timeout_secs: 30,
        report_dir: PathBuf::from("/tmp/out"),
        ..options_with_target()
    };
    let settings = options.scan_settings();

    assert_eq!(settings.threads, 5);
    assert_eq!(settings.tabs, 2);
    assert_eq!(settings.http.timeout_secs, 3);
    assert_eq!(settings.http.proxy.as_deref(), Some("http://127.0.0.1:8080"));
    assert_eq!(settings.ai_timeout, Duration::from_secs(30));
    assert_eq!(settings.report_dir, PathBuf::from("/tmp/out"));
    assert_eq!(settings.route_timeout, Duration::from_secs(20));
}
