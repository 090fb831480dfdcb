use std::io::Write;
use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderValue};

use super::validate::{
    normalize_media_type, sniff_matches, sniff_media_type, verify_content, verify_cookies,
    verify_headers,
};
use super::*;
use crate::config::{ContentSpec, CookieRule, ExtractRule, HeaderRule, TlsConfig};
use crate::error::ValidationError;
use crate::metrics::NoopSink;

fn request_with_responses(codes: &[u16]) -> Request {
    Request {
        name: "probe".to_owned(),
        responses: codes
            .iter()
            .map(|code| Response {
                name: format!("r{}", code),
                status_code: *code,
                ..Response::default()
            })
            .collect(),
        ..Request::default()
    }
}

#[test]
fn classify_prefers_declared_specs() {
    let request = request_with_responses(&[200, 500]);
    let matched = classify(&request, 500);
    assert_eq!(matched.spec().name, "r500");
    assert!(matches!(matched, Matched::Declared(_)));
}

#[test]
fn classify_synthesizes_unknown_once() -> Result<(), String> {
    let request = request_with_responses(&[200, 500]);
    let first = classify(&request, 501);
    let second = classify(&request, 501);
    assert_eq!(first.spec().status_code, 501);
    assert_eq!(second.spec().name, crate::config::UNKNOWN_RESPONSE_NAME);

    let unknown = request
        .unknown
        .lock()
        .map_err(|_err| "poisoned lock".to_owned())?;
    assert_eq!(unknown.len(), 1);
    Ok(())
}

#[test]
fn classify_dedups_under_concurrency() -> Result<(), String> {
    let request = Arc::new(request_with_responses(&[200, 500]));
    let mut handles = Vec::new();
    for _ in 0..8 {
        let request = Arc::clone(&request);
        handles.push(std::thread::spawn(move || {
            for _ in 0..100 {
                let matched = classify(&request, 501);
                assert_eq!(matched.spec().status_code, 501);
            }
        }));
    }
    for handle in handles {
        handle.join().map_err(|_err| "worker panicked".to_owned())?;
    }
    let unknown = request
        .unknown
        .lock()
        .map_err(|_err| "poisoned lock".to_owned())?;
    assert_eq!(unknown.len(), 1);
    Ok(())
}

fn executor_for(scenario: Scenario) -> Result<(RestExecutor, Arc<DataStore>), String> {
    let store = Arc::new(DataStore::new());
    let executor = RestExecutor::new(
        Arc::new(scenario),
        Arc::clone(&store),
        Arc::new(NoopSink),
    )
    .map_err(|err| err.to_string())?;
    Ok((executor, store))
}

fn template_request() -> Request {
    Request {
        name: "create".to_owned(),
        method: "POST".to_owned(),
        url: "http://%%HOST%%/items".to_owned(),
        content: r#"{"id":"%%ID%%"}"#.to_owned(),
        content_type: "application/json".to_owned(),
        headers: vec![HeaderRule {
            name: "X-Trace".to_owned(),
            value: "trace-%%ID%%".to_owned(),
        }],
        cookies: vec![CookieRule {
            value: "session=%%ID%%".to_owned(),
        }],
        ..Request::default()
    }
}

#[test]
fn build_request_resolves_every_element() -> Result<(), String> {
    let scenario = Scenario {
        replacements: vec![
            crate::config::ReplaceRule {
                pattern: "%%HOST%%".to_owned(),
                value: "api.example.test".to_owned(),
            },
            crate::config::ReplaceRule {
                pattern: "%%ID%%".to_owned(),
                value: "42".to_owned(),
            },
        ],
        ..Scenario::default()
    };
    let (executor, _store) = executor_for(scenario)?;
    let client = reqwest::Client::new();
    let run = RunContext::new();

    let built = executor
        .build_request(&client, &run, &template_request())
        .map_err(|err| err.to_string())?;

    assert_eq!(built.method().as_str(), "POST");
    assert_eq!(built.url().as_str(), "http://api.example.test/items");
    assert_eq!(
        built
            .headers()
            .get("X-Trace")
            .and_then(|value| value.to_str().ok()),
        Some("trace-42")
    );
    assert_eq!(
        built
            .headers()
            .get(COOKIE)
            .and_then(|value| value.to_str().ok()),
        Some("session=42")
    );
    assert_eq!(
        built
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok()),
        Some("application/json")
    );
    let body = built
        .body()
        .and_then(reqwest::Body::as_bytes)
        .ok_or("missing body")?;
    assert_eq!(body, br#"{"id":"42"}"#);
    Ok(())
}

#[test]
fn build_request_rejects_bad_method() -> Result<(), String> {
    let (executor, _store) = executor_for(Scenario::default())?;
    let client = reqwest::Client::new();
    let run = RunContext::new();
    let request = Request {
        method: "NOT A METHOD".to_owned(),
        url: "http://localhost/".to_owned(),
        ..Request::default()
    };
    let result = executor.build_request(&client, &run, &request);
    assert!(matches!(result, Err(ExecuteError::Method { .. })));
    Ok(())
}

#[test]
fn build_request_rejects_bad_cookie() -> Result<(), String> {
    let (executor, _store) = executor_for(Scenario::default())?;
    let client = reqwest::Client::new();
    let run = RunContext::new();
    let request = Request {
        method: "GET".to_owned(),
        url: "http://localhost/".to_owned(),
        cookies: vec![CookieRule {
            value: "no-equals-sign".to_owned(),
        }],
        ..Request::default()
    };
    let result = executor.build_request(&client, &run, &request);
    assert!(matches!(result, Err(ExecuteError::Cookie { .. })));
    Ok(())
}

#[test]
fn seed_replacements_with_bad_pattern_fail_construction() {
    let scenario = Scenario {
        replacements: vec![crate::config::ReplaceRule {
            pattern: "(open".to_owned(),
            value: "x".to_owned(),
        }],
        ..Scenario::default()
    };
    let result = RestExecutor::new(
        Arc::new(scenario),
        Arc::new(DataStore::new()),
        Arc::new(NoopSink),
    );
    assert!(result.is_err());
}

#[test]
fn tls_missing_files_surface_certificate_error() {
    let tls = TlsConfig {
        cert_path: "/does/not/exist.pem".to_owned(),
        key_path: "/does/not/exist.key".to_owned(),
        ..TlsConfig::default()
    };
    let result = super::tls::build_client(&tls);
    assert!(matches!(result, Err(ExecuteError::CertificateRead { .. })));
}

#[test]
fn tls_garbage_material_surfaces_certificate_error() -> Result<(), String> {
    let mut cert = tempfile::NamedTempFile::new().map_err(|err| err.to_string())?;
    cert.write_all(b"not a pem").map_err(|err| err.to_string())?;
    let mut key = tempfile::NamedTempFile::new().map_err(|err| err.to_string())?;
    key.write_all(b"not a key").map_err(|err| err.to_string())?;

    let tls = TlsConfig {
        cert_path: cert.path().to_string_lossy().into_owned(),
        key_path: key.path().to_string_lossy().into_owned(),
        ..TlsConfig::default()
    };
    let result = super::tls::build_client(&tls);
    assert!(matches!(
        result,
        Err(ExecuteError::CertificateInvalid { .. })
    ));
    Ok(())
}

#[test]
fn tls_absent_material_means_default_transport() -> Result<(), String> {
    super::tls::build_client(&TlsConfig::default()).map_err(|err| err.to_string())?;
    Ok(())
}

fn headers_of(pairs: &[(&str, &str)]) -> Result<HeaderMap, String> {
    let mut map = HeaderMap::new();
    for (name, value) in pairs {
        map.append(
            reqwest::header::HeaderName::from_bytes(name.as_bytes())
                .map_err(|err| err.to_string())?,
            HeaderValue::from_str(value).map_err(|err| err.to_string())?,
        );
    }
    Ok(map)
}

fn spec_expecting_header(name: &str, value: &str) -> Response {
    Response {
        headers: vec![HeaderRule {
            name: name.to_owned(),
            value: value.to_owned(),
        }],
        ..Response::default()
    }
}

#[test]
fn header_check_accepts_any_matching_value() -> Result<(), String> {
    let headers = headers_of(&[("x-mode", "a"), ("x-mode", "b")])?;
    let spec = spec_expecting_header("X-Mode", "b");
    verify_headers(&headers, &spec).map_err(|err| err.to_string())?;
    Ok(())
}

#[test]
fn header_check_distinguishes_absent_from_mismatch() -> Result<(), String> {
    let headers = headers_of(&[("x-mode", "a")])?;
    assert!(matches!(
        verify_headers(&headers, &spec_expecting_header("X-Other", "a")),
        Err(ValidationError::HeaderNotFound { .. })
    ));
    assert!(matches!(
        verify_headers(&headers, &spec_expecting_header("X-Mode", "z")),
        Err(ValidationError::HeaderValueMismatch { .. })
    ));
    Ok(())
}

fn spec_expecting_cookie(value: &str) -> Response {
    Response {
        cookies: vec![CookieRule {
            value: value.to_owned(),
        }],
        ..Response::default()
    }
}

#[test]
fn cookie_check_matches_serialized_form() -> Result<(), String> {
    let headers = headers_of(&[("set-cookie", "session=abc; Path=/")])?;
    verify_cookies(&headers, &spec_expecting_cookie("session=abc; Path=/"))
        .map_err(|err| err.to_string())?;
    assert!(matches!(
        verify_cookies(&headers, &spec_expecting_cookie("session=zzz")),
        Err(ValidationError::CookieNotFound { .. })
    ));
    Ok(())
}

#[test]
fn cookie_check_rejects_malformed_expectation() -> Result<(), String> {
    let headers = headers_of(&[("set-cookie", "session=abc")])?;
    assert!(matches!(
        verify_cookies(&headers, &spec_expecting_cookie("definitely not a cookie")),
        Err(ValidationError::CookieSyntax { .. })
    ));
    Ok(())
}

fn json_content_spec() -> ContentSpec {
    ContentSpec {
        expected: true,
        media_type: "application/json".to_owned(),
        max_size: 4096,
        ..ContentSpec::default()
    }
}

#[test]
fn content_unexpected_bytes_fail() {
    let store = DataStore::new();
    let spec = ContentSpec::default();
    let result = verify_content("text/plain", Some(5), b"hello", &spec, &store);
    assert!(matches!(
        result,
        Err(ValidationError::UnexpectedContent { read: 5 })
    ));
}

#[test]
fn content_empty_body_with_no_expectation_passes() -> Result<(), String> {
    let store = DataStore::new();
    verify_content("", None, b"", &ContentSpec::default(), &store)
        .map_err(|err| err.to_string())?;
    Ok(())
}

#[test]
fn content_length_mismatches_fail() {
    let store = DataStore::new();
    let spec = json_content_spec();
    assert!(matches!(
        verify_content("application/json", Some(0), br#"{"a":1}"#, &spec, &store),
        Err(ValidationError::ContentLengthMismatch { .. })
    ));
    assert!(matches!(
        verify_content("application/json", Some(10), b"", &spec, &store),
        Err(ValidationError::ContentLengthMismatch { .. })
    ));
}

#[test]
fn content_type_compares_without_parameters() -> Result<(), String> {
    let store = DataStore::new();
    let spec = json_content_spec();
    verify_content(
        "application/json; charset=utf-8",
        Some(7),
        br#"{"a":1}"#,
        &spec,
        &store,
    )
    .map_err(|err| err.to_string())?;

    assert!(matches!(
        verify_content("text/html", Some(7), br#"{"a":1}"#, &spec, &store),
        Err(ValidationError::ContentTypeMismatch { .. })
    ));
    Ok(())
}

#[test]
fn content_sniff_catches_mislabeled_body() {
    let store = DataStore::new();
    let spec = json_content_spec();
    let result = verify_content(
        "application/json",
        Some(9),
        b"plain txt",
        &spec,
        &store,
    );
    assert!(matches!(
        result,
        Err(ValidationError::ContentSniffMismatch { .. })
    ));
}

#[test]
fn content_contains_patterns_must_all_match() {
    let store = DataStore::new();
    let mut spec = json_content_spec();
    spec.contains = vec!["\"a\":\\d+".to_owned(), "zebra".to_owned()];
    let result = verify_content("application/json", Some(7), br#"{"a":1}"#, &spec, &store);
    assert!(matches!(
        result,
        Err(ValidationError::ContentPatternNotFound { .. })
    ));
}

#[test]
fn content_extraction_registers_into_store() -> Result<(), String> {
    let store = DataStore::new();
    let mut spec = json_content_spec();
    spec.extract = vec![ExtractRule {
        kind: crate::config::ExtractKind::Json,
        path: "goo.moo.boo".to_owned(),
        name: "%%X%%".to_owned(),
    }];
    let body = br#"{"foo":"barhoo","goo":{"moo":{"boo":"doo"}}}"#;
    verify_content(
        "application/json",
        Some(body.len() as u64),
        body,
        &spec,
        &store,
    )
    .map_err(|err| err.to_string())?;

    assert_eq!(store.lookup("%%X%%"), Some("doo".to_owned()));
    assert_eq!(store.replace("/next/%%X%%"), "/next/doo");
    Ok(())
}

#[test]
fn media_type_normalization() {
    assert_eq!(
        normalize_media_type("Application/JSON; charset=utf-8"),
        "application/json"
    );
    assert_eq!(normalize_media_type(" text/html "), "text/html");
    assert_eq!(normalize_media_type(""), "");
}

#[test]
fn sniffer_recognizes_common_shapes() {
    assert_eq!(sniff_media_type(br#"{"a":1}"#), "application/json");
    assert_eq!(sniff_media_type(b"[1,2,3]"), "application/json");
    assert_eq!(sniff_media_type(b"<?xml version=\"1.0\"?><a/>"), "text/xml");
    assert_eq!(sniff_media_type(b"<!DOCTYPE html><html></html>"), "text/html");
    assert_eq!(sniff_media_type(b"plain words"), "text/plain");
    assert_eq!(
        sniff_media_type(&[0x00, 0xff, 0x12, 0x00]),
        "application/octet-stream"
    );
    assert_eq!(sniff_media_type(b""), "text/plain");
}

#[test]
fn sniff_compatibility_aliases() {
    assert!(sniff_matches("application/json", "application/json"));
    assert!(sniff_matches("application/json", "application/problem+json"));
    assert!(sniff_matches("text/xml", "application/xml"));
    assert!(sniff_matches("text/plain", "text/csv"));
    assert!(!sniff_matches("text/plain", "application/json"));
    assert!(!sniff_matches("application/octet-stream", "text/plain"));
}
