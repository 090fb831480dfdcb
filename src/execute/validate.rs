//! Multi-stage response verification.
//!
//! Checks run in a fixed order — headers, cookies, content — and the first
//! failure wins. On full success the content stage has already registered
//! every extracted value into the data store.

use cookie::Cookie;
use reqwest::header::{HeaderMap, HeaderName, CONTENT_TYPE, SET_COOKIE};

use crate::config::{ContentSpec, ExtractKind, Response, DEFAULT_CONTENT_LIMIT};
use crate::error::ValidationError;
use crate::store::{extract_json, extract_regex, extract_xml, DataStore};

/// Verifies one HTTP response against its classified spec and feeds
/// extracted values into `store`.
///
/// # Errors
///
/// Returns the first failing check as a [`ValidationError`].
pub(crate) async fn verify(
    response: reqwest::Response,
    spec: &Response,
    store: &DataStore,
) -> Result<(), ValidationError> {
    verify_headers(response.headers(), spec)?;
    verify_cookies(response.headers(), spec)?;

    let declared = response.content_length();
    let media_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_owned();
    let body = read_limited(response, declared, &spec.content).await?;

    verify_content(&media_type, declared, &body, &spec.content, store)
}

/// Reads the body up to min(declared Content-Length, spec max-size). A
/// deliberate bound: a misbehaving server cannot make the engine buffer an
/// unbounded response.
async fn read_limited(
    mut response: reqwest::Response,
    declared: Option<u64>,
    content: &ContentSpec,
) -> Result<Vec<u8>, ValidationError> {
    let max_size = if content.max_size == 0 {
        DEFAULT_CONTENT_LIMIT
    } else {
        content.max_size
    };
    let cap = declared.map_or(max_size, |length| {
        usize::try_from(length).unwrap_or(usize::MAX).min(max_size)
    });

    let mut body = Vec::with_capacity(cap.min(DEFAULT_CONTENT_LIMIT));
    while body.len() < cap {
        let chunk = response
            .chunk()
            .await
            .map_err(|err| ValidationError::BodyRead { source: err })?;
        let Some(chunk) = chunk else { break };
        let room = cap.saturating_sub(body.len());
        body.extend(chunk.iter().take(room).copied());
    }
    Ok(body)
}

pub(crate) fn verify_headers(
    headers: &HeaderMap,
    spec: &Response,
) -> Result<(), ValidationError> {
    for rule in &spec.headers {
        let name =
            HeaderName::from_bytes(rule.name.as_bytes()).map_err(|_err| {
                ValidationError::HeaderNotFound {
                    name: rule.name.clone(),
                }
            })?;
        let mut seen_any = false;
        let mut matched = false;
        for value in headers.get_all(&name) {
            seen_any = true;
            if value.to_str().is_ok_and(|v| v == rule.value.as_str()) {
                matched = true;
                break;
            }
        }
        if !seen_any {
            return Err(ValidationError::HeaderNotFound {
                name: rule.name.clone(),
            });
        }
        if !matched {
            return Err(ValidationError::HeaderValueMismatch {
                name: rule.name.clone(),
                expected: rule.value.clone(),
            });
        }
    }
    Ok(())
}

pub(crate) fn verify_cookies(
    headers: &HeaderMap,
    spec: &Response,
) -> Result<(), ValidationError> {
    if spec.cookies.is_empty() {
        return Ok(());
    }

    // Normalize every Set-Cookie the server sent; unparseable ones are
    // skipped, matching how permissive clients treat them.
    let mut actual = Vec::new();
    for value in headers.get_all(SET_COOKIE) {
        if let Ok(raw) = value.to_str() {
            if let Ok(parsed) = Cookie::parse(raw) {
                actual.push(parsed.to_string());
            }
        }
    }

    for rule in &spec.cookies {
        let expected =
            Cookie::parse(rule.value.as_str()).map_err(|err| ValidationError::CookieSyntax {
                value: rule.value.clone(),
                source: err,
            })?;
        let serialized = expected.to_string();
        if !actual.iter().any(|candidate| *candidate == serialized) {
            return Err(ValidationError::CookieNotFound { value: serialized });
        }
    }
    Ok(())
}

pub(crate) fn verify_content(
    media_type_header: &str,
    declared: Option<u64>,
    body: &[u8],
    content: &ContentSpec,
    store: &DataStore,
) -> Result<(), ValidationError> {
    if !content.expected {
        if !body.is_empty() {
            return Err(ValidationError::UnexpectedContent { read: body.len() });
        }
        return Ok(());
    }

    match declared {
        Some(0) if !body.is_empty() => {
            return Err(ValidationError::ContentLengthMismatch {
                declared: 0,
                read: body.len(),
            });
        }
        Some(length) if length > 0 && body.is_empty() => {
            return Err(ValidationError::ContentLengthMismatch {
                declared: length,
                read: 0,
            });
        }
        Some(_) | None => {}
    }

    let actual = normalize_media_type(media_type_header);
    let expected = normalize_media_type(&content.media_type);
    if actual != expected {
        return Err(ValidationError::ContentTypeMismatch { expected, actual });
    }

    // Guards against a mislabeling server: the bytes themselves must agree
    // with the declared type.
    let detected = sniff_media_type(body);
    if !sniff_matches(detected, &actual) {
        return Err(ValidationError::ContentSniffMismatch {
            declared: actual,
            detected: detected.to_owned(),
        });
    }

    for pattern in &content.contains {
        let matcher = regex::bytes::Regex::new(pattern).map_err(|err| {
            ValidationError::ContainsPattern {
                pattern: pattern.clone(),
                source: err,
            }
        })?;
        if !matcher.is_match(body) {
            return Err(ValidationError::ContentPatternNotFound {
                pattern: pattern.clone(),
            });
        }
    }

    for rule in &content.extract {
        let value = match rule.kind {
            ExtractKind::Json => extract_json(&rule.path, body),
            ExtractKind::Xml => extract_xml(&rule.path, body),
            ExtractKind::Text => extract_regex(&rule.path, body),
        }?;
        store.add_replacement(&rule.name, &value)?;
    }

    Ok(())
}

/// Strips parameters (`; charset=...`) and case from a media type.
pub(crate) fn normalize_media_type(raw: &str) -> String {
    raw.split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Sniffs the body into one of the coarse media types this engine verifies.
/// Independent of any header the server sent.
pub(crate) fn sniff_media_type(body: &[u8]) -> &'static str {
    let trimmed = body.trim_ascii_start();
    if trimmed.is_empty() {
        return "text/plain";
    }
    match trimmed.first() {
        Some(b'{' | b'[') if serde_json::from_slice::<serde_json::Value>(trimmed).is_ok() => {
            return "application/json";
        }
        Some(b'<') => {
            let lower = ascii_prefix_lower(trimmed, 16);
            if lower.starts_with("<!doctype html") || lower.starts_with("<html") {
                return "text/html";
            }
            return "text/xml";
        }
        Some(_) | None => {}
    }
    if std::str::from_utf8(trimmed).is_ok() && !trimmed.contains(&0) {
        "text/plain"
    } else {
        "application/octet-stream"
    }
}

/// Whether the sniffed type is compatible with the declared one. A family
/// of aliases exists on the declared side (application/xml vs text/xml,
/// `+json` suffixes), so this is looser than string equality.
pub(crate) fn sniff_matches(detected: &str, declared: &str) -> bool {
    if detected == declared {
        return true;
    }
    match detected {
        "application/json" => declared.ends_with("+json") || declared == "text/json",
        "text/xml" => declared == "application/xml" || declared.ends_with("+xml"),
        "text/plain" => declared.starts_with("text/"),
        _ => false,
    }
}

fn ascii_prefix_lower(body: &[u8], limit: usize) -> String {
    body.iter()
        .take(limit)
        .map(|byte| byte.to_ascii_lowercase() as char)
        .collect()
}
