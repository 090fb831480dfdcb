//! Single-scalar extractors. Pure functions; the caller registers results
//! into the store.

use regex::Regex;
use serde_json::Value;

use crate::error::StoreError;

fn not_found(path: &str) -> StoreError {
    StoreError::NotFound {
        path: path.to_owned(),
    }
}

fn parse_error(path: &str, detail: String) -> StoreError {
    StoreError::Parse {
        path: path.to_owned(),
        detail,
    }
}

fn utf8_text(body: &[u8]) -> Result<&str, StoreError> {
    std::str::from_utf8(body).map_err(|err| StoreError::Read {
        detail: err.to_string(),
    })
}

/// Extracts the scalar at a dot path (`goo.moo.boo`; numeric segments index
/// arrays) from a JSON body.
///
/// # Errors
///
/// [`StoreError::Parse`] for a malformed document or empty path,
/// [`StoreError::NotFound`] when the path resolves to nothing.
pub fn extract_json(path: &str, body: &[u8]) -> Result<String, StoreError> {
    if path.is_empty() {
        return Err(parse_error(path, "empty path".to_owned()));
    }
    let document: Value =
        serde_json::from_slice(body).map_err(|err| parse_error(path, err.to_string()))?;

    let mut current = &document;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment).ok_or_else(|| not_found(path))?,
            Value::Array(items) => {
                let index: usize = segment.parse().map_err(|_err| not_found(path))?;
                items.get(index).ok_or_else(|| not_found(path))?
            }
            Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => {
                return Err(not_found(path));
            }
        };
    }

    match current {
        Value::String(text) => Ok(text.clone()),
        Value::Null => Err(not_found(path)),
        Value::Bool(_) | Value::Number(_) | Value::Array(_) | Value::Object(_) => {
            Ok(current.to_string())
        }
    }
}

fn element_matches(node: roxmltree::Node<'_, '_>, name: &str) -> bool {
    node.is_element() && node.tag_name().name() == name
}

fn walk_children<'doc>(
    node: roxmltree::Node<'doc, 'doc>,
    segments: &[&str],
) -> Option<roxmltree::Node<'doc, 'doc>> {
    let Some((head, rest)) = segments.split_first() else {
        return Some(node);
    };
    node.children()
        .filter(|child| element_matches(*child, head))
        .find_map(|child| walk_children(child, rest))
}

/// Extracts the inner text of the first element matching a slash path
/// (`rsp/token`; a leading `//` anchors the first segment at any depth).
///
/// # Errors
///
/// [`StoreError::Read`] for non-UTF-8 input, [`StoreError::Parse`] for a
/// malformed document or empty path, [`StoreError::NotFound`] when no
/// element matches.
pub fn extract_xml(path: &str, body: &[u8]) -> Result<String, StoreError> {
    let text = utf8_text(body)?;
    let document =
        roxmltree::Document::parse(text).map_err(|err| parse_error(path, err.to_string()))?;

    let segments: Vec<&str> = path.split('/').filter(|part| !part.is_empty()).collect();
    let Some((first, rest)) = segments.split_first() else {
        return Err(parse_error(path, "empty path".to_owned()));
    };

    let found = document
        .descendants()
        .filter(|node| element_matches(*node, first))
        .find_map(|node| walk_children(node, rest))
        .ok_or_else(|| not_found(path))?;

    let mut value = String::new();
    for piece in found.descendants().filter_map(|node| node.text()) {
        value.push_str(piece);
    }
    Ok(value)
}

/// Extracts the first match of a regular expression from a text body.
///
/// # Errors
///
/// [`StoreError::Parse`] for an invalid expression, [`StoreError::Read`]
/// for non-UTF-8 input, [`StoreError::NotFound`] when nothing matches.
pub fn extract_regex(pattern: &str, body: &[u8]) -> Result<String, StoreError> {
    let matcher = Regex::new(pattern).map_err(|err| parse_error(pattern, err.to_string()))?;
    let text = utf8_text(body)?;
    matcher
        .find(text)
        .map(|found| found.as_str().to_owned())
        .ok_or_else(|| not_found(pattern))
}
