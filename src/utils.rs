use regex::Regex;
use std::sync::LazyLock;

/// Matches path wildcards such as `/:id` or `/*rest`.
static WILDCARD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/(?::|\*)([a-zA-Z0-9_]+)").expect("wildcard regex is valid"));

/// Lookup key of a media type identifier: lowercase, without the `+suffix`
/// of the subtype and with parameters sorted.
///
/// `application/vnd.Bottle+json; charset=utf-8` becomes
/// `application/vnd.bottle; charset=utf-8`.
pub fn canonical_identifier(identifier: &str) -> String {
    let mut parts = identifier.split(';');
    let base = parts.next().unwrap_or_default().trim().to_lowercase();
    let base = match base.find('+') {
        Some(i) => base[..i].to_string(),
        None => base,
    };
    let mut params: Vec<(String, String)> = parts
        .filter_map(|p| {
            let (key, value) = p.split_once('=')?;
            let key = key.trim().to_lowercase();
            let value = value.trim().trim_matches('"').to_string();
            (!key.is_empty()).then_some((key, value))
        })
        .collect();
    params.sort();
    let mut canonical = base;
    for (key, value) in params {
        canonical.push_str("; ");
        canonical.push_str(&key);
        canonical.push('=');
        canonical.push_str(&value);
    }
    canonical
}

/// The canonical identifier of `identifier` with parameter `key` set to `value`.
pub fn with_param(identifier: &str, key: &str, value: &str) -> String {
    let canonical = canonical_identifier(identifier);
    let base = canonical.split(';').next().unwrap_or_default();
    let prefix = format!("{key}=");
    let mut params: Vec<&str> = canonical
        .split(';')
        .skip(1)
        .map(str::trim)
        .filter(|p| !p.starts_with(prefix.as_str()))
        .collect();
    let param = format!("{key}={value}");
    params.push(&param);
    params.sort_unstable();
    let mut result = base.to_string();
    for param in params {
        result.push_str("; ");
        result.push_str(param);
    }
    result
}

/// The canonical identifier of `identifier` with the `view` parameter set.
pub fn with_view_param(identifier: &str, view: &str) -> String {
    with_param(identifier, "view", view)
}

/// Identifier of the collection of `identifier`: a `type=collection`
/// parameter is added unless a `type` parameter is already present.
pub fn collection_identifier(identifier: &str) -> String {
    let canonical = canonical_identifier(identifier);
    let typed = canonical
        .split(';')
        .skip(1)
        .any(|p| p.trim().starts_with("type="));
    if typed {
        canonical
    } else {
        with_param(&canonical, "type", "collection")
    }
}

/// Derives a type name from a media type identifier:
/// `application/vnd.goa.example.bottle` gives `GoaExampleBottle`.
pub fn type_name_from_identifier(identifier: &str) -> String {
    let canonical = canonical_identifier(identifier);
    let base = canonical.split(';').next().unwrap_or_default();
    let subtype = base.rsplit('/').next().unwrap_or(base);
    let subtype = subtype.strip_prefix("vnd.").unwrap_or(subtype);
    title_case(subtype)
}

/// `tiny-view` gives `TinyView`.
pub fn title_case(text: &str) -> String {
    text.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

/// Normalizes a URL path: leading slash, no empty or `.` segments, `..`
/// resolved, no trailing slash.
pub fn clean_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    format!("/{}", segments.join("/"))
}

pub fn join_paths(base: &str, path: &str) -> String {
    clean_path(&format!("{base}/{path}"))
}

/// Names of the wildcards appearing in `path`, in order.
pub fn extract_wildcards(path: &str) -> Vec<String> {
    WILDCARD
        .captures_iter(path)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .collect()
}
