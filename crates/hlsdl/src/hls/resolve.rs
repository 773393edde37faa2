// URL resolution for playlist entries: segment and variant URIs are resolved against
// the URL the playlist was actually served from.

use tracing::warn;
use url::Url;

use crate::DownloadError;

/// Returns true when `reference` already carries an HTTP(S) scheme.
pub fn is_absolute(reference: &str) -> bool {
    let prefix = |scheme: &str| {
        reference
            .get(..scheme.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(scheme))
    };
    prefix("http://") || prefix("https://")
}

/// Resolve `reference` against `base`.
///
/// * Absolute references (`http://`, `https://`) are returned unchanged.
/// * References starting with `/` replace the whole path of `base`.
/// * Anything else is joined onto the directory of the base path and
///   normalized, so `.` and `..` segments collapse as they would on a
///   filesystem and can never climb above the root.
///
/// A query or fragment on the reference is kept; the base's own query and
/// fragment are not carried over.
pub fn resolve_url(base: &str, reference: &str) -> Result<String, DownloadError> {
    if is_absolute(reference) {
        return Ok(reference.to_string());
    }

    let mut url =
        Url::parse(base).map_err(|e| DownloadError::malformed_base_url(base, e.to_string()))?;
    if url.cannot_be_a_base() {
        return Err(DownloadError::malformed_base_url(
            base,
            "URL cannot be used as a base",
        ));
    }

    let (path, query, fragment) = split_reference(reference);
    if path.is_empty() {
        return Err(DownloadError::invalid_url(
            reference,
            "reference has no path component",
        ));
    }

    let resolved_path = if path.starts_with('/') {
        path.to_string()
    } else {
        clean_path(&format!("{}/{}", parent_dir(url.path()), path))
    };

    url.set_path(&resolved_path);
    url.set_query(query);
    url.set_fragment(fragment);
    Ok(url.to_string())
}

/// Resolve `reference`, logging and yielding an empty string on failure.
///
/// Callers must treat the empty string as an unresolved item and skip it.
pub fn resolve_or_empty(base: &str, reference: &str) -> String {
    match resolve_url(base, reference) {
        Ok(url) => url,
        Err(e) => {
            warn!(base = %base, reference = %reference, error = %e, "Failed to resolve URL");
            String::new()
        }
    }
}

/// Last path segment of an absolute URL, used as the on-disk file name.
///
/// Query and fragment are ignored. Returns `None` when the URL does not parse,
/// has no path segments, or its path ends with `/`.
pub fn url_basename(url: &str) -> Option<String> {
    let url = Url::parse(url).ok()?;
    let name = url.path_segments()?.next_back()?;
    match name {
        "" | "." | ".." => None,
        name => Some(name.to_string()),
    }
}

fn split_reference(reference: &str) -> (&str, Option<&str>, Option<&str>) {
    let (rest, fragment) = match reference.split_once('#') {
        Some((rest, fragment)) => (rest, Some(fragment)),
        None => (reference, None),
    };
    match rest.split_once('?') {
        Some((path, query)) => (path, Some(query), fragment),
        None => (rest, None, fragment),
    }
}

/// Directory part of a URL path, without the trailing slash (`/` for the root).
fn parent_dir(path: &str) -> &str {
    match path.rsplit_once('/') {
        Some(("", _)) | None => "/",
        Some((dir, _)) => dir,
    }
}

/// Lexically normalize a slash-separated path.
///
/// Repeated separators and `.` segments are dropped, `..` removes the
/// preceding segment, and for rooted paths `..` at the root is discarded.
/// The result never has a trailing slash unless it is the root itself.
pub(crate) fn clean_path(path: &str) -> String {
    let rooted = path.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => match segments.last() {
                Some(&last) if last != ".." => {
                    segments.pop();
                }
                _ if rooted => {}
                _ => segments.push(".."),
            },
            other => segments.push(other),
        }
    }

    let joined = segments.join("/");
    if rooted {
        format!("/{joined}")
    } else if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}
