//! Rendering filesystem paths as `file:` URIs and back.
//!
//! URI-valued compiler flags always use forward slashes, including on
//! Windows; decoded paths keep that forward-slash form since they only
//! feed string-prefix mapping, never filesystem calls.

/// Bytes that stay unencoded in a URI path, beyond ASCII alphanumerics.
/// This is the RFC 3986 `pchar` set plus `/`.
const KEEP: &[u8] = b"-._~!$&'()*+,;=:@/";

fn encode(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for &byte in path.as_bytes() {
        if byte.is_ascii_alphanumeric() || KEEP.contains(&byte) {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}

fn decode(text: &str) -> Option<String> {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = bytes.get(i + 1..i + 3)?;
            let hex = std::str::from_utf8(hex).ok()?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

/// Render `path` as a `file:` URI using the conventions of the current
/// platform.
pub fn file_uri(path: &str) -> String {
    file_uri_for(path, cfg!(windows))
}

/// Render `path` as a `file:` URI. Backslashes become forward slashes on
/// Windows and drive letters gain the conventional third slash. A relative
/// path renders as a relative URI reference with no scheme.
pub fn file_uri_for(path: &str, windows: bool) -> String {
    let normalized = if windows { path.replace('\\', "/") } else { path.to_string() };
    if windows && normalized.as_bytes().get(1) == Some(&b':') {
        format!("file:///{}", encode(&normalized))
    } else if normalized.starts_with('/') {
        format!("file://{}", encode(&normalized))
    } else {
        encode(&normalized)
    }
}

/// Decode a `file:` URI into a forward-slash path, or `None` when the
/// input is not a decodable `file:` URI.
pub fn path_from_file_uri(uri: &str) -> Option<String> {
    let rest = uri.strip_prefix("file://")?;
    decode(rest)
}

/// Normalize a directory for URI-valued flags: forward slashes only, with
/// exactly one trailing slash.
pub fn ensure_trailing_slash(dir: &str) -> String {
    let forward = dir.replace('\\', "/");
    if forward.ends_with('/') {
        forward
    } else {
        format!("{forward}/")
    }
}
