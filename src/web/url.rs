//! Canonical URL rules for search results.
//!
//! Search backends return redirect wrappers, protocol-relative links,
//! and occasional garbage. Everything entering the research state goes
//! through [`canonicalize_url`] first, so sources are keyed by a stable
//! canonical form. Canonicalization is idempotent.

use url::Url;

/// Canonicalizes a raw URL string from a search backend.
///
/// Rules applied in order:
/// 1. Protocol-relative `//host/path` is promoted to `https://`.
/// 2. Redirect wrappers of the form `…/l/?uddg=<encoded>` are unwrapped
///    to their inner target (and the target is canonicalized in turn).
/// 3. Anything that fails to parse as an absolute `http`/`https` URL
///    with a host is dropped.
///
/// Returns `None` for malformed input.
#[must_use]
pub fn canonicalize_url(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let promoted = trimmed
        .strip_prefix("//")
        .map_or_else(|| trimmed.to_string(), |rest| format!("https://{rest}"));

    let parsed = Url::parse(&promoted).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }
    parsed.host_str()?;

    // Unwrap redirect wrappers (DuckDuckGo-style `/l/?uddg=<target>`).
    if parsed.path().ends_with("/l/") {
        if let Some((_, inner)) = parsed.query_pairs().find(|(key, _)| key == "uddg") {
            return canonicalize_url(&inner);
        }
    }

    Some(parsed.to_string())
}

/// Extracts the display domain of a canonical URL: the host with any
/// leading `www.` stripped.
///
/// Returns an empty string if the URL does not parse (callers only pass
/// already-canonicalized URLs, where this cannot happen).
#[must_use]
pub fn domain_of(canonical: &str) -> String {
    Url::parse(canonical)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .map(|host| host.strip_prefix("www.").map_or_else(|| host.clone(), str::to_string))
        .unwrap_or_default()
}
