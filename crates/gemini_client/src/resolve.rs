use url::Url;

use crate::error::GeminiClientError;

const SCHEME_PREFIX: &str = "gemini://";
const DEFAULT_PORT: &str = "1965";

/// Returns the `host[:port]` span of a `gemini://...` string, up to the
/// first `/`, `?`, `#`, or end of string.
fn authority_of(candidate: &str) -> Option<&str> {
    let rest = candidate.strip_prefix(SCHEME_PREFIX)?;
    let end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    Some(&rest[..end])
}

/// The authority to splice relative references against: the referer's own
/// authority when it's a `gemini://` URL, otherwise the empty-host default.
fn base_authority(referer: &str) -> String {
    if referer.starts_with(SCHEME_PREFIX) {
        authority_of(referer).unwrap_or(":1965").to_string()
    } else {
        format!(":{DEFAULT_PORT}")
    }
}

/// Inserts `:1965` right after the authority if it carries no port already.
fn ensure_default_port(candidate: &str) -> String {
    match authority_of(candidate) {
        Some(authority) if !authority.contains(':') => {
            let insert_at = SCHEME_PREFIX.len() + authority.len();
            let mut out = String::with_capacity(candidate.len() + DEFAULT_PORT.len() + 1);
            out.push_str(&candidate[..insert_at]);
            out.push(':');
            out.push_str(DEFAULT_PORT);
            out.push_str(&candidate[insert_at..]);
            out
        }
        _ => candidate.to_string(),
    }
}

/// Resolves a raw link target against a referer URL string, normalizing it
/// to an absolute `gemini://host:port/...` form whenever the scheme ends up
/// being `gemini`.
///
/// `referer` is consulted only for its authority (`host:port`); it need not
/// itself be a fully valid URL beyond starting with `gemini://`.
pub fn resolve(raw: &str, referer: &str) -> Result<Url, GeminiClientError> {
    let base_host_port = base_authority(referer);

    let mut candidate = if raw.starts_with('/') {
        format!("{SCHEME_PREFIX}{base_host_port}{raw}")
    } else if !raw.contains(":/") {
        format!("{SCHEME_PREFIX}{raw}")
    } else {
        raw.to_string()
    };

    if candidate.starts_with(SCHEME_PREFIX) {
        candidate = ensure_default_port(&candidate);
    }

    Url::parse(&candidate)
        .map_err(|_| GeminiClientError::Format(format!("{raw:?} against referer {referer:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_relative_link() {
        let u = resolve("/docs/spec.gmi", "gemini://example.org:1965/index.gmi").unwrap();
        assert_eq!(u.as_str(), "gemini://example.org:1965/docs/spec.gmi");
    }

    #[test]
    fn resolve_bare_host() {
        let u = resolve("example.org", "").unwrap();
        assert_eq!(u.as_str(), "gemini://example.org:1965/");
    }

    #[test]
    fn resolve_referer_less_absolute_path() {
        // The Go original's zero-value referer base carries an empty host,
        // so this produces an empty-host URL. Preserved literally rather
        // than patched, since the authority is genuinely absent here.
        let u = resolve("/a", "").unwrap();
        assert_eq!(u.host_str().unwrap_or(""), "");
        assert_eq!(u.port(), Some(1965));
        assert_eq!(u.path(), "/a");
    }

    #[test]
    fn resolve_keeps_explicit_port() {
        let u = resolve("example.org:1966/x", "").unwrap();
        assert_eq!(u.port(), Some(1966));
    }

    #[test]
    fn resolve_already_absolute_gains_default_port() {
        let u = resolve("gemini://other.example/path", "gemini://example.org:1965/").unwrap();
        assert_eq!(u.as_str(), "gemini://other.example:1965/path");
    }

    #[test]
    fn resolve_non_gemini_scheme_is_untouched() {
        let u = resolve("https://example.org/x", "gemini://example.org:1965/").unwrap();
        assert_eq!(u.scheme(), "https");
        assert_eq!(u.port(), None);
    }

    #[test]
    fn resolve_invalid_candidate_is_format_error() {
        let err = resolve("gemini://exa mple.org/", "").unwrap_err();
        assert!(matches!(err, GeminiClientError::Format(_)));
    }
}
