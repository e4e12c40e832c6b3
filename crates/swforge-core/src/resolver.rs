//! Path resolver
//!
//! Maps public URLs to validated filesystem paths under the site's
//! content directory. This is the only way file-backed script sources are
//! opened, so it has to reject anything that could escape the content
//! directory: cross-origin hosts, traversal segments (including
//! percent-encoded ones), alternate schemes, and nonexistent files.

use std::path::{Path, PathBuf};

use tracing::debug;
use url::Url;

use crate::config::SiteConfig;
use crate::error::ResolveError;

/// Maximum rounds of percent-decoding applied before giving up on an
/// input as hostile (double- and triple-encoded traversal attempts).
const MAX_DECODE_ROUNDS: usize = 4;

/// Resolves public URLs to local files inside the content directory.
#[derive(Debug, Clone)]
pub struct PathResolver {
    site_url: Url,
    content_url: Url,
    content_dir: PathBuf,
}

impl PathResolver {
    /// Build a resolver from the site configuration.
    pub fn new(config: &SiteConfig) -> Self {
        Self {
            site_url: config.site_url.clone(),
            content_url: config.content_url.clone(),
            content_dir: config.content_dir.clone(),
        }
    }

    /// Resolve a public URL to a validated, existing file path.
    ///
    /// Relative inputs are treated as relative to the site root. The
    /// returned path is canonical, so resolution is idempotent for valid
    /// inputs.
    pub fn resolve_file_path(&self, raw: &str) -> Result<PathBuf, ResolveError> {
        let input = raw.trim();
        if input.is_empty() {
            return Err(ResolveError::InvalidPathFormat(raw.to_string()));
        }

        // Absolutize: scheme-relative URLs borrow the content scheme,
        // bare paths are joined onto the site root.
        let absolute = if input.starts_with("//") {
            format!("{}:{}", self.content_url.scheme(), input)
        } else if has_absolute_scheme(input) {
            input.to_string()
        } else {
            self.site_url
                .join(input)
                .map_err(|_| ResolveError::InvalidPathFormat(raw.to_string()))?
                .to_string()
        };

        let mut target = Url::parse(&absolute)
            .map_err(|_| ResolveError::InvalidPathFormat(raw.to_string()))?;
        target.set_query(None);
        target.set_fragment(None);

        let content_host = self
            .content_url
            .host_str()
            .ok_or_else(|| ResolveError::InvalidPathFormat(raw.to_string()))?;
        match target.host_str() {
            Some(host) if host.eq_ignore_ascii_case(content_host) => {}
            _ => {
                debug!(url = raw, "rejecting file source on foreign host");
                return Err(ResolveError::ExternalFileUrl(raw.to_string()));
            }
        }

        // Map the path remainder onto the content directory.
        let base = self.content_url.path().trim_end_matches('/');
        let rel = match target.path().strip_prefix(base) {
            Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
            _ => return Err(ResolveError::FilePathNotFound(raw.to_string())),
        };

        let decoded = percent_decode_fully(rel)
            .ok_or_else(|| ResolveError::FilePathNotFound(raw.to_string()))?;
        if decoded.contains("..") || decoded.contains(':') || decoded.contains('\0') {
            debug!(url = raw, "rejecting file source with disallowed path segment");
            return Err(ResolveError::FilePathNotFound(raw.to_string()));
        }

        let candidate = self.content_dir.join(decoded.trim_start_matches('/'));
        let canonical = candidate
            .canonicalize()
            .map_err(|_| ResolveError::FilePathNotFound(raw.to_string()))?;
        let content_root = self
            .content_dir
            .canonicalize()
            .map_err(|_| ResolveError::FilePathNotFound(raw.to_string()))?;
        if !canonical.starts_with(&content_root) || !canonical.is_file() {
            return Err(ResolveError::FilePathNotFound(raw.to_string()));
        }

        Ok(canonical)
    }

    /// The content directory this resolver maps into.
    pub fn content_dir(&self) -> &Path {
        &self.content_dir
    }
}

/// Whether the input starts with a `scheme://` prefix.
fn has_absolute_scheme(input: &str) -> bool {
    match input.split_once("://") {
        Some((scheme, _)) => {
            !scheme.is_empty()
                && scheme.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        None => false,
    }
}

/// Percent-decode until the string stops changing, bounded by
/// [`MAX_DECODE_ROUNDS`]. Returns `None` for undecodable input or input
/// still changing after the bound (nested encoding games).
fn percent_decode_fully(input: &str) -> Option<String> {
    let mut current = input.to_string();
    for _ in 0..MAX_DECODE_ROUNDS {
        let decoded = urlencoding::decode(&current).ok()?.into_owned();
        if decoded == current {
            return Some(current);
        }
        current = decoded;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn fixture() -> (TempDir, PathResolver) {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("app.js"), "console.log('a');").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested/lib.js"), "console.log('lib');").unwrap();

        let config = SiteConfig::new(
            "https://example.com/",
            "https://example.com/content/",
            dir.path(),
        )
        .unwrap();
        let resolver = PathResolver::new(&config);
        (dir, resolver)
    }

    #[test]
    fn test_accepts_in_content_file() {
        let (dir, resolver) = fixture();
        let path = resolver
            .resolve_file_path("https://example.com/content/app.js")
            .unwrap();
        assert_eq!(path, dir.path().join("app.js").canonicalize().unwrap());
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let (_dir, resolver) = fixture();
        let first = resolver
            .resolve_file_path("https://example.com/content/nested/lib.js")
            .unwrap();
        let second = resolver
            .resolve_file_path("https://example.com/content/nested/lib.js")
            .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_relative_url_joined_onto_site_root() {
        let (_dir, resolver) = fixture();
        assert!(resolver.resolve_file_path("content/app.js").is_ok());
    }

    #[test]
    fn test_scheme_relative_url() {
        let (_dir, resolver) = fixture();
        assert!(resolver
            .resolve_file_path("//example.com/content/app.js")
            .is_ok());
    }

    #[test]
    fn test_query_and_fragment_stripped() {
        let (_dir, resolver) = fixture();
        assert!(resolver
            .resolve_file_path("https://example.com/content/app.js?ver=1#frag")
            .is_ok());
    }

    #[test]
    fn test_rejects_empty_input() {
        let (_dir, resolver) = fixture();
        assert_eq!(
            resolver.resolve_file_path("   "),
            Err(ResolveError::InvalidPathFormat("   ".to_string()))
        );
    }

    #[test]
    fn test_rejects_foreign_host() {
        let (_dir, resolver) = fixture();
        assert!(matches!(
            resolver.resolve_file_path("https://evil.example/x.js"),
            Err(ResolveError::ExternalFileUrl(_))
        ));
    }

    #[test]
    fn test_rejects_alternate_scheme() {
        let (_dir, resolver) = fixture();
        assert!(resolver.resolve_file_path("javascript:alert(1)").is_err());
    }

    #[test]
    fn test_rejects_bare_string_outside_content_dir() {
        let (_dir, resolver) = fixture();
        assert!(matches!(
            resolver.resolve_file_path("not a url"),
            Err(ResolveError::FilePathNotFound(_))
        ));
    }

    #[test]
    fn test_rejects_traversal() {
        let (_dir, resolver) = fixture();
        assert!(resolver
            .resolve_file_path("https://example.com/content/nested/../../etc/passwd")
            .is_err());
    }

    #[test]
    fn test_rejects_encoded_traversal() {
        let (_dir, resolver) = fixture();
        for url in [
            "https://example.com/content/%2e%2e/secret.js",
            "https://example.com/content/%252e%252e/secret.js",
            "https://example.com/content/..%2fsecret.js",
        ] {
            assert!(
                matches!(
                    resolver.resolve_file_path(url),
                    Err(ResolveError::FilePathNotFound(_))
                ),
                "expected rejection for {url}"
            );
        }
    }

    #[test]
    fn test_rejects_missing_file() {
        let (_dir, resolver) = fixture();
        assert!(matches!(
            resolver.resolve_file_path("https://example.com/content/ghost.js"),
            Err(ResolveError::FilePathNotFound(_))
        ));
    }

    #[test]
    fn test_rejects_prefix_confusion() {
        // "/contentx" must not match the "/content" base.
        let (_dir, resolver) = fixture();
        assert!(matches!(
            resolver.resolve_file_path("https://example.com/contentx/app.js"),
            Err(ResolveError::FilePathNotFound(_))
        ));
    }

    #[test]
    fn test_rejects_directory_target() {
        let (_dir, resolver) = fixture();
        assert!(matches!(
            resolver.resolve_file_path("https://example.com/content/nested"),
            Err(ResolveError::FilePathNotFound(_))
        ));
    }

    #[test]
    fn test_host_comparison_is_case_insensitive() {
        let (_dir, resolver) = fixture();
        assert!(resolver
            .resolve_file_path("https://EXAMPLE.com/content/app.js")
            .is_ok());
    }
}
