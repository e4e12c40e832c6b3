//! Site configuration

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{SwError, SwResult};

/// Site configuration for script assembly.
///
/// The content URL is the public address of the content directory; the
/// path resolver only ever maps file sources that live under it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Base URL of the site, used to absolutize relative file sources.
    pub site_url: Url,

    /// Public URL of the content directory.
    pub content_url: Url,

    /// Local filesystem root backing `content_url`.
    pub content_dir: PathBuf,
}

impl SiteConfig {
    /// Build and validate a site configuration.
    ///
    /// Both URLs must parse and carry a host; the content directory is not
    /// required to exist yet (fragments are checked per request).
    pub fn new(
        site_url: &str,
        content_url: &str,
        content_dir: impl Into<PathBuf>,
    ) -> SwResult<Self> {
        let site_url = Url::parse(site_url)?;
        let content_url = Url::parse(content_url)?;

        if site_url.host_str().is_none() {
            return Err(SwError::config(format!("site URL has no host: {site_url}")));
        }
        if content_url.host_str().is_none() {
            return Err(SwError::config(format!(
                "content URL has no host: {content_url}"
            )));
        }

        Ok(Self {
            site_url,
            content_url,
            content_dir: content_dir.into(),
        })
    }
}
