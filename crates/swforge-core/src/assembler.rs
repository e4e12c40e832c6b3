//! Script assembler
//!
//! Renders registered fragments into the output buffer for one request.
//! A broken fragment never aborts the response: it turns into an inline
//! `console.warn` plus a server-side warning, and assembly moves on to
//! the next handle.

use std::fs;

use tracing::warn;

use crate::registry::{ScriptRegistry, ScriptSource};
use crate::resolver::PathResolver;

/// Renders script fragments in dependency order into a caller-owned
/// output buffer.
pub struct ScriptAssembler<'a> {
    registry: &'a ScriptRegistry,
    resolver: &'a PathResolver,
}

impl<'a> ScriptAssembler<'a> {
    pub fn new(registry: &'a ScriptRegistry, resolver: &'a PathResolver) -> Self {
        Self { registry, resolver }
    }

    /// Append the script text for `handle` to `out`.
    pub fn render(&self, handle: &str, out: &mut String) {
        let Some(item) = self.registry.get(handle) else {
            self.render_invalid(handle, "handle is not registered", out);
            return;
        };

        match &item.source {
            ScriptSource::Callable(source) => match source() {
                Ok(text) => {
                    out.push_str(&format!("/* Source {handle}: */\n{text}\n\n"));
                }
                Err(err) => {
                    self.render_invalid(handle, &err.to_string(), out);
                }
            },
            ScriptSource::FileRef(url) => {
                let contents = self
                    .resolver
                    .resolve_file_path(url)
                    .map_err(|e| e.to_string())
                    .and_then(|path| fs::read_to_string(&path).map_err(|e| e.to_string()));
                match contents {
                    Ok(text) => {
                        out.push_str(&format!("/* Source {handle} {url}: */\n{text}\n\n"));
                    }
                    Err(reason) => {
                        self.render_invalid(handle, &reason, out);
                    }
                }
            }
        }
    }

    /// Emit the diagnostic path for a fragment that could not be rendered.
    fn render_invalid(&self, handle: &str, reason: &str, out: &mut String) {
        warn!(handle, reason, "service worker script source is invalid");

        let message = format!("Service worker script source '{handle}' is invalid.");
        // serde_json gives us a safely quoted JS string literal.
        let encoded =
            serde_json::to_string(&message).unwrap_or_else(|_| "\"invalid source\"".to_string());
        out.push_str(&format!("console.warn( {encoded} );\n\n"));
    }
}
