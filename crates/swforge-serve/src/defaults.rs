//! Default script registrations
//!
//! Every server starts with three fragments: the bundled runtime
//! library (a file under the content directory), the runtime config
//! script (wires the library up and embeds the navigation preload
//! flag), and the caching-utils glue that exposes the
//! `sw.cache.registerRoute` helper the compiled caching rules call.

use std::sync::{Arc, RwLock};

use swforge_core::{Scope, ScriptRegistry, ScriptSource, SiteConfig};

use crate::NavigationPreload;

/// Handle of the bundled runtime library.
pub const RUNTIME_LIB_HANDLE: &str = "swforge-runtime";

/// Handle of the runtime configuration script.
pub const RUNTIME_CONFIG_HANDLE: &str = "swforge-runtime-config";

/// Handle of the caching-utils glue.
pub const CACHING_UTILS_HANDLE: &str = "swforge-caching-utils";

/// Location of the runtime library, relative to the content URL.
pub const RUNTIME_LIB_PATH: &str = "js/workbox/workbox-sw.js";

const CACHING_UTILS_JS: &str = r#"sw.cache = sw.cache || {};
sw.cache.registerRoute = function( route, strategy, cacheName, maxAgeSeconds, maxEntries ) {
	var options = {};
	if ( cacheName ) {
		options.cacheName = cacheName;
	}
	if ( maxAgeSeconds || maxEntries ) {
		options.plugins = [
			new sw.runtime.expiration.ExpirationPlugin( {
				maxAgeSeconds: maxAgeSeconds,
				maxEntries: maxEntries
			} )
		];
	}
	var name = strategy.charAt( 0 ).toUpperCase() + strategy.slice( 1 );
	var Strategy = sw.runtime.strategies[ name ] || sw.runtime.strategies.StaleWhileRevalidate;
	sw.runtime.routing.registerRoute(
		new RegExp( route ),
		new Strategy( options )
	);
};"#;

/// Register the default fragments on a fresh registry.
///
/// The runtime-config source reads the effective navigation preload
/// value at assembly time through the shared cell, so filters applied
/// per serve are reflected in the output.
pub fn register_default_scripts(
    registry: &mut ScriptRegistry,
    config: &SiteConfig,
    preload: Arc<RwLock<NavigationPreload>>,
) {
    let runtime_url = format!(
        "{}/{}",
        config.content_url.as_str().trim_end_matches('/'),
        RUNTIME_LIB_PATH
    );

    registry.register(
        RUNTIME_LIB_HANDLE,
        ScriptSource::file(runtime_url),
        vec![],
        Scope::ALL,
    );

    registry.register(
        RUNTIME_CONFIG_HANDLE,
        ScriptSource::callable(move || {
            let effective = preload
                .read()
                .map(|cell| cell.clone())
                .unwrap_or(NavigationPreload::Disabled);
            Ok(runtime_config_script(&effective))
        }),
        vec![RUNTIME_LIB_HANDLE.to_string()],
        Scope::ALL,
    );

    registry.register(
        CACHING_UTILS_HANDLE,
        ScriptSource::callable(|| Ok(CACHING_UTILS_JS.to_string())),
        vec![RUNTIME_CONFIG_HANDLE.to_string()],
        Scope::ALL,
    );
}

fn runtime_config_script(preload: &NavigationPreload) -> String {
    let preload_stmt = match preload {
        NavigationPreload::Disabled => "sw.runtime.navigationPreload.disable();".to_string(),
        NavigationPreload::Enabled => "sw.runtime.navigationPreload.enable();".to_string(),
        NavigationPreload::HeaderValue(value) => format!(
            "sw.runtime.navigationPreload.enable( '{}' );",
            value.replace('\\', "\\\\").replace('\'', "\\'")
        ),
    };

    format!(
        "if ( 'undefined' === typeof workbox ) {{\n\
         \tconsole.warn( 'Service worker runtime library failed to load.' );\n\
         }}\n\
         self.sw = self.sw || {{}};\n\
         sw.runtime = workbox;\n\
         sw.runtime.setConfig( {{ debug: false }} );\n\
         {preload_stmt}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::WorkerScriptServer;
    use std::fs;
    use swforge_core::Scope;
    use tempfile::TempDir;

    fn provisioned_site() -> (TempDir, SiteConfig) {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("js/workbox")).unwrap();
        fs::write(
            dir.path().join(RUNTIME_LIB_PATH),
            "/* workbox runtime */\nvar workbox = {};",
        )
        .unwrap();
        let config = SiteConfig::new(
            "https://example.com/",
            "https://example.com/content/",
            dir.path(),
        )
        .unwrap();
        (dir, config)
    }

    #[test]
    fn test_defaults_assemble_in_dependency_order() {
        let (_dir, config) = provisioned_site();
        let mut server = WorkerScriptServer::new(config);

        let body = server.serve(Scope::FRONT, None).body;

        let lib = body.find("/* workbox runtime */").unwrap();
        let config_script = body.find("sw.runtime = workbox;").unwrap();
        let glue = body.find("sw.cache.registerRoute = function").unwrap();
        assert!(lib < config_script);
        assert!(config_script < glue);
    }

    #[test]
    fn test_missing_runtime_file_degrades_gracefully() {
        let dir = TempDir::new().unwrap();
        let config = SiteConfig::new(
            "https://example.com/",
            "https://example.com/content/",
            dir.path(),
        )
        .unwrap();
        let mut server = WorkerScriptServer::new(config);

        let response = server.serve(Scope::FRONT, None);
        assert_eq!(response.status, http::StatusCode::OK);
        assert!(response.body.contains("console.warn("));
        // Config and glue still render.
        assert!(response.body.contains("sw.runtime = workbox;"));
    }

    #[test]
    fn test_navigation_preload_enabled_by_default() {
        let (_dir, config) = provisioned_site();
        let mut server = WorkerScriptServer::new(config);

        let body = server.serve(Scope::FRONT, None).body;
        assert!(body.contains("sw.runtime.navigationPreload.enable();"));
    }

    #[test]
    fn test_navigation_preload_filter_overrides_value() {
        let (_dir, config) = provisioned_site();
        let mut server = WorkerScriptServer::new(config);
        server.filter_navigation_preload(|_| {
            NavigationPreload::HeaderValue("X-Preload: on".to_string())
        });

        let body = server.serve(Scope::FRONT, None).body;
        assert!(body.contains("sw.runtime.navigationPreload.enable( 'X-Preload: on' );"));
    }

    #[test]
    fn test_navigation_preload_disabled() {
        let (_dir, config) = provisioned_site();
        let mut server = WorkerScriptServer::new(config);
        server.set_navigation_preload(NavigationPreload::Disabled);

        let body = server.serve(Scope::FRONT, None).body;
        assert!(body.contains("sw.runtime.navigationPreload.disable();"));
    }

    #[test]
    fn test_runtime_config_escapes_header_value() {
        let script =
            runtime_config_script(&NavigationPreload::HeaderValue("it's".to_string()));
        assert!(script.contains("enable( 'it\\'s' );"));
    }
}
