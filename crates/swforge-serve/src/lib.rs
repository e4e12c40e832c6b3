//! # Swforge Serve
//!
//! Scope-aware serving of the assembled service worker script.
//!
//! One server instance owns the script registry and the accumulated
//! caching rules for the whole process. Registration happens during
//! single-threaded initialization (directly or through init hooks);
//! every `serve` call is then a fresh pass: filter by audience, resolve
//! dependency order, assemble, append caching rules, fingerprint, and
//! answer with 200, 304, or 400.

pub mod defaults;

use std::fmt::Write as _;
use std::sync::{Arc, RwLock};

use http::header::{CONTENT_TYPE, ETAG};
use http::{HeaderMap, HeaderValue, StatusCode};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use swforge_core::{
    CachingRules, PathResolver, RouteOptions, Scope, ScriptAssembler, ScriptRegistry,
    ScriptSource, SiteConfig,
};

pub use defaults::{CACHING_UTILS_HANDLE, RUNTIME_CONFIG_HANDLE, RUNTIME_LIB_HANDLE};

/// Content type of every response from this endpoint.
pub const CONTENT_TYPE_JS: &str = "text/javascript; charset=utf-8";

/// Body served for a request with an unservable scope.
pub const INVALID_SCOPE_BODY: &str = "/* invalid_scope_requested */";

/// Navigation preload configuration for the generated runtime config.
///
/// `HeaderValue` enables preload with a custom value that is echoed into
/// the script and intended to be set as a response header by the host.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum NavigationPreload {
    Disabled,
    #[default]
    Enabled,
    HeaderValue(String),
}

/// Hook run once, before the first serve, with mutable access to the
/// server for external registrations.
pub type InitHook = Box<dyn FnOnce(&mut WorkerScriptServer) + Send>;

/// Filter overriding the configured navigation preload value.
pub type PreloadFilter = Box<dyn Fn(NavigationPreload) -> NavigationPreload + Send + Sync>;

/// An HTTP response for the service worker endpoint.
///
/// The server is transport-agnostic: the HTTP host writes status,
/// headers, and body out however it likes.
#[derive(Debug)]
pub struct ScriptResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl ScriptResponse {
    fn bad_scope() -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            headers: base_headers(),
            body: INVALID_SCOPE_BODY.to_string(),
        }
    }

    fn not_modified(etag: &str) -> Self {
        Self {
            status: StatusCode::NOT_MODIFIED,
            headers: headers_with_etag(etag),
            body: String::new(),
        }
    }

    fn ok(etag: &str, body: String) -> Self {
        Self {
            status: StatusCode::OK,
            headers: headers_with_etag(etag),
            body,
        }
    }

    /// Get a header value as a string.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

fn base_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE_JS));
    headers
}

fn headers_with_etag(etag: &str) -> HeaderMap {
    let mut headers = base_headers();
    // Best-effort side channel: an unrepresentable ETag is dropped, not
    // a failure.
    if let Ok(value) = HeaderValue::from_str(etag) {
        headers.insert(ETAG, value);
    }
    headers
}

/// Content fingerprint of a finished script, formatted as a quoted ETag.
///
/// Only change detection is needed, not any cryptographic property;
/// Sha256 is simply what the rest of the codebase hashes with.
pub fn fingerprint(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    let mut hex = String::with_capacity(2 * digest.len() + 2);
    hex.push('"');
    for byte in digest {
        let _ = write!(hex, "{byte:02x}");
    }
    hex.push('"');
    hex
}

fn token_matches(token: Option<&str>, etag: &str) -> bool {
    let Some(token) = token else {
        return false;
    };
    let normalize = |s: &str| {
        s.trim()
            .trim_start_matches("W/")
            .trim_matches('"')
            .to_string()
    };
    normalize(token) == normalize(etag)
}

/// Serves the site's service worker script per audience scope.
pub struct WorkerScriptServer {
    registry: ScriptRegistry,
    resolver: PathResolver,
    rules: CachingRules,
    navigation_preload: NavigationPreload,
    preload_filter: Option<PreloadFilter>,
    // Shared with the runtime-config source closure, which renders the
    // effective value during assembly.
    effective_preload: Arc<RwLock<NavigationPreload>>,
    init_hooks: Vec<InitHook>,
    initialized: bool,
}

impl WorkerScriptServer {
    /// Create a server with the bundled runtime library, runtime config,
    /// and caching-utils glue pre-registered.
    pub fn new(config: SiteConfig) -> Self {
        let mut server = Self::without_defaults(config.clone());
        defaults::register_default_scripts(
            &mut server.registry,
            &config,
            Arc::clone(&server.effective_preload),
        );
        server
    }

    /// Create a server with an empty registry.
    pub fn without_defaults(config: SiteConfig) -> Self {
        let resolver = PathResolver::new(&config);
        Self {
            registry: ScriptRegistry::new(),
            resolver,
            rules: CachingRules::new(),
            navigation_preload: NavigationPreload::default(),
            preload_filter: None,
            effective_preload: Arc::new(RwLock::new(NavigationPreload::default())),
            init_hooks: Vec::new(),
            initialized: false,
        }
    }

    /// Register a script fragment.
    ///
    /// `scope_bits` outside {FRONT, ADMIN, ALL} are corrected to ALL with
    /// a warning; registration still succeeds. Re-registering a handle
    /// overwrites it.
    pub fn register(
        &mut self,
        handle: impl Into<String>,
        source: ScriptSource,
        deps: Vec<String>,
        scope_bits: u8,
    ) -> bool {
        let scope = Scope::from_bits_lossy(scope_bits);
        self.registry.register(handle, source, deps, scope)
    }

    /// Register a caching rule for the client-side runtime.
    ///
    /// Rules are compiled immediately and appended to every served
    /// script, in registration order, regardless of scope.
    pub fn register_route(&mut self, route: &str, strategy_id: u32, options: RouteOptions) {
        self.rules.register(route, strategy_id, &options);
    }

    /// Queue a hook to run once before the first serve.
    pub fn on_init(&mut self, hook: impl FnOnce(&mut WorkerScriptServer) + Send + 'static) {
        if self.initialized {
            warn!("init hook added after first serve will never run");
            return;
        }
        self.init_hooks.push(Box::new(hook));
    }

    /// Set the configured navigation preload value.
    pub fn set_navigation_preload(&mut self, preload: NavigationPreload) {
        self.navigation_preload = preload;
    }

    /// Install a filter that can override the configured navigation
    /// preload value at serve time.
    pub fn filter_navigation_preload(
        &mut self,
        filter: impl Fn(NavigationPreload) -> NavigationPreload + Send + Sync + 'static,
    ) {
        self.preload_filter = Some(Box::new(filter));
    }

    /// Serve the assembled script for one audience.
    ///
    /// `validation_token` is the client's cached fingerprint
    /// (If-None-Match); a match short-circuits to 304 with no body.
    pub fn serve(&mut self, scope: Scope, validation_token: Option<&str>) -> ScriptResponse {
        if !scope.is_requestable() {
            warn!(bits = scope.bits(), "service worker requested for invalid scope");
            return ScriptResponse::bad_scope();
        }

        self.run_init_hooks();
        self.publish_effective_preload();

        let mut output = String::new();
        let requested = self.registry.handles_for_scope(scope);
        let ordered = self.registry.resolve(&requested);
        debug!(?ordered, "assembling service worker script");

        let assembler = ScriptAssembler::new(&self.registry, &self.resolver);
        for handle in &ordered {
            assembler.render(handle, &mut output);
        }

        // Caching rules are not scope-filtered; every audience gets the
        // full set.
        output.push_str(self.rules.as_script());

        let etag = fingerprint(&output);
        if token_matches(validation_token, &etag) {
            return ScriptResponse::not_modified(&etag);
        }
        ScriptResponse::ok(&etag, output)
    }

    fn run_init_hooks(&mut self) {
        if self.initialized {
            return;
        }
        self.initialized = true;
        let hooks = std::mem::take(&mut self.init_hooks);
        for hook in hooks {
            hook(self);
        }
    }

    /// Apply the preload filter and publish the result to the
    /// runtime-config source closure. A poisoned lock is swallowed; the
    /// config script then renders the last published value.
    fn publish_effective_preload(&self) {
        let configured = self.navigation_preload.clone();
        let effective = match &self.preload_filter {
            Some(filter) => filter(configured),
            None => configured,
        };
        if let Ok(mut cell) = self.effective_preload.write() {
            *cell = effective;
        }
    }
}
