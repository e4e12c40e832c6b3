//! # Swforge Core
//!
//! Registration, resolution, and assembly primitives for building a
//! site's service worker script out of independently registered
//! fragments.
//!
//! ## Architecture
//!
//! ```text
//! ScriptRegistry (handles, deps, scopes)
//!     │ resolve() yields stable dependency order
//!     ▼
//! ScriptAssembler ──► output buffer
//!     │ FileRef sources
//!     ▼
//! PathResolver (content-directory jail)
//!
//! CachingRules ──► compiled rule statements (appended after assembly)
//! ```
//!
//! The HTTP-facing server that drives these lives in `swforge-serve`.

pub mod assembler;
pub mod config;
pub mod error;
pub mod registry;
pub mod resolver;
pub mod routes;
pub mod scope;

pub use assembler::ScriptAssembler;
pub use config::SiteConfig;
pub use error::{ResolveError, SwError, SwResult};
pub use registry::{RegisteredScript, ScriptRegistry, ScriptSource, SourceFn};
pub use resolver::PathResolver;
pub use routes::{compile_rule, CachingRules, CachingStrategy, RouteOptions};
pub use scope::Scope;
