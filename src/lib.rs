//! Client for a JSON-RPC data gateway, with an on-disk schema cache.
//!
//! - [`gateway`]: transport, session handshake, typed tool calls and result
//!   extraction
//! - [`schema_cache`]: discovery sweep and TTL-bounded schema snapshot

pub mod gateway;
pub mod schema_cache;

pub use gateway::{GatewayClient, GatewayConfig, GatewayError};
pub use schema_cache::{CacheError, CachedSchema, SchemaCache};

/// Directory name used under the platform cache directory.
const APP_DIR_NAME: &str = "catalog-gateway";

/// Return the platform-standard cache directory for this crate.
///
/// - macOS: `~/Library/Caches/catalog-gateway/`
/// - Windows: `{FOLDERID_LocalAppData}\catalog-gateway\`
/// - Linux: `$XDG_CACHE_HOME/catalog-gateway/` (fallback `~/.cache/...`)
///
/// `None` only if neither a cache directory nor a home directory resolves.
pub fn cache_dir() -> Option<std::path::PathBuf> {
    if let Some(dir) = dirs::cache_dir() {
        return Some(dir.join(APP_DIR_NAME));
    }
    dirs::home_dir().map(|home| home.join(".cache").join(APP_DIR_NAME))
}

/// Output format for [`init_tracing`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

/// Install a global tracing subscriber writing to stderr.
///
/// The filter comes from `RUST_LOG`, defaulting to
/// `catalog_gateway=info,warn`. Returns `false` if a subscriber was already
/// installed, in which case nothing changes.
pub fn init_tracing(format: LogFormat) -> bool {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("catalog_gateway=info,warn"));

    let builder = fmt::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false);

    let installed = match format {
        LogFormat::Text => builder.try_init().is_ok(),
        LogFormat::Json => builder.json().try_init().is_ok(),
    };

    if installed {
        tracing::info!(
            version = env!("CARGO_PKG_VERSION"),
            cache_dir = ?cache_dir(),
            pid = std::process::id(),
            "catalog gateway logging initialized"
        );
    }
    installed
}
