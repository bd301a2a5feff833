//! Schema cache: on-disk snapshot of gateway metadata.
//!
//! A discovery sweep walks every catalog (`getCatalogs`, then `getSchemas`
//! and `getTables` per catalog) and stores the raw text blobs in one JSON
//! file. The file is replaced wholesale by the next sweep and expires by age
//! only, measured from its modification time.
//!
//! Writes go to a sibling temporary file that is renamed over the target, so
//! readers never observe a partial file. A failed sweep writes nothing.

pub mod errors;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::gateway::{GatewayClient, GatewayConfig, RpcTransport};

pub use errors::{CacheError, SweepCause, SweepStage};

/// File name of the cache inside the cache directory.
pub const CACHE_FILE_NAME: &str = "schema.json";

// ─── Cached entry ────────────────────────────────────────────────────────────

/// Raw metadata text for one catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub schemas_raw: String,
    pub tables_raw: String,
}

/// The result of one full discovery sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedSchema {
    pub discovered_at: DateTime<Utc>,
    /// Raw `getCatalogs` text. Absent when a fixed catalog was configured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalogs_raw: Option<String>,
    #[serde(default)]
    pub catalogs: BTreeMap<String, CatalogEntry>,
}

impl CachedSchema {
    pub fn catalog_names(&self) -> Vec<&str> {
        self.catalogs.keys().map(String::as_str).collect()
    }

    /// Compact JSON of the entry, cut to at most `max_chars` characters and
    /// followed by `...` when cut. Sized for inclusion in prompts.
    pub fn compact_summary(&self, max_chars: usize) -> String {
        let json = serde_json::to_string(self).unwrap_or_default();
        if json.chars().count() <= max_chars {
            return json;
        }
        let mut summary: String = json.chars().take(max_chars).collect();
        summary.push_str("...");
        summary
    }
}

/// Parse the newline-delimited `getCatalogs` text into catalog names.
///
/// Blank lines and header lines (anything starting with `catalog`, or
/// `table_cat`, ignoring case) are dropped; surrounding quotes and trailing
/// commas are stripped. Duplicates keep their first position.
pub fn parse_catalog_names(raw: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();

    for line in raw.lines() {
        let name = line
            .trim()
            .trim_end_matches(',')
            .trim_matches('"')
            .trim_end_matches(',')
            .trim();
        if name.is_empty() || is_header(name) {
            continue;
        }
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }

    names
}

fn is_header(line: &str) -> bool {
    let starts_with_catalog = line
        .get(..7)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("catalog"));
    starts_with_catalog || line.eq_ignore_ascii_case("table_cat")
}

// ─── SchemaCache ─────────────────────────────────────────────────────────────

/// Handle on the cache file at one path.
#[derive(Debug, Clone)]
pub struct SchemaCache {
    path: PathBuf,
    ttl: Duration,
}

impl SchemaCache {
    pub fn new(path: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            path: path.into(),
            ttl,
        }
    }

    /// Cache at `<platform cache dir>/catalog-gateway/schema.json`.
    pub fn at_default_location(ttl: Duration) -> Result<Self, CacheError> {
        let dir = crate::cache_dir().ok_or(CacheError::NoCacheDir)?;
        Ok(Self::new(dir.join(CACHE_FILE_NAME), ttl))
    }

    /// Cache at the configured path (or the default location) with the
    /// configured TTL.
    pub fn from_config(config: &GatewayConfig) -> Result<Self, CacheError> {
        match &config.cache_path {
            Some(path) => Ok(Self::new(path.clone(), config.cache_ttl())),
            None => Self::at_default_location(config.cache_ttl()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    // ─── Freshness ───────────────────────────────────────────────────────

    /// Age of the cache file at `now`, or `None` if there is no readable file.
    /// A modification time in the future counts as age zero.
    pub fn age_at(&self, now: SystemTime) -> Option<Duration> {
        let modified = std::fs::metadata(&self.path).ok()?.modified().ok()?;
        Some(now.duration_since(modified).unwrap_or(Duration::ZERO))
    }

    pub fn is_valid_at(&self, now: SystemTime) -> bool {
        self.age_at(now).is_some_and(|age| age < self.ttl)
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(SystemTime::now())
    }

    // ─── File access ─────────────────────────────────────────────────────

    pub fn load(&self) -> Result<CachedSchema, CacheError> {
        let raw = std::fs::read_to_string(&self.path).map_err(|e| CacheError::io(&self.path, e))?;
        serde_json::from_str(&raw).map_err(|e| CacheError::Corrupt {
            path: self.path.clone(),
            reason: e.to_string(),
        })
    }

    /// The cached entry if the file is fresh and loads cleanly. Any problem
    /// is logged and reported as a miss.
    pub fn load_if_valid(&self) -> Option<CachedSchema> {
        if !self.is_valid() {
            tracing::debug!(path = %self.path.display(), "schema cache missing or expired");
            return None;
        }
        match self.load() {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!(error = %e, "ignoring unreadable schema cache");
                None
            }
        }
    }

    /// Write `entry` as pretty JSON, replacing the file atomically.
    pub fn save(&self, entry: &CachedSchema) -> Result<(), CacheError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CacheError::io(parent, e))?;
        }

        let json = serde_json::to_string_pretty(entry).map_err(|e| CacheError::Io {
            path: self.path.clone(),
            reason: format!("failed to serialize schema cache: {e}"),
        })?;

        let tmp_path = self.temp_path();
        std::fs::write(&tmp_path, json).map_err(|e| CacheError::io(&tmp_path, e))?;
        if let Err(e) = std::fs::rename(&tmp_path, &self.path) {
            let _ = std::fs::remove_file(&tmp_path);
            return Err(CacheError::io(&self.path, e));
        }

        tracing::debug!(path = %self.path.display(), "schema cache written");
        Ok(())
    }

    /// Delete the cache file. Returns whether a file was removed.
    pub fn clear(&self) -> Result<bool, CacheError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::info!(path = %self.path.display(), "schema cache cleared");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CacheError::io(&self.path, e)),
        }
    }

    fn temp_path(&self) -> PathBuf {
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| CACHE_FILE_NAME.to_string());
        self.path
            .with_file_name(format!(".{file_name}.{}.tmp", std::process::id()))
    }

    // ─── Discovery ───────────────────────────────────────────────────────

    /// Run a full discovery sweep and persist it.
    ///
    /// The entry is built in memory and saved only after every call has
    /// succeeded. On failure the existing file is left untouched.
    pub async fn discover_and_cache<T: RpcTransport>(
        &self,
        client: &mut GatewayClient<T>,
    ) -> Result<CachedSchema, CacheError> {
        client
            .ensure_initialized()
            .await
            .map_err(|e| sweep_error(SweepStage::Handshake, None, e))?;

        let (catalog_names, catalogs_raw) = match client.fixed_catalog().map(str::to_string) {
            Some(catalog) => {
                tracing::info!(catalog = %catalog, "using fixed catalog");
                (vec![catalog], None)
            }
            None => {
                let raw = client
                    .get_catalogs()
                    .await
                    .map_err(|e| sweep_error(SweepStage::Catalogs, None, e))?;
                (parse_catalog_names(&raw), Some(raw))
            }
        };

        tracing::info!(catalogs = catalog_names.len(), "starting schema discovery");

        let mut catalogs = BTreeMap::new();
        for name in catalog_names {
            let schemas_raw = client
                .get_schemas(&name)
                .await
                .map_err(|e| sweep_error(SweepStage::Schemas, Some(&name), e))?;
            let tables_raw = client
                .get_tables(&name, "")
                .await
                .map_err(|e| sweep_error(SweepStage::Tables, Some(&name), e))?;

            tracing::debug!(catalog = %name, "catalog discovered");
            catalogs.insert(
                name,
                CatalogEntry {
                    schemas_raw,
                    tables_raw,
                },
            );
        }

        let entry = CachedSchema {
            discovered_at: Utc::now(),
            catalogs_raw,
            catalogs,
        };
        self.save(&entry)
            .map_err(|e| sweep_error(SweepStage::Persist, None, Box::new(e)))?;

        tracing::info!(
            catalogs = entry.catalogs.len(),
            path = %self.path.display(),
            "schema cached"
        );
        Ok(entry)
    }

    /// The cached entry when fresh, otherwise a new sweep.
    pub async fn load_or_discover<T: RpcTransport>(
        &self,
        client: &mut GatewayClient<T>,
    ) -> Result<CachedSchema, CacheError> {
        if let Some(entry) = self.load_if_valid() {
            tracing::info!(
                catalogs = entry.catalogs.len(),
                discovered_at = %entry.discovered_at,
                "using cached schema"
            );
            return Ok(entry);
        }
        self.discover_and_cache(client).await
    }
}

fn sweep_error(
    stage: SweepStage,
    catalog: Option<&str>,
    source: impl Into<SweepCause>,
) -> CacheError {
    let source = source.into();
    tracing::warn!(%stage, catalog, error = %source, "schema discovery failed");
    CacheError::DiscoverySweep {
        stage,
        catalog: catalog.map(str::to_string),
        source,
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
