//! Schema cache error types.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::gateway::GatewayError;

/// Step of a discovery sweep, reported when the sweep fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepStage {
    Handshake,
    Catalogs,
    Schemas,
    Tables,
    /// Writing the finished entry to disk.
    Persist,
}

impl fmt::Display for SweepStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SweepStage::Handshake => "handshake",
            SweepStage::Catalogs => "catalogs",
            SweepStage::Schemas => "schemas",
            SweepStage::Tables => "tables",
            SweepStage::Persist => "persist",
        };
        f.write_str(name)
    }
}

/// What went wrong inside a discovery sweep.
#[derive(Debug, Error)]
pub enum SweepCause {
    /// A gateway call failed.
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// The finished entry could not be written.
    #[error(transparent)]
    Persist(#[from] Box<CacheError>),
}

impl SweepCause {
    pub fn gateway_error(&self) -> Option<&GatewayError> {
        match self {
            SweepCause::Gateway(e) => Some(e),
            SweepCause::Persist(_) => None,
        }
    }
}

/// Errors from reading, writing or rebuilding the schema cache.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The cache file or its directory could not be read or written.
    #[error("cache I/O error at {}: {reason}", path.display())]
    Io {
        path: PathBuf,
        reason: String,
    },

    /// The cache file exists but does not hold a valid entry.
    #[error("corrupt schema cache at {}: {reason}", path.display())]
    Corrupt {
        path: PathBuf,
        reason: String,
    },

    /// A discovery sweep failed. The previous cache file is untouched.
    #[error("schema discovery failed at {stage}{}: {source}", describe_catalog(catalog))]
    DiscoverySweep {
        stage: SweepStage,
        catalog: Option<String>,
        #[source]
        source: SweepCause,
    },

    /// No platform cache directory or home directory could be resolved.
    #[error("no cache directory available on this platform")]
    NoCacheDir,
}

fn describe_catalog(catalog: &Option<String>) -> String {
    match catalog {
        Some(name) => format!(" for catalog '{name}'"),
        None => String::new(),
    }
}

impl CacheError {
    pub(crate) fn io(path: &std::path::Path, err: std::io::Error) -> Self {
        CacheError::Io {
            path: path.to_path_buf(),
            reason: err.to_string(),
        }
    }

    /// The failed stage, for sweep errors.
    pub fn stage(&self) -> Option<SweepStage> {
        match self {
            CacheError::DiscoverySweep { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}
