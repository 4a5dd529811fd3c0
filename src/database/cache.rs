use std::ffi::OsString;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::database::engine::{CompileError, PatternDatabase};
use crate::database::rule::PatternRule;
use crate::parsing::patterns::{parse_pattern_file, PatternTableError};
use crate::utils::validation::compute_file_md5;

/// File extension of serialized pattern databases
pub const CACHE_EXTENSION: &str = "fdb";

/// Cache layout version for compatibility checking
pub const CACHE_FORMAT_VERSION: u32 = 2;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error(transparent)]
    Table(#[from] PatternTableError),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error("Failed to generate MD5 digest of '{path}': {source}")]
    Digest {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Couldn't remove cache file '{path}': {source}")]
    CacheRemove {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Couldn't read cache file '{path}': {source}")]
    CacheRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to decode cache file '{path}': {source}")]
    CacheDecode {
        path: PathBuf,
        #[source]
        source: bincode::Error,
    },

    #[error("Cache file '{path}' is incompatible ({reason}); delete it or use --recompile")]
    CacheMismatch { path: PathBuf, reason: String },

    #[error("Couldn't write cache file '{path}': {source}")]
    CacheWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode pattern database: {0}")]
    CacheEncode(#[source] bincode::Error),
}

impl DatabaseError {
    /// Whether the failure concerns the cache file rather than the pattern table
    #[must_use]
    pub fn is_cache_error(&self) -> bool {
        matches!(
            self,
            Self::CacheRemove { .. }
                | Self::CacheRead { .. }
                | Self::CacheDecode { .. }
                | Self::CacheMismatch { .. }
                | Self::CacheWrite { .. }
                | Self::CacheEncode(_)
        )
    }
}

/// Serializable cache payload
#[derive(Debug, Serialize, Deserialize)]
struct CachedDatabase {
    format_version: u32,
    created_at: String,
    source_digest: String,
    rules: Vec<PatternRule>,
}

/// How a database was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseOrigin {
    /// Parsed and compiled from the pattern table, then cached
    Compiled,
    /// Restored from an existing cache file
    Cached,
}

/// A database together with where it came from
#[derive(Debug)]
pub struct LoadedDatabase {
    pub database: PatternDatabase,
    pub cache_path: PathBuf,
    pub origin: DatabaseOrigin,
}

/// Content-addressed cache location for one pattern file revision
#[derive(Debug, Clone)]
pub struct PatternCache {
    pattern_file: PathBuf,
    digest: String,
    cache_path: PathBuf,
}

impl PatternCache {
    /// Locate the cache entry for the current content of `pattern_file`.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::Digest` if the pattern file cannot be read.
    pub fn for_pattern_file(pattern_file: &Path) -> Result<Self, DatabaseError> {
        let digest = compute_file_md5(pattern_file).map_err(|source| DatabaseError::Digest {
            path: pattern_file.to_path_buf(),
            source,
        })?;
        let cache_path = cache_path_for(pattern_file, &digest);

        Ok(Self {
            pattern_file: pattern_file.to_path_buf(),
            digest,
            cache_path,
        })
    }

    #[must_use]
    pub fn cache_path(&self) -> &Path {
        &self.cache_path
    }

    #[must_use]
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// Restore the database from the cache, or compile and cache it.
    ///
    /// With `force_recompile`, an existing cache entry is deleted first.
    ///
    /// # Errors
    ///
    /// Returns a `DatabaseError` if the cache cannot be removed, read or
    /// written, or if the pattern table fails to parse or compile. Cache
    /// failures are never downgraded to a silent recompile.
    pub fn compile_or_load(&self, force_recompile: bool) -> Result<LoadedDatabase, DatabaseError> {
        if force_recompile && self.cache_path.is_file() {
            debug!("Removing cached pattern DB {}", self.cache_path.display());
            std::fs::remove_file(&self.cache_path).map_err(|source| {
                DatabaseError::CacheRemove {
                    path: self.cache_path.clone(),
                    source,
                }
            })?;
        }

        if self.cache_path.is_file() {
            debug!("Serialized pattern DB exists, use --recompile to rebuild it from text");
            info!("Reading from pattern DB file: {}", self.cache_path.display());
            let database = self.read()?;
            return Ok(LoadedDatabase {
                database,
                cache_path: self.cache_path.clone(),
                origin: DatabaseOrigin::Cached,
            });
        }

        info!("Compiling patterns from {}", self.pattern_file.display());
        let rules = parse_pattern_file(&self.pattern_file)?;
        let database = PatternDatabase::compile(rules)?;
        info!("Compiled {} patterns", database.len());

        info!("Serializing pattern DB to {}", self.cache_path.display());
        self.write(&database)?;

        Ok(LoadedDatabase {
            database,
            cache_path: self.cache_path.clone(),
            origin: DatabaseOrigin::Compiled,
        })
    }

    fn read(&self) -> Result<PatternDatabase, DatabaseError> {
        let read_error = |source| DatabaseError::CacheRead {
            path: self.cache_path.clone(),
            source,
        };

        let file = File::open(&self.cache_path).map_err(read_error)?;
        let mut bytes = Vec::new();
        GzDecoder::new(BufReader::new(file))
            .read_to_end(&mut bytes)
            .map_err(read_error)?;

        let cached: CachedDatabase =
            bincode::deserialize(&bytes).map_err(|source| DatabaseError::CacheDecode {
                path: self.cache_path.clone(),
                source,
            })?;

        if cached.format_version != CACHE_FORMAT_VERSION {
            return Err(DatabaseError::CacheMismatch {
                path: self.cache_path.clone(),
                reason: format!(
                    "format version {} but expected {CACHE_FORMAT_VERSION}",
                    cached.format_version
                ),
            });
        }
        if cached.source_digest != self.digest {
            return Err(DatabaseError::CacheMismatch {
                path: self.cache_path.clone(),
                reason: format!(
                    "built from digest {} but pattern file is {}",
                    cached.source_digest, self.digest
                ),
            });
        }

        debug!("Cache entry created at {}", cached.created_at);
        Ok(PatternDatabase::compile(cached.rules)?)
    }

    /// Write the cache through a temporary file so readers never see a partial entry
    fn write(&self, database: &PatternDatabase) -> Result<(), DatabaseError> {
        let write_error = |source| DatabaseError::CacheWrite {
            path: self.cache_path.clone(),
            source,
        };

        let cached = CachedDatabase {
            format_version: CACHE_FORMAT_VERSION,
            created_at: chrono::Utc::now().to_rfc3339(),
            source_digest: self.digest.clone(),
            rules: database.rules().to_vec(),
        };
        let bytes = bincode::serialize(&cached).map_err(DatabaseError::CacheEncode)?;

        let dir = match self.cache_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let temp = tempfile::NamedTempFile::new_in(dir).map_err(write_error)?;

        let mut encoder = GzEncoder::new(BufWriter::new(temp), Compression::best());
        encoder.write_all(&bytes).map_err(write_error)?;
        let temp = encoder
            .finish()
            .map_err(write_error)?
            .into_inner()
            .map_err(|e| write_error(e.into_error()))?;

        temp.persist(&self.cache_path)
            .map_err(|e| write_error(e.error))?;
        Ok(())
    }
}

/// Cache file path for a pattern file with the given content digest:
/// `<pattern_file>.<digest>.fdb`
#[must_use]
pub fn cache_path_for(pattern_file: &Path, digest: &str) -> PathBuf {
    let mut name = OsString::from(pattern_file.as_os_str());
    name.push(format!(".{digest}.{CACHE_EXTENSION}"));
    PathBuf::from(name)
}

/// Build the database for a pattern file, using the content-addressed cache.
///
/// # Errors
///
/// See [`PatternCache::compile_or_load`].
pub fn compile_or_load(
    pattern_file: &Path,
    force_recompile: bool,
) -> Result<PatternDatabase, DatabaseError> {
    let cache = PatternCache::for_pattern_file(pattern_file)?;
    Ok(cache.compile_or_load(force_recompile)?.database)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::engine::PatternScanner;
    use std::io::Write;
    use tempfile::TempDir;

    fn pattern_file(dir: &TempDir, content: &str) -> PathBuf {
        let path = dir.path().join("barcodes.txt");
        let mut file = File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_cache_path_embeds_digest() {
        let path = cache_path_for(Path::new("dir/barcodes.txt"), "abc123");
        assert_eq!(path, PathBuf::from("dir/barcodes.txt.abc123.fdb"));
    }

    #[test]
    fn test_compile_then_load_from_cache() {
        let dir = TempDir::new().unwrap();
        let path = pattern_file(&dir, "1:/ACGT/i\n2:/GGG/\n");
        let cache = PatternCache::for_pattern_file(&path).unwrap();

        let first = cache.compile_or_load(false).unwrap();
        assert_eq!(first.origin, DatabaseOrigin::Compiled);
        assert!(first.cache_path.is_file());

        let second = cache.compile_or_load(false).unwrap();
        assert_eq!(second.origin, DatabaseOrigin::Cached);
        assert_eq!(second.database.rules(), first.database.rules());

        let buffer = b"ggacgtGGGcc\n";
        let a: Vec<_> = first.database.scan(buffer).collect();
        let b: Vec<_> = second.database.scan(buffer).collect();
        assert_eq!(a, b);
        assert_eq!(a.len(), 2);
    }

    #[test]
    fn test_force_recompile_replaces_cache() {
        let dir = TempDir::new().unwrap();
        let path = pattern_file(&dir, "1:/ACGT/\n");
        let cache = PatternCache::for_pattern_file(&path).unwrap();

        cache.compile_or_load(false).unwrap();
        let again = cache.compile_or_load(true).unwrap();
        assert_eq!(again.origin, DatabaseOrigin::Compiled);
        assert!(cache.cache_path().is_file());
    }

    #[test]
    fn test_changed_content_uses_new_cache_entry() {
        let dir = TempDir::new().unwrap();
        let path = pattern_file(&dir, "1:/ACGT/\n");
        let before = PatternCache::for_pattern_file(&path).unwrap();
        before.compile_or_load(false).unwrap();

        let path = pattern_file(&dir, "1:/TTTT/\n");
        let after = PatternCache::for_pattern_file(&path).unwrap();
        assert_ne!(before.cache_path(), after.cache_path());

        let loaded = after.compile_or_load(false).unwrap();
        assert_eq!(loaded.origin, DatabaseOrigin::Compiled);
        assert_eq!(loaded.database.rules()[0].expression.pattern, "TTTT");
    }

    #[test]
    fn test_corrupt_cache_is_fatal() {
        let dir = TempDir::new().unwrap();
        let path = pattern_file(&dir, "1:/ACGT/\n");
        let cache = PatternCache::for_pattern_file(&path).unwrap();
        std::fs::write(cache.cache_path(), b"not gzip at all").unwrap();

        let err = cache.compile_or_load(false).unwrap_err();
        assert!(err.is_cache_error());
    }

    #[test]
    fn test_parse_error_is_not_cached() {
        let dir = TempDir::new().unwrap();
        let path = pattern_file(&dir, "1:/ACGT/\nx:/GG/\n");
        let cache = PatternCache::for_pattern_file(&path).unwrap();

        let err = cache.compile_or_load(false).unwrap_err();
        assert!(!err.is_cache_error());
        assert!(err.to_string().contains("line 2"));
        assert!(!cache.cache_path().exists());
    }

    #[test]
    fn test_compile_error_names_table_line() {
        let dir = TempDir::new().unwrap();
        let path = pattern_file(&dir, "1:/ACGT/\n2:/AC(GT/\n");

        let err = compile_or_load(&path, false).unwrap_err();
        assert!(matches!(err, DatabaseError::Compile(_)));
        assert!(err.to_string().contains("line 2"), "{err}");
    }

    #[test]
    fn test_unwritable_cache_is_cache_error() {
        let dir = TempDir::new().unwrap();
        let path = pattern_file(&dir, "1:/ACGT/\n");
        let cache = PatternCache::for_pattern_file(&path).unwrap();
        // A directory in the cache's place cannot be replaced by the new file
        std::fs::create_dir(cache.cache_path()).unwrap();

        let err = cache.compile_or_load(false).unwrap_err();
        assert!(err.is_cache_error(), "{err}");
        assert!(matches!(err, DatabaseError::CacheWrite { .. }));
    }

    #[test]
    fn test_missing_pattern_file() {
        let err = compile_or_load(Path::new("/nonexistent/barcodes.txt"), false).unwrap_err();
        assert!(matches!(err, DatabaseError::Digest { .. }));
        assert!(err.to_string().contains("/nonexistent/barcodes.txt"));
    }
}
