//! Content-addressed cache of generated input bundles
//!
//! Each bundle `bundle_<timestamp>.json` has a sidecar `bundle_<timestamp>.hash`
//! holding the digest of the case file it was built from. There is no index:
//! every lookup rescans the directory, since its contents may change between
//! runs.
//!
//! The sidecar is written only after the bundle is complete, so an interrupted
//! build never produces a hit. Entries are never invalidated; a bundle stays
//! valid for as long as the case file's bytes are unchanged, even if the
//! codebase behind it moved. Concurrent writers are not coordinated: two runs
//! missing on the same hash both build, and the later sidecar wins.

use crate::builder::BundleBuilder;
use crate::case::CaseDescription;
use crate::error::{BenchError, BenchResult};
use crate::hash::hash_file;
use chrono::Utc;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const BUNDLE_EXTENSION: &str = "json";
pub const SIDECAR_EXTENSION: &str = "hash";
const BUNDLE_PREFIX: &str = "bundle_";

/// One hash -> bundle mapping found on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub hash: String,
    pub bundle: PathBuf,
}

/// Outcome of a lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup {
    Hit(PathBuf),
    Built(PathBuf),
}

impl CacheLookup {
    pub fn path(&self) -> &Path {
        match self {
            CacheLookup::Hit(path) | CacheLookup::Built(path) => path,
        }
    }

    pub fn into_path(self) -> PathBuf {
        match self {
            CacheLookup::Hit(path) | CacheLookup::Built(path) => path,
        }
    }
}

#[derive(Debug, Clone)]
pub struct InputsCache {
    dir: PathBuf,
}

impl InputsCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Return the cached bundle for `case_file`, building and recording one on a miss.
    ///
    /// The builder runs at most once and only on a miss.
    pub fn lookup_or_build(
        &self,
        case_file: &Path,
        case: &CaseDescription,
        codebase_root: &Path,
        builder: &dyn BundleBuilder,
    ) -> BenchResult<CacheLookup> {
        let hash = hash_file(case_file)?;

        if let Some(bundle) = self.scan()?.remove(&hash) {
            tracing::info!(hash = %hash, bundle = %bundle.display(), "input cache hit");
            return Ok(CacheLookup::Hit(bundle));
        }

        tracing::info!(hash = %hash, "input cache miss; generating bundle");
        let bundle = builder.build(case, codebase_root)?;

        fs::create_dir_all(&self.dir).map_err(|e| BenchError::io(&self.dir, e))?;
        let bundle_path = self.fresh_bundle_path();
        bundle.write(&bundle_path)?;

        let sidecar = bundle_path.with_extension(SIDECAR_EXTENSION);
        fs::write(&sidecar, &hash).map_err(|e| BenchError::io(&sidecar, e))?;
        tracing::info!(bundle = %bundle_path.display(), "cached new bundle");

        Ok(CacheLookup::Built(bundle_path))
    }

    /// Hash -> bundle map built from the sidecars currently on disk.
    ///
    /// Sidecars are visited in name order, which is creation order for
    /// timestamped names, so a later sidecar for the same hash wins. Sidecars
    /// whose bundle is missing are ignored.
    pub fn scan(&self) -> BenchResult<BTreeMap<String, PathBuf>> {
        Ok(self
            .entries()?
            .into_iter()
            .map(|entry| (entry.hash, entry.bundle))
            .collect())
    }

    /// All usable entries, oldest first
    pub fn entries(&self) -> BenchResult<Vec<CacheEntry>> {
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut sidecars: Vec<PathBuf> = fs::read_dir(&self.dir)
            .map_err(|e| BenchError::io(&self.dir, e))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().is_some_and(|ext| ext == SIDECAR_EXTENSION))
            .collect();
        sidecars.sort();

        let mut entries = Vec::with_capacity(sidecars.len());
        for sidecar in sidecars {
            let bundle = sidecar.with_extension(BUNDLE_EXTENSION);
            if !bundle.is_file() {
                tracing::warn!(sidecar = %sidecar.display(), "sidecar without bundle; ignoring");
                continue;
            }
            let hash = fs::read_to_string(&sidecar).map_err(|e| BenchError::io(&sidecar, e))?;
            tracing::debug!(hash = %hash.trim(), bundle = %bundle.display(), "cache entry");
            entries.push(CacheEntry {
                hash: hash.trim().to_string(),
                bundle,
            });
        }

        Ok(entries)
    }

    /// Delete every bundle and sidecar; returns the number of files removed.
    pub fn clear(&self) -> BenchResult<usize> {
        if !self.dir.is_dir() {
            return Ok(0);
        }

        let mut removed = 0;
        for entry in fs::read_dir(&self.dir).map_err(|e| BenchError::io(&self.dir, e))? {
            let path = entry.map_err(|e| BenchError::io(&self.dir, e))?.path();
            let is_cache_file = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(BUNDLE_PREFIX))
                && path.extension().is_some_and(|ext| {
                    ext == BUNDLE_EXTENSION || ext == SIDECAR_EXTENSION
                });
            if is_cache_file {
                fs::remove_file(&path).map_err(|e| BenchError::io(&path, e))?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// `bundle_<timestamp>.json` that does not exist yet
    fn fresh_bundle_path(&self) -> PathBuf {
        let stamp = Utc::now().format("%Y%m%dT%H%M%S%.6f").to_string();
        let mut candidate = self
            .dir
            .join(format!("{}{}.{}", BUNDLE_PREFIX, stamp, BUNDLE_EXTENSION));
        let mut suffix = 1;
        while candidate.exists() {
            candidate = self.dir.join(format!(
                "{}{}_{}.{}",
                BUNDLE_PREFIX, stamp, suffix, BUNDLE_EXTENSION
            ));
            suffix += 1;
        }
        candidate
    }
}
