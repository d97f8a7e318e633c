//! Route set directories.
//!
//! A route set is a directory of catalog documents (`*.toml`). Files whose name starts
//! with `_` hold shared data (stops, calendars, operators); the others hold one line each.
//! Both groups are sorted by name and shared files come first, which fixes the order used
//! for loading and for the fingerprint.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use sha2::{Digest, Sha256};

use crate::catalog::doc::{CatalogDoc, load_doc_path, normalize_doc};
use crate::import_set::ImportError;

/// File extension of catalog documents in a route set.
pub const CATALOG_EXTENSION: &str = "toml";

/// A listed and fingerprinted route set directory.
#[derive(Debug, Clone)]
pub struct RouteSet {
    path: PathBuf,
    shared_files: Vec<PathBuf>,
    line_files: Vec<PathBuf>,
    size: u64,
    fingerprint: String,
}

impl RouteSet {
    /// List and fingerprint the route set at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ImportError> {
        let path = path.as_ref().to_path_buf();
        if !path.is_dir() {
            return Err(ImportError::NotADirectory(path));
        }

        let mut shared_files = Vec::new();
        let mut line_files = Vec::new();
        for entry in fs::read_dir(&path)? {
            let file = entry?.path();
            if !file.is_file() || file.extension().is_none_or(|e| e != CATALOG_EXTENSION) {
                continue;
            }
            let shared = file
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with('_'));
            if shared {
                shared_files.push(file);
            } else {
                line_files.push(file);
            }
        }
        if shared_files.is_empty() && line_files.is_empty() {
            return Err(ImportError::EmptyRouteSet(path));
        }
        shared_files.sort();
        line_files.sort();

        let mut size = 0;
        let mut digests = Vec::with_capacity(shared_files.len() + line_files.len());
        for file in shared_files.iter().chain(&line_files) {
            let bytes = fs::read(file)?;
            size += bytes.len() as u64;
            digests.push(hex::encode(Sha256::digest(&bytes)));
        }
        let fingerprint = hex::encode(Sha256::digest(digests.join(":").as_bytes()));

        Ok(Self {
            path,
            shared_files,
            line_files,
            size,
            fingerprint,
        })
    }

    /// Directory of the set.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Shared files, sorted.
    pub fn shared_files(&self) -> &[PathBuf] {
        &self.shared_files
    }

    /// Line files, sorted.
    pub fn line_files(&self) -> &[PathBuf] {
        &self.line_files
    }

    /// All files, shared first.
    pub fn files(&self) -> impl Iterator<Item = &Path> {
        self.shared_files
            .iter()
            .chain(&self.line_files)
            .map(PathBuf::as_path)
    }

    /// Number of files.
    pub fn file_count(&self) -> usize {
        self.shared_files.len() + self.line_files.len()
    }

    /// Total bytes of all files.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// SHA-256 over the `:`-joined hex digests of every file, in listing order.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Parse every file and merge them into one normalized catalog document.
    pub fn load_doc(&self) -> anyhow::Result<CatalogDoc> {
        let mut doc = CatalogDoc::default();
        for file in self.files() {
            doc.merge(load_doc_path(file)?);
        }
        let report = normalize_doc(&mut doc)
            .with_context(|| format!("route set {}", self.path.display()))?;
        if !report.is_noop() {
            tracing::info!(%report, "route set normalized");
        }
        Ok(doc)
    }
}
