//! Loading documents from the ingestion directory.
//!
//! PDFs yield one document per page; any other matched file is read whole as
//! UTF-8 text. Files are read on blocking threads with bounded concurrency.

use docqa_core::{Document, Error, IngestConfig, Result, SourceRef};
use futures::stream::{FuturesUnordered, StreamExt as _};
use glob::Pattern;
use lopdf::Document as PdfDocument;
use std::fs;
use std::path::{Path, PathBuf};
use tokio::task::{JoinHandle, spawn_blocking};
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

const MAX_CONCURRENT_READS: usize = 8;

/// A matched file that could not be loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    /// File that failed
    pub path: PathBuf,
    /// Why it failed
    pub reason: String,
}

/// Result of loading a directory.
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Documents in path order, pages ascending
    pub documents: Vec<Document>,
    /// Number of files that loaded
    pub files_loaded: usize,
    /// Files matched by the pattern that could not be read
    pub skipped: Vec<SkippedFile>,
}

/// Finds and reads documents under a root directory.
#[derive(Debug, Clone)]
pub struct DocumentLoader {
    root: PathBuf,
    pattern: Pattern,
}

impl DocumentLoader {
    /// Loader for files under `root` whose relative path matches `pattern`.
    ///
    /// # Errors
    /// Returns `Error::Config` if `pattern` is not a valid glob
    pub fn new(root: impl Into<PathBuf>, pattern: &str) -> Result<Self> {
        let pattern = Pattern::new(pattern)
            .map_err(|error| Error::Config(format!("Invalid file pattern '{pattern}': {error}")))?;
        Ok(Self {
            root: root.into(),
            pattern,
        })
    }

    /// Loader for the `[ingest]` config section.
    ///
    /// # Errors
    /// Returns `Error::Config` if the configured pattern is not a valid glob
    pub fn from_config(config: &IngestConfig) -> Result<Self> {
        Self::new(config.data_path.clone(), &config.file_pattern)
    }

    /// Directory being searched.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Matching files, sorted by path.
    ///
    /// # Errors
    /// Returns `Error::FileNotFound` if the root directory does not exist
    pub fn discover(&self) -> Result<Vec<PathBuf>> {
        if !self.root.is_dir() {
            return Err(Error::FileNotFound(format!(
                "The specified data path '{}' does not exist.",
                self.root.display()
            )));
        }

        let mut files: Vec<PathBuf> = WalkDir::new(&self.root)
            .follow_links(true)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(error) => {
                    warn!("Skipping unreadable entry: {error}");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .map(DirEntry::into_path)
            .filter(|path| {
                path.strip_prefix(&self.root)
                    .is_ok_and(|relative| self.pattern.matches_path(relative))
            })
            .collect();
        files.sort();

        debug!(
            "Found {} files matching '{}' under {}",
            files.len(),
            self.pattern,
            self.root.display()
        );
        Ok(files)
    }

    /// Loads every matching file. Unreadable files are reported, not fatal.
    ///
    /// # Errors
    /// Returns `Error::FileNotFound` if the root directory does not exist
    pub async fn load(&self) -> Result<LoadReport> {
        let files = self.discover()?;
        let mut report = LoadReport::default();
        let mut tasks = FuturesUnordered::new();
        let mut pending = files.into_iter();

        for path in pending.by_ref().take(MAX_CONCURRENT_READS) {
            tasks.push(spawn_load(path));
        }

        while let Some(joined) = tasks.next().await {
            let (path, result) =
                joined.map_err(|error| Error::Other(format!("Task join error: {error}")))?;
            match result {
                Ok(documents) => {
                    report.files_loaded += 1;
                    report.documents.extend(documents);
                }
                Err(error) => {
                    warn!("Failed to load {}: {error}", path.display());
                    report.skipped.push(SkippedFile {
                        path,
                        reason: error.to_string(),
                    });
                }
            }

            if let Some(path) = pending.next() {
                tasks.push(spawn_load(path));
            }
        }

        report
            .documents
            .sort_by(|first, second| {
                (&first.source.path, first.source.page).cmp(&(&second.source.path, second.source.page))
            });
        report.skipped.sort_by(|first, second| first.path.cmp(&second.path));

        info!(
            "Loaded {} documents from {} files ({} skipped)",
            report.documents.len(),
            report.files_loaded,
            report.skipped.len()
        );
        Ok(report)
    }
}

fn spawn_load(path: PathBuf) -> JoinHandle<(PathBuf, Result<Vec<Document>>)> {
    spawn_blocking(move || {
        let result = load_file(&path);
        (path, result)
    })
}

/// Reads one file into documents.
///
/// # Errors
/// Returns `Error::Document` if the file cannot be parsed, or `Error::Io` if
/// it cannot be read
pub fn load_file(path: &Path) -> Result<Vec<Document>> {
    let is_pdf = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
    if is_pdf {
        return load_pdf(path);
    }

    let bytes = fs::read(path)?;
    let text = String::from_utf8(bytes).map_err(|error| {
        Error::Document(format!("{} is not valid UTF-8: {error}", path.display()))
    })?;
    Ok(vec![Document::new(text, SourceRef::file(path))])
}

fn load_pdf(path: &Path) -> Result<Vec<Document>> {
    let pdf = PdfDocument::load(path)
        .map_err(|error| Error::Document(format!("Failed to open {}: {error}", path.display())))?;

    pdf.get_pages()
        .into_keys()
        .map(|page| {
            let text = pdf.extract_text(&[page]).map_err(|error| {
                Error::Document(format!(
                    "Failed to extract page {page} of {}: {error}",
                    path.display()
                ))
            })?;
            Ok(Document::new(text, SourceRef::page(path, page)))
        })
        .collect()
}
