//! On-disk layout of a vector index.
//!
//! An index directory holds two files written together:
//! - `index.bin`: bincode-encoded format version, dimension and vectors
//! - `chunks.json`: format version, model name and the chunk for each entry id
//!
//! Saves go to a staging directory next to the target which is then renamed
//! into place, so readers never observe a partially written index.

use bincode::config::standard as bincode_config;
use bincode::{Decode, Encode, decode_from_slice, encode_to_vec};
use docqa_core::{Chunk, Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tokio::task::spawn_blocking;
use tracing::{info, warn};
use uuid::Uuid;

use super::{IndexEntry, VectorIndex};

/// Version written into both index files
pub const FORMAT_VERSION: u32 = 1;
/// Binary vector file name
pub const VECTORS_FILE: &str = "index.bin";
/// Chunk metadata file name
pub const CHUNKS_FILE: &str = "chunks.json";
/// Upper bound on the memory `index.bin` may claim while decoding
pub const MAX_INDEX_BYTES: usize = 1 << 30;

#[derive(Debug, Encode, Decode)]
struct VectorFile {
    version: u32,
    dimension: u64,
    vectors: Vec<Vec<f32>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChunkManifest {
    version: u32,
    model: String,
    entries: Vec<ManifestEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ManifestEntry {
    id: usize,
    chunk: Chunk,
}

/// Writes `index` to the directory `path`, replacing any previous index.
///
/// # Errors
/// Returns an error if encoding fails or the directory cannot be written
pub fn save_index(index: &VectorIndex, path: &Path) -> Result<()> {
    let parent = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| Error::Config(format!("Invalid index path: {}", path.display())))?;
    fs::create_dir_all(parent)?;

    let staging = parent.join(format!(".{name}.staging-{}", Uuid::new_v4()));
    if let Err(error) = write_files(index, &staging) {
        remove_quietly(&staging);
        return Err(error);
    }

    swap_into_place(&staging, path, parent, name)?;
    info!(
        "Saved index with {} entries to {}",
        index.len(),
        path.display()
    );
    Ok(())
}

/// Reads the index stored in the directory `path`.
///
/// # Errors
/// Returns `Error::FileNotFound` if no index exists at `path`, and
/// `Error::IndexCorrupt` if its files are missing, unreadable, or disagree
pub fn load_index(path: &Path) -> Result<VectorIndex> {
    if !path.is_dir() {
        return Err(Error::FileNotFound(format!(
            "No index at '{}'. Run ingestion first.",
            path.display()
        )));
    }

    let vector_bytes = read_part(&path.join(VECTORS_FILE))?;
    let (vectors, consumed): (VectorFile, usize) =
        decode_from_slice(&vector_bytes, bincode_config().with_limit::<MAX_INDEX_BYTES>())
            .map_err(|error| Error::IndexCorrupt(format!("Undecodable {VECTORS_FILE}: {error}")))?;
    if consumed != vector_bytes.len() {
        return Err(Error::IndexCorrupt(format!(
            "Trailing bytes in {VECTORS_FILE}"
        )));
    }

    let manifest_bytes = read_part(&path.join(CHUNKS_FILE))?;
    let manifest: ChunkManifest = serde_json::from_slice(&manifest_bytes)
        .map_err(|error| Error::IndexCorrupt(format!("Unparseable {CHUNKS_FILE}: {error}")))?;

    let entries = join_parts(vectors, manifest.version, manifest.entries)?;
    VectorIndex::build(manifest.model, entries)
        .map_err(|error| Error::IndexCorrupt(error.to_string()))
}

/// Saves on a blocking thread.
///
/// # Errors
/// See [`save_index`]
pub async fn save_index_async(index: VectorIndex, path: PathBuf) -> Result<()> {
    spawn_blocking(move || save_index(&index, &path))
        .await
        .map_err(|error| Error::Other(format!("Task join error: {error}")))?
}

/// Loads on a blocking thread.
///
/// # Errors
/// See [`load_index`]
pub async fn load_index_async(path: PathBuf) -> Result<VectorIndex> {
    spawn_blocking(move || load_index(&path))
        .await
        .map_err(|error| Error::Other(format!("Task join error: {error}")))?
}

fn write_files(index: &VectorIndex, dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)?;

    let vectors = VectorFile {
        version: FORMAT_VERSION,
        dimension: index.dimension() as u64,
        vectors: index
            .entries()
            .iter()
            .map(|entry| entry.vector.clone())
            .collect(),
    };
    let bytes = encode_to_vec(&vectors, bincode_config())
        .map_err(|error| Error::Other(format!("Failed to encode vectors: {error}")))?;
    if bytes.len() > MAX_INDEX_BYTES {
        return Err(Error::Other(format!(
            "Index of {} bytes exceeds the {MAX_INDEX_BYTES} byte limit",
            bytes.len()
        )));
    }
    fs::write(dir.join(VECTORS_FILE), bytes)?;

    let manifest = ChunkManifest {
        version: FORMAT_VERSION,
        model: index.model().to_owned(),
        entries: index
            .entries()
            .iter()
            .enumerate()
            .map(|(id, entry)| ManifestEntry {
                id,
                chunk: entry.chunk.clone(),
            })
            .collect(),
    };
    fs::write(dir.join(CHUNKS_FILE), serde_json::to_vec_pretty(&manifest)?)?;
    Ok(())
}

fn swap_into_place(staging: &Path, target: &Path, parent: &Path, name: &str) -> Result<()> {
    let backup = if target.exists() {
        let backup = parent.join(format!(".{name}.old-{}", Uuid::new_v4()));
        fs::rename(target, &backup)?;
        Some(backup)
    } else {
        None
    };

    if let Err(error) = fs::rename(staging, target) {
        if let Some(backup) = &backup
            && let Err(restore_error) = fs::rename(backup, target)
        {
            warn!(
                "Failed to restore previous index from {}: {restore_error}",
                backup.display()
            );
        }
        remove_quietly(staging);
        return Err(error.into());
    }

    if let Some(backup) = backup {
        remove_quietly(&backup);
    }
    Ok(())
}

fn remove_quietly(dir: &Path) {
    if dir.exists()
        && let Err(error) = fs::remove_dir_all(dir)
    {
        warn!("Failed to remove {}: {error}", dir.display());
    }
}

fn read_part(path: &Path) -> Result<Vec<u8>> {
    fs::read(path)
        .map_err(|error| Error::IndexCorrupt(format!("Cannot read {}: {error}", path.display())))
}

fn join_parts(
    vectors: VectorFile,
    manifest_version: u32,
    manifest_entries: Vec<ManifestEntry>,
) -> Result<Vec<IndexEntry>> {
    if vectors.version != FORMAT_VERSION || manifest_version != FORMAT_VERSION {
        return Err(Error::IndexCorrupt(format!(
            "Unsupported format version (vectors {}, chunks {manifest_version}, expected {FORMAT_VERSION})",
            vectors.version
        )));
    }
    if vectors.vectors.len() != manifest_entries.len() {
        return Err(Error::IndexCorrupt(format!(
            "{} vectors but {} chunks",
            vectors.vectors.len(),
            manifest_entries.len()
        )));
    }

    let dimension = vectors.dimension as usize;
    vectors
        .vectors
        .into_iter()
        .zip(manifest_entries)
        .enumerate()
        .map(|(position, (vector, entry))| {
            if entry.id != position {
                return Err(Error::IndexCorrupt(format!(
                    "Entry id {} found at position {position}",
                    entry.id
                )));
            }
            if vector.len() != dimension {
                return Err(Error::IndexCorrupt(format!(
                    "Vector {position} has length {}, expected {dimension}",
                    vector.len()
                )));
            }
            Ok(IndexEntry::new(vector, entry.chunk))
        })
        .collect()
}
