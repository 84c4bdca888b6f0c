//! Saving and loading indexes, and query edge cases.

use docqa_context::{IndexEntry, VectorIndex, load_index, load_index_async, save_index};
use docqa_core::{Chunk, Error, SourceRef};
use std::fs;
use tempfile::TempDir;

fn entries() -> Vec<IndexEntry> {
    let vectors = [
        vec![0.12, -0.5, 0.33, 0.9],
        vec![0.7, 0.1, -0.2, 0.05],
        vec![0.7, 0.1, -0.2, 0.05],
        vec![-0.3, 0.8, 0.6, -0.1],
        vec![0.0, 0.0, 1.0, 0.0],
    ];
    vectors
        .into_iter()
        .enumerate()
        .map(|(position, vector)| {
            IndexEntry::new(
                vector,
                Chunk {
                    text: format!("chunk {position} of the boss guide"),
                    source: SourceRef::page("data/Skeletron_Prime.pdf", u32::try_from(position).unwrap() + 1),
                    index: position,
                    overlap: if position == 0 { 0 } else { 5 },
                },
            )
        })
        .collect()
}

fn probes() -> Vec<Vec<f32>> {
    vec![
        vec![1.0, 0.0, 0.0, 0.0],
        vec![0.7, 0.1, -0.2, 0.05],
        vec![-1.0, -1.0, 0.5, 0.25],
        vec![0.0, 0.0, 0.0, 0.0],
    ]
}

#[test]
fn loaded_index_answers_identically() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("vectorstores").join("db");
    let built = VectorIndex::build("all-minilm", entries()).unwrap();

    save_index(&built, &path).unwrap();
    let loaded = load_index(&path).unwrap();

    for probe in probes() {
        for k in 0..=6 {
            assert_eq!(built.query(&probe, k).unwrap(), loaded.query(&probe, k).unwrap());
        }
    }
}

#[tokio::test]
async fn async_load_matches_sync_save() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("db");
    let built = VectorIndex::build("all-minilm", entries()).unwrap();
    save_index(&built, &path).unwrap();

    let loaded = load_index_async(path).await.unwrap();
    assert_eq!(loaded, built);
}

#[test]
fn zero_k_returns_nothing() {
    let index = VectorIndex::build("all-minilm", entries()).unwrap();
    for probe in probes() {
        assert!(index.query(&probe, 0).unwrap().is_empty());
    }
}

#[test]
fn empty_index_rejects_queries() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("db");
    save_index(&VectorIndex::empty("all-minilm"), &path).unwrap();
    let index = load_index(&path).unwrap();

    for k in 1..4 {
        assert!(matches!(
            index.query(&[1.0, 0.0, 0.0, 0.0], k),
            Err(Error::EmptyIndex)
        ));
    }
}

#[test]
fn duplicate_vectors_keep_insertion_order() {
    let index = VectorIndex::build("all-minilm", entries()).unwrap();
    let hits = index.query(&[0.7, 0.1, -0.2, 0.05], 2).unwrap();
    assert_eq!(hits[0].chunk.index, 1);
    assert_eq!(hits[1].chunk.index, 2);
}

#[test]
fn garbage_files_are_reported_as_corrupt() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("db");
    save_index(&VectorIndex::build("all-minilm", entries()).unwrap(), &path).unwrap();
    fs::write(path.join("chunks.json"), b"{ not json").unwrap();

    assert!(matches!(load_index(&path), Err(Error::IndexCorrupt(_))));
}
