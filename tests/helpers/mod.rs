#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{ArrayRef, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use ndarray::Array2;
use scope_embed::config::Codec;
use scope_embed::matrix::{write_matrix, EmbeddingMatrix};
use scope_embed::merge::MergeConfig;
use scope_embed::table::write_table;

/// A table with an `id` column `0..n` and a `text` column `"row-{i}"`.
pub fn id_text_table(n: i64) -> RecordBatch {
    let schema = Schema::new(vec![
        Field::new("id", DataType::Int64, false),
        Field::new("text", DataType::Utf8, true),
    ]);
    let columns: Vec<ArrayRef> = vec![
        Arc::new(Int64Array::from_iter_values(0..n)),
        Arc::new(StringArray::from_iter_values((0..n).map(|i| format!("row-{i}")))),
    ];
    RecordBatch::try_new(Arc::new(schema), columns).unwrap()
}

/// A deterministic `rows × dims` matrix where element `(i, j)` is `i + j / 10`.
pub fn test_matrix(rows: usize, dims: usize) -> EmbeddingMatrix {
    EmbeddingMatrix::F32(Array2::from_shape_fn((rows, dims), |(i, j)| {
        i as f32 + j as f32 / 10.0
    }))
}

/// Write a matrix and table into `dir` and return a merge job over them.
pub fn write_fixtures(dir: &Path, matrix: &EmbeddingMatrix, table: &RecordBatch) -> MergeConfig {
    let embeddings = dir.join("embedding-001.safetensors");
    let input = dir.join("scopes-001-input.parquet");
    write_matrix(&embeddings, "embeddings", matrix).unwrap();
    write_table(&input, table, Codec::Snappy).unwrap();
    MergeConfig {
        embeddings,
        input,
        output: dir.join("out").join("scopes-001-embeddings.parquet"),
        tensor: "embeddings".to_string(),
        column: "embeddings".to_string(),
        compression: Codec::Snappy,
    }
}

/// Files directly inside `dir`, sorted.
pub fn files_in(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = match std::fs::read_dir(dir) {
        Ok(entries) => entries.map(|e| e.unwrap().path()).collect(),
        Err(_) => Vec::new(),
    };
    files.sort();
    files
}
