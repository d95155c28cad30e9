//! Attach precomputed embedding vectors to a Parquet table by row position.
//!
//! `scope-embed` reads a dense embedding matrix from a named dataset in an
//! HDF5 file (or a named tensor in a
//! [safetensors](https://github.com/huggingface/safetensors) container), reads a
//! Parquet table fully into memory, and writes the table back out with one
//! extra list column holding row `i`'s embedding vector.
//!
//! | Input | Format | Default |
//! |-------|--------|---------|
//! | Embedding matrix | HDF5 (`.h5`/`.hdf5`) or safetensors, array `embeddings`, shape `rows × dims` | `embedding-001.h5` |
//! | Table | Parquet | `scopes-001-input.parquet` |
//! | Output | Parquet, original columns + `embeddings` | `scopes-001-embeddings.parquet` |
//!
//! The join is positional: the matrix and table must have the same number of
//! rows, in the same order. A row-count mismatch is an error
//! ([`merge::MergeError::LengthMismatch`]) and no output is written.
//!
//! # Modules
//!
//! - [`config`] — Configuration loading from TOML files and environment variables
//! - [`matrix`] — Embedding matrix loading, writing, and reconstruction from list columns
//! - [`table`] — Parquet table loading and atomic writing
//! - [`merge`] — The positional join and the end-to-end merge pipeline
//! - [`preview`] — Shape and head diagnostics printed during a run

pub mod config;
pub mod matrix;
pub mod merge;
pub mod preview;
pub mod table;
