//! Positional join of an embedding matrix onto a table.
//!
//! [`attach_embeddings`] is the join itself; [`merge_files`] runs the whole
//! load → join → save pipeline and [`verify_output`] reads a written file back
//! to check the embeddings survived intact.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use arrow::array::{Array, ArrayRef};
use arrow::datatypes::{DataType, Field, FieldRef, Schema};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use thiserror::Error;
use tracing::info;

use crate::config::Codec;
use crate::matrix::{self, EmbeddingMatrix};
use crate::preview::Preview;
use crate::table;

/// Errors raised by the join and by reading an embedding column back.
#[derive(Debug, Error)]
pub enum MergeError {
    #[error("length of embeddings ({embeddings}) does not match length of table ({rows})")]
    LengthMismatch { rows: usize, embeddings: usize },

    #[error("column not found: {0}")]
    ColumnNotFound(String),

    #[error("column {column} has type {data_type}, expected a list of floats")]
    NotAList { column: String, data_type: DataType },

    #[error("row {row} of column {column} has {found} values, expected {expected}")]
    RaggedRows {
        column: String,
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("column {column} has a null embedding at row {row}")]
    NullValues { column: String, row: usize },
}

/// Everything one merge run needs.
#[derive(Debug, Clone)]
pub struct MergeConfig {
    pub embeddings: PathBuf,
    pub input: PathBuf,
    pub output: PathBuf,
    /// Tensor name inside the embedding container.
    pub tensor: String,
    /// Name of the column the vectors are written to.
    pub column: String,
    pub compression: Codec,
}

/// Summary of a completed merge.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeReport {
    pub rows: usize,
    pub input_columns: usize,
    pub output_columns: usize,
    pub dimensions: usize,
    pub output: PathBuf,
}

/// Outcome of reading a written table back and comparing it to its matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct Verification {
    pub expected_shape: (usize, usize),
    pub found_shape: (usize, usize),
    /// First row whose stored vector differs from the matrix, if any.
    pub first_mismatch: Option<usize>,
}

impl Verification {
    pub fn is_match(&self) -> bool {
        self.first_mismatch.is_none()
    }
}

/// Return a copy of `batch` with `matrix` attached as the list column `column`.
///
/// Row `i` of the new column is row `i` of the matrix. The column is appended
/// on the right; if `batch` already has a column of that name it is replaced
/// where it stands. The matrix must have exactly one row per table row.
pub fn attach_embeddings(
    batch: &RecordBatch,
    matrix: &EmbeddingMatrix,
    column: &str,
) -> Result<RecordBatch> {
    if matrix.nrows() != batch.num_rows() {
        return Err(MergeError::LengthMismatch {
            rows: batch.num_rows(),
            embeddings: matrix.nrows(),
        }
        .into());
    }

    let list: ArrayRef = Arc::new(matrix.to_list_array()?);
    let field: FieldRef = Arc::new(Field::new(column, list.data_type().clone(), true));

    let schema = batch.schema();
    let mut fields: Vec<FieldRef> = schema.fields().iter().cloned().collect();
    let mut columns: Vec<ArrayRef> = batch.columns().to_vec();
    match schema.index_of(column) {
        Ok(idx) => {
            tracing::warn!(column, "replacing existing column with embeddings");
            fields[idx] = field;
            columns[idx] = list;
        }
        Err(_) => {
            fields.push(field);
            columns.push(list);
        }
    }

    let options = RecordBatchOptions::new().with_row_count(Some(batch.num_rows()));
    let augmented = RecordBatch::try_new_with_options(
        Arc::new(Schema::new_with_metadata(fields, schema.metadata().clone())),
        columns,
        &options,
    )?;
    Ok(augmented)
}

/// Load the matrix and table named by `config`, join them, and write the result.
///
/// Diagnostics for each stage go to `preview`. Nothing is written to
/// `config.output` unless every earlier step succeeded.
pub fn merge_files<W: Write>(config: &MergeConfig, preview: &mut Preview<W>) -> Result<MergeReport> {
    let matrix = matrix::load_matrix(&config.embeddings, &config.tensor)?;
    info!(
        path = %config.embeddings.display(),
        rows = matrix.nrows(),
        dims = matrix.ncols(),
        dtype = matrix.dtype(),
        "embeddings loaded"
    );
    preview.matrix(&matrix)?;

    let table = table::load_table(&config.input)?;
    info!(
        path = %config.input.display(),
        rows = table.num_rows(),
        columns = table.num_columns(),
        "table loaded"
    );
    preview.table(&table)?;

    let augmented = attach_embeddings(&table, &matrix, &config.column)?;
    preview.head(&augmented)?;

    table::write_table(&config.output, &augmented, config.compression)?;
    preview.saved(&config.output)?;

    Ok(MergeReport {
        rows: augmented.num_rows(),
        input_columns: table.num_columns(),
        output_columns: augmented.num_columns(),
        dimensions: matrix.ncols(),
        output: config.output.clone(),
    })
}

/// Re-read `output` and compare its `column` to the tensor `tensor` in `embeddings`.
pub fn verify_output(
    output: impl AsRef<Path>,
    embeddings: impl AsRef<Path>,
    tensor: &str,
    column: &str,
) -> Result<Verification> {
    let expected = matrix::load_matrix(embeddings, tensor)?;
    let written = table::load_table(output)?;
    let found = matrix::from_list_column(&written, column)?;

    let verification = Verification {
        expected_shape: expected.shape(),
        found_shape: found.shape(),
        first_mismatch: expected.first_difference(&found),
    };
    tracing::debug!(?verification, "output verified");
    Ok(verification)
}
