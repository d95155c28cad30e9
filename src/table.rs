//! Parquet table I/O.
//!
//! Tables are held fully in memory as a single Arrow [`RecordBatch`] in file
//! row order.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::compute::concat_batches;
use arrow::datatypes::Schema;
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::file::properties::WriterProperties;
use serde::Deserialize;
use tempfile::NamedTempFile;

use crate::config::Codec;

/// Schema metadata key pandas uses to describe its index and dtypes.
const PANDAS_METADATA_KEY: &str = "pandas";

/// Read every row group of the Parquet file at `path` into one record batch.
///
/// pandas index columns are dropped along with the `pandas` schema metadata
/// (see [`strip_index_columns`]), so the batch holds data columns only.
pub fn load_table(path: impl AsRef<Path>) -> Result<RecordBatch> {
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("failed to open table {}", path.display()))?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .with_context(|| format!("failed to read Parquet metadata from {}", path.display()))?;
    let schema = builder.schema().clone();
    let reader = builder.build()?;

    let batches = reader
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("failed to decode rows from {}", path.display()))?;
    let batch = concat_batches(&schema, &batches)?;

    let batch = strip_index_columns(batch)?;
    tracing::debug!(
        path = %path.display(),
        rows = batch.num_rows(),
        columns = batch.num_columns(),
        "table loaded"
    );
    Ok(batch)
}

/// Drop pandas index columns and the `pandas` schema metadata from `batch`.
///
/// Index columns are the ones pandas lists under `index_columns` in its
/// metadata (a named index is stored as an ordinary column), plus any
/// `__index_level_N__` column.
pub fn strip_index_columns(batch: RecordBatch) -> Result<RecordBatch> {
    let schema = batch.schema();
    let Some(pandas) = schema.metadata().get(PANDAS_METADATA_KEY) else {
        if !schema.fields().iter().any(|f| is_index_column(f.name())) {
            return Ok(batch);
        }
        return drop_columns(&batch, &[]);
    };
    let named = pandas_index_columns(pandas);
    drop_columns(&batch, &named)
}

/// Subset of the `pandas` schema metadata this crate reads.
#[derive(Debug, Deserialize)]
struct PandasMetadata {
    #[serde(default)]
    index_columns: Vec<serde_json::Value>,
}

/// Names of the index columns stored in the table.
///
/// A `RangeIndex` is recorded as a JSON object rather than a column name
/// and has no stored column, so only string entries count.
fn pandas_index_columns(metadata: &str) -> Vec<String> {
    match serde_json::from_str::<PandasMetadata>(metadata) {
        Ok(parsed) => parsed
            .index_columns
            .into_iter()
            .filter_map(|v| v.as_str().map(str::to_owned))
            .collect(),
        Err(e) => {
            tracing::warn!(error = %e, "ignoring unparseable pandas metadata");
            Vec::new()
        }
    }
}

fn drop_columns(batch: &RecordBatch, named: &[String]) -> Result<RecordBatch> {
    let schema = batch.schema();
    let (fields, columns): (Vec<_>, Vec<_>) = schema
        .fields()
        .iter()
        .zip(batch.columns())
        .filter(|(field, _)| {
            let name = field.name();
            !is_index_column(name) && !named.iter().any(|n| n == name)
        })
        .map(|(field, column)| (field.clone(), column.clone()))
        .unzip();
    let mut metadata = schema.metadata().clone();
    metadata.remove(PANDAS_METADATA_KEY);

    let options = RecordBatchOptions::new().with_row_count(Some(batch.num_rows()));
    let stripped = RecordBatch::try_new_with_options(
        Arc::new(Schema::new_with_metadata(fields, metadata)),
        columns,
        &options,
    )?;
    Ok(stripped)
}

fn is_index_column(name: &str) -> bool {
    name.starts_with("__index_level_") && name.ends_with("__")
}

/// Write `batch` to a Parquet file at `path`.
///
/// Rows go to a uniquely named temporary file in the destination directory,
/// which is persisted over `path` once the writer has closed. The temporary
/// file is removed on every failure path, so a failed write leaves nothing
/// behind and concurrent writers never share a scratch file.
pub fn write_table(path: impl AsRef<Path>, batch: &RecordBatch, codec: Codec) -> Result<()> {
    let path = path.as_ref();

    let parent = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
            parent
        }
        None => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(parent)
        .with_context(|| format!("failed to create temporary file in {}", parent.display()))?;
    write_parquet(tmp.as_file_mut(), batch, codec)?;
    tmp.persist(path)
        .with_context(|| format!("failed to move output into place at {}", path.display()))?;

    tracing::info!(
        path = %path.display(),
        rows = batch.num_rows(),
        columns = batch.num_columns(),
        compression = %codec,
        "table written"
    );
    Ok(())
}

fn write_parquet(file: &mut File, batch: &RecordBatch, codec: Codec) -> Result<()> {
    let props = WriterProperties::builder()
        .set_compression(codec.to_parquet())
        .build();
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))
        .context("failed to start Parquet writer")?;
    writer.write(batch).context("failed to write rows")?;
    writer.close().context("failed to finish Parquet file")?;
    Ok(())
}
