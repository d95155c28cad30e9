//! Human-readable diagnostics printed while a merge runs.
//!
//! Output is for eyeballing shapes and sample rows; nothing parses it.

use std::io::Write;
use std::path::Path;

use anyhow::Result;
use arrow::record_batch::RecordBatch;
use arrow::util::pretty::pretty_format_batches;

use crate::matrix::EmbeddingMatrix;

/// Writes stage diagnostics to `out`, showing at most `rows` sample rows.
pub struct Preview<W: Write> {
    out: W,
    rows: usize,
}

impl<W: Write> Preview<W> {
    pub fn new(out: W, rows: usize) -> Self {
        Self { out, rows }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Matrix shape followed by its first rows.
    pub fn matrix(&mut self, matrix: &EmbeddingMatrix) -> Result<()> {
        writeln!(self.out, "{}", format_shape(matrix.shape()))?;
        writeln!(self.out, "{}", matrix.head(self.rows))?;
        Ok(())
    }

    /// Table shape followed by its head.
    pub fn table(&mut self, batch: &RecordBatch) -> Result<()> {
        writeln!(
            self.out,
            "{}",
            format_shape((batch.num_rows(), batch.num_columns()))
        )?;
        self.head(batch)
    }

    /// First rows of `batch`. A table arrow cannot render prints a
    /// placeholder line instead of failing the run.
    pub fn head(&mut self, batch: &RecordBatch) -> Result<()> {
        match format_head(batch, self.rows) {
            Ok(text) => writeln!(self.out, "{text}")?,
            Err(e) => {
                tracing::warn!(error = %e, "failed to render table head");
                writeln!(self.out, "(could not render head: {e})")?;
            }
        }
        Ok(())
    }

    pub fn saved(&mut self, path: &Path) -> Result<()> {
        writeln!(self.out, "Table with embeddings saved to {}", path.display())?;
        Ok(())
    }
}

/// `(rows, columns)`
pub fn format_shape((rows, cols): (usize, usize)) -> String {
    format!("({rows}, {cols})")
}

/// Render the first `n` rows of `batch` as a text table.
pub fn format_head(batch: &RecordBatch, n: usize) -> Result<String> {
    if batch.num_columns() == 0 {
        return Ok(format!("Empty table ({} rows, no columns)", batch.num_rows()));
    }
    let head = batch.slice(0, n.min(batch.num_rows()));
    Ok(pretty_format_batches(&[head])?.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{ArrayRef, Int64Array, TimestampMicrosecondArray};
    use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
    use ndarray::Array2;
    use std::sync::Arc;

    #[test]
    fn shape_reads_like_a_tuple() {
        assert_eq!(format_shape((5, 3)), "(5, 3)");
    }

    #[test]
    fn head_is_limited_to_requested_rows() {
        let schema = Schema::new(vec![Field::new("id", DataType::Int64, false)]);
        let column: ArrayRef = Arc::new(Int64Array::from_iter_values(100..110));
        let batch = RecordBatch::try_new(Arc::new(schema), vec![column]).unwrap();

        let text = format_head(&batch, 3).unwrap();
        assert!(text.contains("102"));
        assert!(!text.contains("103"));
    }

    #[test]
    fn matrix_preview_writes_shape_first() {
        let mut preview = Preview::new(Vec::new(), 2);
        preview
            .matrix(&EmbeddingMatrix::F32(Array2::zeros((4, 3))))
            .unwrap();
        let text = String::from_utf8(preview.into_inner()).unwrap();
        assert!(text.starts_with("(4, 3)\n"));
    }

    #[test]
    fn named_timezone_timestamps_render() {
        let tz = "Europe/Berlin";
        let schema = Schema::new(vec![Field::new(
            "at",
            DataType::Timestamp(TimeUnit::Microsecond, Some(tz.into())),
            true,
        )]);
        let column: ArrayRef =
            Arc::new(TimestampMicrosecondArray::from(vec![0i64, 1_000_000]).with_timezone(tz));
        let batch = RecordBatch::try_new(Arc::new(schema), vec![column]).unwrap();

        let text = format_head(&batch, 5).unwrap();
        assert!(text.contains("1970-01-01"), "{text}");
    }

    #[test]
    fn unrenderable_head_prints_placeholder() {
        let tz = "Mars/Olympus_Mons";
        let schema = Schema::new(vec![Field::new(
            "at",
            DataType::Timestamp(TimeUnit::Microsecond, Some(tz.into())),
            true,
        )]);
        let column: ArrayRef = Arc::new(TimestampMicrosecondArray::from(vec![0i64]).with_timezone(tz));
        let batch = RecordBatch::try_new(Arc::new(schema), vec![column]).unwrap();

        let mut preview = Preview::new(Vec::new(), 5);
        preview.table(&batch).unwrap();
        let text = String::from_utf8(preview.into_inner()).unwrap();
        assert!(text.starts_with("(1, 1)\n"));
        assert!(text.contains("(could not render head"), "{text}");
    }
}
