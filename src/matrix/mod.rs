//! Embedding matrix storage.
//!
//! An [`EmbeddingMatrix`] is a dense row-major `rows × dims` array read from a
//! named array in an HDF5 file or a safetensors container. Rows are items, columns are
//! embedding dimensions. The matrix can also be rebuilt from a list column of
//! an Arrow record batch, which is how a written table is checked against the
//! matrix it was built from.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{Array, ArrayRef, AsArray, ListArray, PrimitiveArray};
use arrow::record_batch::RecordBatch;
use arrow::buffer::OffsetBuffer;
use arrow::datatypes::{ArrowPrimitiveType, DataType, Field, Float32Type, Float64Type};
use ndarray::{s, Array2};

use crate::merge::MergeError;

mod h5;
mod tensors;

/// A dense embedding matrix. The element type is whatever the container stored.
#[derive(Debug, Clone, PartialEq)]
pub enum EmbeddingMatrix {
    F32(Array2<f32>),
    F64(Array2<f64>),
}

/// Name, dtype and shape of one array in a container.
#[derive(Debug, Clone, PartialEq)]
pub struct TensorInfo {
    pub name: String,
    pub dtype: String,
    pub shape: Vec<usize>,
}

impl EmbeddingMatrix {
    pub fn nrows(&self) -> usize {
        match self {
            Self::F32(a) => a.nrows(),
            Self::F64(a) => a.nrows(),
        }
    }

    pub fn ncols(&self) -> usize {
        match self {
            Self::F32(a) => a.ncols(),
            Self::F64(a) => a.ncols(),
        }
    }

    /// `(rows, dims)`
    pub fn shape(&self) -> (usize, usize) {
        (self.nrows(), self.ncols())
    }

    pub fn dtype(&self) -> &'static str {
        match self {
            Self::F32(_) => "float32",
            Self::F64(_) => "float64",
        }
    }

    /// Render the first `n` rows the way ndarray prints a 2-D array.
    pub fn head(&self, n: usize) -> String {
        let n = n.min(self.nrows());
        match self {
            Self::F32(a) => format!("{}", a.slice(s![..n, ..])),
            Self::F64(a) => format!("{}", a.slice(s![..n, ..])),
        }
    }

    /// Index of the first row whose values differ bit-for-bit from `other`.
    ///
    /// Returns `None` when the matrices are identical. Matrices with a
    /// different dtype or shape differ at row 0, except that two matrices
    /// with no rows are always equal (a zero-row list column carries no
    /// dimension).
    pub fn first_difference(&self, other: &EmbeddingMatrix) -> Option<usize> {
        if self.nrows() == 0 && other.nrows() == 0 {
            return None;
        }
        if self.shape() != other.shape() {
            return Some(0);
        }
        match (self, other) {
            (Self::F32(a), Self::F32(b)) => a
                .rows()
                .into_iter()
                .zip(b.rows())
                .position(|(x, y)| x.iter().zip(y.iter()).any(|(p, q)| p.to_bits() != q.to_bits())),
            (Self::F64(a), Self::F64(b)) => a
                .rows()
                .into_iter()
                .zip(b.rows())
                .position(|(x, y)| x.iter().zip(y.iter()).any(|(p, q)| p.to_bits() != q.to_bits())),
            _ => Some(0),
        }
    }

    /// Build a `List<Float32>`/`List<Float64>` array with one list per row.
    pub fn to_list_array(&self) -> Result<ListArray> {
        let (rows, dims) = self.shape();
        anyhow::ensure!(
            rows.checked_mul(dims)
                .is_some_and(|n| i32::try_from(n).is_ok()),
            "embedding matrix {rows}x{dims} is too large for a single list column"
        );
        match self {
            Self::F32(a) => list_array::<Float32Type>(a),
            Self::F64(a) => list_array::<Float64Type>(a),
        }
    }
}

fn list_array<T: ArrowPrimitiveType>(matrix: &Array2<T::Native>) -> Result<ListArray> {
    let (rows, dims) = matrix.dim();
    // Iteration is in logical (row-major) order regardless of memory layout.
    let values = PrimitiveArray::<T>::from_iter_values(matrix.iter().copied());
    let offsets = OffsetBuffer::<i32>::from_lengths(std::iter::repeat(dims).take(rows));
    let field = Arc::new(Field::new("item", T::DATA_TYPE, true));
    ListArray::try_new(field, offsets, Arc::new(values), None)
        .context("failed to build embedding list column")
}

/// On-disk container holding the embedding matrix, picked by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerFormat {
    /// `.h5` / `.hdf5`: the matrix is a named dataset.
    Hdf5,
    /// `.safetensors` / `.st`: the matrix is a named tensor.
    SafeTensors,
}

impl ContainerFormat {
    /// Format implied by the extension of `path`, if it names a known container.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|ext| ext.to_str())? {
            "h5" | "hdf5" => Some(Self::Hdf5),
            "safetensors" | "st" => Some(Self::SafeTensors),
            _ => None,
        }
    }

    /// Format for `path`, treating unknown extensions as safetensors.
    fn for_path(path: &Path) -> Self {
        Self::from_path(path).unwrap_or(Self::SafeTensors)
    }
}

/// Read the array `name` from the container at `path`.
///
/// The array must be two-dimensional with 32- or 64-bit float elements. The
/// file is open only for the duration of the call.
pub fn load_matrix(path: impl AsRef<Path>, name: &str) -> Result<EmbeddingMatrix> {
    let path = path.as_ref();
    let matrix = match ContainerFormat::for_path(path) {
        ContainerFormat::Hdf5 => h5::load(path, name)?,
        ContainerFormat::SafeTensors => tensors::load(path, name)?,
    };
    let (rows, dims) = matrix.shape();
    tracing::debug!(path = %path.display(), array = name, rows, dims, "embedding matrix loaded");
    Ok(matrix)
}

/// Write `matrix` as the single array `name` of a new container at `path`.
pub fn write_matrix(path: impl AsRef<Path>, name: &str, matrix: &EmbeddingMatrix) -> Result<()> {
    let path = path.as_ref();
    match ContainerFormat::for_path(path) {
        ContainerFormat::Hdf5 => h5::write(path, name, matrix),
        ContainerFormat::SafeTensors => tensors::write(path, name, matrix),
    }
}

/// List every array in the container at `path`, sorted by name.
pub fn list_tensors(path: impl AsRef<Path>) -> Result<Vec<TensorInfo>> {
    let path = path.as_ref();
    let mut infos = match ContainerFormat::for_path(path) {
        ContainerFormat::Hdf5 => h5::list(path)?,
        ContainerFormat::SafeTensors => tensors::list(path)?,
    };
    infos.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(infos)
}

/// Check a container array's rank and return `(rows, dims)`.
fn matrix_dims(name: &str, shape: &[usize]) -> Result<(usize, usize)> {
    anyhow::ensure!(
        shape.len() == 2,
        "array {name:?} has rank {}, expected a 2-D matrix",
        shape.len()
    );
    Ok((shape[0], shape[1]))
}

/// Rebuild a matrix from the list column `column` of `batch`.
///
/// Every row must be a non-null list of the same length. A batch with no
/// rows yields a `0 × 0` matrix.
pub fn from_list_column(batch: &RecordBatch, column: &str) -> Result<EmbeddingMatrix> {
    let array = batch
        .column_by_name(column)
        .ok_or_else(|| MergeError::ColumnNotFound(column.to_string()))?;
    let list = array
        .as_list_opt::<i32>()
        .filter(|l| matches!(l.value_type(), DataType::Float32 | DataType::Float64))
        .ok_or_else(|| MergeError::NotAList {
            column: column.to_string(),
            data_type: array.data_type().clone(),
        })?;

    let rows = list.len();
    let dims = if rows == 0 { 0 } else { list.value_length(0) as usize };
    for row in 0..rows {
        if list.is_null(row) {
            return Err(MergeError::NullValues { column: column.to_string(), row }.into());
        }
        let found = list.value_length(row) as usize;
        if found != dims {
            return Err(MergeError::RaggedRows {
                column: column.to_string(),
                row,
                expected: dims,
                found,
            }
            .into());
        }
    }

    let offsets = list.value_offsets();
    let start = offsets[0] as usize;
    let end = offsets[rows] as usize;
    let values: ArrayRef = list.values().slice(start, end - start);
    if values.null_count() > 0 {
        let first_null = (0..values.len()).find(|&i| values.is_null(i)).unwrap_or(0);
        let row = if dims == 0 { 0 } else { first_null / dims };
        return Err(MergeError::NullValues { column: column.to_string(), row }.into());
    }

    let matrix = match values.data_type() {
        DataType::Float32 => EmbeddingMatrix::F32(
            Array2::from_shape_vec((rows, dims), primitive_values::<Float32Type>(&values))?,
        ),
        _ => EmbeddingMatrix::F64(
            Array2::from_shape_vec((rows, dims), primitive_values::<Float64Type>(&values))?,
        ),
    };
    Ok(matrix)
}

fn primitive_values<T: ArrowPrimitiveType>(values: &ArrayRef) -> Vec<T::Native> {
    values.as_primitive::<T>().values().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::datatypes::Schema;
    use ndarray::array;

    fn batch_with(column: &str, list: ListArray) -> RecordBatch {
        let schema = Schema::new(vec![Field::new(column, list.data_type().clone(), true)]);
        RecordBatch::try_new(Arc::new(schema), vec![Arc::new(list)]).unwrap()
    }

    #[test]
    fn list_array_has_one_row_per_vector() {
        let matrix = EmbeddingMatrix::F32(array![[0.1, 0.2, 0.3], [1.0, 2.0, 3.0]]);
        let list = matrix.to_list_array().unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list.value_length(1), 3);
        let row = list.value(1);
        let row = row.as_primitive::<Float32Type>();
        assert_eq!(row.values().to_vec(), vec![1.0f32, 2.0, 3.0]);
    }

    #[test]
    fn list_column_rebuilds_matrix() {
        let matrix = EmbeddingMatrix::F64(array![[0.5, -1.0], [2.0, 4.0], [8.0, 16.0]]);
        let batch = batch_with("embeddings", matrix.to_list_array().unwrap());
        let rebuilt = from_list_column(&batch, "embeddings").unwrap();
        assert_eq!(rebuilt, matrix);
        assert_eq!(matrix.first_difference(&rebuilt), None);
    }

    #[test]
    fn sliced_list_column_uses_offsets() {
        let matrix = EmbeddingMatrix::F32(array![[1.0, 1.0], [2.0, 2.0], [3.0, 3.0]]);
        let list = matrix.to_list_array().unwrap().slice(1, 2);
        let batch = batch_with("v", list);
        let rebuilt = from_list_column(&batch, "v").unwrap();
        assert_eq!(rebuilt, EmbeddingMatrix::F32(array![[2.0, 2.0], [3.0, 3.0]]));
    }

    #[test]
    fn missing_column_is_reported() {
        let matrix = EmbeddingMatrix::F32(array![[1.0]]);
        let batch = batch_with("embeddings", matrix.to_list_array().unwrap());
        let err = from_list_column(&batch, "vectors").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MergeError>(),
            Some(MergeError::ColumnNotFound(name)) if name == "vectors"
        ));
    }

    #[test]
    fn first_difference_finds_changed_row() {
        let a = EmbeddingMatrix::F32(array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]]);
        let b = EmbeddingMatrix::F32(array![[1.0, 2.0], [3.0, 4.5], [5.0, 6.0]]);
        assert_eq!(a.first_difference(&b), Some(1));
        let c = EmbeddingMatrix::F64(array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]]);
        assert_eq!(a.first_difference(&c), Some(0));
    }

    #[test]
    fn container_format_follows_extension() {
        assert_eq!(ContainerFormat::from_path(Path::new("a/embedding-001.h5")), Some(ContainerFormat::Hdf5));
        assert_eq!(ContainerFormat::from_path(Path::new("e.hdf5")), Some(ContainerFormat::Hdf5));
        assert_eq!(ContainerFormat::from_path(Path::new("e.safetensors")), Some(ContainerFormat::SafeTensors));
        assert_eq!(ContainerFormat::from_path(Path::new("e.parquet")), None);
        assert_eq!(ContainerFormat::for_path(Path::new("e.bin")), ContainerFormat::SafeTensors);
    }

    #[test]
    fn head_is_clamped_to_row_count() {
        let matrix = EmbeddingMatrix::F32(array![[1.0, 2.0]]);
        let text = matrix.head(5);
        assert!(text.contains('1'));
        assert!(text.contains('2'));
    }
}
