//! HDF5 files. The matrix is a dataset in the root group.

use std::path::Path;

use anyhow::{Context, Result};
use hdf5::types::{FloatSize, TypeDescriptor};
use ndarray::Array2;

use super::{matrix_dims, EmbeddingMatrix, TensorInfo};

pub(super) fn load(path: &Path, name: &str) -> Result<EmbeddingMatrix> {
    // Surface a missing or unreadable file as an I/O error before HDF5 sees it.
    std::fs::metadata(path)
        .with_context(|| format!("failed to read embedding file {}", path.display()))?;
    let file = hdf5::File::open(path)
        .with_context(|| format!("failed to open HDF5 file {}", path.display()))?;
    let dataset = file
        .dataset(name)
        .with_context(|| format!("no dataset named {name:?} in {}", path.display()))?;
    let dims = matrix_dims(name, &dataset.shape())?;

    let matrix = match dataset.dtype()?.to_descriptor()? {
        TypeDescriptor::Float(FloatSize::U4) => EmbeddingMatrix::F32(
            Array2::from_shape_vec(dims, dataset.read_raw::<f32>()?)
                .context("dataset data does not match its shape")?,
        ),
        TypeDescriptor::Float(FloatSize::U8) => EmbeddingMatrix::F64(
            Array2::from_shape_vec(dims, dataset.read_raw::<f64>()?)
                .context("dataset data does not match its shape")?,
        ),
        other => anyhow::bail!(
            "dataset {name:?} has unsupported dtype {other:?}, expected a 32- or 64-bit float"
        ),
    };
    Ok(matrix)
}

pub(super) fn write(path: &Path, name: &str, matrix: &EmbeddingMatrix) -> Result<()> {
    let file = hdf5::File::create(path)
        .with_context(|| format!("failed to create HDF5 file {}", path.display()))?;
    let shape = (matrix.nrows(), matrix.ncols());
    match matrix {
        EmbeddingMatrix::F32(a) => {
            let data: Vec<f32> = a.iter().copied().collect();
            let dataset = file.new_dataset::<f32>().shape(shape).create(name)?;
            if !data.is_empty() {
                dataset.write_raw(data.as_slice())?;
            }
        }
        EmbeddingMatrix::F64(a) => {
            let data: Vec<f64> = a.iter().copied().collect();
            let dataset = file.new_dataset::<f64>().shape(shape).create(name)?;
            if !data.is_empty() {
                dataset.write_raw(data.as_slice())?;
            }
        }
    }
    Ok(())
}

pub(super) fn list(path: &Path) -> Result<Vec<TensorInfo>> {
    let file = hdf5::File::open(path)
        .with_context(|| format!("failed to open HDF5 file {}", path.display()))?;
    let mut infos = Vec::new();
    for name in file.member_names()? {
        // Groups and other non-dataset members are skipped.
        let Ok(dataset) = file.dataset(&name) else {
            continue;
        };
        infos.push(TensorInfo {
            dtype: format!("{:?}", dataset.dtype()?.to_descriptor()?),
            shape: dataset.shape(),
            name,
        });
    }
    Ok(infos)
}
