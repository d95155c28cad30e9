//! safetensors containers.

use std::path::Path;

use anyhow::{Context, Result};
use ndarray::Array2;
use safetensors::tensor::TensorView;
use safetensors::{serialize, Dtype, SafeTensors};

use super::{matrix_dims, EmbeddingMatrix, TensorInfo};

pub(super) fn load(path: &Path, name: &str) -> Result<EmbeddingMatrix> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("failed to read embedding file {}", path.display()))?;
    let tensors = SafeTensors::deserialize(&bytes)
        .with_context(|| format!("failed to parse safetensors container {}", path.display()))?;
    let tensor = tensors
        .tensor(name)
        .with_context(|| format!("no tensor named {name:?} in {}", path.display()))?;
    let dims = matrix_dims(name, tensor.shape())?;

    let matrix = match tensor.dtype() {
        Dtype::F32 => EmbeddingMatrix::F32(
            Array2::from_shape_vec(dims, decode::<f32>(tensor.data()))
                .context("tensor data does not match its shape")?,
        ),
        Dtype::F64 => EmbeddingMatrix::F64(
            Array2::from_shape_vec(dims, decode::<f64>(tensor.data()))
                .context("tensor data does not match its shape")?,
        ),
        other => anyhow::bail!("tensor {name:?} has unsupported dtype {other:?}, expected F32 or F64"),
    };
    Ok(matrix)
}

/// Copy raw tensor bytes into typed values. The slice need not be aligned.
fn decode<T: bytemuck::Pod>(data: &[u8]) -> Vec<T> {
    bytemuck::pod_collect_to_vec(data)
}

pub(super) fn write(path: &Path, name: &str, matrix: &EmbeddingMatrix) -> Result<()> {
    let shape = vec![matrix.nrows(), matrix.ncols()];
    let bytes = match matrix {
        EmbeddingMatrix::F32(a) => {
            let data: Vec<f32> = a.iter().copied().collect();
            let view = TensorView::new(Dtype::F32, shape, bytemuck::cast_slice(&data))?;
            serialize(std::iter::once((name.to_string(), view)), &None)?
        }
        EmbeddingMatrix::F64(a) => {
            let data: Vec<f64> = a.iter().copied().collect();
            let view = TensorView::new(Dtype::F64, shape, bytemuck::cast_slice(&data))?;
            serialize(std::iter::once((name.to_string(), view)), &None)?
        }
    };
    std::fs::write(path, bytes)
        .with_context(|| format!("failed to write embedding file {}", path.display()))?;
    Ok(())
}

pub(super) fn list(path: &Path) -> Result<Vec<TensorInfo>> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("failed to read embedding file {}", path.display()))?;
    let tensors = SafeTensors::deserialize(&bytes)
        .with_context(|| format!("failed to parse safetensors container {}", path.display()))?;
    Ok(tensors
        .tensors()
        .into_iter()
        .map(|(name, view)| TensorInfo {
            name,
            dtype: format!("{:?}", view.dtype()),
            shape: view.shape().to_vec(),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_reads_unaligned_bytes() {
        let values = [1.5f32, -2.25, 1e-7];
        let mut buf = vec![0u8];
        buf.extend(values.iter().flat_map(|v| v.to_ne_bytes()));

        assert_eq!(decode::<f32>(&buf[1..]), values.to_vec());
    }

    #[test]
    fn decode_f64_keeps_every_bit() {
        let values = [std::f64::consts::E, -0.0, f64::MIN_POSITIVE];
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_ne_bytes()).collect();
        let decoded = decode::<f64>(&bytes);
        for (a, b) in decoded.iter().zip(values.iter()) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }
}
