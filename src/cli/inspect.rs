//! CLI `inspect` command — print what a Parquet, safetensors or HDF5 file holds.

use std::path::Path;

use anyhow::Result;

use scope_embed::config::ScopeEmbedConfig;
use scope_embed::matrix::{list_tensors, load_matrix, ContainerFormat};
use scope_embed::preview::Preview;
use scope_embed::table::load_table;

/// Inspect `file`, treating `.safetensors`/`.st`/`.h5`/`.hdf5` as an embedding
/// container and anything else as a Parquet table.
pub fn inspect(config: &ScopeEmbedConfig, file: &Path) -> Result<()> {
    let is_container = ContainerFormat::from_path(file).is_some();

    let mut preview = Preview::new(std::io::stdout().lock(), config.preview.rows);

    if !is_container {
        let batch = load_table(file)?;
        println!("Table: {}", file.display());
        for field in batch.schema().fields() {
            println!("  {:<24} {}", field.name(), field.data_type());
        }
        return preview.table(&batch);
    }

    let tensors = list_tensors(file)?;
    println!("Container: {}", file.display());
    for tensor in &tensors {
        println!("  {:<24} {:<6} {:?}", tensor.name, tensor.dtype, tensor.shape);
    }

    let configured = &config.embedding.tensor;
    if tensors
        .iter()
        .any(|t| &t.name == configured && t.shape.len() == 2)
    {
        println!();
        println!("Tensor {configured:?}:");
        let matrix = load_matrix(file, configured)?;
        preview.matrix(&matrix)?;
    }

    Ok(())
}
