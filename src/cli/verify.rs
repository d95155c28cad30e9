//! CLI `verify` command — check the output table against the embedding matrix.

use anyhow::{bail, Result};

use scope_embed::config::ScopeEmbedConfig;
use scope_embed::merge::verify_output;
use scope_embed::preview::format_shape;

/// Re-read the output table and compare its embedding column with the matrix
/// row by row. Fails with the first differing row.
pub fn verify(config: &ScopeEmbedConfig) -> Result<()> {
    let output = config.resolved_output_path();
    let embeddings = config.resolved_embeddings_path();

    let result = verify_output(
        &output,
        &embeddings,
        &config.embedding.tensor,
        &config.embedding.column,
    )?;

    println!("Output:      {}", output.display());
    println!("Embeddings:  {}", embeddings.display());
    println!("Expected:    {}", format_shape(result.expected_shape));
    println!("Found:       {}", format_shape(result.found_shape));

    match result.first_mismatch {
        None => {
            println!("Status:      OK (all rows match)");
            Ok(())
        }
        Some(row) => bail!(
            "column {:?} in {} differs from the embedding matrix at row {row}",
            config.embedding.column,
            output.display()
        ),
    }
}
