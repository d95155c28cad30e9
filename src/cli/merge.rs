//! CLI `merge` command — attach the embeddings and write the output table.

use anyhow::Result;

use scope_embed::config::ScopeEmbedConfig;
use scope_embed::merge::merge_files;
use scope_embed::preview::Preview;

/// Run the merge described by `config`, printing diagnostics to stdout.
pub fn merge(config: &ScopeEmbedConfig) -> Result<()> {
    let job = config.merge_config();
    let mut preview = Preview::new(std::io::stdout().lock(), config.preview.rows);

    let report = merge_files(&job, &mut preview)?;

    tracing::info!(
        rows = report.rows,
        columns = report.output_columns,
        dims = report.dimensions,
        output = %report.output.display(),
        "merge complete"
    );
    Ok(())
}
