//! Listing of the canonical column set.
//!
//! Shows each column's canonical name, the name it carries after
//! normalization, and its role, as an aligned table.

use anyhow::Result;
use log::info;

use crate::{cli::ColumnsArgs, config::PipelineConfig, table};

pub fn execute(args: &ColumnsArgs) -> Result<()> {
    let config = PipelineConfig::load_or_default(args.config.as_deref())?;
    config.validate()?;
    let headers = ["#", "canonical", "output", "role"].map(String::from).to_vec();
    let rows = column_rows(&config);
    table::print_table(&headers, &rows);
    info!(
        "Listed {} column(s); anchor file is '{}'",
        rows.len(),
        config.anchor_file
    );
    Ok(())
}

pub fn column_rows(config: &PipelineConfig) -> Vec<Vec<String>> {
    config
        .canonical_columns()
        .into_iter()
        .enumerate()
        .map(|(idx, (canonical, role))| {
            let output = config.output_name(canonical);
            let output = if output == canonical {
                String::new()
            } else {
                output
            };
            vec![
                (idx + 1).to_string(),
                canonical.to_string(),
                output,
                role.as_str().to_string(),
            ]
        })
        .collect()
}
