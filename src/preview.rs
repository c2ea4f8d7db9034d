use anyhow::{Context, Result};
use log::info;

use crate::{cli::PreviewArgs, io_utils, table};

pub fn execute(args: &PreviewArgs) -> Result<()> {
    let delimiter = io_utils::resolve_input_delimiter(&args.input, args.delimiter);
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    let mut reader = io_utils::open_csv_reader_from_path(&args.input, delimiter)?;
    let headers = io_utils::reader_headers(&mut reader, encoding)?;
    let width = visible_columns(headers.len(), args.max_columns);

    let mut rows = Vec::new();
    for (idx, record) in reader.byte_records().enumerate() {
        if idx >= args.rows {
            break;
        }
        let record = record.with_context(|| format!("Reading row {}", idx + 2))?;
        let mut decoded = io_utils::decode_record(&record, encoding)?;
        decoded.truncate(width);
        rows.push(decoded);
    }

    table::print_table(&headers[..width], &rows);
    if width < headers.len() {
        info!(
            "Showing {} of {} column(s); use --max-columns 0 to show all",
            width,
            headers.len()
        );
    }
    info!("Displayed {} row(s) from {:?}", rows.len(), args.input);
    Ok(())
}

fn visible_columns(total: usize, max_columns: usize) -> usize {
    if max_columns == 0 {
        total
    } else {
        total.min(max_columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_max_columns_shows_everything() {
        assert_eq!(visible_columns(577, 0), 577);
        assert_eq!(visible_columns(577, 8), 8);
        assert_eq!(visible_columns(3, 8), 3);
    }
}
