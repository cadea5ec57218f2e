use std::{collections::BTreeSet, fs};

use anyhow::{Context, Result};
use log::info;

use crate::{
    cli::InspectArgs,
    config::resolve_encoding,
    fields::CanonicalField,
    mapping::map_to_canonical,
    sheet::{CsvOptions, parse_upload},
    table,
    validate::{check_required_columns, validate_and_transform},
};

pub fn execute(args: &InspectArgs) -> Result<()> {
    let bytes = fs::read(&args.input).with_context(|| format!("Reading {:?}", args.input))?;
    let options = CsvOptions {
        delimiter: args.delimiter,
        encoding: resolve_encoding(args.input_encoding.as_deref())?,
    };
    let file_name = args.input.to_string_lossy();
    let raw = parse_upload(&file_name, &bytes, &options)
        .with_context(|| format!("Parsing {:?}", args.input))?;
    let (format, canonical) = map_to_canonical(&raw);
    println!("Layout: {format}");
    println!("Rows: {}", canonical.len());

    if let Err(schema_error) = check_required_columns(&canonical) {
        println!("{schema_error}");
        return Ok(());
    }

    let partition = validate_and_transform(&canonical);
    println!(
        "Valid rows: {}, rows with errors: {}",
        partition.valid_rows.len(),
        partition.failed_row_count()
    );

    let preview = &partition.valid_rows[..partition.valid_rows.len().min(args.rows)];
    // Only fields carrying a value somewhere in the preview get a column.
    let populated = preview
        .iter()
        .flat_map(|row| CanonicalField::all().filter(|field| row.get(*field).is_some()))
        .collect::<BTreeSet<_>>();
    let mut headers = vec!["row".to_string()];
    headers.extend(populated.iter().map(|field| field.to_string()));
    let rows = preview
        .iter()
        .map(|row| {
            let mut cells = vec![row.row_number.to_string()];
            cells.extend(populated.iter().map(|field| {
                row.get(*field)
                    .map(|value| value.to_string())
                    .unwrap_or_default()
            }));
            cells
        })
        .collect::<Vec<_>>();
    if !rows.is_empty() {
        table::print_table(&headers, &rows);
    }

    if !partition.errors.is_empty() {
        let shown = partition.errors.len().min(args.rows);
        table::print_errors(&partition.errors[..shown]);
    }
    info!(
        "Inspected {} row(s) from {:?} as {format} layout",
        canonical.len(),
        args.input
    );
    Ok(())
}
