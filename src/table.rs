//! Plain-text tables for terminal reports.
//!
//! Widths are measured in terminal columns, so Thai tone and vowel marks
//! (zero width) do not push later columns out of line.

use std::borrow::Cow;
use std::fmt::Write as _;

use unicode_width::UnicodeWidthStr;

use crate::validate::ValidationErrorItem;

pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut widths = headers.iter().map(|h| display_width(h)).collect::<Vec<_>>();
    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(widths.len()) {
            widths[idx] = widths[idx].max(display_width(cell));
        }
    }
    for width in &mut widths {
        *width = (*width).max(1);
    }

    let mut output = String::new();
    let _ = writeln!(output, "{}", format_row(headers, &widths));
    let separator = widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>();
    let _ = writeln!(output, "{}", format_row(&separator, &widths));
    for row in rows {
        let _ = writeln!(output, "{}", format_row(row, &widths));
    }
    output
}

pub fn print_table(headers: &[String], rows: &[Vec<String>]) {
    print!("{}", render_table(headers, rows));
}

pub fn print_errors(errors: &[ValidationErrorItem]) {
    let headers = ["row", "column", "error"].map(String::from).to_vec();
    let rows = errors
        .iter()
        .map(|error| {
            vec![
                error.row_number.to_string(),
                error.column_name.clone().unwrap_or_default(),
                error.error_message.clone(),
            ]
        })
        .collect::<Vec<_>>();
    print_table(&headers, &rows);
}

fn format_row(values: &[String], widths: &[usize]) -> String {
    let mut line = values
        .iter()
        .zip(widths)
        .map(|(value, width)| {
            let sanitized = sanitize_cell(value);
            let padding = width.saturating_sub(display_width(&sanitized));
            format!("{sanitized}{}", " ".repeat(padding))
        })
        .collect::<Vec<_>>()
        .join("  ");
    line.truncate(line.trim_end().len());
    line
}

fn display_width(value: &str) -> usize {
    UnicodeWidthStr::width(sanitize_cell(value).as_ref())
}

fn sanitize_cell(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn columns_align_on_display_width() {
        let rendered = render_table(
            &strings(&["row", "name"]),
            &[strings(&["2", "สมชาย ใจดี"]), strings(&["10", "Bob"])],
        );
        let lines = rendered.lines().collect::<Vec<_>>();
        assert_eq!(lines[0], "row  name");
        assert_eq!(lines[1], "---  ---------");
        assert_eq!(lines[2], "2    สมชาย ใจดี");
        assert_eq!(lines[3], "10   Bob");
    }

    #[test]
    fn control_characters_are_flattened() {
        let rendered = render_table(&strings(&["msg"]), &[strings(&["a\nb"])]);
        assert!(rendered.ends_with("a b\n"));
    }
}
