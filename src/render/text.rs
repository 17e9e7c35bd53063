//! Fixed-width tabular output
//!
//! Column width is the widest cell or header. Headers are centered, numeric
//! cells right-justified, everything else left-justified, and columns are
//! separated by two spaces.

use crate::data::{AllocationRecord, Attribute};
use crate::query::{Groups, Resolved};

const COLUMN_SEPARATOR: &str = "  ";
/// Minimum width of the trailing count/bytes column of grouped output
const AGGREGATE_WIDTH: usize = 5;

/// Render any resolved result
pub fn render(resolved: &Resolved<'_>, columns: &[Attribute], alias_paths: bool) -> String {
    match resolved {
        Resolved::Records(records) => render_records(records, columns, alias_paths),
        Resolved::Bytes(bytes) => render_bytes(bytes),
        Resolved::Groups(groups) => render_groups(groups, "count", |records| records.len() as u64),
        Resolved::GroupBytes(groups) => render_groups(groups, "bytes", |bytes| *bytes),
    }
}

/// One row per record, one column per attribute
pub fn render_records(
    records: &[&AllocationRecord],
    columns: &[Attribute],
    alias_paths: bool,
) -> String {
    let cells: Vec<Vec<String>> = records
        .iter()
        .map(|record| {
            columns
                .iter()
                .map(|column| record.attribute(column, alias_paths).to_string())
                .collect()
        })
        .collect();

    let headers: Vec<&str> = columns.iter().map(Attribute::as_str).collect();
    let widths = column_widths(&headers, &cells);

    let mut lines = header_lines(&headers, &widths);
    for row in &cells {
        let line = row
            .iter()
            .enumerate()
            .map(|(idx, cell)| justify(cell, widths[idx], columns[idx].is_numeric()))
            .collect::<Vec<_>>()
            .join(COLUMN_SEPARATOR);
        lines.push(line.trim_end().to_string());
    }

    lines.join("\n")
}

/// One row per group: the key cells followed by an aggregate column
pub fn render_groups<T>(groups: &Groups<T>, aggregate: &str, value: impl Fn(&T) -> u64) -> String {
    let attributes = groups.attributes();
    let key_cells: Vec<Vec<String>> = groups
        .keys()
        .map(|key| key.iter().map(ToString::to_string).collect())
        .collect();
    let aggregates: Vec<String> = groups.values().map(|v| value(v).to_string()).collect();

    let mut headers: Vec<&str> = attributes.iter().map(Attribute::as_str).collect();
    headers.push(aggregate);

    let mut widths = column_widths(&headers[..attributes.len()], &key_cells);
    let aggregate_width = aggregates
        .iter()
        .map(|a| a.chars().count())
        .chain([aggregate.chars().count(), AGGREGATE_WIDTH])
        .max()
        .unwrap_or(AGGREGATE_WIDTH);
    widths.push(aggregate_width);

    let mut lines = header_lines(&headers, &widths);
    for (row, total) in key_cells.iter().zip(&aggregates) {
        let mut line = row
            .iter()
            .enumerate()
            .map(|(idx, cell)| justify(cell, widths[idx], attributes[idx].is_numeric()))
            .collect::<Vec<_>>()
            .join(COLUMN_SEPARATOR);
        line.push_str(COLUMN_SEPARATOR);
        line.push_str(&format!("{:>width$}", total, width = aggregate_width));
        lines.push(line);
    }

    lines.join("\n")
}

fn render_bytes(bytes: &[u64]) -> String {
    let header = Attribute::RetainedBytes;
    let cells: Vec<Vec<String>> = bytes.iter().map(|b| vec![b.to_string()]).collect();
    let headers = [header.as_str()];
    let widths = column_widths(&headers, &cells);

    let mut lines = header_lines(&headers, &widths);
    lines.extend(cells.iter().map(|row| justify(&row[0], widths[0], true)));
    lines.join("\n")
}

fn column_widths(headers: &[&str], rows: &[Vec<String>]) -> Vec<usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, header)| {
            rows.iter()
                .filter_map(|row| row.get(idx))
                .map(|cell| cell.chars().count())
                .chain(std::iter::once(header.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect()
}

/// Centered header row and dashed separator row
fn header_lines(headers: &[&str], widths: &[usize]) -> Vec<String> {
    let header = headers
        .iter()
        .zip(widths)
        .map(|(name, width)| format!("{:^width$}", name, width = *width))
        .collect::<Vec<_>>()
        .join(COLUMN_SEPARATOR);
    let separator = widths
        .iter()
        .map(|width| "-".repeat(*width))
        .collect::<Vec<_>>()
        .join(COLUMN_SEPARATOR);

    vec![header.trim_end().to_string(), separator]
}

fn justify(cell: &str, width: usize, numeric: bool) -> String {
    if numeric {
        format!("{:>width$}", cell, width = width)
    } else {
        format!("{:<width$}", cell, width = width)
    }
}
