//! Table rendering using comfy-table

use comfy_table::{presets::UTF8_FULL_CONDENSED, Attribute, Cell, Color, ContentArrangement, Table};

/// Print a formatted table with headers and rows
pub fn print_table(headers: &[&str], rows: &[Vec<String>]) {
    print!("{}", format_table(headers, rows));
}

/// Format a table to an indented string
pub fn format_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    if !console::colors_enabled() {
        table.force_no_tty();
    }

    // Constrain table width to terminal width minus indent, default to 120 if detection fails
    let width = crossterm::terminal::size()
        .map(|(cols, _)| cols)
        .unwrap_or(120)
        .saturating_sub(4);
    table.set_width(width);
    table.set_content_arrangement(ContentArrangement::Dynamic);

    let header_cells: Vec<Cell> = headers
        .iter()
        .map(|h| Cell::new(h).add_attribute(Attribute::Bold).fg(Color::Cyan))
        .collect();
    table.set_header(header_cells);

    for row in rows {
        let cells: Vec<Cell> = row.iter().map(|text| status_cell(text)).collect();
        table.add_row(cells);
    }

    let mut out = String::new();
    for line in table.to_string().lines() {
        out.push_str(&format!("    {}\n", line));
    }
    out
}

/// Colour cells that carry a status icon
fn status_cell(text: &str) -> Cell {
    let cell = Cell::new(text);
    if text.starts_with('✓') {
        cell.fg(Color::Green)
    } else if text.starts_with('✗') {
        cell.fg(Color::Red)
    } else if text.starts_with('⚠') {
        cell.fg(Color::Yellow)
    } else if text.starts_with("- SKIP") {
        cell.fg(Color::DarkGrey)
    } else {
        cell
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_table_contains_cells() {
        let out = format_table(
            &["Check", "Status"],
            &[vec!["ping".to_string(), "✓ PASS".to_string()]],
        );
        assert!(out.contains("Check"));
        assert!(out.contains("ping"));
        assert!(out.lines().all(|l| l.starts_with("    ")));
    }
}
