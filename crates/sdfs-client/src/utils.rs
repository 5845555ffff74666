//! Utility functions for the SDFS CLI.

use std::fmt;

/// Format size as human readable
pub fn format_size(bytes: i64, human_readable: bool) -> String {
    if human_readable {
        humansize::format_size(bytes as u64, humansize::BINARY)
    } else {
        bytes.to_string()
    }
}

/// A fixed-width column table, grounded in `original_source/mp3-sdfs/client.go`'s
/// use of `text/tabwriter` for `ls`/`store` output.
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: &[&str]) -> Self {
        Self {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut widths: Vec<usize> = self.headers.iter().map(|h| h.len()).collect();
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate() {
                if let Some(w) = widths.get_mut(i) {
                    *w = (*w).max(cell.len());
                }
            }
        }

        let write_row = |f: &mut fmt::Formatter<'_>, cells: &[String]| -> fmt::Result {
            for (i, cell) in cells.iter().enumerate() {
                let width = widths.get(i).copied().unwrap_or(cell.len());
                if i + 1 == cells.len() {
                    write!(f, "{cell}")?;
                } else {
                    write!(f, "{cell:width$}  ")?;
                }
            }
            writeln!(f)
        };

        write_row(f, &self.headers)?;
        for row in &self.rows {
            write_row(f, row)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_size_human_readable() {
        assert_eq!(format_size(1024, true), "1 KiB");
        assert_eq!(format_size(1024, false), "1024");
    }

    #[test]
    fn table_pads_columns_to_widest_cell() {
        let mut table = Table::new(&["NAME", "SIZE"]);
        table.push(vec!["short".into(), "1".into()]);
        table.push(vec!["a-much-longer-name".into(), "22".into()]);
        let rendered = table.to_string();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("NAME"));
        assert!(lines[1].len() >= lines[2].split_whitespace().next().unwrap().len());
    }
}
