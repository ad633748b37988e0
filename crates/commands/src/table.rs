//! Fixed-width text tables for chat output.

/// A table with a header row, a `---` separator row and data rows. Every
/// column is padded to its widest cell.
#[derive(Debug, Clone, Default)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new<I, S>(headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Append a row. Short rows are padded with empty cells; extra cells are
    /// dropped.
    pub fn row<I, S>(&mut self, cells: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut cells: Vec<String> = cells.into_iter().map(Into::into).collect();
        cells.resize(self.headers.len(), String::new());
        self.rows.push(cells);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn render(&self) -> String {
        let widths: Vec<usize> = (0..self.headers.len())
            .map(|i| {
                self.rows
                    .iter()
                    .map(|r| r[i].chars().count())
                    .chain(std::iter::once(self.headers[i].chars().count()))
                    .max()
                    .unwrap_or(0)
                    .max(3)
            })
            .collect();

        let mut out = String::new();
        push_line(&mut out, &self.headers, &widths);
        let separator: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        push_line(&mut out, &separator, &widths);
        for row in &self.rows {
            push_line(&mut out, row, &widths);
        }
        out.pop();
        out
    }
}

fn push_line(out: &mut String, cells: &[String], widths: &[usize]) {
    out.push('|');
    for (cell, width) in cells.iter().zip(widths) {
        let pad = width.saturating_sub(cell.chars().count());
        out.push(' ');
        out.push_str(cell);
        out.extend(std::iter::repeat_n(' ', pad));
        out.push_str(" |");
    }
    out.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_aligned_columns() {
        let mut table = Table::new(["ID", "Name"]);
        table.row(["1", "web-1"]).row(["1234", "db"]);
        assert_eq!(
            table.render(),
            "| ID   | Name  |\n\
             | ---- | ----- |\n\
             | 1    | web-1 |\n\
             | 1234 | db    |"
        );
    }

    #[test]
    fn short_rows_are_padded() {
        let mut table = Table::new(["A", "B"]);
        table.row(["x"]);
        assert_eq!(table.render(), "| A   | B   |\n| --- | --- |\n| x   |     |");
    }

    #[test]
    fn header_only_table() {
        let table = Table::new(["Name"]);
        assert!(table.is_empty());
        assert_eq!(table.render(), "| Name |\n| ---- |");
    }
}
