//! Terminal rendering

use std::io::Write;

use tabled::builder::Builder;
use tabled::settings::object::Columns;
use tabled::settings::{Alignment, Modify, Style};

use crate::error::Result;
use crate::model::table::Table;

const ELLIPSIS: &str = "...";

/// How many rows a [`Table`]'s `Display` implementation shows.
const DISPLAY_ROW_LIMIT: usize = 20;

impl Table {
    /// Render the table as a bordered grid, truncating to at most `max_rows`
    /// rows and `max_columns` columns with an ellipsis marker. Numeric
    /// columns are right-aligned.
    pub fn print_table(
        &self,
        max_rows: Option<usize>,
        max_columns: Option<usize>,
        writer: &mut dyn Write,
    ) -> Result<()> {
        writeln!(writer, "{}", self.render(max_rows, max_columns))?;
        Ok(())
    }

    fn render(&self, max_rows: Option<usize>, max_columns: Option<usize>) -> String {
        let n_rows = max_rows.unwrap_or(self.n_rows()).min(self.n_rows());
        let n_columns = max_columns.unwrap_or(self.n_columns()).min(self.n_columns());
        let rows_truncated = n_rows < self.n_rows();
        let columns_truncated = n_columns < self.n_columns();

        let mut builder = Builder::default();
        let mut header: Vec<String> = self.column_names()[..n_columns].to_vec();
        if columns_truncated {
            header.push(ELLIPSIS.to_string());
        }
        builder.push_record(header);

        for row in self.rows().iter().take(n_rows) {
            let mut cells: Vec<String> = (0..n_columns)
                .map(|i| self.column_types()[i].csvify(&row[i]))
                .collect();
            if columns_truncated {
                cells.push(ELLIPSIS.to_string());
            }
            builder.push_record(cells);
        }
        if rows_truncated {
            let width = n_columns + usize::from(columns_truncated);
            builder.push_record(vec![ELLIPSIS.to_string(); width]);
        }

        let mut grid = builder.build();
        grid.with(Style::sharp());
        for (i, data_type) in self.column_types()[..n_columns].iter().enumerate() {
            if data_type.is_numeric() {
                grid.with(Modify::new(Columns::single(i)).with(Alignment::right()));
            }
        }
        grid.to_string()
    }
}

impl std::fmt::Display for Table {
    /// A preview: the first twenty rows.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.render(Some(DISPLAY_ROW_LIMIT), None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::types::ValueType;
    use crate::model::value::Value;

    fn sample(n: usize) -> Table {
        Table::from_values(
            (0..n)
                .map(|i| vec![Value::from(i as i64), Value::from(format!("row{i}"))])
                .collect(),
            vec!["n".to_string(), "label".to_string()],
            vec![ValueType::number(), ValueType::text()],
        )
        .unwrap()
    }

    #[test]
    fn test_print_table_contains_all_cells() {
        let mut out = Vec::new();
        sample(3).print_table(None, None, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("label"));
        assert!(text.contains("row2"));
        assert!(!text.contains(ELLIPSIS));
    }

    #[test]
    fn test_truncation_markers() {
        let table = sample(10);
        let mut out = Vec::new();
        table.print_table(Some(2), Some(1), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains(ELLIPSIS));
        // rows 0 and 1 of column "n" survive; the label column and row 2 do not
        assert!(text.contains('0'));
        assert!(text.contains('1'));
        assert!(!text.contains('2'));
        assert!(!text.contains("label"));
    }

    #[test]
    fn test_display_preview_is_bounded() {
        let table = sample(30);
        let text = table.to_string();
        assert!(text.contains("row19"));
        assert!(!text.contains("row20"));
        assert!(text.contains(ELLIPSIS));
    }
}
