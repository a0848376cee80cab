//! CSV adapter

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::error::Result;
use crate::model::table::{Table, TableOptions};

impl Table {
    /// Load a table from a CSV file. The first record is the header unless
    /// the options carry explicit column names.
    pub fn from_csv(path: impl AsRef<Path>, options: TableOptions) -> Result<Table> {
        let file = File::open(path)?;
        Self::from_csv_reader(BufReader::new(file), options)
    }

    /// Load a table from any CSV source.
    pub fn from_csv_reader<R: Read>(reader: R, options: TableOptions) -> Result<Table> {
        let has_headers = options.column_names.is_none();
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(has_headers)
            .flexible(true)
            .from_reader(reader);

        let options = if has_headers {
            let headers = csv_reader.headers()?.clone();
            options.with_column_names(headers.iter().map(str::to_string).collect())
        } else {
            options
        };

        let mut raw_rows = Vec::new();
        for result in csv_reader.records() {
            let record = result?;
            raw_rows.push(record.iter().map(|cell| Some(cell.to_string())).collect());
        }

        Table::new(raw_rows, options)
    }

    /// Write the table to a CSV file, header first.
    pub fn to_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = File::create(path)?;
        self.to_csv_writer(BufWriter::new(file))
    }

    /// Write the table as CSV to any sink.
    pub fn to_csv_writer<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record(self.column_names())?;
        for row in self.rows().iter() {
            let record: Vec<String> = row
                .values()
                .iter()
                .zip(self.column_types().iter())
                .map(|(value, data_type)| data_type.csvify(value))
                .collect();
            csv_writer.write_record(&record)?;
        }
        csv_writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::types::TypeKind;
    use crate::model::value::Value;

    const SAMPLE: &str = "id,name,joined\n1,alice,2024-01-05\n2,bob,2024-02-10\n3,,\n";

    #[test]
    fn test_from_csv_infers_types() {
        let table = Table::from_csv_reader(SAMPLE.as_bytes(), TableOptions::new()).unwrap();
        assert_eq!(
            table.column_names(),
            &["id".to_string(), "name".to_string(), "joined".to_string()]
        );
        assert_eq!(table.column_types()[0].kind(), TypeKind::Number);
        assert_eq!(table.column_types()[2].kind(), TypeKind::Date);
        assert_eq!(table.n_rows(), 3);
        assert_eq!(table.row(2).unwrap()[1], Value::Null);
    }

    #[test]
    fn test_csv_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.csv");
        std::fs::write(&path, SAMPLE).unwrap();

        let table = Table::from_csv(&path, TableOptions::new()).unwrap();
        let out = dir.path().join("out.csv");
        table.to_csv(&out).unwrap();

        let again = Table::from_csv(&out, TableOptions::new()).unwrap();
        assert_eq!(again.column_names(), table.column_names());
        assert_eq!(again.n_rows(), table.n_rows());
        for (a, b) in again.rows().iter().zip(table.rows().iter()) {
            assert_eq!(a.values(), b.values());
        }
    }

    #[test]
    fn test_explicit_column_names_consume_no_header() {
        let table = Table::from_csv_reader(
            "1,x\n2,y\n".as_bytes(),
            TableOptions::new().with_column_names(vec!["n".to_string(), "s".to_string()]),
        )
        .unwrap();
        assert_eq!(table.n_rows(), 2);
        assert_eq!(table.row(0).unwrap()[1], Value::from("x"));
    }

    #[test]
    fn test_short_csv_rows_are_padded() {
        let table =
            Table::from_csv_reader("a,b\n1\n".as_bytes(), TableOptions::new()).unwrap();
        assert_eq!(table.row(0).unwrap()[1], Value::Null);
    }
}
