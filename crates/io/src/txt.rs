//! Plain-text point records: one point per line, numeric columns.

use groundcloud_core::PointRecords;
use std::fs;
use std::io::{self, BufWriter, Write as _};
use std::path::Path;

/// Precision used for every text file the tools write.
pub const DEFAULT_PRECISION: usize = 6;

fn invalid(msg: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg)
}

/// Reads whitespace-separated records.
///
/// Blank lines and lines starting with `#` are skipped. Every remaining line
/// must have the same number of columns. A file with no records is an error,
/// since its width is unknown.
pub fn read_records(path: impl AsRef<Path>) -> io::Result<PointRecords> {
    let text = fs::read_to_string(&path)?;
    parse_records(
        text.lines().map(|l| l.split_whitespace()),
        path.as_ref(),
    )
}

/// Reads records separated by `delimiter`, ignoring the first `skip_rows`
/// lines (header rows).
pub fn read_delimited_records(
    path: impl AsRef<Path>,
    delimiter: char,
    skip_rows: usize,
) -> io::Result<PointRecords> {
    let text = fs::read_to_string(&path)?;
    parse_records(
        text.lines()
            .skip(skip_rows)
            .map(|l| l.split(delimiter).map(str::trim).filter(|f| !f.is_empty())),
        path.as_ref(),
    )
}

fn parse_records<'a, L, F>(lines: L, path: &Path) -> io::Result<PointRecords>
where
    L: Iterator<Item = F>,
    F: Iterator<Item = &'a str>,
{
    let mut records: Option<PointRecords> = None;
    let mut row = Vec::new();

    for (line_no, fields) in lines.enumerate() {
        row.clear();
        let mut fields = fields.peekable();
        match fields.peek() {
            None => continue,
            Some(first) if first.starts_with('#') => continue,
            _ => {}
        }
        for field in fields {
            let value = field.parse::<f64>().map_err(|e| {
                invalid(format!(
                    "{}: line {}: cannot parse '{}': {}",
                    path.display(),
                    line_no + 1,
                    field,
                    e
                ))
            })?;
            row.push(value);
        }

        let table = records.get_or_insert_with(|| PointRecords::new(row.len()));
        if row.len() != table.columns() {
            return Err(invalid(format!(
                "{}: line {}: expected {} columns, found {}",
                path.display(),
                line_no + 1,
                table.columns(),
                row.len()
            )));
        }
        table.push(&row);
    }

    records.ok_or_else(|| invalid(format!("{}: no records", path.display())))
}

/// Writes one record per line, columns separated by a single space, each
/// value with `precision` digits after the decimal point.
pub fn write_records(
    path: impl AsRef<Path>,
    records: &PointRecords,
    precision: usize,
) -> io::Result<()> {
    let file = fs::File::create(path)?;
    let mut w = BufWriter::new(file);

    for row in records.rows() {
        for (c, v) in row.iter().enumerate() {
            if c > 0 {
                w.write_all(b" ")?;
            }
            write!(w, "{:.*}", precision, v)?;
        }
        w.write_all(b"\n")?;
    }

    w.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn write_text(text: &str) -> NamedTempFile {
        let tmp = NamedTempFile::new().unwrap();
        fs::write(tmp.path(), text).unwrap();
        tmp
    }

    #[test]
    fn reads_whitespace_records() {
        let tmp = write_text("# x y z r g b\n1 2 3 255 0 0\n\n4\t5  6 0 255 0\n");
        let records = read_records(tmp.path()).unwrap();
        assert_eq!(records.columns(), 6);
        assert_eq!(records.len(), 2);
        assert_eq!(records.row(1), &[4.0, 5.0, 6.0, 0.0, 255.0, 0.0]);
    }

    #[test]
    fn single_row_is_a_one_row_table() {
        let tmp = write_text("1.5 2.5 3.5\n");
        let records = read_records(tmp.path()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records.xyz(0), [1.5, 2.5, 3.5]);
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let tmp = write_text("1 2 3\n4 5\n");
        let err = read_records(tmp.path()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn bad_numbers_and_empty_files_are_rejected() {
        assert!(read_records(write_text("1 2 x\n").path()).is_err());
        assert!(read_records(write_text("\n# only a comment\n").path()).is_err());
        assert!(read_records("/definitely/not/here.txt").is_err());
    }

    #[test]
    fn reads_comma_delimited_with_header() {
        let tmp = write_text("\"X\",\"Y\",\"Z\"\n1.000000,2.000000,3.000000\n4.5, 5.5, 6.5\n");
        let records = read_delimited_records(tmp.path(), ',', 1).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records.xyz(1), [4.5, 5.5, 6.5]);
    }

    #[test]
    fn writes_fixed_precision() {
        let records = PointRecords::from_rows(4, &[[1.0, -2.5, 1.0 / 3.0, 255.0]]);
        let tmp = NamedTempFile::new().unwrap();
        write_records(tmp.path(), &records, DEFAULT_PRECISION).unwrap();
        assert_eq!(
            fs::read_to_string(tmp.path()).unwrap(),
            "1.000000 -2.500000 0.333333 255.000000\n"
        );

        let back = read_records(tmp.path()).unwrap();
        assert_eq!(back.columns(), 4);
        assert!((back.row(0)[2] - 0.333333).abs() < 1e-12);
    }
}
