//! Source-corpus parsing for the offline builder.
//!
//! Mozc dictionary TSV: `reading \t left_id \t right_id \t cost \t surface`.
//! Mozc connection text: a dimension header line, then one cost per line.

use super::{ConnectionMatrix, DictError, DictRow};
use crate::utf16;

/// Parse Mozc dictionary TSV rows.
///
/// Comment lines (`#`), blank lines, and lines with fewer than five columns
/// are skipped; an unparsable or out-of-range integer field is fatal.
pub fn parse_mozc_tsv(text: &str) -> Result<Vec<DictRow>, DictError> {
    let mut rows = Vec::new();
    for line in text.lines() {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut cols = line.splitn(5, '\t');
        let (Some(reading), Some(left), Some(right), Some(cost), Some(surface)) = (
            cols.next(),
            cols.next(),
            cols.next(),
            cols.next(),
            cols.next(),
        ) else {
            continue;
        };
        rows.push(DictRow {
            reading: utf16::encode(reading),
            left_id: parse_i16(left, "left_id")?,
            right_id: parse_i16(right, "right_id")?,
            cost: parse_i16(cost, "cost")?,
            surface: utf16::encode(surface),
        });
    }
    Ok(rows)
}

/// Parse Mozc `connection_single_column.txt`: the first line is the matrix
/// dimension, followed by exactly dim² costs, one per line.
pub fn parse_connection_text(text: &str) -> Result<ConnectionMatrix, DictError> {
    let mut lines = text.lines().filter(|l| !l.trim().is_empty());
    let header = lines
        .next()
        .ok_or_else(|| DictError::Parse("empty connection text".to_string()))?;
    let dim: usize = header
        .trim()
        .parse()
        .map_err(|e| DictError::Parse(format!("invalid dimension header {header:?}: {e}")))?;

    let expected = dim * dim;
    let mut values = Vec::with_capacity(expected);
    for line in lines {
        values.push(parse_i16(line, "connection cost")?);
    }
    if values.len() != expected {
        return Err(DictError::Parse(format!(
            "expected {expected} connection costs, got {}",
            values.len()
        )));
    }
    ConnectionMatrix::from_values(values)
}

fn parse_i16(field: &str, name: &str) -> Result<i16, DictError> {
    let value: i64 = field
        .trim()
        .parse()
        .map_err(|e| DictError::Parse(format!("invalid {name} {field:?}: {e}")))?;
    i16::try_from(value)
        .map_err(|_| DictError::Parse(format!("{name} out of i16 range: {value}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utf16::encode;

    #[test]
    fn test_parse_tsv() {
        let text = "# comment\n\
                    きょう\t1900\t1900\t3000\t今日\n\
                    \n\
                    malformed line without tabs\n\
                    は\t300\t300\t2000\tは\r\n";
        let rows = parse_mozc_tsv(text).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].reading, encode("きょう"));
        assert_eq!(rows[0].surface, encode("今日"));
        assert_eq!(rows[0].cost, 3000);
        assert_eq!(rows[1].right_id, 300);
    }

    #[test]
    fn test_parse_tsv_bad_int() {
        let text = "きょう\tabc\t1900\t3000\t今日\n";
        assert!(matches!(parse_mozc_tsv(text), Err(DictError::Parse(_))));
        let text = "きょう\t99999\t1900\t3000\t今日\n";
        assert!(matches!(parse_mozc_tsv(text), Err(DictError::Parse(_))));
    }

    #[test]
    fn test_parse_connection() {
        let text = "2\n10\n-20\n30\n40\n";
        let conn = parse_connection_text(text).unwrap();
        assert_eq!(conn.dim(), 2);
        assert_eq!(conn.get(0, 1), -20);
        assert_eq!(conn.get(1, 1), 40);
    }

    #[test]
    fn test_parse_connection_count_mismatch() {
        assert!(matches!(
            parse_connection_text("2\n1\n2\n3\n"),
            Err(DictError::Parse(_))
        ));
        assert!(matches!(
            parse_connection_text(""),
            Err(DictError::Parse(_))
        ));
    }

    #[test]
    fn test_connection_text_matches_binary() {
        let text = "2\n1\n2\n3\n4\n";
        let conn = parse_connection_text(text).unwrap();
        let back = ConnectionMatrix::from_bytes(&conn.to_bytes()).unwrap();
        assert_eq!(back, conn);
    }
}
