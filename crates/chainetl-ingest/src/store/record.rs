//! Rows written to the CSV store

use chainetl_common::{EtlError, Result};

/// A value that renders to one CSV row under a fixed header.
///
/// Every record of one kind must return the same `headers`; the first insert
/// into an empty file writes them as the header row.
pub trait CsvRecord: Send + Sync {
    fn headers(&self) -> &'static [&'static str];

    fn row(&self) -> Vec<String>;
}

/// Look up the value of column `key` in `row` using the header row.
pub fn field_by_header<'a>(headers: &[&str], row: &'a [String], key: &str) -> Result<&'a str> {
    headers
        .iter()
        .position(|header| *header == key)
        .and_then(|index| row.get(index))
        .map(String::as_str)
        .ok_or_else(|| EtlError::FieldNotFound(key.to_string()))
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::CsvRecord;

    /// Two-column record used by the store tests.
    #[derive(Debug, Clone)]
    pub struct TestRow {
        pub id: i64,
        pub label: String,
    }

    impl TestRow {
        pub fn new(id: i64, label: &str) -> Self {
            Self {
                id,
                label: label.to_string(),
            }
        }
    }

    impl CsvRecord for TestRow {
        fn headers(&self) -> &'static [&'static str] {
            &["header1", "header2"]
        }

        fn row(&self) -> Vec<String> {
            vec![self.id.to_string(), self.label.clone()]
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::test_support::TestRow;
    use super::*;

    #[test]
    fn test_field_by_header() {
        let row = TestRow::new(1, "test1");
        let headers = row.headers();
        let values = row.row();

        assert_eq!(field_by_header(headers, &values, "header1").unwrap(), "1");
        assert_eq!(field_by_header(headers, &values, "header2").unwrap(), "test1");
        assert!(matches!(
            field_by_header(headers, &values, "header3"),
            Err(EtlError::FieldNotFound(_))
        ));
    }

    #[test]
    fn test_field_by_header_short_row() {
        let values = vec!["only".to_string()];
        assert!(field_by_header(&["a", "b"], &values, "b").is_err());
    }
}
