//! Spreadsheet rows to keyed records.

use std::collections::BTreeMap;

/// One data row keyed by normalized header.
pub type SheetRecord = BTreeMap<String, String>;

/// Lower-cases a header and folds every run of non-alphanumeric characters
/// into the upper-cased character that follows it.
///
/// `"Post Date"` becomes `"postDate"`. A trailing run keeps only its last
/// character.
pub fn normalize_header(header: &str) -> String {
    let lowered = header.to_lowercase();
    let mut out = String::with_capacity(lowered.len());
    let mut chars = lowered.chars().peekable();

    while let Some(c) = chars.next() {
        if c.is_alphanumeric() {
            out.push(c);
            continue;
        }
        let mut last = c;
        while let Some(&next) = chars.peek() {
            if next.is_alphanumeric() {
                break;
            }
            last = next;
            chars.next();
        }
        match chars.next() {
            Some(next) => out.extend(next.to_uppercase()),
            None => out.push(last),
        }
    }
    out
}

/// Treats the first row as headers and turns every following row into a
/// record. Missing cells become empty strings and cells past the last header
/// are dropped. When two headers normalize to the same key the later column
/// wins.
pub fn rows_to_records(rows: &[Vec<String>]) -> Vec<SheetRecord> {
    let Some((header_row, data_rows)) = rows.split_first() else {
        return Vec::new();
    };
    let headers: Vec<String> = header_row.iter().map(|h| normalize_header(h)).collect();

    data_rows
        .iter()
        .map(|row| {
            let mut record = SheetRecord::new();
            for (index, key) in headers.iter().enumerate() {
                let cell = row.get(index).cloned().unwrap_or_default();
                record.insert(key.clone(), cell);
            }
            record
        })
        .collect()
}
