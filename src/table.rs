//! Delimited text tables
//!
//! Metadata sheets and distance matrices arrive as CSV, TSV or other
//! delimited text exported from spreadsheets and pipeline tools. The
//! delimiter is sniffed from the first lines, and input that is not valid
//! UTF-8 is decoded as Windows-1252.

use std::fs;
use std::path::Path;

use thiserror::Error;

/// Errors that can occur when reading a delimited table
#[derive(Error, Debug)]
pub enum TableError {
    #[error("Failed to read table: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Table is empty")]
    Empty,

    #[error("Line {line}: expected at most {expected} fields, found {found}")]
    RaggedRow {
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("Line {line}: unterminated quoted field")]
    UnterminatedQuote { line: usize },

    #[error("Duplicate column name '{0}'")]
    DuplicateColumn(String),
}

/// A header row plus data rows, all cells as text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

const CANDIDATE_DELIMITERS: [char; 4] = ['\t', ',', ';', '|'];

/// Lines inspected when sniffing the delimiter
const SNIFF_LINES: usize = 5;

/// Read and parse a delimited file
pub fn read_table(path: &Path) -> Result<Table, TableError> {
    let bytes = fs::read(path)?;
    parse_table(&decode_text(&bytes))
}

/// Parse delimited text. Rows shorter than the header are padded with
/// empty cells; longer rows are an error.
pub fn parse_table(text: &str) -> Result<Table, TableError> {
    let lines: Vec<(usize, &str)> = text
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim_end_matches('\r')))
        .filter(|(_, line)| !line.trim().is_empty())
        .collect();

    let Some(&(header_line, header)) = lines.first() else {
        return Err(TableError::Empty);
    };

    let sample: Vec<&str> = lines.iter().take(SNIFF_LINES).map(|(_, l)| *l).collect();
    let delimiter = sniff_delimiter(&sample);

    let headers: Vec<String> = split_record(header, delimiter, header_line)?
        .into_iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::with_capacity(lines.len().saturating_sub(1));
    for &(line_no, line) in &lines[1..] {
        let mut cells = split_record(line, delimiter, line_no)?;
        if cells.len() > headers.len() {
            return Err(TableError::RaggedRow {
                line: line_no,
                expected: headers.len(),
                found: cells.len(),
            });
        }
        cells.resize(headers.len(), String::new());
        rows.push(cells);
    }

    Ok(Table { headers, rows })
}

/// Pick the delimiter that splits every sampled line into the same,
/// non-trivial number of fields. Falls back to a comma.
pub fn sniff_delimiter(lines: &[&str]) -> char {
    let consistent = |delim: char| {
        let mut counts = lines.iter().map(|line| count_unquoted(line, delim));
        match counts.next() {
            Some(first) if first > 0 => counts.all(|c| c == first),
            _ => false,
        }
    };

    if let Some(&delim) = CANDIDATE_DELIMITERS.iter().find(|&&d| consistent(d)) {
        return delim;
    }

    // Ragged input: take whichever delimiter the header uses most
    let header = lines.first().copied().unwrap_or_default();
    CANDIDATE_DELIMITERS
        .iter()
        .copied()
        .map(|d| (d, count_unquoted(header, d)))
        .filter(|&(_, count)| count > 0)
        .max_by_key(|&(_, count)| count)
        .map(|(d, _)| d)
        .unwrap_or(',')
}

fn count_unquoted(line: &str, delimiter: char) -> usize {
    let mut in_quotes = false;
    let mut count = 0;
    for c in line.chars() {
        if c == '"' {
            in_quotes = !in_quotes;
        } else if c == delimiter && !in_quotes {
            count += 1;
        }
    }
    count
}

/// Split one record, honouring double-quoted fields with `""` escapes
fn split_record(line: &str, delimiter: char, line_no: usize) -> Result<Vec<String>, TableError> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    field.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            } else {
                field.push(c);
            }
        } else if c == '"' && field.trim().is_empty() {
            field.clear();
            in_quotes = true;
        } else if c == delimiter {
            fields.push(std::mem::take(&mut field));
        } else {
            field.push(c);
        }
    }

    if in_quotes {
        return Err(TableError::UnterminatedQuote { line: line_no });
    }
    fields.push(field);
    Ok(fields)
}

/// Decode UTF-8, falling back to Windows-1252 for legacy spreadsheet exports
pub fn decode_text(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => bytes.iter().map(|&b| decode_cp1252(b)).collect(),
    }
}

fn decode_cp1252(byte: u8) -> char {
    // 0x80..=0x9F differ from Latin-1; undefined slots map to U+FFFD
    const HIGH: [char; 32] = [
        '\u{20AC}', '\u{FFFD}', '\u{201A}', '\u{0192}', '\u{201E}', '\u{2026}', '\u{2020}',
        '\u{2021}', '\u{02C6}', '\u{2030}', '\u{0160}', '\u{2039}', '\u{0152}', '\u{FFFD}',
        '\u{017D}', '\u{FFFD}', '\u{FFFD}', '\u{2018}', '\u{2019}', '\u{201C}', '\u{201D}',
        '\u{2022}', '\u{2013}', '\u{2014}', '\u{02DC}', '\u{2122}', '\u{0161}', '\u{203A}',
        '\u{0153}', '\u{FFFD}', '\u{017E}', '\u{0178}',
    ];
    match byte {
        0x80..=0x9F => HIGH[(byte - 0x80) as usize],
        _ => byte as char,
    }
}
