//! # Record Codec
//!
//! Pure encode/decode between [`Record`]s and the on-disk CSV format. No I/O happens here.
//!
//! ## File Format
//!
//! ```text
//! id,name,quantity,store,price,addedBy      <-- reserved header, always first
//! 1,Milk,2,Market,3.50,Alice
//! 2,"Bread, rye",1,,,Bob                    <-- quoted because of the comma
//! ```
//!
//! - Six fixed-order columns.
//! - A field containing `,`, `"`, `\r` or `\n` is wrapped in double quotes and inner
//!   quotes are doubled (standard CSV quoting). Everything else is written bare.
//! - Every row, including the last, ends with `\n`. Reading is CRLF-insensitive.
//! - Quoted fields may span lines, so files are split into records with quote
//!   awareness rather than with `str::lines`.
//!
//! ## Malformed Rows
//!
//! A row resolving to fewer than six fields decodes to [`Malformed`]. Decoding a file never
//! fails: malformed rows are dropped and counted in [`Decoded::malformed`], the caller
//! decides how to report them. Extra trailing fields are ignored.

use crate::model::Record;

pub const HEADER: &str = "id,name,quantity,store,price,addedBy";
pub const FIELD_COUNT: usize = 6;

/// A row that did not resolve to six fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Malformed {
    pub fields: usize,
}

/// Result of decoding a whole file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Decoded {
    pub records: Vec<Record>,
    pub malformed: usize,
}

fn needs_quoting(field: &str) -> bool {
    field.contains([',', '"', '\n', '\r'])
}

fn encode_field(field: &str, out: &mut String) {
    if needs_quoting(field) {
        out.push('"');
        out.push_str(&field.replace('"', "\"\""));
        out.push('"');
    } else {
        out.push_str(field);
    }
}

/// Encodes one record as a CSV row, without the trailing newline.
pub fn encode(record: &Record) -> String {
    let fields = [
        &record.id,
        &record.name,
        &record.quantity,
        &record.store,
        &record.price,
        &record.added_by,
    ];
    let mut out = String::new();
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        encode_field(field, &mut out);
    }
    out
}

/// Splits one raw row into its fields, undoing CSV quoting.
pub fn split_fields(row: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut at_field_start = true;
    let mut chars = row.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    current.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            } else {
                current.push(c);
            }
            continue;
        }

        match c {
            ',' => {
                fields.push(std::mem::take(&mut current));
                at_field_start = true;
                continue;
            }
            '"' if at_field_start => in_quotes = true,
            _ => current.push(c),
        }
        at_field_start = false;
    }
    fields.push(current);
    fields
}

/// Decodes one raw row. The header row is not special-cased here.
pub fn decode(row: &str) -> Result<Record, Malformed> {
    let mut fields = split_fields(row);
    if fields.len() < FIELD_COUNT {
        return Err(Malformed {
            fields: fields.len(),
        });
    }
    fields.truncate(FIELD_COUNT);
    let mut it = fields.into_iter();
    // Six elements are guaranteed by the length check above.
    let mut next = || it.next().unwrap_or_default();
    Ok(Record {
        id: next(),
        name: next(),
        quantity: next(),
        store: next(),
        price: next(),
        added_by: next(),
    })
}

/// Splits file text into raw rows. Newlines inside quoted fields stay in their row,
/// a `\r` right before a row-ending `\n` is dropped.
pub fn split_records(text: &str) -> Vec<String> {
    let mut rows = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for c in text.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            '\n' if !in_quotes => {
                if current.ends_with('\r') {
                    current.pop();
                }
                rows.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    if current.ends_with('\r') {
        current.pop();
    }
    if !current.is_empty() {
        rows.push(current);
    }
    rows
}

fn is_header(row: &str) -> bool {
    row.trim() == HEADER
}

/// Decodes a whole file: skips the header and blank rows, drops malformed rows.
pub fn decode_file(text: &str) -> Decoded {
    let mut decoded = Decoded::default();
    for (i, row) in split_records(text).iter().enumerate() {
        if row.is_empty() || (i == 0 && is_header(row)) {
            continue;
        }
        match decode(row) {
            Ok(record) => decoded.records.push(record),
            Err(_) => decoded.malformed += 1,
        }
    }
    decoded
}

/// Encodes a full file: header plus one newline-terminated row per record.
pub fn encode_file(records: &[Record]) -> String {
    let mut out = header_line();
    for record in records {
        out.push_str(&encode(record));
        out.push('\n');
    }
    out
}

/// The header row with its terminating newline, as written to a fresh file.
pub fn header_line() -> String {
    format!("{HEADER}\n")
}
