//! Path segment encoding and entry addressing

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::error::{Error, Result};

/// Everything except RFC 3986 unreserved characters gets percent-encoded.
/// Unlike a plain path segment, `/` and `:` are encoded too: the result is
/// spliced between `/`-delimited operation words and must stay one token.
const OPAQUE_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Separator between table name and key in an entry address
pub const ENTRY_SEPARATOR: char = ':';

/// Percent-encode a string into a single opaque path segment.
pub fn encode(s: &str) -> String {
    utf8_percent_encode(s, OPAQUE_SEGMENT).to_string()
}

/// Reverse [`encode`].
pub fn decode(s: &str) -> Result<String> {
    percent_decode_str(s)
        .decode_utf8()
        .map(|c| c.into_owned())
        .map_err(|e| Error::InvalidEncoding(format!("{}: {}", s, e)))
}

/// Compose the `table:key` address of an entry.
pub fn entry_uri(table: &str, key: &str) -> String {
    let mut uri = String::with_capacity(table.len() + key.len() + 1);
    uri.push_str(table);
    uri.push(ENTRY_SEPARATOR);
    uri.push_str(key);
    uri
}

/// Encode the composed address as one token. Table and key are never
/// encoded separately.
pub fn encoded_entry(table: &str, key: &str) -> String {
    encode(&entry_uri(table, key))
}

/// Accept only non-empty table names made of RFC 3986 unreserved
/// characters.
///
/// Such a name can never contain the entry separator, and it encodes to
/// itself, so it reads the same whether it sits inside an entry address or
/// stands alone as the `/drop/<table>` and `/from/<table>` segments.
pub fn validate_table(table: &str) -> Result<()> {
    if table.is_empty() {
        return Err(Error::InvalidTable("table name is empty".to_string()));
    }
    if let Some(c) = table.chars().find(|c| !is_unreserved(*c)) {
        return Err(Error::InvalidTable(format!(
            "'{}' contains reserved character {:?}",
            table, c
        )));
    }
    Ok(())
}

fn is_unreserved(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~')
}
