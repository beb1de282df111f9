//! Field extraction from matched tool output.
//!
//! The toolkit's scripts report values as `<label><sep> <value>` lines, so
//! callers name the separator and the position of the field they want.

use crate::error::Error;

/// Extract the trimmed field at `index` from the first line of `text`,
/// splitting on `separator`.
///
/// Fails when the separator never occurs on that line or the index is out
/// of range; callers decide whether that aborts their stage or merely
/// downgrades it to a manual-recovery hint.
pub fn field(text: &str, separator: char, index: usize) -> Result<String, Error> {
    let line = text.lines().next().unwrap_or("");
    if !line.contains(separator) {
        return Err(Error::Parse("delimited field"));
    }
    let part = line
        .split(separator)
        .nth(index)
        .ok_or(Error::Parse("delimited field"))?;
    Ok(part.trim().to_string())
}
