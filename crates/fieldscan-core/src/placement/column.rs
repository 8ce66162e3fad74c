use crate::error::FieldscanError;
use crate::sheet::SheetState;

/// Last column of an xlsx sheet (`XFD`).
pub const MAX_COLUMN: u32 = 16_384;

/// Convert column letters (`A`, `z`, `AA`) to a 1-based index.
///
/// Trailing row digits are ignored, so `A81` resolves like `A`. Returns `None`
/// when there are no leading letters, when letters are followed by anything
/// other than digits, or when the index exceeds `MAX_COLUMN`.
pub fn letters_to_column(target: &str) -> Option<u32> {
    let target = target.trim();
    let letters_end = target
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(target.len());
    let (letters, rest) = target.split_at(letters_end);
    if letters.is_empty() || !rest.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let mut index: u32 = 0;
    for c in letters.chars() {
        let digit = u32::from(c.to_ascii_uppercase() as u8 - b'A' + 1);
        index = index.checked_mul(26)?.checked_add(digit)?;
        if index > MAX_COLUMN {
            return None;
        }
    }
    Some(index)
}

/// Convert a 1-based column index to letters. Index 0 yields an empty string.
pub fn column_to_letters(mut column: u32) -> String {
    let mut letters = Vec::new();
    while column > 0 {
        let rem = (column - 1) % 26;
        letters.push(b'A' + rem as u8);
        column = (column - 1) / 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

/// Find the column whose cell in `header_row` equals `header` (trimmed).
pub fn find_header<S: SheetState + ?Sized>(sheet: &S, header_row: u32, header: &str) -> Option<u32> {
    let wanted = header.trim();
    (1..=sheet.max_column()).find(|&col| {
        sheet
            .read_cell(header_row, col)
            .map(|v| v.trim() == wanted)
            .unwrap_or(false)
    })
}

/// Resolve a mapping target to a column index.
///
/// A target matching a header in `header_row` wins; otherwise it is read as
/// column letters. Anything else is a configuration error.
pub fn resolve_target<S: SheetState + ?Sized>(
    region: &str,
    target: &str,
    sheet: &S,
    header_row: u32,
) -> Result<u32, FieldscanError> {
    let trimmed = target.trim();
    if trimmed.is_empty() {
        return Err(FieldscanError::InvalidColumn {
            region: region.to_string(),
            target: target.to_string(),
        });
    }

    if let Some(col) = find_header(sheet, header_row, trimmed) {
        return Ok(col);
    }

    if let Some(col) = letters_to_column(trimmed) {
        return Ok(col);
    }

    // Cell-address shaped targets (`0`, `ZZZZ`, `1A`) are bad columns, not headers.
    if trimmed.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(FieldscanError::InvalidColumn {
            region: region.to_string(),
            target: target.to_string(),
        });
    }

    Err(FieldscanError::UnresolvedHeader {
        region: region.to_string(),
        header: trimmed.to_string(),
        header_row,
    })
}
