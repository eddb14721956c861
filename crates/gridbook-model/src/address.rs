use serde::{Deserialize, Serialize};

/// 0-indexed cell coordinate. This is the "host" coordinate of a formula:
/// the cell the formula lives in, used to resolve shared-formula relative
/// offsets at decode time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellCoord {
    pub row: u32,
    pub col: u32,
}

impl CellCoord {
    #[must_use]
    pub fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }
}

/// Convert a column label (`A`, `Z`, `AA`, ...) to a 0-indexed column.
///
/// Returns `None` for empty input or non-alphabetic characters. Case is
/// ignored. Labels beyond the `u32` range return `None`.
#[must_use]
pub fn column_label_to_index(label: &str) -> Option<u32> {
    if label.is_empty() {
        return None;
    }
    let mut col: u64 = 0;
    for b in label.bytes() {
        if !b.is_ascii_alphabetic() {
            return None;
        }
        let digit = u64::from(b.to_ascii_uppercase() - b'A') + 1;
        col = col * 26 + digit;
        if col > u64::from(u32::MAX) {
            return None;
        }
    }
    Some((col - 1) as u32)
}

/// Convert a 0-indexed column to its label (`0 -> "A"`, `26 -> "AA"`).
#[must_use]
pub fn column_index_to_label(col: u32) -> String {
    let mut out = Vec::new();
    let mut n = u64::from(col) + 1;
    while n > 0 {
        let rem = ((n - 1) % 26) as u8;
        out.push(b'A' + rem);
        n = (n - 1) / 26;
    }
    out.reverse();
    // Only ASCII uppercase letters are pushed above.
    String::from_utf8(out).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn column_labels_round_trip() {
        for col in [0, 1, 25, 26, 27, 51, 52, 255, 701, 702, 16_383] {
            let label = column_index_to_label(col);
            assert_eq!(column_label_to_index(&label), Some(col), "label {label}");
        }
    }

    #[test]
    fn column_label_well_known_values() {
        assert_eq!(column_label_to_index("A"), Some(0));
        assert_eq!(column_label_to_index("z"), Some(25));
        assert_eq!(column_label_to_index("AA"), Some(26));
        assert_eq!(column_label_to_index("IV"), Some(255));
        assert_eq!(column_label_to_index(""), None);
        assert_eq!(column_label_to_index("A1"), None);
    }
}
