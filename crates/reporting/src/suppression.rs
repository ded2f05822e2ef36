//! Small-number masking for aggregate affiliate reports. Cell counts below
//! the threshold could re-identify individual patients, so they render as a
//! literal `"<5"` instead of the number. A privacy requirement, not a
//! formatting nicety.

use std::fmt;

use serde::Serialize;

/// Counts strictly below this (and above zero) are masked.
pub const SMALL_CELL_THRESHOLD: u64 = 5;

/// A count that may be masked. Serializes as a bare number when exact and
/// as the string `"<5"` when masked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum MaskedCount {
    Exact(u64),
    Masked(&'static str),
}

impl MaskedCount {
    pub fn masked() -> Self {
        Self::Masked("<5")
    }

    pub fn is_masked(&self) -> bool {
        matches!(self, Self::Masked(_))
    }
}

impl fmt::Display for MaskedCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(n) => write!(f, "{n}"),
            Self::Masked(s) => write!(f, "{s}"),
        }
    }
}

/// Mask `count` when `0 < count < 5`; zero and anything at or above the
/// threshold pass through unchanged. Apply exactly once, at the final
/// output boundary — the masked form is a string and cannot be re-masked.
pub fn suppress_small_number(count: u64) -> MaskedCount {
    if count > 0 && count < SMALL_CELL_THRESHOLD {
        MaskedCount::masked()
    } else {
        MaskedCount::Exact(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masking_boundaries() {
        assert_eq!(suppress_small_number(0), MaskedCount::Exact(0));
        assert_eq!(suppress_small_number(1), MaskedCount::masked());
        assert_eq!(suppress_small_number(3), MaskedCount::masked());
        assert_eq!(suppress_small_number(4), MaskedCount::masked());
        assert_eq!(suppress_small_number(5), MaskedCount::Exact(5));
        assert_eq!(suppress_small_number(120), MaskedCount::Exact(120));
    }

    #[test]
    fn test_serialization() {
        assert_eq!(serde_json::to_string(&suppress_small_number(3)).unwrap(), "\"<5\"");
        assert_eq!(serde_json::to_string(&suppress_small_number(0)).unwrap(), "0");
        assert_eq!(serde_json::to_string(&suppress_small_number(7)).unwrap(), "7");
    }

    #[test]
    fn test_display() {
        assert_eq!(suppress_small_number(2).to_string(), "<5");
        assert_eq!(suppress_small_number(9).to_string(), "9");
    }
}
