//! Human-readable sizes for the command line: `4096`, `192k`, `1M`, `2g`.

/// Why a size string was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseSizeError {
    #[error("empty size")]
    Empty,
    #[error("{0}: invalid size")]
    NoDigits(String),
    #[error("{0}: invalid size suffix")]
    BadSuffix(String),
    #[error("{0}: size too large")]
    Overflow(String),
}

/// Parse a byte count with an optional binary `k`, `m` or `g` suffix.
pub fn parse_size(s: &str) -> Result<u64, ParseSizeError> {
    if s.is_empty() {
        return Err(ParseSizeError::Empty);
    }

    let digits_end = s
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map_or(s.len(), |(i, _)| i);
    let (digits, suffix) = s.split_at(digits_end);
    if digits.is_empty() {
        return Err(ParseSizeError::NoDigits(s.to_owned()));
    }

    let shift = match suffix {
        "" => 0,
        "k" | "K" => 10,
        "m" | "M" => 20,
        "g" | "G" => 30,
        _ => return Err(ParseSizeError::BadSuffix(s.to_owned())),
    };

    digits
        .parse::<u64>()
        .ok()
        .and_then(|v| v.checked_mul(1 << shift))
        .ok_or_else(|| ParseSizeError::Overflow(s.to_owned()))
}
