//! Kubernetes resource quantity parsing
//!
//! Limits arrive as quantity strings (`"100m"`, `"1.5"`, `"128Mi"`, `"1e3"`).
//! They are converted to plain floats: cores for CPU, bytes for memory.

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum QuantityError {
    #[error("empty quantity")]
    Empty,
    #[error("invalid quantity '{0}'")]
    Invalid(String),
}

const BINARY_SUFFIXES: &[(&str, f64)] = &[
    ("Ki", 1024.0),
    ("Mi", 1_048_576.0),
    ("Gi", 1_073_741_824.0),
    ("Ti", 1_099_511_627_776.0),
    ("Pi", 1_125_899_906_842_624.0),
    ("Ei", 1_152_921_504_606_846_976.0),
];

const DECIMAL_SUFFIXES: &[(&str, f64)] = &[
    ("n", 1e-9),
    ("u", 1e-6),
    ("m", 1e-3),
    ("k", 1e3),
    ("M", 1e6),
    ("G", 1e9),
    ("T", 1e12),
    ("P", 1e15),
    ("E", 1e18),
];

/// Parse a quantity string into its numeric value
pub fn parse_quantity(raw: &str) -> Result<f64, QuantityError> {
    let s = raw.trim();
    if s.is_empty() {
        return Err(QuantityError::Empty);
    }

    // A trailing digit means a plain or exponent-form number.
    if s.ends_with(|c: char| c.is_ascii_digit()) {
        return parse_number(s, raw);
    }

    for (suffix, multiplier) in BINARY_SUFFIXES.iter().chain(DECIMAL_SUFFIXES) {
        if let Some(number) = s.strip_suffix(suffix) {
            return Ok(parse_number(number, raw)? * multiplier);
        }
    }

    Err(QuantityError::Invalid(raw.to_string()))
}

fn parse_number(s: &str, raw: &str) -> Result<f64, QuantityError> {
    let value: f64 = s
        .parse()
        .map_err(|_| QuantityError::Invalid(raw.to_string()))?;
    if !value.is_finite() || value < 0.0 {
        return Err(QuantityError::Invalid(raw.to_string()));
    }
    Ok(value)
}
