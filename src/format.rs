/// Significant digits kept for coordinates relative to the viewport size.
const COORDINATE_DIGITS: i32 = 4;
const MAX_FRACTION_DIGITS: i32 = 8;
const FLOAT_VALUE_DIGITS: usize = 6;

/// Formats path coordinates with a precision derived from the viewport size,
/// so a 24×24 icon gets three fractional digits and a 2400×2400 one none.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinateFormat {
    fraction_digits: usize,
}

impl CoordinateFormat {
    pub fn for_viewport(size: f64) -> Self {
        if !size.is_finite() || size <= 0.0 {
            return Self::with_fraction_digits(3);
        }
        let exponent = size.log10().floor() as i32;
        let digits = (COORDINATE_DIGITS - exponent).clamp(0, MAX_FRACTION_DIGITS);
        Self::with_fraction_digits(digits as usize)
    }

    pub fn with_fraction_digits(fraction_digits: usize) -> Self {
        Self { fraction_digits }
    }

    pub fn fraction_digits(&self) -> usize {
        self.fraction_digits
    }

    pub fn format(&self, value: f64) -> String {
        format_decimal(value, self.fraction_digits)
    }
}

/// Formats an attribute value such as an alpha or a dimension, dropping
/// trailing zeros (`24.0` → `24`, `0.50` → `0.5`).
pub fn format_float_value(value: f64) -> String {
    format_decimal(value, FLOAT_VALUE_DIGITS)
}

fn format_decimal(value: f64, digits: usize) -> String {
    let mut text = format!("{value:.digits$}");
    if text.contains('.') {
        let trimmed = text.trim_end_matches('0').trim_end_matches('.').len();
        text.truncate(trimmed);
    }
    if text == "-0" {
        text = "0".to_string();
    }
    text
}

/// Parses a number that may carry a `px` suffix.
pub fn parse_length(value: &str) -> Option<f64> {
    let value = value.trim();
    let value = value.strip_suffix("px").unwrap_or(value).trim_end();
    value.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parses an opacity given as a fraction or a percentage.
pub fn parse_opacity(value: &str) -> Option<f64> {
    let value = value.trim();
    match value.strip_suffix('%') {
        Some(percent) => percent.trim().parse::<f64>().ok().map(|v| v / 100.0),
        None => value.parse::<f64>().ok(),
    }
    .filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precision_follows_viewport_size() {
        assert_eq!(CoordinateFormat::for_viewport(24.0).fraction_digits(), 3);
        assert_eq!(CoordinateFormat::for_viewport(512.0).fraction_digits(), 2);
        assert_eq!(CoordinateFormat::for_viewport(1.0).fraction_digits(), 4);
        assert_eq!(CoordinateFormat::for_viewport(0.0).fraction_digits(), 3);
    }

    #[test]
    fn trims_trailing_zeros_and_negative_zero() {
        let format = CoordinateFormat::with_fraction_digits(3);
        assert_eq!(format.format(12.0), "12");
        assert_eq!(format.format(1.25), "1.25");
        assert_eq!(format.format(0.33333), "0.333");
        assert_eq!(format.format(-0.0001), "0");
        assert_eq!(format_float_value(24.0), "24");
        assert_eq!(format_float_value(0.5), "0.5");
    }

    #[test]
    fn parses_lengths_and_opacities() {
        assert_eq!(parse_length("2px"), Some(2.0));
        assert_eq!(parse_length(" 1.5 "), Some(1.5));
        assert_eq!(parse_length("abc"), None);
        assert_eq!(parse_opacity("50%"), Some(0.5));
        assert_eq!(parse_opacity("0.25"), Some(0.25));
    }
}
