// Numeric conversions shared by the evaluator and the builtins.

const TWO_32: f64 = 4_294_967_296.0;

/// String to number conversion with script semantics; `NaN` when the text is not numeric.
pub fn parse_number(text: &str) -> f64 {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    let (sign, unsigned) = match trimmed.strip_prefix('-') {
        Some(rest) => (-1.0, rest),
        None => (1.0, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    if unsigned == "Infinity" {
        return sign * f64::INFINITY;
    }
    if let Some(hex) = trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
        return u64::from_str_radix(hex, 16).map(|n| n as f64).unwrap_or(f64::NAN);
    }
    // Rust accepts spellings like "inf" and "nan" that scripts must reject.
    if unsigned.starts_with(['+', '-']) || !unsigned.chars().all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-')) {
        return f64::NAN;
    }
    unsigned.parse::<f64>().map(|n| sign * n).unwrap_or(f64::NAN)
}

/// `parseInt`: longest valid prefix in `radix` (2..=36, 0 means auto-detect).
pub fn parse_int(text: &str, radix: u32) -> f64 {
    let mut s = text.trim_start();
    let mut sign = 1.0;
    if let Some(rest) = s.strip_prefix('-') {
        sign = -1.0;
        s = rest;
    } else if let Some(rest) = s.strip_prefix('+') {
        s = rest;
    }
    let mut radix = radix;
    if (radix == 0 || radix == 16)
        && let Some(rest) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X"))
    {
        s = rest;
        radix = 16;
    }
    if radix == 0 {
        radix = 10;
    }
    if !(2..=36).contains(&radix) {
        return f64::NAN;
    }
    let digits: Vec<u32> = s.chars().map_while(|c| c.to_digit(radix)).collect();
    if digits.is_empty() {
        return f64::NAN;
    }
    let value = digits.iter().fold(0.0, |acc, &d| acc * f64::from(radix) + f64::from(d));
    sign * value
}

/// `parseFloat`: longest decimal prefix.
pub fn parse_float(text: &str) -> f64 {
    let s = text.trim_start();
    let unsigned = s.strip_prefix(['-', '+']).unwrap_or(s);
    if unsigned.starts_with("Infinity") {
        return if s.starts_with('-') { f64::NEG_INFINITY } else { f64::INFINITY };
    }
    let mut end = 0;
    let mut seen_dot = false;
    let mut seen_exp = false;
    let bytes = s.as_bytes();
    while end < bytes.len() {
        let c = bytes[end];
        let accepted = match c {
            b'0'..=b'9' => true,
            b'+' | b'-' => end == 0 || matches!(bytes[end - 1], b'e' | b'E'),
            b'.' if !seen_dot && !seen_exp => {
                seen_dot = true;
                true
            }
            b'e' | b'E' if !seen_exp && end > 0 => {
                seen_exp = true;
                true
            }
            _ => false,
        };
        if !accepted {
            break;
        }
        end += 1;
    }
    // Back off a dangling exponent or sign.
    let mut candidate = &s[..end];
    while !candidate.is_empty() {
        if let Ok(n) = candidate.parse::<f64>() {
            return n;
        }
        candidate = &candidate[..candidate.len() - 1];
    }
    f64::NAN
}

/// ToInt32 semantics.
pub fn to_int32(n: f64) -> i32 {
    if !n.is_finite() || n == 0.0 {
        return 0;
    }
    let int = n.trunc();
    let int32bit = ((int % TWO_32) + TWO_32) % TWO_32;
    if int32bit >= TWO_32 / 2.0 {
        (int32bit - TWO_32) as i32
    } else {
        int32bit as i32
    }
}

/// Canonical array index for a property key, if it is one.
pub fn array_index(key: &str) -> Option<usize> {
    if key.is_empty() || (key.len() > 1 && key.starts_with('0')) || !key.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    key.parse::<u32>().ok().filter(|&i| i != u32::MAX).map(|i| i as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_numeric_strings() {
        assert_eq!(parse_number(" 42 "), 42.0);
        assert_eq!(parse_number(""), 0.0);
        assert_eq!(parse_number("0x10"), 16.0);
        assert_eq!(parse_number("-Infinity"), f64::NEG_INFINITY);
        assert!(parse_number("inf").is_nan());
        assert!(parse_number("12px").is_nan());
    }

    #[test]
    fn parse_int_and_float_take_prefixes() {
        assert_eq!(parse_int("12px", 0), 12.0);
        assert_eq!(parse_int("-ff", 16), -255.0);
        assert_eq!(parse_int("0x1A", 0), 26.0);
        assert!(parse_int("px", 10).is_nan());
        assert_eq!(parse_float("3.25em"), 3.25);
        assert_eq!(parse_float("1e3x"), 1000.0);
        assert_eq!(parse_float("2e"), 2.0);
        assert!(parse_float(".").is_nan());
    }

    #[test]
    fn int32_wraps() {
        assert_eq!(to_int32(4_294_967_297.0), 1);
        assert_eq!(to_int32(2_147_483_648.0), -2_147_483_648);
        assert_eq!(to_int32(f64::NAN), 0);
    }

    #[test]
    fn array_index_is_canonical() {
        assert_eq!(array_index("0"), Some(0));
        assert_eq!(array_index("17"), Some(17));
        assert_eq!(array_index("01"), None);
        assert_eq!(array_index("-1"), None);
        assert_eq!(array_index("length"), None);
    }
}
