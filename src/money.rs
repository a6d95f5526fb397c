//! Peso formatting for prices shown to customers and typed by operators.
//!
//! Argentine convention: `.` groups thousands and `,` separates decimals.

/// Formats a whole-peso amount, e.g. `1234567` as `$1.234.567`.
pub fn format_price(amount: i64) -> String {
    let sign = if amount < 0 { "-" } else { "" };
    format!("{sign}${}", group_thousands(amount.unsigned_abs()))
}

/// Formats a possibly fractional amount; cents are only shown when non-zero.
pub fn format_decimal(value: f64) -> String {
    let cents = (value.abs() * 100.0).round() as u64;
    let sign = if value < 0.0 && cents > 0 { "-" } else { "" };
    let (whole, frac) = (cents / 100, cents % 100);
    if frac == 0 {
        format!("{sign}${}", group_thousands(whole))
    } else {
        format!("{sign}${},{frac:02}", group_thousands(whole))
    }
}

/// Parses raw or already formatted input (`"$ 1.234,50"`, `"1500"`, `"12.5"`).
pub fn to_number(input: &str) -> Option<f64> {
    let cleaned: String = input
        .chars()
        .filter(|c| !matches!(c, '$' | ' ' | '\u{a0}'))
        .collect();
    let (negative, body) = match cleaned.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, cleaned.as_str()),
    };
    if body.is_empty() {
        return None;
    }

    let (int_part, frac_part) = match body.rsplit_once(',') {
        Some((int_part, frac_part)) => (strip_grouping(int_part)?, frac_part),
        None => split_without_comma(body)?,
    };

    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }
    if !int_part.chars().all(|c| c.is_ascii_digit())
        || !frac_part.chars().all(|c| c.is_ascii_digit())
    {
        return None;
    }

    let int_part = if int_part.is_empty() { "0" } else { int_part.as_str() };
    let literal = if frac_part.is_empty() {
        int_part.to_string()
    } else {
        format!("{int_part}.{frac_part}")
    };
    let value: f64 = literal.parse().ok()?;
    Some(if negative { -value } else { value })
}

/// Normalizes a typed price back into display form.
///
/// Input that does not parse is returned trimmed and otherwise untouched.
pub fn reformat(input: &str) -> String {
    match to_number(input) {
        Some(value) if value.fract() == 0.0 => format_price(value as i64),
        Some(value) => format_decimal(value),
        None => input.trim().to_string(),
    }
}

fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push('.');
        }
        out.push(ch);
    }
    out
}

/// Removes `.` thousands separators, rejecting malformed groups.
fn strip_grouping(int_part: &str) -> Option<String> {
    if !int_part.contains('.') {
        return Some(int_part.to_string());
    }
    let mut groups = int_part.split('.');
    let first = groups.next()?;
    if first.is_empty() || first.len() > 3 {
        return None;
    }
    let mut out = first.to_string();
    for group in groups {
        if group.len() != 3 {
            return None;
        }
        out.push_str(group);
    }
    Some(out)
}

fn split_without_comma(body: &str) -> Option<(String, &str)> {
    match body.matches('.').count() {
        0 => Some((body.to_string(), "")),
        1 => {
            let (int_part, tail) = body.split_once('.')?;
            if tail.len() == 3 && !int_part.is_empty() {
                // "1.500" is fifteen hundred, not one and a half
                Some((format!("{int_part}{tail}"), ""))
            } else {
                Some((int_part.to_string(), tail))
            }
        }
        _ => Some((strip_grouping(body)?, "")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_with_thousands_separator() {
        assert_eq!(format_price(0), "$0");
        assert_eq!(format_price(999), "$999");
        assert_eq!(format_price(1000), "$1.000");
        assert_eq!(format_price(1_234_567), "$1.234.567");
        assert_eq!(format_price(-1500), "-$1.500");
    }

    #[test]
    fn formats_decimals_only_when_fractional() {
        assert_eq!(format_decimal(1234.5), "$1.234,50");
        assert_eq!(format_decimal(1234.0), "$1.234");
        assert_eq!(format_decimal(0.05), "$0,05");
        assert_eq!(format_decimal(-10.25), "-$10,25");
    }

    #[test]
    fn parses_whole_numbers_back() {
        for x in [0_i64, 7, 999, 1000, 25_500, 1_234_567, -42_000] {
            assert_eq!(to_number(&format_price(x)), Some(x as f64), "value {x}");
        }
    }

    #[test]
    fn parses_locale_separators() {
        assert_eq!(to_number("$ 1.234,50"), Some(1234.5));
        assert_eq!(to_number("1.500"), Some(1500.0));
        assert_eq!(to_number("12.5"), Some(12.5));
        assert_eq!(to_number("1234,75"), Some(1234.75));
        assert_eq!(to_number("\u{a0}$2.000.000"), Some(2_000_000.0));
        assert_eq!(to_number(",5"), Some(0.5));
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(to_number(""), None);
        assert_eq!(to_number("$"), None);
        assert_eq!(to_number("abc"), None);
        assert_eq!(to_number("1.23.4"), None);
        assert_eq!(to_number("12,3,4"), None);
    }

    #[test]
    fn reformat_is_stable_on_formatted_input() {
        for x in [0_i64, 15, 2500, 1_000_000] {
            let formatted = format_price(x);
            assert_eq!(reformat(&formatted), formatted);
        }
        assert_eq!(reformat("2500"), "$2.500");
        assert_eq!(reformat("1234,5"), "$1.234,50");
        assert_eq!(reformat("  consultar "), "consultar");
    }
}
