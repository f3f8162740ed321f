//! Numeric helpers shared by source parsing and derived metrics

/// True for a finite, usable number.
pub fn is_usable(value: f64) -> bool {
    value.is_finite()
}

/// Round to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Round an optional value to two decimal places.
pub fn round2_opt(value: Option<f64>) -> Option<f64> {
    value.filter(|v| is_usable(*v)).map(round2)
}

/// Percentage change from `old` to `new`, rounded to two decimals.
///
/// Returns `None` when either side is unusable or `old` is zero - callers
/// must render the field as missing rather than defaulting it.
pub fn pct_change(new: f64, old: f64) -> Option<f64> {
    if !is_usable(new) || !is_usable(old) || old == 0.0 {
        return None;
    }
    Some(round2((new / old - 1.0) * 100.0))
}

/// Value scaled to billions, rounded to two decimals.
pub fn to_billions(value: f64) -> Option<f64> {
    if !is_usable(value) {
        return None;
    }
    Some(round2(value / 1_000_000_000.0))
}

/// First usable number from a candidate list, in priority order.
pub fn first_usable(candidates: impl IntoIterator<Item = Option<f64>>) -> Option<f64> {
    candidates.into_iter().flatten().find(|v| is_usable(*v))
}

/// Parse a display-formatted number like `1.23T`, `45.6B`, `789M`, `12K`,
/// `3.5%` or `1,234.5`. `N/A` and `--` parse to `None`.
///
/// Percent values are returned as the percentage number itself (no scaling);
/// magnitude suffixes multiply.
pub fn parse_display_number(text: &str) -> Option<f64> {
    let mut v = text.trim().replace(',', "");
    if v.is_empty() || v == "N/A" || v == "--" {
        return None;
    }

    let is_pct = v.ends_with('%');
    if is_pct {
        v.pop();
    }

    let multiplier = match v.chars().last()? {
        'T' => 1_000_000_000_000.0,
        'B' => 1_000_000_000.0,
        'M' => 1_000_000.0,
        'K' => 1_000.0,
        _ => 1.0,
    };
    if multiplier != 1.0 {
        v.pop();
    }

    let num: f64 = v.trim().parse().ok()?;
    if !is_usable(num) {
        return None;
    }
    Some(if is_pct { num } else { num * multiplier })
}

/// Interpret a ratio that sources report either as a fraction (`0.42`) or a
/// percentage (`42.0`), normalizing to percent.
pub fn to_pct(value: f64) -> Option<f64> {
    if !is_usable(value) {
        return None;
    }
    let scaled = if value.abs() <= 1.5 { value * 100.0 } else { value };
    Some(round2(scaled))
}

/// `numerator / denominator` expressed as a percentage.
pub fn ratio_pct(numerator: f64, denominator: f64) -> Option<f64> {
    if !is_usable(numerator) || !is_usable(denominator) || denominator == 0.0 {
        return None;
    }
    Some(round2(numerator / denominator * 100.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pct_change() {
        assert_eq!(pct_change(110.0, 100.0), Some(10.0));
        assert_eq!(pct_change(95.0, 100.0), Some(-5.0));
        assert_eq!(pct_change(1.0, 0.0), None);
        assert_eq!(pct_change(f64::NAN, 100.0), None);
    }

    #[test]
    fn test_to_billions() {
        assert_eq!(to_billions(3_456_000_000.0), Some(3.46));
        assert_eq!(to_billions(f64::INFINITY), None);
    }

    #[test]
    fn test_parse_display_number_suffixes() {
        assert_eq!(parse_display_number("1.5T"), Some(1_500_000_000_000.0));
        assert_eq!(parse_display_number("45.6B"), Some(45_600_000_000.0));
        assert_eq!(parse_display_number("789M"), Some(789_000_000.0));
        assert_eq!(parse_display_number("12K"), Some(12_000.0));
        assert_eq!(parse_display_number("1,234.5"), Some(1234.5));
    }

    #[test]
    fn test_parse_display_number_percent_and_missing() {
        assert_eq!(parse_display_number("3.5%"), Some(3.5));
        assert_eq!(parse_display_number("N/A"), None);
        assert_eq!(parse_display_number("--"), None);
        assert_eq!(parse_display_number(""), None);
        assert_eq!(parse_display_number("garbage"), None);
    }

    #[test]
    fn test_to_pct_scales_fractions() {
        assert_eq!(to_pct(0.42), Some(42.0));
        assert_eq!(to_pct(42.0), Some(42.0));
        assert_eq!(to_pct(-0.05), Some(-5.0));
    }

    #[test]
    fn test_first_usable() {
        assert_eq!(first_usable([None, Some(f64::NAN), Some(3.0)]), Some(3.0));
        assert_eq!(first_usable([None, None]), None);
    }
}
