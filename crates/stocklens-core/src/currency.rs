//! Currency code normalization and symbol-suffix inference

use crate::symbol::Symbol;

/// Yahoo ticker suffix to quote currency fallback map.
const SUFFIX_CURRENCY: &[(&str, &str)] = &[
    ("HK", "HKD"),
    ("SS", "CNY"),
    ("SZ", "CNY"),
    ("SH", "CNY"),
    ("BJ", "CNY"),
    ("T", "JPY"),
    ("KS", "KRW"),
    ("KQ", "KRW"),
    ("TW", "TWD"),
    ("TWO", "TWD"),
    ("L", "GBP"),
    ("PA", "EUR"),
    ("AS", "EUR"),
    ("BR", "EUR"),
    ("MI", "EUR"),
    ("DE", "EUR"),
    ("MC", "EUR"),
    ("HE", "EUR"),
    ("CO", "DKK"),
    ("ST", "SEK"),
    ("OL", "NOK"),
    ("SW", "CHF"),
    ("AX", "AUD"),
    ("TO", "CAD"),
    ("V", "CAD"),
    ("SI", "SGD"),
    ("NS", "INR"),
    ("BO", "INR"),
    ("BK", "THB"),
    ("JK", "IDR"),
    ("KL", "MYR"),
    ("VN", "VND"),
    ("SA", "BRL"),
    ("MX", "MXN"),
    ("JO", "ZAR"),
    ("TA", "ILS"),
    ("ME", "RUB"),
    ("BA", "ARS"),
];

/// Normalize a raw currency token to a three-letter uppercase code.
pub fn normalize_code(raw: &str) -> Option<String> {
    let code: String = raw
        .trim()
        .chars()
        .filter(char::is_ascii_alphabetic)
        .map(|c| c.to_ascii_uppercase())
        .collect();
    if code.len() == 3 { Some(code) } else { None }
}

/// Infer the quote currency from the symbol's exchange suffix.
///
/// Unsuffixed tickers default to USD. A single-letter suffix on an
/// alphabetic base is treated as a US share class (e.g. `BF.B`).
pub fn infer_from_symbol(symbol: &Symbol) -> Option<String> {
    match symbol.suffix() {
        None => Some("USD".to_string()),
        Some(suffix) => {
            if let Some((_, code)) = SUFFIX_CURRENCY.iter().find(|(s, _)| *s == suffix) {
                return Some((*code).to_string());
            }
            let base = symbol.as_str().rsplit_once('.').map(|(b, _)| b).unwrap_or_default();
            if suffix.len() == 1 && base.chars().all(|c| c.is_ascii_uppercase()) {
                return Some("USD".to_string());
            }
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_code() {
        assert_eq!(normalize_code(" usd "), Some("USD".to_string()));
        assert_eq!(normalize_code("HK$"), None);
        assert_eq!(normalize_code(""), None);
    }

    #[test]
    fn test_infer_from_suffix() {
        let hk = Symbol::parse("0700.HK").unwrap();
        assert_eq!(infer_from_symbol(&hk), Some("HKD".to_string()));

        let plain = Symbol::parse("NVDA").unwrap();
        assert_eq!(infer_from_symbol(&plain), Some("USD".to_string()));

        // US class shares keep USD
        let class_share = Symbol::parse("BF.B").unwrap();
        assert_eq!(infer_from_symbol(&class_share), Some("USD".to_string()));
    }

    #[test]
    fn test_unknown_suffix_is_missing() {
        let odd = Symbol::parse("ABC.ZZ").unwrap();
        assert_eq!(infer_from_symbol(&odd), None);
    }
}
