//! Phone number normalization
//!
//! Callers are keyed by their normalized number. Everything but digits is
//! stripped; a `+` survives only when it precedes the first digit, and then
//! only once.

/// Normalize a phone number for lookup
///
/// Idempotent: `normalize_phone(&normalize_phone(x)) == normalize_phone(x)`.
pub fn normalize_phone(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut seen_digit = false;
    let mut plus = false;

    for c in raw.chars() {
        if c.is_ascii_digit() {
            seen_digit = true;
            out.push(c);
        } else if c == '+' && !seen_digit {
            plus = true;
        }
    }

    if plus {
        out.insert(0, '+');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_formatting() {
        assert_eq!(normalize_phone("+91 98765-43210"), "+919876543210");
        assert_eq!(normalize_phone("(022) 555 0100"), "0225550100");
        assert_eq!(normalize_phone("  +1 (415) 555-2671 "), "+14155552671");
    }

    #[test]
    fn test_single_leading_plus() {
        assert_eq!(normalize_phone("++91 1234"), "+911234");
        assert_eq!(normalize_phone("91+1234"), "911234");
        assert_eq!(normalize_phone("(+44) 20"), "+4420");
    }

    #[test]
    fn test_degenerate_input() {
        assert_eq!(normalize_phone(""), "");
        assert_eq!(normalize_phone("anonymous"), "");
        assert_eq!(normalize_phone("+"), "+");
    }

    #[test]
    fn test_idempotent() {
        let samples = [
            "+91 98765 43210",
            "tel:+1-800-FLOWERS",
            "++--++12",
            "0044 (0) 20 7946 0958",
            "+",
            "",
            "१२३+४",
            "1+2+3",
        ];
        for s in samples {
            let once = normalize_phone(s);
            assert_eq!(normalize_phone(&once), once, "sample {:?}", s);
            assert!(once.chars().skip(1).all(|c| c.is_ascii_digit()));
        }
    }
}
