//! The parameter tuple a share link carries.

use std::ops::RangeInclusive;

use crate::{decode_secret, normalize_secret};

pub const DEFAULT_PERIOD: u64 = 30;
pub const DEFAULT_DIGITS: u32 = 6;
pub const DEFAULT_LABEL: &str = "TOTP";

pub const RECOMMENDED_PERIODS: RangeInclusive<u64> = 10..=120;
pub const RECOMMENDED_DIGITS: RangeInclusive<u32> = 4..=10;

/// Truncation leaves a 31-bit value, so no code has more digits than this
pub const MAX_DIGITS: u32 = 10;

/// Secret, label, issuer, period and digits of a single TOTP configuration.
///
/// An empty `secret` means "absent". Empty `label`/`issuer` are stored as
/// `None` so that `Some("")` never has to be told apart from a missing value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TotpParameters {
    pub secret: String,
    pub label: Option<String>,
    pub issuer: Option<String>,
    pub period: u64,
    pub digits: u32,
}

impl Default for TotpParameters {
    fn default() -> Self {
        Self {
            secret: String::new(),
            label: None,
            issuer: None,
            period: DEFAULT_PERIOD,
            digits: DEFAULT_DIGITS,
        }
    }
}

impl TotpParameters {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            ..Self::default()
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = non_empty(label.into());
        self
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = non_empty(issuer.into());
        self
    }

    pub fn with_period(mut self, period: u64) -> Self {
        self.period = period;
        self
    }

    pub fn with_digits(mut self, digits: u32) -> Self {
        self.digits = digits;
        self
    }

    /// A tuple is valid iff its secret, with whitespace stripped, decodes as
    /// Base32, the period can drive a countdown and `digits` is in
    /// `1..=MAX_DIGITS`.
    pub fn is_valid(&self) -> bool {
        self.period > 0
            && (1..=MAX_DIGITS).contains(&self.digits)
            && decode_secret(&self.secret).is_ok()
    }

    /// The secret in the form authenticator apps expect
    pub fn normalized_secret(&self) -> String {
        normalize_secret(&self.secret)
    }

    /// Label used when one is required, falling back to `"TOTP"`
    pub fn label_or_default(&self) -> &str {
        self.label
            .as_deref()
            .filter(|l| !l.is_empty())
            .unwrap_or(DEFAULT_LABEL)
    }

    /// `period`, unless it is the default and can be left out of a URL
    pub fn explicit_period(&self) -> Option<u64> {
        Some(self.period).filter(|p| *p != 0 && *p != DEFAULT_PERIOD)
    }

    /// `digits`, unless it is the default and can be left out of a URL
    pub fn explicit_digits(&self) -> Option<u32> {
        Some(self.digits).filter(|d| *d != 0 && *d != DEFAULT_DIGITS)
    }

    pub fn within_recommended_ranges(&self) -> bool {
        RECOMMENDED_PERIODS.contains(&self.period) && RECOMMENDED_DIGITS.contains(&self.digits)
    }
}

/// A partial tuple recovered from shared content (an embedded otpauth URI or
/// a bare `secret=` token).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SharedParameters {
    pub secret: String,
    pub label: Option<String>,
    pub issuer: Option<String>,
    pub period: Option<u64>,
    pub digits: Option<u32>,
}

impl SharedParameters {
    /// Fills in whatever `base` is missing: the secret when empty,
    /// label/issuer when absent, period/digits when still at their defaults.
    pub fn merge_into(self, base: TotpParameters) -> TotpParameters {
        TotpParameters {
            secret: if base.secret.is_empty() {
                self.secret
            } else {
                base.secret
            },
            label: base.label.or(self.label),
            issuer: base.issuer.or(self.issuer),
            period: match self.period {
                Some(period) if base.period == DEFAULT_PERIOD => period,
                _ => base.period,
            },
            digits: match self.digits {
                Some(digits) if base.digits == DEFAULT_DIGITS => digits,
                _ => base.digits,
            },
        }
    }
}

/// Reads a positive whole number the way a browser's `Number()` would,
/// so `"60"`, `" 60 "` and `"60.0"` all count. Anything else is `None`.
fn parse_positive(value: &str) -> Option<f64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 1.0 && v.fract() == 0.0)
}

pub fn parse_period(value: &str) -> Option<u64> {
    parse_positive(value)
        .filter(|v| *v <= u64::MAX as f64)
        .map(|v| v as u64)
}

/// Like [`parse_period`], but anything above [`MAX_DIGITS`] is `None` too
pub fn parse_digits(value: &str) -> Option<u32> {
    parse_positive(value)
        .filter(|v| *v <= f64::from(MAX_DIGITS))
        .map(|v| v as u32)
}

/// `None` for an empty string
pub fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[test]
    fn defaults() {
        let params = TotpParameters::default();

        assert_eq!("", params.secret);
        assert_eq!(30, params.period);
        assert_eq!(6, params.digits);
        assert_eq!("TOTP", params.label_or_default());
        assert!(!params.is_valid());
    }

    #[test]
    fn empty_label_and_issuer_are_absent() {
        let params = TotpParameters::new("JBSWY3DPEHPK3PXP")
            .with_label("")
            .with_issuer("");

        assert_eq!(None, params.label);
        assert_eq!(None, params.issuer);
    }

    #[rstest]
    #[case("JBSWY3DPEHPK3PXP", true)]
    #[case("JBSW Y3DP EHPK 3PXP", true)]
    #[case("", false)]
    #[case("hello world!", false)]
    fn validity_follows_secret(#[case] secret: &str, #[case] expected: bool) {
        assert_eq!(expected, TotpParameters::new(secret).is_valid());
    }

    #[test]
    fn zero_period_is_invalid() {
        assert!(!TotpParameters::new("JBSWY3DPEHPK3PXP")
            .with_period(0)
            .is_valid());
    }

    #[rstest]
    #[case("60", Some(60))]
    #[case(" 45 ", Some(45))]
    #[case("60.0", Some(60))]
    #[case("abc", None)]
    #[case("", None)]
    #[case("0", None)]
    #[case("-30", None)]
    #[case("1.5", None)]
    #[case("inf", None)]
    fn parse_period_test(#[case] input: &str, #[case] expected: Option<u64>) {
        assert_eq!(expected, parse_period(input));
    }

    #[rstest]
    #[case("8", Some(8))]
    #[case("10", Some(10))]
    #[case("10.0", Some(10))]
    #[case("11", None)]
    #[case("65536", None)]
    #[case("4294967295", None)]
    #[case("1e300", None)]
    #[case("0", None)]
    fn parse_digits_test(#[case] input: &str, #[case] expected: Option<u32>) {
        assert_eq!(expected, parse_digits(input));
    }

    #[rstest]
    #[case(0, false)]
    #[case(1, true)]
    #[case(10, true)]
    #[case(11, false)]
    #[case(u32::MAX, false)]
    fn validity_bounds_digits(#[case] digits: u32, #[case] expected: bool) {
        let params = TotpParameters::new("JBSWY3DPEHPK3PXP").with_digits(digits);

        assert_eq!(expected, params.is_valid());
    }

    #[test]
    fn huge_period_is_still_valid() {
        assert!(TotpParameters::new("JBSWY3DPEHPK3PXP")
            .with_period(u64::MAX)
            .is_valid());
    }

    #[test]
    fn explicit_values_skip_defaults() {
        let params = TotpParameters::new("JBSWY3DPEHPK3PXP");
        assert_eq!(None, params.explicit_period());
        assert_eq!(None, params.explicit_digits());

        let params = params.with_period(60).with_digits(8);
        assert_eq!(Some(60), params.explicit_period());
        assert_eq!(Some(8), params.explicit_digits());
    }

    #[test]
    fn merge_fills_only_missing_fields() {
        let base = TotpParameters::default().with_label("Mine").with_digits(8);
        let shared = SharedParameters {
            secret: "JBSWY3DPEHPK3PXP".into(),
            label: Some("Theirs".into()),
            issuer: Some("Acme".into()),
            period: Some(60),
            digits: Some(7),
        };

        let merged = shared.merge_into(base);

        assert_eq!("JBSWY3DPEHPK3PXP", merged.secret);
        assert_eq!(Some("Mine".to_string()), merged.label);
        assert_eq!(Some("Acme".to_string()), merged.issuer);
        assert_eq!(60, merged.period);
        assert_eq!(8, merged.digits);
    }

    #[rstest]
    #[case(30, 6, true)]
    #[case(10, 4, true)]
    #[case(120, 10, true)]
    #[case(5, 6, false)]
    #[case(30, 12, false)]
    fn recommended_ranges(#[case] period: u64, #[case] digits: u32, #[case] expected: bool) {
        let params = TotpParameters::new("JBSWY3DPEHPK3PXP")
            .with_period(period)
            .with_digits(digits);

        assert_eq!(expected, params.within_recommended_ranges());
    }
}
