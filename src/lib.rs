pub mod config;
pub mod countdown;
pub mod metadata;
pub mod otpauth;
pub mod params;
pub mod share;
pub mod share_target;
pub mod store;
pub mod ticker;
pub mod totp;

use std::{fmt::Display, str::FromStr};

use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::{Sha256, Sha512};

pub use countdown::{compute_derived, CodeEngine, Derived, EngineState};
pub use params::{SharedParameters, TotpParameters};
pub use share::{decode, decode_from_location, ShareCodec};
pub use share_target::decode_from_share_target;
pub use ticker::{LiveCountdown, Ticker};

#[derive(Debug, thiserror::Error)]
pub enum OtpError {
    #[error("Secret decode error")]
    SecretDecode(#[source] data_encoding::DecodeError),
    #[error("Base32 alphabet error")]
    SecretAlphabet(#[source] data_encoding::SpecificationError),
    #[error("The secret is empty")]
    EmptySecret,
    #[error("Invalid digest")]
    InvalidDigest(Vec<u8>),
    #[error("Invalid HMAC key")]
    InvalidKey,
    #[error("Invalid hashing algorithm, found {0}. Expected one of: SHA1, SHA256 or SHA512")]
    InvalidHashingAlgorithm(String),
    #[error("The provided URI is not valid, found {0}. Expected: {1}")]
    InvalidUriType(String, String),
    #[error("Could not parse the URI")]
    UriParseError(#[source] url::ParseError),
    #[error("Could not retrieve the secret from the URI")]
    UriMissingSecret,
    #[error("The period must be greater than zero")]
    ZeroPeriod,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum OtpHashAlgorithm {
    #[default]
    SHA1,
    SHA256,
    SHA512,
}

impl Display for OtpHashAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SHA1 => write!(f, "SHA1"),
            Self::SHA256 => write!(f, "SHA256"),
            Self::SHA512 => write!(f, "SHA512"),
        }
    }
}

impl FromStr for OtpHashAlgorithm {
    type Err = OtpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.to_uppercase();

        match normalized.as_str() {
            "SHA1" => Ok(Self::SHA1),
            "SHA256" => Ok(Self::SHA256),
            "SHA512" => Ok(Self::SHA512),
            _ => Err(OtpError::InvalidHashingAlgorithm(s.to_string())),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct OtpCode {
    code: u32,
    digits: u32,
}

impl OtpCode {
    pub fn integer(&self) -> u32 {
        self.code
    }

    pub fn digits(&self) -> u32 {
        self.digits
    }
}

impl Display for OtpCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:0padding$}",
            self.code,
            padding = (self.digits.min(params::MAX_DIGITS) as usize)
        )
    }
}

/// Removes whitespace and `=` padding and folds the secret to upper case,
/// so that `"jbsw y3dp ehpk 3pxp"` and `"JBSWY3DPEHPK3PXP===="` decode alike.
pub fn normalize_secret(secret: &str) -> String {
    secret
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .trim_end_matches('=')
        .to_ascii_uppercase()
}

/// Decodes a secret (given as an RFC4648 base32-encoded ASCII string)
/// into a byte string.
///
/// Any length is accepted: bits left over after the last whole byte are
/// dropped, as authenticator apps do. Only symbols outside `A-Z2-7` fail.
pub fn decode_secret(secret: &str) -> Result<Vec<u8>, OtpError> {
    let normalized = normalize_secret(secret);
    if normalized.is_empty() {
        return Err(OtpError::EmptySecret);
    }

    if let Some(position) = normalized
        .bytes()
        .position(|b| !matches!(b, b'A'..=b'Z' | b'2'..=b'7'))
    {
        return Err(OtpError::SecretDecode(data_encoding::DecodeError {
            position,
            kind: data_encoding::DecodeKind::Symbol,
        }));
    }

    // a length of 1, 3 or 6 mod 8 ends in a symbol that completes no byte
    let len = match normalized.len() % 8 {
        1 | 3 | 6 => normalized.len() - 1,
        _ => normalized.len(),
    };

    let mut spec = data_encoding::BASE32_NOPAD.specification();
    spec.check_trailing_bits = false;

    spec.encoding()
        .map_err(OtpError::SecretAlphabet)?
        .decode(&normalized.as_bytes()[..len])
        .map_err(OtpError::SecretDecode)
}

/// A one-time password generator keyed on seconds since the UNIX epoch.
///
/// The countdown engine only talks to this trait, so any RFC 6238 style
/// implementation can stand in for [`totp::Totp`].
pub trait Otp {
    /// Length of a time step in seconds
    fn period(&self) -> u64;

    /// Generates the code for the given step index
    fn generate_at_step(&self, step: u64) -> Result<OtpCode, OtpError>;

    /// Generates the code for the step containing `seconds_since_epoch`
    fn generate(&self, seconds_since_epoch: u64) -> Result<OtpCode, OtpError> {
        let period = self.period();
        if period == 0 {
            return Err(OtpError::ZeroPeriod);
        }

        self.generate_at_step(seconds_since_epoch / period)
    }

    /// Calculates the HMAC digest for the given secret.
    fn calc_digest(
        &self,
        decoded_secret: &[u8],
        algorithm: OtpHashAlgorithm,
        data: u64,
    ) -> Result<Vec<u8>, OtpError> {
        let data = data.to_be_bytes();

        let digest = match algorithm {
            OtpHashAlgorithm::SHA1 => {
                let mut mac = Hmac::<Sha1>::new_from_slice(decoded_secret)
                    .map_err(|_| OtpError::InvalidKey)?;
                mac.update(&data);
                mac.finalize().into_bytes().to_vec()
            }
            OtpHashAlgorithm::SHA256 => {
                let mut mac = Hmac::<Sha256>::new_from_slice(decoded_secret)
                    .map_err(|_| OtpError::InvalidKey)?;
                mac.update(&data);
                mac.finalize().into_bytes().to_vec()
            }
            OtpHashAlgorithm::SHA512 => {
                let mut mac = Hmac::<Sha512>::new_from_slice(decoded_secret)
                    .map_err(|_| OtpError::InvalidKey)?;
                mac.update(&data);
                mac.finalize().into_bytes().to_vec()
            }
        };

        Ok(digest)
    }

    /// Encodes the HMAC digest into a truncated integer.
    fn encode_digest_truncated(digest: &[u8], target_digits_count: u32) -> Result<u32, OtpError>
    where
        Self: Sized,
    {
        // the last byte tells us the offset for any algorithm
        let offset = match digest.last() {
            Some(x) => *x & 0xf,
            None => return Err(OtpError::InvalidDigest(Vec::from(digest))),
        } as usize;

        let code_bytes: [u8; 4] = match digest.get(offset..offset + 4).map(TryInto::try_into) {
            Some(Ok(x)) => x,
            _ => return Err(OtpError::InvalidDigest(Vec::from(digest))),
        };

        let code = u64::from(u32::from_be_bytes(code_bytes) & 0x7fffffff);

        // 10^10 and above exceeds any 31-bit value, nothing to truncate
        let truncated = match 10u64.checked_pow(target_digits_count) {
            Some(factor) => code % factor,
            None => code,
        };

        Ok(truncated as u32)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use crate::{decode_secret, normalize_secret, OtpCode, OtpError, OtpHashAlgorithm};

    #[rstest]
    #[case("JBSWY3DPEHPK3PXP", "JBSWY3DPEHPK3PXP")]
    #[case("jbsw y3dp ehpk 3pxp", "JBSWY3DPEHPK3PXP")]
    #[case(" JBSWY3DP\tEHPK3PXP\n", "JBSWY3DPEHPK3PXP")]
    #[case("GEZDGNA=", "GEZDGNA")]
    fn normalize_secret_test(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(expected, normalize_secret(input));
    }

    #[rstest]
    #[case("JBSWY3DPEHPK3PXP")]
    #[case("jbswy3dpehpk3pxp")]
    #[case("JBSW Y3DP EHPK 3PXP")]
    #[case("GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ")]
    fn decode_secret_accepts(#[case] secret: &str) {
        assert!(decode_secret(secret).is_ok());
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    #[case("JBSWY3DP!")]
    #[case("01189998")]
    fn decode_secret_rejects(#[case] secret: &str) {
        assert!(decode_secret(secret).is_err());
    }

    #[rstest]
    #[case("JBSWY3DPEHPK3PX", &[0x48, 0x65, 0x6c, 0x6c, 0x6f, 0x21, 0xde, 0xad, 0xbe])]
    #[case("JBSWY3DPEHPK3PXP7", &[0x48, 0x65, 0x6c, 0x6c, 0x6f, 0x21, 0xde, 0xad, 0xbe, 0xef])]
    #[case("A", &[])]
    #[case("MZXW6", &[0x66, 0x6f, 0x6f])]
    #[case("MZXW7", &[0x66, 0x6f, 0x6f])]
    fn decode_secret_drops_leftover_bits(#[case] secret: &str, #[case] expected: &[u8]) {
        assert_eq!(expected, decode_secret(secret).unwrap().as_slice());
    }

    #[test]
    fn symbol_position_is_reported() {
        match decode_secret("JBSWY3DP8") {
            Err(OtpError::SecretDecode(e)) => assert_eq!(8, e.position),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn oversized_digits_pad_to_the_maximum() {
        let code = OtpCode {
            code: 42,
            digits: u32::MAX,
        };

        assert_eq!("0000000042", code.to_string());
    }

    #[test]
    fn empty_secret_is_reported() {
        assert!(matches!(decode_secret(" \n"), Err(OtpError::EmptySecret)));
    }

    #[rstest]
    #[case("sha1", OtpHashAlgorithm::SHA1)]
    #[case("Sha256", OtpHashAlgorithm::SHA256)]
    #[case("SHA512", OtpHashAlgorithm::SHA512)]
    fn algorithm_from_str(#[case] input: &str, #[case] expected: OtpHashAlgorithm) {
        assert_eq!(expected, input.parse::<OtpHashAlgorithm>().unwrap());
    }

    #[test]
    fn algorithm_from_str_rejects_md5() {
        assert!("md5".parse::<OtpHashAlgorithm>().is_err());
    }
}
