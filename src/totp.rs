use crate::{decode_secret, params::TotpParameters, Otp, OtpCode, OtpError, OtpHashAlgorithm};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Totp {
    pub(crate) secret: Vec<u8>,
    pub(crate) algorithm: OtpHashAlgorithm,
    pub(crate) period: u64,
    pub(crate) digits: u32,
}

impl Otp for Totp {
    fn period(&self) -> u64 {
        self.period
    }

    fn generate_at_step(&self, step: u64) -> Result<OtpCode, OtpError> {
        let digest = self.calc_digest(self.secret.as_slice(), self.algorithm, step)?;
        let code = Self::encode_digest_truncated(digest.as_ref(), self.digits)?;

        Ok(OtpCode {
            code,
            digits: self.digits,
        })
    }
}

impl Totp {
    /// Creates the config for the [Time-based One-time Password Algorithm](http://en.wikipedia.org/wiki/Time-based_One-time_Password_Algorithm)
    /// (TOTP) given an RFC4648 base32 encoded secret.
    ///
    /// Obs.: This method defaults to the SHA1 hash, a 6-digit code and a period of 30 seconds
    pub fn new(secret: &str) -> Result<Self, OtpError> {
        Ok(Self {
            secret: decode_secret(secret)?,
            algorithm: OtpHashAlgorithm::SHA1,
            period: 30,
            digits: 6,
        })
    }

    /// Builds a SHA1 generator from a share-link parameter tuple
    pub fn from_parameters(params: &TotpParameters) -> Result<Self, OtpError> {
        if params.period == 0 {
            return Err(OtpError::ZeroPeriod);
        }

        let mut totp = Self::new(&params.secret)?;
        totp.with_period(params.period).with_digits(params.digits);

        Ok(totp)
    }

    ///  Sets hashing algorithm
    pub fn with_algorithm(&mut self, algorithm: OtpHashAlgorithm) -> &mut Self {
        self.algorithm = algorithm;

        self
    }

    ///  Sets the period in seconds
    pub fn with_period(&mut self, period: u64) -> &mut Self {
        self.period = period;

        self
    }

    ///  Sets the number of digits to generate
    pub fn with_digits(&mut self, digits: u32) -> &mut Self {
        self.digits = digits;

        self
    }

    pub fn digits(&self) -> u32 {
        self.digits
    }
}
