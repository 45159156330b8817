use std::borrow::Cow;

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::{
    params::{non_empty, parse_digits, parse_period, SharedParameters, TotpParameters},
    OtpError,
};

pub const OTPAUTH_SCHEME: &str = "otpauth";
const TOTP_TYPE: &str = "totp";

pub(crate) const URI_SECRET_QUERY: &str = "secret";
pub(crate) const URI_LABEL_QUERY: &str = "label";
pub(crate) const URI_ISSUER_QUERY: &str = "issuer";
pub(crate) const URI_PERIOD_QUERY: &str = "period";
pub(crate) const URI_DIGITS_QUERY: &str = "digits";

/// Characters `encodeURIComponent` leaves alone: alphanumerics and `-_.!~*'()`
const LABEL_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Builds the enrollment URI authenticator apps scan:
/// `otpauth://totp/<label>?secret=..&issuer=..&period=..&digits=..`
///
/// `period` and `digits` only appear when they differ from the defaults and
/// `issuer` only when present. The label falls back to `TOTP`.
pub fn encode_otpauth_url(params: &TotpParameters) -> String {
    let label = utf8_percent_encode(params.label_or_default(), LABEL_ENCODE_SET);

    let mut query = url::form_urlencoded::Serializer::new(String::new());
    query.append_pair(URI_SECRET_QUERY, &params.normalized_secret());

    if let Some(issuer) = params.issuer.as_deref().filter(|i| !i.is_empty()) {
        query.append_pair(URI_ISSUER_QUERY, issuer);
    }
    if let Some(period) = params.explicit_period() {
        query.append_pair(URI_PERIOD_QUERY, &period.to_string());
    }
    if let Some(digits) = params.explicit_digits() {
        query.append_pair(URI_DIGITS_QUERY, &digits.to_string());
    }

    format!("{OTPAUTH_SCHEME}://{TOTP_TYPE}/{label}?{}", query.finish())
}

/// Parses an `otpauth://totp/...` URI.
///
/// Scheme, type and secret are required. Numeric fields are read
/// permissively: anything that is not a positive integer is dropped.
pub fn parse_otpauth_url(uri: &str) -> Result<SharedParameters, OtpError> {
    let uri = url::Url::parse(uri.trim()).map_err(OtpError::UriParseError)?;

    if uri.scheme() != OTPAUTH_SCHEME {
        return Err(OtpError::InvalidUriType(
            uri.scheme().into(),
            OTPAUTH_SCHEME.into(),
        ));
    }

    let otp_type = uri.host_str();
    if !otp_type.is_some_and(|t| t.eq_ignore_ascii_case(TOTP_TYPE)) {
        return Err(OtpError::InvalidUriType(
            otp_type.unwrap_or("None").into(),
            TOTP_TYPE.into(),
        ));
    }

    let label = percent_decode_str(uri.path().trim_start_matches('/'))
        .decode_utf8_lossy()
        .into_owned();

    let mut shared = SharedParameters {
        label: non_empty(label),
        ..SharedParameters::default()
    };

    for (key, value) in uri.query_pairs() {
        match key {
            Cow::Borrowed(URI_SECRET_QUERY) => shared.secret = value.into_owned(),
            Cow::Borrowed(URI_ISSUER_QUERY) => shared.issuer = non_empty(value.into_owned()),
            Cow::Borrowed(URI_PERIOD_QUERY) => shared.period = parse_period(&value),
            Cow::Borrowed(URI_DIGITS_QUERY) => shared.digits = parse_digits(&value),
            _ => (),
        }
    }

    if shared.secret.is_empty() {
        return Err(OtpError::UriMissingSecret);
    }

    Ok(shared)
}
