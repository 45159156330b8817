//! Intake for content handed over by an operating system share sheet.
//!
//! Share sheets deliver a generic `url`, `text` or `title` field rather than
//! our own query keys. The payload is scanned for an embedded `otpauth://`
//! URI first and, failing that, for a bare `secret=<base32>` token. Both are
//! heuristics over free text, not strict parsers.

use regex::Regex;
use tracing::debug;
use url::Url;

use crate::{otpauth::parse_otpauth_url, params::SharedParameters, share::first_query_value};

const SHARE_TARGET_FIELDS: [&str; 3] = ["url", "text", "title"];

const OTPAUTH_PATTERN: &str = r"(?i)otpauth://\S+";
const SECRET_TOKEN_PATTERN: &str = r"(?i)secret=([A-Z2-7=]+)";

/// Looks for shared TOTP parameters in the share-target fields of `location`.
///
/// Returns `None` when the URL is malformed or nothing usable is found.
pub fn decode_from_share_target(location: &str) -> Option<SharedParameters> {
    let url = match Url::parse(location) {
        Ok(url) => url,
        Err(e) => {
            debug!(error = %e, "share-target location is not a valid URL");
            return None;
        }
    };

    let payloads: Vec<String> = SHARE_TARGET_FIELDS
        .iter()
        .filter_map(|field| first_query_value(&url, field))
        .filter(|payload| !payload.is_empty())
        .collect();

    payloads
        .iter()
        .find_map(|payload| find_otpauth_uri(payload))
        .or_else(|| payloads.iter().find_map(|payload| find_secret_token(payload)))
}

/// Scans free text the same way as a share-target payload
pub fn decode_shared_text(text: &str) -> Option<SharedParameters> {
    find_otpauth_uri(text).or_else(|| find_secret_token(text))
}

fn find_otpauth_uri(text: &str) -> Option<SharedParameters> {
    let pattern = Regex::new(OTPAUTH_PATTERN).ok()?;

    let found = pattern
        .find_iter(text)
        .find_map(|candidate| match parse_otpauth_url(candidate.as_str()) {
            Ok(shared) => Some(shared),
            Err(e) => {
                debug!(error = %e, "skipping unusable otpauth URI in shared content");
                None
            }
        });

    found
}

fn find_secret_token(text: &str) -> Option<SharedParameters> {
    let pattern = Regex::new(SECRET_TOKEN_PATTERN).ok()?;
    let secret = pattern.captures(text)?.get(1)?.as_str().to_string();

    Some(SharedParameters {
        secret,
        ..SharedParameters::default()
    })
}
