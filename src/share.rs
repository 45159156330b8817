//! The share link: a URL on the tool's own origin whose query string is the
//! only durable copy of a [`TotpParameters`].

use tracing::debug;
use url::Url;

use crate::{
    otpauth::{
        URI_DIGITS_QUERY, URI_ISSUER_QUERY, URI_LABEL_QUERY, URI_PERIOD_QUERY, URI_SECRET_QUERY,
    },
    params::{non_empty, parse_digits, parse_period, TotpParameters, DEFAULT_DIGITS, DEFAULT_PERIOD},
    share_target::decode_from_share_target,
};

/// Builds share links relative to the location the tool was opened at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareCodec {
    location: Url,
    base_url: Option<Url>,
}

impl ShareCodec {
    pub fn new(location: Url) -> Self {
        Self {
            location,
            base_url: None,
        }
    }

    /// Resolves the share link against `base_url` instead of the location's
    /// own origin
    pub fn with_base_url(mut self, base_url: Option<Url>) -> Self {
        self.base_url = base_url;
        self
    }

    pub fn location(&self) -> &Url {
        &self.location
    }

    /// Replaces the current location, the way a page rewrites its address
    /// bar after an edit
    pub fn set_location(&mut self, location: Url) {
        self.location = location;
    }

    /// Builds the absolute share link for `params`.
    ///
    /// `secret` is always set. `label` and `issuer` are set when non-empty and
    /// removed otherwise; `period` and `digits` are set only when they differ
    /// from the defaults. Other query keys of the location keep their place.
    pub fn encode_share_url(&self, params: &TotpParameters) -> String {
        let mut pairs: Vec<(String, String)> = self.location.query_pairs().into_owned().collect();

        set_pair(&mut pairs, URI_SECRET_QUERY, Some(params.secret.clone()));
        set_pair(
            &mut pairs,
            URI_LABEL_QUERY,
            params.label.clone().and_then(non_empty),
        );
        set_pair(
            &mut pairs,
            URI_ISSUER_QUERY,
            params.issuer.clone().and_then(non_empty),
        );
        set_pair(
            &mut pairs,
            URI_PERIOD_QUERY,
            params.explicit_period().map(|p| p.to_string()),
        );
        set_pair(
            &mut pairs,
            URI_DIGITS_QUERY,
            params.explicit_digits().map(|d| d.to_string()),
        );

        let query = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(pairs)
            .finish();

        let mut url = self.base_url.clone().unwrap_or_else(|| self.location.clone());
        url.set_path(self.location.path());
        url.set_query(Some(&query));
        url.set_fragment(None);

        url.to_string()
    }
}

/// `URLSearchParams` semantics: `Some` replaces the first occurrence in place
/// and drops the rest (or appends), `None` removes every occurrence.
fn set_pair(pairs: &mut Vec<(String, String)>, key: &str, value: Option<String>) {
    let Some(value) = value else {
        pairs.retain(|(k, _)| k != key);
        return;
    };

    match pairs.iter().position(|(k, _)| k == key) {
        Some(first) => {
            pairs[first].1 = value;
            let mut index = 0;
            pairs.retain(|(k, _)| {
                let keep = k != key || index == first;
                index += 1;
                keep
            });
        }
        None => pairs.push((key.to_string(), value)),
    }
}

/// First value of `key` in the query, as `URLSearchParams.get` returns it
pub(crate) fn first_query_value(url: &Url, key: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

/// Reads the parameter tuple out of a location's query string.
///
/// Never fails: an unparseable URL yields the empty tuple and a missing or
/// non-numeric `period`/`digits` falls back to 30/6.
pub fn decode_from_location(location: &str) -> TotpParameters {
    match Url::parse(location) {
        Ok(url) => decode_url(&url),
        Err(e) => {
            debug!(error = %e, "location is not a valid URL, ignoring it");
            TotpParameters::default()
        }
    }
}

pub fn decode_url(url: &Url) -> TotpParameters {
    let period = first_query_value(url, URI_PERIOD_QUERY).map(|raw| {
        parse_period(&raw).unwrap_or_else(|| {
            debug!(value = %raw, "falling back to the default period");
            DEFAULT_PERIOD
        })
    });
    let digits = first_query_value(url, URI_DIGITS_QUERY).map(|raw| {
        parse_digits(&raw).unwrap_or_else(|| {
            debug!(value = %raw, "falling back to the default digits");
            DEFAULT_DIGITS
        })
    });

    TotpParameters {
        secret: first_query_value(url, URI_SECRET_QUERY).unwrap_or_default(),
        label: first_query_value(url, URI_LABEL_QUERY).and_then(non_empty),
        issuer: first_query_value(url, URI_ISSUER_QUERY).and_then(non_empty),
        period: period.unwrap_or(DEFAULT_PERIOD),
        digits: digits.unwrap_or(DEFAULT_DIGITS),
    }
}

/// The load pipeline: the location's own query first, then, only when it
/// carries no `secret`, whatever a share-target payload provides.
pub fn decode(location: &str) -> TotpParameters {
    let params = decode_from_location(location);
    if !params.secret.is_empty() {
        return params;
    }

    match decode_from_share_target(location) {
        Some(shared) => shared.merge_into(params),
        None => params,
    }
}
