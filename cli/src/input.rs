//! Turns command line arguments into a location and a parameter tuple.

use sharetp::{
    config::Config,
    params::non_empty,
    share_target::decode_shared_text,
    store::{KeyValueStore, PreferenceKey},
    ShareCodec, TotpParameters,
};
use tracing::{debug, warn};
use url::Url;

use crate::cli::ParamArgs;

/// Picks the location to decode: `--url`, then the saved start link when no
/// secret is supplied any other way, then the configured base URL.
pub fn location(args: &ParamArgs, config: &Config, store: &impl KeyValueStore) -> Url {
    let raw = args.url.clone().or_else(|| {
        if args.secret.is_some() || args.text.is_some() {
            return None;
        }
        let saved = store.get(PreferenceKey::InstallStartUrl);
        if saved.is_some() {
            debug!("using the saved start link");
        }
        saved
    });

    let Some(raw) = raw else {
        return config.base_url.clone();
    };

    match Url::options().base_url(Some(&config.base_url)).parse(&raw) {
        Ok(url) => url,
        Err(e) => {
            warn!(error = %e, location = %raw, "ignoring unparseable location");
            config.base_url.clone()
        }
    }
}

/// Decodes the location, scans `--text` when the location has no secret,
/// then applies the explicit flags on top.
pub fn parameters(args: &ParamArgs, location: &Url) -> TotpParameters {
    let mut params = sharetp::decode(location.as_str());

    if params.secret.is_empty() {
        if let Some(shared) = args.text.as_deref().and_then(decode_shared_text) {
            params = shared.merge_into(params);
        }
    }

    if let Some(secret) = &args.secret {
        params.secret = secret.clone();
    }
    if let Some(label) = &args.label {
        params.label = non_empty(label.clone());
    }
    if let Some(issuer) = &args.issuer {
        params.issuer = non_empty(issuer.clone());
    }
    if let Some(period) = args.period {
        params.period = period;
    }
    if let Some(digits) = args.digits {
        params.digits = digits;
    }

    if !params.within_recommended_ranges() {
        warn!(
            period = params.period,
            digits = params.digits,
            "period or digits outside the recommended range"
        );
    }

    params
}

pub fn resolve(
    args: &ParamArgs,
    config: &Config,
    store: &impl KeyValueStore,
) -> (ShareCodec, TotpParameters) {
    let location = location(args, config, store);
    let params = parameters(args, &location);

    (ShareCodec::new(location).with_base_url(config.public_url.clone()), params)
}
