//! Time-driven derivation of the displayed code and countdown.

use std::{
    cell::Cell,
    time::{SystemTime, UNIX_EPOCH},
};

use tracing::{debug, info, warn};
use url::Url;

use crate::{
    otpauth::encode_otpauth_url, params::TotpParameters, share::ShareCodec, totp::Totp, Otp,
    OtpCode, OtpError,
};

const MILLIS_PER_SECOND: u64 = 1000;

/// Wall-clock source, in milliseconds since the UNIX epoch
pub trait Clock {
    fn now_millis(&self) -> u64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default()
    }
}

/// A clock that only moves when told to
#[derive(Debug, Default)]
pub struct ManualClock(Cell<u64>);

impl ManualClock {
    pub fn new(now_millis: u64) -> Self {
        Self(Cell::new(now_millis))
    }

    pub fn set(&self, now_millis: u64) {
        self.0.set(now_millis);
    }

    pub fn advance(&self, millis: u64) {
        self.0.set(self.0.get() + millis);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        self.0.get()
    }
}

/// Seconds elapsed in the current period
pub fn phase(now_millis: u64, period: u64) -> u64 {
    if period == 0 {
        return 0;
    }
    (now_millis / MILLIS_PER_SECOND) % period
}

/// Seconds left in the current period, in `1..=period`
pub fn remaining(now_millis: u64, period: u64) -> u64 {
    period - phase(now_millis, period)
}

pub fn step_index(now_millis: u64, period: u64) -> u64 {
    if period == 0 {
        return 0;
    }
    now_millis / MILLIS_PER_SECOND / period
}

/// Share of the period still left, as a percentage clamped to `0..=100`
pub fn progress_percent(remaining: u64, period: u64) -> f64 {
    if period == 0 {
        return 0.0;
    }
    (remaining as f64 / period as f64 * 100.0).clamp(0.0, 100.0)
}

/// Everything a display needs for one instant.
#[derive(Debug, Clone, PartialEq)]
pub struct Derived {
    /// `None` when the generator failed; show a placeholder
    pub code: Option<OtpCode>,
    pub remaining: u64,
    pub progress: f64,
    pub share_url: String,
    pub otpauth_url: String,
}

/// Recomputes the display state from scratch. `None` for an invalid tuple.
pub fn compute_derived(
    params: &TotpParameters,
    codec: &ShareCodec,
    now_millis: u64,
) -> Option<Derived> {
    if !params.is_valid() {
        return None;
    }

    let code = Totp::from_parameters(params)
        .and_then(|totp| totp.generate_at_step(step_index(now_millis, params.period)));
    let code = match code {
        Ok(code) => Some(code),
        Err(e) => {
            warn!(error = %e, "code generation failed");
            None
        }
    };
    let remaining = remaining(now_millis, params.period);

    Some(Derived {
        code,
        remaining,
        progress: progress_percent(remaining, params.period),
        share_url: codec.encode_share_url(params),
        otpauth_url: encode_otpauth_url(params),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// No valid secret, nothing to compute
    Invalid,
    /// Valid secret, codes follow the clock
    Active,
}

pub type GeneratorFactory = fn(&TotpParameters) -> Result<Box<dyn Otp>, OtpError>;

fn totp_generator(params: &TotpParameters) -> Result<Box<dyn Otp>, OtpError> {
    Ok(Box::new(Totp::from_parameters(params)?))
}

struct Active {
    params: TotpParameters,
    generator: Option<Box<dyn Otp>>,
    share_url: String,
    otpauth_url: String,
    step: Option<u64>,
    code: Option<OtpCode>,
}

/// Holds the current tuple and regenerates the code once per time step.
///
/// Parameter changes go through [`CodeEngine::set_parameters`], clock
/// changes through [`CodeEngine::tick`]. Share URLs are rebuilt on every
/// parameter change and the codec's location follows the latest share URL.
pub struct CodeEngine {
    codec: ShareCodec,
    factory: GeneratorFactory,
    active: Option<Active>,
    generations: u64,
}

impl CodeEngine {
    pub fn new(codec: ShareCodec) -> Self {
        Self {
            codec,
            factory: totp_generator,
            active: None,
            generations: 0,
        }
    }

    /// Swaps the code generator, mostly useful to stub it out
    pub fn with_generator(mut self, factory: GeneratorFactory) -> Self {
        self.factory = factory;
        self
    }

    pub fn state(&self) -> EngineState {
        match self.active {
            Some(_) => EngineState::Active,
            None => EngineState::Invalid,
        }
    }

    pub fn parameters(&self) -> Option<&TotpParameters> {
        self.active.as_ref().map(|a| &a.params)
    }

    pub fn codec(&self) -> &ShareCodec {
        &self.codec
    }

    /// How many times the generator has been asked for a code
    pub fn generations(&self) -> u64 {
        self.generations
    }

    pub fn set_parameters(&mut self, params: TotpParameters) -> EngineState {
        if !params.is_valid() {
            if self.active.take().is_some() {
                info!("secret cleared or malformed, code engine idle");
            }
            return EngineState::Invalid;
        }

        if self.parameters() == Some(&params) {
            return EngineState::Active;
        }

        let generator = match (self.factory)(&params) {
            Ok(generator) => Some(generator),
            Err(e) => {
                warn!(error = %e, "could not build a code generator");
                None
            }
        };

        let share_url = self.codec.encode_share_url(&params);
        let otpauth_url = encode_otpauth_url(&params);

        match Url::parse(&share_url) {
            Ok(location) => self.codec.set_location(location),
            Err(e) => debug!(error = %e, "share URL is not absolute, keeping location"),
        }

        if self.active.is_none() {
            info!(period = params.period, digits = params.digits, "code engine active");
        }

        self.active = Some(Active {
            params,
            generator,
            share_url,
            otpauth_url,
            step: None,
            code: None,
        });

        EngineState::Active
    }

    /// Derives the display state for `now_millis`, asking the generator for a
    /// new code only when the step index moved.
    pub fn tick(&mut self, now_millis: u64) -> Option<Derived> {
        let active = self.active.as_mut()?;
        let period = active.params.period;
        let step = step_index(now_millis, period);

        if active.step != Some(step) {
            active.code = match active.generator.as_ref().map(|g| g.generate_at_step(step)) {
                Some(Ok(code)) => Some(code),
                Some(Err(e)) => {
                    warn!(error = %e, step, "code generation failed");
                    None
                }
                None => None,
            };
            active.step = Some(step);
            self.generations += 1;
        }

        let remaining = remaining(now_millis, period);

        Some(Derived {
            code: active.code,
            remaining,
            progress: progress_percent(remaining, period),
            share_url: active.share_url.clone(),
            otpauth_url: active.otpauth_url.clone(),
        })
    }
}
