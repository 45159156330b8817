//! Terminal presentation of the derived state.

use qrcode::{render::unicode, QrCode};
use sharetp::{params::MAX_DIGITS, store::ColorMode, Derived};
use tracing::warn;

const PROGRESS_WIDTH: usize = 30;

pub fn status(valid: bool) -> &'static str {
    if valid {
        "Status: valid secret"
    } else {
        "Status: invalid secret"
    }
}

/// The code, or a dash per digit when none could be generated
pub fn code(derived: &Derived, digits: u32) -> String {
    match derived.code {
        Some(code) => code.to_string(),
        None => vec!["—"; digits.min(MAX_DIGITS) as usize].join(" "),
    }
}

pub fn progress_bar(progress: f64, width: usize) -> String {
    let filled = ((progress.clamp(0.0, 100.0) / 100.0) * width as f64).round() as usize;
    format!("[{}{}]", "#".repeat(filled), "-".repeat(width - filled))
}

pub fn countdown_line(derived: &Derived, digits: u32) -> String {
    format!(
        "{}  updates in {:>3}s {}",
        code(derived, digits),
        derived.remaining,
        progress_bar(derived.progress, PROGRESS_WIDTH)
    )
}

/// Renders `data` as a QR code made of Unicode half blocks. Dark themes get
/// inverted modules so the code stays scannable on a dark terminal.
pub fn qr_code(data: &str, mode: ColorMode) -> String {
    let code = match QrCode::new(data.as_bytes()) {
        Ok(code) => code,
        Err(e) => {
            warn!(error = %e, "QR code generation failed");
            return format!("(QR code unavailable: {e})");
        }
    };

    let mut renderer = code.render::<unicode::Dense1x2>();
    if mode == ColorMode::Dark {
        renderer
            .dark_color(unicode::Dense1x2::Light)
            .light_color(unicode::Dense1x2::Dark);
    }

    renderer.build()
}
