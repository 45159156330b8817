//! CLI argument definitions using clap.

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "sharetp")]
#[command(version)]
#[command(about = "TOTP codes from a Base32 secret, shared as a link and a QR code", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the current code, the countdown and the share links
    Show {
        #[command(flatten)]
        params: ParamArgs,

        /// Also print the otpauth QR code
        #[arg(long)]
        qr: bool,
    },

    /// Keep the code and countdown on screen until interrupted
    Watch {
        #[command(flatten)]
        params: ParamArgs,
    },

    /// Print only the share link and the otpauth URI
    Share {
        #[command(flatten)]
        params: ParamArgs,

        /// Also print the otpauth QR code
        #[arg(long)]
        qr: bool,
    },

    /// Remember these parameters as the start link and update the manifest
    Install(InstallArgs),

    /// Read or change stored preferences
    Prefs {
        #[command(subcommand)]
        action: PrefsAction,
    },

    /// Show or toggle the light/dark theme
    Theme {
        #[command(subcommand)]
        action: ThemeAction,
    },

    /// Print the effective configuration
    Config,
}

/// Where the parameters come from. Explicit flags edit whatever the
/// location provided.
#[derive(Args, Debug, Clone, Default)]
pub struct ParamArgs {
    /// Location to decode: a share link or a share-target URL
    #[arg(long)]
    pub url: Option<String>,

    /// Shared text to scan for an otpauth URI or a `secret=` token
    #[arg(long)]
    pub text: Option<String>,

    /// Base32 secret
    #[arg(short, long)]
    pub secret: Option<String>,

    /// Label shown by authenticator apps
    #[arg(short, long)]
    pub label: Option<String>,

    /// Issuer shown by authenticator apps
    #[arg(short, long)]
    pub issuer: Option<String>,

    /// Period in seconds (10-120 recommended)
    #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
    pub period: Option<u64>,

    /// Number of digits (4-10 recommended)
    #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..=10))]
    pub digits: Option<u32>,
}

#[derive(Args, Debug, Clone)]
pub struct InstallArgs {
    #[command(flatten)]
    pub params: ParamArgs,

    /// Display name, defaults to the configured site name
    #[arg(long)]
    pub name: Option<String>,

    /// Theme color, e.g. #0f172a
    #[arg(long)]
    pub theme_color: Option<String>,

    /// Background color, e.g. #0b1220
    #[arg(long)]
    pub background_color: Option<String>,

    /// Store the preferences without rewriting the manifest
    #[arg(long)]
    pub no_manifest: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum PrefsAction {
    /// Print every stored preference
    List,
    /// Print one preference
    Get { key: String },
    /// Store one preference
    Set { key: String, value: String },
    /// Forget one preference
    Delete { key: String },
}

#[derive(Subcommand, Debug, Clone, Copy)]
pub enum ThemeAction {
    /// Print the current theme
    Show,
    /// Switch between light and dark
    Toggle,
}
