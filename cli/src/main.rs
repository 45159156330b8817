mod cli;
mod input;
mod render;

use std::{
    future::Future,
    io::{self, Write},
    process::ExitCode,
};

use anyhow::Result;
use clap::Parser;
use sharetp::{
    config::Config,
    countdown::{Clock, SystemClock},
    metadata::{InstallMetadata, ManifestFileSink, MetadataSink, NoopSink},
    store::{ColorMode, JsonFileStore, KeyValueStore, PreferenceKey},
    CodeEngine, EngineState, LiveCountdown,
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::cli::{Cli, Commands, InstallArgs, ParamArgs, PrefsAction, ThemeAction};

/// Logs go to stderr so stdout only carries codes and links.
/// `RUST_LOG` wins over the configured level.
fn init_tracing(config: &Config) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    if config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
            .init();
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    init_tracing(&config);

    let mut store = JsonFileStore::in_dir(&config.data_dir);

    match cli.command {
        Commands::Show { params, qr } => show(&params, qr, &config, &store),
        Commands::Watch { params } => watch(&params, &config, &store).await,
        Commands::Share { params, qr } => share(&params, qr, &config, &store),
        Commands::Install(args) => install(&args, &config, &mut store),
        Commands::Prefs { action } => prefs(action, &mut store),
        Commands::Theme { action } => theme(action, &mut store),
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn invalid() -> Result<ExitCode> {
    println!("{}", render::status(false));
    Ok(ExitCode::FAILURE)
}

fn show(args: &ParamArgs, qr: bool, config: &Config, store: &JsonFileStore) -> Result<ExitCode> {
    let (codec, params) = input::resolve(args, config, store);
    let mut engine = CodeEngine::new(codec);

    if engine.set_parameters(params.clone()) == EngineState::Invalid {
        return invalid();
    }
    let Some(derived) = engine.tick(SystemClock.now_millis()) else {
        return invalid();
    };

    println!("{}", render::status(true));
    println!("{}", render::countdown_line(&derived, params.digits));
    println!("{}", derived.share_url);
    println!("{}", derived.otpauth_url);
    if qr {
        println!("{}", render::qr_code(&derived.otpauth_url, ColorMode::load(store)));
    }

    Ok(ExitCode::SUCCESS)
}

async fn watch(args: &ParamArgs, config: &Config, store: &JsonFileStore) -> Result<ExitCode> {
    let (codec, params) = input::resolve(args, config, store);
    let digits = params.digits;
    let mut live = LiveCountdown::new(CodeEngine::new(codec), SystemClock, config.poll_interval());

    if live.set_parameters(params) == EngineState::Invalid {
        return invalid();
    }

    println!("{}", config.site_name);

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "could not listen for Ctrl-C");
        }
    };
    run_watch(&mut live, digits, shutdown, &mut io::stdout()).await?;

    Ok(ExitCode::SUCCESS)
}

/// Redraws the countdown line on every poll until `shutdown` resolves or the
/// engine goes idle. `shutdown` is polled across iterations, so a signal that
/// arrives mid-redraw is not lost.
async fn run_watch<C: Clock>(
    live: &mut LiveCountdown<C>,
    digits: u32,
    shutdown: impl Future<Output = ()>,
    out: &mut impl Write,
) -> io::Result<()> {
    tokio::pin!(shutdown);
    let mut printed_links = false;

    loop {
        tokio::select! {
            derived = live.next() => {
                let Some(derived) = derived else { break };
                if !printed_links {
                    writeln!(out, "{}\n{}", derived.share_url, derived.otpauth_url)?;
                    printed_links = true;
                }
                write!(out, "\r{}", render::countdown_line(&derived, digits))?;
                out.flush()?;
            }
            () = &mut shutdown => {
                writeln!(out)?;
                info!("interrupted, stopping");
                break;
            }
        }
    }

    Ok(())
}

fn share(args: &ParamArgs, qr: bool, config: &Config, store: &JsonFileStore) -> Result<ExitCode> {
    let (codec, params) = input::resolve(args, config, store);
    let Some(derived) = sharetp::compute_derived(&params, &codec, SystemClock.now_millis()) else {
        return invalid();
    };

    println!("{}", derived.share_url);
    println!("{}", derived.otpauth_url);
    if qr {
        println!("{}", render::qr_code(&derived.otpauth_url, ColorMode::load(store)));
    }

    Ok(ExitCode::SUCCESS)
}

fn install(args: &InstallArgs, config: &Config, store: &mut JsonFileStore) -> Result<ExitCode> {
    let (codec, params) = input::resolve(&args.params, config, store);
    if !params.is_valid() {
        return invalid();
    }

    let name = args.name.clone().unwrap_or_else(|| config.site_name.clone());
    store.set(PreferenceKey::DisplayName, &name);
    store.set(PreferenceKey::InstallStartUrl, &codec.encode_share_url(&params));
    if let Some(color) = &args.theme_color {
        store.set(PreferenceKey::ThemeColor, color);
    }
    if let Some(color) = &args.background_color {
        store.set(PreferenceKey::BackgroundColor, color);
    }

    let sink: Box<dyn MetadataSink> = if args.no_manifest {
        Box::new(NoopSink)
    } else {
        Box::new(ManifestFileSink::in_dir(&config.data_dir))
    };
    sink.publish(&InstallMetadata::from_store(store));

    println!("Installed as {name}");
    Ok(ExitCode::SUCCESS)
}

fn prefs(action: PrefsAction, store: &mut JsonFileStore) -> Result<ExitCode> {
    match action {
        PrefsAction::List => {
            for key in PreferenceKey::ALL {
                if let Some(value) = store.get(key) {
                    println!("{key}={value}");
                }
            }
        }
        PrefsAction::Get { key } => match store.get(key.parse()?) {
            Some(value) => println!("{value}"),
            None => return Ok(ExitCode::FAILURE),
        },
        PrefsAction::Set { key, value } => store.set(key.parse()?, &value),
        PrefsAction::Delete { key } => store.delete(key.parse()?),
    }

    Ok(ExitCode::SUCCESS)
}

fn theme(action: ThemeAction, store: &mut JsonFileStore) -> Result<ExitCode> {
    let mode = match action {
        ThemeAction::Show => ColorMode::load(store),
        ThemeAction::Toggle => {
            let mode = ColorMode::load(store).toggled();
            mode.save(store);
            mode
        }
    };

    println!("{mode}");
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use pretty_assertions::assert_eq;
    use sharetp::{countdown::ManualClock, ShareCodec, TotpParameters};
    use url::Url;

    use super::*;

    fn live(params: TotpParameters) -> LiveCountdown<ManualClock> {
        let codec = ShareCodec::new(Url::parse("https://totp.example/").unwrap());
        let mut live = LiveCountdown::new(
            CodeEngine::new(codec),
            ManualClock::new(1_700_000_000_000),
            Duration::from_millis(250),
        );
        live.set_parameters(params);
        live
    }

    #[tokio::test(start_paused = true)]
    async fn watch_redraws_until_shutdown() {
        let mut live = live(TotpParameters::new("JBSWY3DPEHPK3PXP"));
        let mut out = Vec::new();

        let shutdown = tokio::time::sleep(Duration::from_millis(1_100));
        run_watch(&mut live, 6, shutdown, &mut out).await.unwrap();

        let out = String::from_utf8(out).unwrap();
        assert_eq!(1, out.matches("otpauth://").count());
        assert_eq!(5, out.matches('\r').count());
        assert!(out.ends_with('\n'));
    }

    #[tokio::test(start_paused = true)]
    async fn watch_ends_when_idle() {
        let mut live = live(TotpParameters::default());
        let mut out = Vec::new();

        run_watch(&mut live, 6, std::future::pending(), &mut out).await.unwrap();

        assert!(out.is_empty());
    }
}
