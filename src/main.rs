use std::{env, process::ExitCode, sync::Arc, time::Duration};

use restream::{
    config::{SupervisorConfig, resolve_executable},
    encoders,
    error::AppError,
    layout::RelayLayout,
    profiles::ProfileStore,
    render::{RelayTemplate, RelayTemplateFields, render},
    settings::{DynSettingsStore, JsonSettingsStore, Settings},
    supervisor::Supervisor,
};

const HEALTH_INTERVAL: Duration = Duration::from_secs(2);
const USAGE: &str = "usage: restream [run|encoders|render|profiles]";

#[tokio::main]
async fn main() -> ExitCode {
    setup_tracing();

    let command = env::args().nth(1).unwrap_or_else(|| "run".to_string());
    let config = SupervisorConfig::from_env();

    let result = match command.as_str() {
        "run" => run(config).await,
        "encoders" => list_encoders(&config).await,
        "render" => print_config(&config).await,
        "profiles" => list_profiles(&config).await,
        "-h" | "--help" | "help" => {
            println!("{USAGE}");
            Ok(())
        }
        other => {
            eprintln!("unknown command '{other}'\n{USAGE}");
            return ExitCode::from(2);
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(code = err.code(), error = %err, "command failed");
            ExitCode::FAILURE
        }
    }
}

/// The named profile when one is selected, otherwise the single settings
/// file. A selected profile must exist.
async fn load_settings(config: &SupervisorConfig) -> Result<Settings, AppError> {
    match &config.profile {
        Some(name) => {
            tracing::debug!(profile = %name, "using settings profile");
            ProfileStore::new(&config.profiles_dir).load(name).await
        }
        None => {
            let store: DynSettingsStore = Arc::new(JsonSettingsStore::new(&config.settings_path));
            store.load().await
        }
    }
}

async fn run(config: SupervisorConfig) -> Result<(), AppError> {
    let stream = load_settings(&config).await?.stream_config();
    let supervisor = Supervisor::new(config).await?;

    let info = supervisor.start(&stream).await?;
    tracing::info!(
        session = %info.id,
        targets = %info.targets.join(", "),
        "streaming; press Ctrl-C to stop"
    );

    let mut health = tokio::time::interval(HEALTH_INTERVAL);
    health.tick().await;

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                if let Err(err) = signal {
                    tracing::warn!(?err, "failed to listen for Ctrl-C");
                }
                tracing::info!("shutdown requested");
                supervisor.stop().await;
                return Ok(());
            }
            _ = health.tick() => {
                if let Some(exit) = supervisor.check_health().await {
                    return Err(AppError::launch(format!(
                        "{} exited unexpectedly with {}",
                        exit.role, exit.status
                    )));
                }
            }
        }
    }
}

async fn list_encoders(config: &SupervisorConfig) -> Result<(), AppError> {
    let transcoder = resolve_executable(&config.transcoder_binary)
        .unwrap_or_else(|| config.transcoder_binary.clone());

    let catalog = match encoders::discover(&transcoder).await {
        Ok(catalog) => catalog,
        Err(err) => {
            tracing::warn!(error = %err, "encoder discovery failed");
            Vec::new()
        }
    };

    if catalog.is_empty() {
        println!("no usable video encoders found");
        return Ok(());
    }

    for encoder in catalog {
        let presets = if encoder.supported_presets.is_empty() {
            "-".to_string()
        } else {
            encoder.supported_presets.join(",")
        };
        println!("{}\t{}\t{}", encoder.code, encoder.display_name, presets);
    }

    Ok(())
}

async fn list_profiles(config: &SupervisorConfig) -> Result<(), AppError> {
    let names = ProfileStore::new(&config.profiles_dir).list().await?;
    if names.is_empty() {
        println!("no profiles in {}", config.profiles_dir.display());
    }
    for name in names {
        println!("{name}");
    }
    Ok(())
}

async fn print_config(config: &SupervisorConfig) -> Result<(), AppError> {
    let sanitized = load_settings(config).await?.stream_config().sanitize()?;
    let layout = RelayLayout::initialize(&config.root_dir).await?;
    let template = RelayTemplate::resolve(config.template_path.as_deref(), &layout).await?;

    let fields = RelayTemplateFields::new(&sanitized, &layout).masked();
    print!("{}", render(&fields, &template));

    Ok(())
}

fn setup_tracing() {
    if tracing::dispatcher::has_been_set() {
        return;
    }

    let env_filter = env::var("RUST_LOG").unwrap_or_else(|_| "restream=debug".to_string());

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter.clone())
        .with_target(false)
        .with_level(true)
        .with_writer(std::io::stderr)
        .compact()
        .try_init();

    if init_result.is_ok() {
        tracing::debug!(current_filter = %env_filter, "tracing initialized");
    }
}
