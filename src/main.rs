use camera_control::api::ApiClient;
use camera_control::auth::AuthResolver;
use camera_control::claims;
use camera_control::config::Settings;
use camera_control::credential::CredentialStore;
use camera_control::modal::{Navigator, NotificationSurface};
use camera_control::registry::CameraRegistry;
use camera_control::server;
use camera_control::{OurError, OurResult};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "camera-control")]
#[command(about = "Remote control console for PTZ room cameras")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Exchange a room key for control information and list the room's cameras
    Resolve {
        /// Room key
        #[arg(long)]
        key: String,
    },
    /// List cameras for a room using the stored control credential
    Cameras {
        #[arg(long)]
        room: String,
        #[arg(long)]
        control_group: String,
    },
    /// Decode an access token and show what it allows
    Token {
        token: String,
    },
    /// Start the browser console
    Serve {
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,
        /// Port to bind to
        #[arg(long)]
        port: Option<u16>,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show configuration
    Show,
}

/// Reports resolution failures on the terminal.
struct Terminal;

impl NotificationSurface for Terminal {
    fn show_error(&self, message: &str) {
        eprintln!("Error: {message}");
    }
}

impl Navigator for Terminal {
    fn return_to_entry(&self) {
        debug!("Returning to room key entry");
    }

    fn set_title(&self, title: &str) {
        println!("{title}");
    }
}

#[tokio::main]
async fn main() -> OurResult<()> {
    let cli = Cli::parse();

    let settings = match Settings::new() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let default_level = if cli.debug || settings.debug {
        "debug"
    } else {
        "info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| OurError::App(format!("Failed to set tracing subscriber: {e}")))?;

    debug!("Debug mode enabled");

    match cli.command {
        Commands::Resolve { key } => resolve(&key, &settings).await,
        Commands::Cameras {
            room,
            control_group,
        } => cameras(&room, &control_group, &settings).await,
        Commands::Token { token } => show_token(&token),
        Commands::Serve { host, port } => {
            let host = host.unwrap_or_else(|| settings.host.clone());
            let port = port.unwrap_or(settings.port);
            server::start_server(host, port, settings).await
        }
        Commands::Config { action } => handle_config_command(action, &settings),
    }
}

fn resolver(settings: &Settings) -> OurResult<AuthResolver> {
    Ok(AuthResolver::new(
        ApiClient::new(settings)?,
        CredentialStore::from_settings(settings),
    ))
}

async fn resolve(key: &str, settings: &Settings) -> OurResult<()> {
    let room = resolver(settings)?.enter_room(key, &Terminal, &Terminal).await?;
    println!("  Room: {}", room.info.room);
    println!("  Control group: {}", room.info.control_group);
    println!(
        "  Credential stored at {}",
        settings.credential_path().display()
    );
    print_cameras(&room.registry);
    Ok(())
}

async fn cameras(room: &str, control_group: &str, settings: &Settings) -> OurResult<()> {
    let room = resolver(settings)?
        .reenter_room(room, control_group, &Terminal, &Terminal)
        .await?;
    print_cameras(&room.registry);
    Ok(())
}

fn print_cameras(registry: &CameraRegistry) {
    info!("{} cameras", registry.len());
    for (camera, record) in registry.iter() {
        let presets: Vec<&str> = record
            .presets
            .iter()
            .map(|preset| preset.display_name.as_str())
            .collect();
        println!(
            "  [{}] {} stream={} reboot={} presets=[{}]",
            camera.index(),
            record.display_name,
            record.stream.as_deref().unwrap_or("-"),
            record.reboot.is_some(),
            presets.join(", ")
        );
    }
}

fn show_token(token: &str) -> OurResult<()> {
    let claims = claims::validate(token, Utc::now())?;
    println!("Token:");
    println!("  Subject: {}", claims.subject.as_deref().unwrap_or("-"));
    match claims.expires_at {
        Some(expires_at) => println!("  Expires: {expires_at}"),
        None => println!("  Expires: never"),
    }
    println!("  Camera restart: {}", claims.can_restart_camera);
    Ok(())
}

fn handle_config_command(action: ConfigAction, settings: &Settings) -> OurResult<()> {
    match action {
        ConfigAction::Show => {
            println!("Configuration:");
            println!("  Host: {}", settings.host);
            println!("  Port: {}", settings.port);
            println!("  Debug: {}", settings.debug);
            println!("  API base URL: {}", settings.api_base_url);
            println!(
                "  Liveness threshold: {}s",
                settings.liveness_threshold_secs
            );
            println!("  Reboot lockout: {}s", settings.reboot_lockout_secs);
            println!("  Credential TTL: {}s", settings.credential_ttl_secs);
            println!("  Request timeout: {}s", settings.request_timeout_secs);
            println!(
                "  Credential path: {}",
                settings.credential_path().display()
            );
            println!(
                "  Access token: {}",
                if settings.access_token.is_some() { "set" } else { "unset" }
            );
            Ok(())
        }
    }
}
