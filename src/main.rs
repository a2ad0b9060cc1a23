use koalad::audio::{AlsaDevice, NullDevice, OutputDevice};
use koalad::config::Settings;
use koalad::init_app_dirs;
use koalad::ipc::{self, IpcServer, SessionFacade};
use koalad::player::PlaybackSession;
use koalad::ui::Cli;
use std::error::Error;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const LOG_TARGET: &str = "koalad::main";

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::new();
    let args = &cli.args;

    init_tracing(args.log_json);

    let config_path = args.config.clone().unwrap_or_else(Settings::default_path);
    let mut settings = Settings::load(&config_path)?;
    args.apply_to(&mut settings);
    settings.validate()?;

    match args.request() {
        None => serve(settings).await,
        Some(request) => match ipc::send_request(&settings.socket_path, &request).await {
            Ok(response) => {
                cli.display_response(&response);
                response.into_result().map(|_| ()).map_err(Into::into)
            }
            Err(e) => {
                cli.display_error(&e);
                Err(e.into())
            }
        },
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("koalad=info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json().with_writer(std::io::stderr)).init();
    } else {
        registry.with(fmt::layer().with_writer(std::io::stderr)).init();
    }
}

async fn serve(settings: Settings) -> Result<(), Box<dyn Error>> {
    init_app_dirs()?;

    let device: Box<dyn OutputDevice> = if settings.null_output {
        Box::new(NullDevice::new())
    } else {
        Box::new(AlsaDevice::new(&settings.alsa_device))
    };
    let session = PlaybackSession::with_device(device);

    let mut events = session.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => info!(target: LOG_TARGET, ?event, "Session event"),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(target: LOG_TARGET, skipped, "Session event listener lagged")
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let server = IpcServer::bind(&settings.socket_path)?;
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let surface = Arc::new(SessionFacade::new(session.clone()));
    let server_task = tokio::spawn(server.serve(surface, shutdown_rx));
    info!(target: LOG_TARGET, socket = %settings.socket_path.display(), "koalad is running");

    tokio::signal::ctrl_c().await?;
    info!(target: LOG_TARGET, "Interrupt received, shutting down");
    if shutdown_tx.send(()).is_err() {
        debug!(target: LOG_TARGET, "Control server already stopped");
    }
    server_task.await??;

    tokio::task::spawn_blocking(move || session.shutdown()).await?;
    info!(target: LOG_TARGET, "Shutdown complete");
    Ok(())
}
