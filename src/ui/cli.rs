//! Command-line interface implementation

use crate::config::Settings;
use crate::ipc::{Request, Response};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::error::Error;
use std::path::PathBuf;

/// Command-line arguments for koalad
#[derive(Parser, Debug)]
#[command(author, version, about = "Single-track audio playback daemon", long_about = None)]
pub struct Args {
    /// Config file path
    #[arg(short, long, env = "KOALAD_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Control socket path
    #[arg(short, long, env = "KOALAD_SOCKET", global = true)]
    pub socket: Option<PathBuf>,

    /// ALSA device to use
    #[arg(short = 'd', long = "device", env = "KOALAD_ALSA_DEVICE", global = true)]
    pub alsa_device: Option<String>,

    /// Discard audio instead of opening a sound device
    #[arg(long, global = true)]
    pub null_output: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Run the playback daemon (default)
    Serve,
    /// Play a file, replacing the current track
    Play { path: PathBuf },
    /// Change the gain by a delta; +1 doubles the amplitude
    Volume {
        #[arg(allow_negative_numbers = true)]
        delta: f64,
    },
    /// Pause or resume playback
    Toggle,
    /// Stop playback
    Stop,
    /// Show what is playing
    Status,
}

impl Args {
    /// The subcommand to run, `serve` when none was given.
    pub fn selected_command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Serve)
    }

    /// Applies command-line and environment overrides on top of file settings.
    pub fn apply_to(&self, settings: &mut Settings) {
        if let Some(device) = &self.alsa_device {
            settings.alsa_device = device.clone();
        }
        if let Some(socket) = &self.socket {
            settings.socket_path = socket.clone();
        }
        if self.null_output {
            settings.null_output = true;
        }
    }

    /// The control request for client subcommands, `None` for `serve`.
    pub fn request(&self) -> Option<Request> {
        match self.selected_command() {
            Command::Serve => None,
            Command::Play { path } => {
                // The daemon resolves paths against its own working directory.
                let path = if path.is_relative() {
                    std::env::current_dir().map(|cwd| cwd.join(&path)).unwrap_or(path)
                } else {
                    path
                };
                Some(Request::play_music(&path.to_string_lossy()))
            }
            Command::Volume { delta } => Some(Request::set_volume(delta)),
            Command::Toggle => Some(Request::pause_or_unpause()),
            Command::Stop => Some(Request::stop()),
            Command::Status => Some(Request::status()),
        }
    }
}

/// CLI user interface for the client subcommands
pub struct Cli {
    pub args: Args,
}

impl Cli {
    /// Create a new CLI instance
    pub fn new() -> Self {
        Cli { args: Args::parse() }
    }

    /// Formats a daemon response for the terminal.
    pub fn format_response(response: &Response) -> String {
        match response.clone().into_result() {
            Ok(data) => {
                let message = data
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("ok")
                    .to_string();
                match data.get("status").or_else(|| data.get("track")) {
                    Some(detail) => match serde_json::to_string_pretty(detail) {
                        Ok(detail) => format!("{}\n{}", message, detail),
                        Err(_) => message,
                    },
                    None => message,
                }
            }
            Err(fault) => format!("Error: {}", fault.message),
        }
    }

    /// Display a daemon response
    pub fn display_response(&self, response: &Response) {
        if response.is_ok() {
            println!("{}", Self::format_response(response));
        } else {
            eprintln!("{}", Self::format_response(response));
        }
    }

    /// Display error messages
    pub fn display_error(&self, error: &dyn Error) {
        eprintln!("Error: {}", error);
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self::new()
    }
}
