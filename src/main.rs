mod app;
mod backend;
mod config;
mod error;
mod model;
mod util;

use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};

use app::App;

/// Switch the foreground full-screen application (Kodi, EmulationStation,
/// desktop) on a single-user appliance.
#[derive(Debug, Parser)]
#[command(name = "frontend-switch", version, about)]
struct Cli {
    /// Configuration file
    #[arg(long, global = true, env = "FRONTEND_SWITCH_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Stop every conflicting front-end, then start APP
    Switch {
        app: String,
        /// Also start APP on the next console login
        #[arg(long)]
        boot: bool,
    },
    /// Stop a single service
    Stop { service: String },
    /// Start a single service
    Start { service: String },
    /// Choose the application started at console login
    SetBootApp {
        #[arg(required_unless_present = "none")]
        app: Option<String>,
        /// Remove the autostart entry instead
        #[arg(long, conflicts_with = "app")]
        none: bool,
    },
    /// List switchable applications
    List,
    /// Show which front-ends appear to be running
    Status,
    /// Install sudoers entry, shortcuts, RetroPie ports and autostart
    Setup {
        #[arg(long)]
        boot_app: Option<String>,
    },
    /// Manage the desktop shortcut of an application
    Shortcut {
        #[command(subcommand)]
        action: ShortcutAction,
    },
    /// Finish a switch handed off by a process leaving the desktop session
    #[command(hide = true)]
    Resume {
        #[arg(long)]
        start: String,
        #[arg(long)]
        stop: Vec<String>,
    },
}

#[derive(Debug, Subcommand)]
enum ShortcutAction {
    Install { app: String },
    Remove { app: String },
}

/// `frontend-switch kodi` is accepted as `frontend-switch switch kodi`.
fn normalize_args(mut args: Vec<String>) -> Vec<String> {
    if args.len() == 2 {
        let arg = &args[1];
        let is_command = arg == "help" || Cli::command().find_subcommand(arg).is_some();
        if !arg.starts_with('-') && !is_command {
            args.insert(1, "switch".to_string());
        }
    }
    args
}

fn run(app: &App, command: Command) -> bool {
    match command {
        Command::Switch { app: id, boot } => app.switch(&id, boot),
        Command::Stop { service } => app.stop_service(&service),
        Command::Start { service } => app.start_service(&service),
        Command::SetBootApp { app: id, .. } => app.set_boot_app(id.as_deref()),
        Command::List => app.list(),
        Command::Status => app.status(),
        Command::Setup { boot_app } => app.setup(boot_app.as_deref()),
        Command::Shortcut { action } => match action {
            ShortcutAction::Install { app: id } => app.install_shortcut(&id),
            ShortcutAction::Remove { app: id } => app.remove_shortcut(&id),
        },
        Command::Resume { start, stop } => app.resume(start, stop),
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse_from(normalize_args(std::env::args().collect()));

    let app = match App::new(cli.config) {
        Ok(app) => app,
        Err(e) => {
            log::error!("{}", e);
            std::process::exit(1);
        }
    };

    std::process::exit(if run(&app, cli.command) { 0 } else { 1 });
}
