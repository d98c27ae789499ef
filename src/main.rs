//! kiosk - single-app lock
//!
//! Runs the enforcement core against the desktop session, either driven by a
//! control channel on stdin/stdout or resumed straight from a boot signal.

use clap::{Parser, Subcommand};
use kiosk_lib::config::KioskConfig;
use kiosk_lib::constants::{
    ACTION_BOOT_COMPLETED, DEFAULT_EXIT_PIN, DEFAULT_OWN_PACKAGE, DEFAULT_USAGE_WINDOW_SECS,
};
use kiosk_lib::db::with_connection;
use kiosk_lib::enforcement::Cadence;
use kiosk_lib::error::KioskError;
use kiosk_lib::events::{BootSignal, KioskEvent};
use kiosk_lib::host::{Collaborators, ControlHost, QueuedNotifier, Supervisor};
use kiosk_lib::models::TargetAppSelection;
use kiosk_lib::platform::{DesktopElevation, NativeLauncher, NativeUsageStats, Notice, Notifier};
use kiosk_lib::{default_db_path, open_database};
use log::{debug, error, info, warn};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "kiosk")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the preferences database (defaults to the user data directory)
    #[arg(long, env = "KIOSK_DB", global = true)]
    db: Option<PathBuf>,

    /// Credential that unlocks the kiosk
    #[arg(long, env = "KIOSK_PIN", default_value = DEFAULT_EXIT_PIN, global = true, hide_env_values = true)]
    pin: String,

    /// Enforcement tick interval in milliseconds
    #[arg(long, env = "KIOSK_TICK_MS", default_value_t = 1000, global = true)]
    tick_ms: u64,

    /// Trailing usage window in seconds
    #[arg(long, env = "KIOSK_WINDOW_SECS", default_value_t = DEFAULT_USAGE_WINDOW_SECS, global = true)]
    window_secs: u64,

    /// Identifier this app runs under; never offered as a target
    #[arg(long, default_value = DEFAULT_OWN_PACKAGE, global = true)]
    package: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve the framed JSON control channel on stdin/stdout
    Host,

    /// Handle a boot broadcast and resume enforcement of the saved target
    Boot {
        /// Broadcast action that triggered the start
        #[arg(long, default_value = ACTION_BOOT_COMPLETED)]
        action: String,

        /// Keep serving the control channel after resuming
        #[arg(long)]
        serve: bool,
    },

    /// Print the saved target app
    ShowTarget,
}

impl Cli {
    fn config(&self) -> Result<KioskConfig, KioskError> {
        let config = KioskConfig {
            own_package: self.package.clone(),
            exit_pin: self.pin.clone(),
            tick_interval: Duration::from_millis(self.tick_ms),
            usage_window_secs: self.window_secs,
            ..KioskConfig::default()
        };
        config.validate()?;
        Ok(config)
    }
}

/// Surfaces notices in the log when no control channel is attached.
struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notice: Notice) {
        warn!("Notice: {notice:?}");
    }
}

fn build_supervisor(
    config: KioskConfig,
    db: Arc<Mutex<kiosk_lib::db::Database>>,
    notifier: Arc<dyn Notifier>,
) -> Supervisor {
    let cadence = Cadence::Every(config.tick_interval);
    let collaborators = Collaborators {
        usage_stats: Arc::new(NativeUsageStats::new()),
        launcher: Arc::new(NativeLauncher::new()),
        elevation: Arc::new(DesktopElevation),
        notifier,
    };
    Supervisor::new(config, db, collaborators, cadence)
}

fn serve(supervisor: Supervisor, notices: Arc<QueuedNotifier>) -> Result<(), KioskError> {
    let stdin = io::stdin().lock();
    let stdout = io::stdout().lock();
    let mut host = ControlHost::new(stdin, stdout, supervisor, notices);
    host.run()
}

fn run(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = cli.config()?;
    let db_path = match &cli.db {
        Some(path) => path.clone(),
        None => default_db_path()?,
    };
    debug!("Using database {}", db_path.display());
    let db = Arc::new(Mutex::new(open_database(&db_path)?));

    match &cli.command {
        Commands::Host => {
            let notices = Arc::new(QueuedNotifier::default());
            let supervisor = build_supervisor(config, db, Arc::<QueuedNotifier>::clone(&notices));
            serve(supervisor, notices)?;
        }
        Commands::Boot { action, serve: keep_serving } => {
            let Some(signal) = BootSignal::from_action(action) else {
                info!("'{action}' is not a boot signal, nothing to do");
                return Ok(());
            };

            if *keep_serving {
                let notices = Arc::new(QueuedNotifier::default());
                let mut supervisor = build_supervisor(config, db, Arc::<QueuedNotifier>::clone(&notices));
                supervisor.dispatch(KioskEvent::Boot(signal))?;
                serve(supervisor, notices)?;
            } else {
                let mut supervisor = build_supervisor(config, db, Arc::new(LogNotifier));
                supervisor.dispatch(KioskEvent::Boot(signal))?;
                info!("Kiosk resumed, enforcing until killed");
                loop {
                    std::thread::park();
                }
            }
        }
        Commands::ShowTarget => {
            let selection = with_connection(&db, "load target selection", TargetAppSelection::load)?;
            let mut out = io::stdout().lock();
            match selection.package {
                Some(package) => writeln!(out, "{package}")?,
                None => writeln!(out, "(no target selected)")?,
            }
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("kiosk: {e}");
            ExitCode::FAILURE
        }
    }
}
