use carecall::alert::{
    run_controller_loop, AlertController, AlertUpdate, ControllerEvent, IntervalTicker, LogChannel, OutputChannel, SysfsChannel,
    ALERT_BINDINGS, ALERT_KIND_COUNT, EVENT_QUEUE_CAPACITY,
};
use carecall::audio::{open_output_device, ClipTable, PlaybackOrchestrator};
use carecall::config::Settings;
use carecall::request::{spawn_source, ButtonPoller, RequestSource, SerialReader};
use carecall::ui::Cli;
use carecall::{init_app_dirs, init_tracing};
use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tokio::sync::{broadcast, mpsc};
use tracing::{info, warn};

const LOG_TARGET: &str = "carecall::main";

/// Restores the terminal when dropped.
struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> std::io::Result<Self> {
        crossterm::terminal::enable_raw_mode()?;
        Ok(RawModeGuard)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = crossterm::terminal::disable_raw_mode();
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::new();
    init_tracing(cli.args.log_json);

    let runtime = tokio::runtime::Runtime::new()?;
    let result = runtime.block_on(run(&cli));
    // Blocking stdin reads never return on their own; don't wait for them.
    runtime.shutdown_timeout(StdDuration::from_millis(200));

    if let Err(e) = result {
        cli.display_error(e.as_ref());
        std::process::exit(1);
    }
    Ok(())
}

fn build_channel(label: &str, path: Option<&Path>) -> Arc<dyn OutputChannel> {
    match path {
        Some(path) => Arc::new(SysfsChannel::new(label, path)),
        None => Arc::new(LogChannel::new(label)),
    }
}

async fn log_updates(mut updates: broadcast::Receiver<AlertUpdate>) {
    loop {
        match updates.recv().await {
            Ok(AlertUpdate::ModeChanged { from, to }) => info!(target: LOG_TARGET, "Mode {:?} -> {:?}", from, to),
            Ok(AlertUpdate::PlaybackStarted { clip, duration_ms }) => {
                info!(target: LOG_TARGET, "Speaking '{}' ({} ms)", clip, duration_ms)
            }
            Ok(AlertUpdate::PlaybackFinished { clip, outcome }) => {
                info!(target: LOG_TARGET, "Prompt '{}' finished: {:?}", clip, outcome)
            }
            Ok(AlertUpdate::PlaybackRejected { clip, error }) => warn!(target: LOG_TARGET, "Prompt '{}' skipped: {}", clip, error),
            Err(broadcast::error::RecvError::Lagged(n)) => warn!(target: LOG_TARGET, "Dropped {} diagnostic updates", n),
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

async fn run(cli: &Cli) -> Result<(), Box<dyn Error>> {
    let args = &cli.args;
    init_app_dirs()?;

    let config_path = args.config.clone().unwrap_or_else(Settings::default_path);
    let mut settings = Settings::load(&config_path)?;
    args.apply_to(&mut settings)?;
    settings.validate()?;
    info!(target: LOG_TARGET, "Configuration loaded from {}", config_path.display());

    let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    // --- Audio ---
    let clips = ClipTable::from_settings(&settings)?;
    let device = open_output_device(&settings)?;
    let playback = Arc::new(
        PlaybackOrchestrator::new(clips, device).with_timing(settings.playback_poll_interval(), settings.stall_grace()),
    );

    // --- Alert controller ---
    let channels: [Arc<dyn OutputChannel>; ALERT_KIND_COUNT] = std::array::from_fn(|channel| {
        let binding = &ALERT_BINDINGS[channel];
        build_channel(binding.label, settings.leds.get(binding.label).map(PathBuf::as_path))
    });
    let ticker = Arc::new(IntervalTicker::new(settings.tick_period(), events_tx.clone()));
    let controller = Arc::new(AlertController::new(channels, ticker).with_playback(playback, settings.repeat_ticks));
    tokio::spawn(log_updates(controller.subscribe()));

    // --- Request sources ---
    let mut sources: Vec<Box<dyn RequestSource>> = Vec::new();
    for binding in &ALERT_BINDINGS {
        if let Some(path) = settings.buttons.paths.get(binding.label) {
            sources.push(Box::new(ButtonPoller::new(binding.kind, path, settings.button_poll_interval())));
        }
    }

    let mut raw_guard = None;
    match &settings.serial_device {
        Some(path) => {
            let port = tokio::fs::File::open(path).await?;
            sources.push(Box::new(SerialReader::new(&path.display().to_string(), port)));
        }
        None => {
            if !args.no_raw {
                raw_guard = Some(RawModeGuard::enable()?);
            }
            let reader = SerialReader::new("stdin", tokio::io::stdin()).with_terminal_interrupt(raw_guard.is_some());
            sources.push(Box::new(reader));
        }
    }

    let handles: Vec<_> = sources
        .into_iter()
        .map(|source| spawn_source(source, events_tx.clone(), shutdown_tx.subscribe()))
        .collect();

    let signal_tx = events_tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = signal_tx.send(ControllerEvent::Shutdown).await;
        }
    });
    drop(events_tx);

    cli.display_banner(&settings);
    run_controller_loop(controller, events_rx).await;

    let _ = shutdown_tx.send(());
    for handle in handles {
        handle.abort();
    }
    drop(raw_guard);
    info!(target: LOG_TARGET, "carecall stopped.");
    Ok(())
}
