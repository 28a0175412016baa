//! FsBridge headless host
//!
//! Plays the part of the UI layer: reads calls and platform events as JSON
//! lines on stdin, drives the UI loop, and writes one response line per call
//! on stdout. Logs go to stderr.

mod protocol;

use clap::{Parser, ValueEnum};
use fsbridge_core::capability::PermissionResult;
use fsbridge_core::config::ConsentMode;
use fsbridge_core::{
    Bridge, BridgeConfig, Capabilities, LocalDocumentProvider, LocalShellBroker, LoggingPicker,
    Request, SlotPolicy, StaticBroadAccess, UiLoop,
};
use protocol::{HostEvent, InputLine};
use serde_json::Value;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "fsbridge")]
#[command(about = "Line-oriented host for the FsBridge access dispatcher.", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (defaults to <config_dir>/fsbridge/config.json)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Platform API level to emulate
    #[arg(long, value_name = "LEVEL")]
    sdk_level: Option<u32>,

    /// How the local broker answers permission requests
    #[arg(long, value_enum)]
    consent: Option<Consent>,

    /// Policy for a second flow while one is pending
    #[arg(long, value_enum)]
    policy: Option<Policy>,

    /// Start with broad file access granted
    #[arg(long)]
    all_files: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Consent {
    Grant,
    Deny,
    Prompt,
}

impl From<Consent> for ConsentMode {
    fn from(consent: Consent) -> Self {
        match consent {
            Consent::Grant => ConsentMode::Grant,
            Consent::Deny => ConsentMode::Deny,
            Consent::Prompt => ConsentMode::Prompt,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Policy {
    RejectBusy,
    ReplaceLatest,
}

impl From<Policy> for SlotPolicy {
    fn from(policy: Policy) -> Self {
        match policy {
            Policy::RejectBusy => SlotPolicy::RejectBusy,
            Policy::ReplaceLatest => SlotPolicy::ReplaceLatest,
        }
    }
}

impl Cli {
    fn load_config(&self) -> anyhow::Result<BridgeConfig> {
        let mut config = match &self.config {
            Some(path) => BridgeConfig::load(path)?,
            None => BridgeConfig::load_or_default()?,
        };

        if let Some(level) = self.sdk_level {
            config.platform.sdk_level = level;
        }
        if let Some(consent) = self.consent {
            config.broker.consent = consent.into();
        }
        if let Some(policy) = self.policy {
            config.flows.policy = policy.into();
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs on stderr; stdout carries responses only
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = cli.load_config()?;

    let documents = config.documents.volumes.iter().fold(
        LocalDocumentProvider::new(config.documents.authority.clone()),
        |provider, (id, root)| provider.with_volume(id.clone(), root.clone()),
    );
    for volume in config.documents.volumes.keys() {
        info!("Volume {} available as {}", volume, documents.volume_tree(volume));
    }

    let broker = Arc::new(LocalShellBroker::from_config(&config.broker));
    let mut permission_rx = broker.subscribe();

    let capabilities = Capabilities {
        documents: Arc::new(documents),
        picker: Arc::new(LoggingPicker::new()),
        gate: Arc::new(StaticBroadAccess::new(cli.all_files)),
        broker: broker.clone(),
    };

    let mut ui = UiLoop::new();
    let bridge = Bridge::new(&config, capabilities, ui.handle())?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) => handle_line(&bridge, &line),
                None => break,
            },
            Some(result) = permission_rx.recv() => forward_permission(&bridge, result),
            _ = ui.turn() => {}
        }
    }

    info!("Input closed, waiting for {} running operations", bridge.in_flight());
    drain(&bridge, &mut ui, &mut permission_rx).await;

    bridge.shutdown();
    broker.unsubscribe();
    ui.run_pending();

    Ok(())
}

/// Keep the UI loop turning until no worker job is left
async fn drain(
    bridge: &Bridge,
    ui: &mut UiLoop,
    permission_rx: &mut mpsc::UnboundedReceiver<PermissionResult>,
) {
    while bridge.in_flight() > 0 {
        tokio::select! {
            Some(result) = permission_rx.recv() => forward_permission(bridge, result),
            _ = ui.turn() => {}
            _ = tokio::time::sleep(Duration::from_millis(20)) => {}
        }
    }
    // Resolutions posted by the last jobs
    ui.run_pending();
}

fn forward_permission(bridge: &Bridge, result: PermissionResult) {
    if !bridge.complete_privileged_permission(result.request_code, result.granted) {
        debug!("Broker answer {:?} had no taker", result);
    }
}

fn handle_line(bridge: &Bridge, line: &str) {
    let line = line.trim();
    if line.is_empty() {
        return;
    }

    match protocol::parse_line(line) {
        Ok(InputLine::Call { id, method, args }) => {
            bridge.dispatch(Request { method, args }, move |outcome| {
                emit(&protocol::render_response(id, &outcome));
            });
        }
        Ok(InputLine::Event(event)) => handle_event(bridge, event),
        Err(e) => {
            warn!("Unparseable input line: {}", e);
            emit(&protocol::render_parse_error(&e));
        }
    }
}

fn handle_event(bridge: &Bridge, event: HostEvent) {
    let delivered = match event {
        HostEvent::BrokerPermission {
            request_code,
            granted,
        } => bridge.complete_privileged_permission(request_code, granted),
        picker => match picker.picker_outcome() {
            Some(outcome) => bridge.complete_directory_grant(outcome),
            None => false,
        },
    };

    if !delivered {
        debug!("Event had no pending flow to complete");
    }
}

fn emit(value: &Value) {
    let mut stdout = std::io::stdout().lock();
    let written = writeln!(stdout, "{}", value).and_then(|_| stdout.flush());
    if let Err(e) = written {
        warn!("Failed to write response: {}", e);
    }
}
