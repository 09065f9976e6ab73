use std::io;
use std::path::{Path, PathBuf};

use anyhow::Result;
use bon::Builder;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::classify::DiscoveryFilter;
use crate::cli::FakeArgs;
use crate::device::{DeviceEvent, DriverConfig, DriverFactory, MetricUpdate};
use crate::discovery::DiscoveryManager;
use crate::radio::{BtleplugRadio, DeviceDescriptor, FakeRadio, FakeRadioConfig, RadioClient};
use crate::scripted::{DriverScript, ScriptedDriverFactory};
use crate::session::SessionController;
use crate::signal::SignalHandler;
use crate::state_file::StateFile;
use crate::telemetry;

const SERVICE_NAME: &str = "gymlink";

/// Creates a radio client backed by the real BLE transport.
#[must_use]
pub fn real_radio_client() -> Box<dyn RadioClient> {
    Box::new(BtleplugRadio::new())
}

/// Creates a radio client that replays fake scan fixtures.
#[must_use]
pub fn fake_radio_client(config: FakeRadioConfig) -> Box<dyn RadioClient> {
    info!("using fake radio transport");
    Box::new(FakeRadio::new(config))
}

/// Creates a driver factory whose drivers replay a fixture script.
#[must_use]
pub fn scripted_driver_factory(script: DriverScript) -> Box<dyn DriverFactory> {
    Box::new(ScriptedDriverFactory::new(script))
}

/// Creates the radio and driver factory pair for fake mode.
#[must_use]
pub fn fake_backends(fake_args: FakeArgs) -> (Box<dyn RadioClient>, Box<dyn DriverFactory>) {
    let (radio_config, driver_script) = fake_args.into_backend_configs();
    (
        fake_radio_client(radio_config),
        scripted_driver_factory(driver_script),
    )
}

/// Events raised towards external observers while the bridge runs.
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeEvent {
    /// An advertisement was observed, matching or not.
    DeviceFound {
        /// Advertised device name; may be empty.
        name: String,
    },
    /// A classified device was adopted and its driver opened.
    DeviceConnected,
    /// The active driver reported a new speed in km/h.
    SpeedChanged(f64),
    /// The active driver reported a new inclination in percent.
    InclinationChanged(f64),
}

/// Why the bridge loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum StopReason {
    /// The shutdown token fired, normally after Ctrl-C.
    #[display("interrupted")]
    Interrupted,
    /// The radio closed its discovery stream while a scan was running.
    #[display("radio closed")]
    RadioClosed,
}

/// Final counters for one bridge run.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
#[display(
    "devices found: {devices_found}, sessions completed: {sessions_completed}, \
     stopped: {stop_reason}"
)]
pub struct BridgeSummary {
    devices_found: usize,
    sessions_completed: usize,
    stop_reason: StopReason,
}

impl BridgeSummary {
    /// Count of advertisements observed, matched or not.
    #[must_use]
    pub fn devices_found(&self) -> usize {
        self.devices_found
    }

    /// Count of sessions that ended with a device disconnect.
    #[must_use]
    pub fn sessions_completed(&self) -> usize {
        self.sessions_completed
    }

    /// Why the bridge loop ended.
    #[must_use]
    pub fn stop_reason(&self) -> StopReason {
        self.stop_reason
    }
}

/// Settings for assembling a bridge.
#[derive(Debug, Builder)]
pub struct BridgeSettings {
    /// Restricts discovery to one advertised device name.
    #[builder(default)]
    filter: DiscoveryFilter,
    /// Options handed to every driver.
    #[builder(default)]
    driver_config: DriverConfig,
    /// Location of the persisted session-state document.
    #[builder(default = StateFile::default_path())]
    state_file: PathBuf,
}

impl BridgeSettings {
    /// Discovery filter in effect.
    #[must_use]
    pub fn filter(&self) -> &DiscoveryFilter {
        &self.filter
    }

    /// Options handed to every driver.
    #[must_use]
    pub fn driver_config(&self) -> &DriverConfig {
        &self.driver_config
    }

    /// Location of the persisted session-state document.
    #[must_use]
    pub fn state_file(&self) -> &Path {
        &self.state_file
    }
}

/// Orchestrates discovery, driver sessions, and interrupt cleanup.
///
/// The bridge reacts to one event at a time: scan results while scanning,
/// driver events while a session is active, and shutdown whenever it fires.
pub struct Bridge {
    discovery: DiscoveryManager,
    session: SessionController,
    signal: SignalHandler,
    shutdown: CancellationToken,
    events: Option<mpsc::UnboundedSender<BridgeEvent>>,
    devices_found: usize,
    sessions_completed: usize,
}

enum BridgeStep {
    Discovered(Option<DeviceDescriptor>),
    DriverEvent(Option<DeviceEvent>),
    Shutdown,
}

impl Bridge {
    /// Creates a bridge from a radio transport, a driver factory, and
    /// settings.
    ///
    /// ```
    /// let settings = gymlink::BridgeSettings::builder().build();
    /// let bridge = gymlink::Bridge::new(
    ///     gymlink::real_radio_client(),
    ///     gymlink::scripted_driver_factory(gymlink::DriverScript::default()),
    ///     settings,
    /// );
    /// let _ = bridge;
    /// ```
    #[must_use]
    pub fn new(
        radio: Box<dyn RadioClient>,
        factory: Box<dyn DriverFactory>,
        settings: BridgeSettings,
    ) -> Self {
        let state_file = StateFile::new(settings.state_file);
        Self {
            discovery: DiscoveryManager::new(radio, settings.filter),
            session: SessionController::new(factory, settings.driver_config, state_file.clone()),
            signal: SignalHandler::new(state_file),
            shutdown: CancellationToken::new(),
            events: None,
            devices_found: 0,
            sessions_completed: 0,
        }
    }

    /// Replaces the shutdown token, linking the bridge to an external
    /// trigger.
    #[must_use]
    pub fn with_shutdown_token(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Token that stops the bridge when cancelled.
    #[must_use]
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Subscribes to bridge events, replacing any previous subscriber.
    pub fn event_stream(&mut self) -> mpsc::UnboundedReceiver<BridgeEvent> {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.events = Some(sender);
        receiver
    }

    /// Runs discovery and driver sessions until interrupted or the radio
    /// closes its discovery stream.
    #[instrument(skip(self), level = "info")]
    pub async fn run(mut self) -> BridgeSummary {
        self.discovery.start().await;

        let stop_reason = loop {
            let step = tokio::select! {
                maybe_descriptor = self.discovery.next_descriptor(),
                    if self.discovery.is_scanning() =>
                {
                    BridgeStep::Discovered(maybe_descriptor)
                }
                maybe_event = self.session.next_event(), if self.session.is_active() => {
                    BridgeStep::DriverEvent(maybe_event)
                }
                () = self.shutdown.cancelled() => BridgeStep::Shutdown,
            };

            match step {
                BridgeStep::Discovered(Some(descriptor)) => {
                    self.handle_discovery(&descriptor).await;
                }
                BridgeStep::Discovered(None) => break StopReason::RadioClosed,
                BridgeStep::DriverEvent(Some(event)) => self.handle_driver_event(event).await,
                BridgeStep::DriverEvent(None) => self.end_session().await,
                BridgeStep::Shutdown => {
                    self.signal.on_interrupt();
                    break StopReason::Interrupted;
                }
            }
        };

        self.session.release();
        self.discovery.stop().await;
        info!(%stop_reason, "bridge stopped");

        BridgeSummary {
            devices_found: self.devices_found,
            sessions_completed: self.sessions_completed,
            stop_reason,
        }
    }

    async fn handle_discovery(&mut self, descriptor: &DeviceDescriptor) {
        self.devices_found += 1;
        debug!(
            name = descriptor.name(),
            address = descriptor.address(),
            "device advertisement observed"
        );
        self.emit(BridgeEvent::DeviceFound {
            name: descriptor.name().to_string(),
        });

        if let Some(device_match) = self.discovery.on_device_discovered(descriptor).await {
            self.session.adopt(&device_match);
            self.emit(BridgeEvent::DeviceConnected);
        }
    }

    async fn handle_driver_event(&mut self, event: DeviceEvent) {
        match event {
            DeviceEvent::Disconnected => {
                info!("device disconnected");
                self.end_session().await;
            }
            DeviceEvent::Debug(text) => debug!(driver_message = %text, "driver diagnostic"),
            DeviceEvent::Metric(update) => {
                self.session.record_metric(update);
                match update {
                    MetricUpdate::Speed(value) => self.emit(BridgeEvent::SpeedChanged(value)),
                    MetricUpdate::Inclination(value) => {
                        self.emit(BridgeEvent::InclinationChanged(value));
                    }
                }
            }
        }
    }

    async fn end_session(&mut self) {
        if self.session.release() {
            self.sessions_completed += 1;
        }
        self.discovery.restart().await;
    }

    fn emit(&self, event: BridgeEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }
}

/// Runs the equipment bridge until it stops, then writes a one-line summary.
///
/// ```
/// # async fn run() -> anyhow::Result<()> {
/// use clap::Parser;
///
/// let args = gymlink::Args::try_parse_from([
///     "gymlink",
///     "--fake",
///     "--fake-scan",
///     "Domyos Treadmill|AA:BB:CC:DD:EE|1796",
///     "--fake-driver",
///     "speed:12.5,disconnect",
/// ])?;
/// let (settings, maybe_fake_args) = args.into_settings_and_backends()?;
/// let (radio, factory) = match maybe_fake_args {
///     Some(fake_args) => gymlink::fake_backends(fake_args),
///     None => (
///         gymlink::real_radio_client(),
///         gymlink::scripted_driver_factory(gymlink::DriverScript::default()),
///     ),
/// };
/// let shutdown = tokio_util::sync::CancellationToken::new();
/// shutdown.cancel();
/// let mut out = Vec::new();
/// gymlink::run(settings, &mut out, radio, factory, shutdown).await?;
/// # Ok(())
/// # }
/// ```
///
/// # Errors
///
/// Returns an error if tracing initialisation fails or output writing fails.
pub async fn run<W>(
    settings: BridgeSettings,
    out: &mut W,
    radio: Box<dyn RadioClient>,
    factory: Box<dyn DriverFactory>,
    shutdown: CancellationToken,
) -> Result<BridgeSummary>
where
    W: io::Write,
{
    telemetry::initialise_tracing(SERVICE_NAME, settings.driver_config.verbose())?;

    let bridge = Bridge::new(radio, factory, settings).with_shutdown_token(shutdown);
    let summary = bridge.run().await;
    writeln!(out, "{summary}")?;
    Ok(summary)
}
