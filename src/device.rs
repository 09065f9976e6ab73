use std::time::Duration;

use bon::Builder;
use tokio::sync::mpsc;

use crate::classify::DriverModel;
use crate::radio::DeviceDescriptor;

/// Default interval between device metric polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Category of fitness equipment served by a driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum DeviceKind {
    #[display("treadmill")]
    Treadmill,
    #[display("bike")]
    Bike,
    #[display("rower")]
    Rower,
    #[display("unknown")]
    Unknown,
}

/// A metric sample reported by an active driver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricUpdate {
    /// Belt or wheel speed in km/h.
    Speed(f64),
    /// Running surface inclination in percent.
    Inclination(f64),
}

/// Events emitted by an active driver over its session channel.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceEvent {
    /// The device dropped its connection.
    Disconnected,
    /// A free-form diagnostic line from the driver.
    Debug(String),
    /// A fresh metric sample.
    Metric(MetricUpdate),
}

/// Runtime options shared by every driver.
#[derive(Debug, Clone, Builder)]
pub struct DriverConfig {
    /// Emit verbose driver diagnostics.
    #[builder(default)]
    verbose: bool,
    /// Skip resistance writes to the device.
    #[builder(default)]
    no_resistance_writes: bool,
    /// Skip the heart-rate service subscription.
    #[builder(default)]
    no_heart_service: bool,
    /// Interval between metric polls.
    #[builder(default = DEFAULT_POLL_INTERVAL)]
    poll_interval: Duration,
    /// Suppress driver console output.
    #[builder(default)]
    no_console: bool,
    /// Exercise resistance levels right after connecting.
    #[builder(default)]
    test_resistance: bool,
}

impl DriverConfig {
    #[must_use]
    pub fn verbose(&self) -> bool {
        self.verbose
    }

    #[must_use]
    pub fn no_resistance_writes(&self) -> bool {
        self.no_resistance_writes
    }

    #[must_use]
    pub fn no_heart_service(&self) -> bool {
        self.no_heart_service
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    #[must_use]
    pub fn no_console(&self) -> bool {
        self.no_console
    }

    #[must_use]
    pub fn test_resistance(&self) -> bool {
        self.test_resistance
    }
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// A vendor driver for one piece of fitness equipment.
pub trait FitnessDevice: Send {
    /// Equipment category served by this driver.
    fn kind(&self) -> DeviceKind;

    /// Most recent speed sample in km/h.
    fn current_speed(&self) -> f64;

    /// Most recent inclination sample in percent.
    fn current_inclination(&self) -> f64;

    /// Replays persisted metrics into a driver that has not connected yet.
    fn restore_metrics(&mut self, speed: f64, inclination: f64);

    /// Connects the driver to the device behind `descriptor`.
    ///
    /// Session traffic is reported through `events`; connection failures
    /// surface as [`DeviceEvent::Disconnected`] rather than an error.
    fn open(&mut self, descriptor: DeviceDescriptor, events: mpsc::Sender<DeviceEvent>);
}

/// Builds driver instances for classified devices.
pub trait DriverFactory: Send + Sync {
    /// Creates an unopened driver for `model`.
    fn build(&self, model: DriverModel, config: &DriverConfig) -> Box<dyn FitnessDevice>;
}
