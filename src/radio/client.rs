use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::RadioError;

pub(crate) const DESCRIPTOR_CHANNEL_CAPACITY: usize = 32;

/// Snapshot of one advertisement observed during a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    name: String,
    address: String,
    device_class: Option<u32>,
}

impl DeviceDescriptor {
    /// Creates a descriptor for a device advertising `name` at `address`.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        address: impl Into<String>,
        device_class: Option<u32>,
    ) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            device_class,
        }
    }

    /// Advertised device name; empty when the advertisement carried none.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Transport identifier of the peripheral.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Bluetooth class-of-device bits, when advertised.
    #[must_use]
    pub fn device_class(&self) -> Option<u32> {
        self.device_class
    }
}

/// A scanning transport reporting discovered devices over a channel.
///
/// Implementations report each device at most once per scan. The channel
/// returned by [`start_scan`](RadioClient::start_scan) closes when the
/// transport shuts down on its own.
#[async_trait]
pub trait RadioClient: Send {
    /// Starts an advertisement scan, replacing any scan already running.
    ///
    /// # Errors
    ///
    /// Returns an error if no adapter is available or the transport rejects
    /// the scan request.
    async fn start_scan(&mut self) -> Result<mpsc::Receiver<DeviceDescriptor>, RadioError>;

    /// Stops the running scan; a no-op when none is active.
    ///
    /// Once this returns, no further descriptors are queued on the channel
    /// handed out by the matching [`start_scan`](RadioClient::start_scan).
    ///
    /// # Errors
    ///
    /// Returns an error if the transport rejects the stop request.
    async fn stop_scan(&mut self) -> Result<(), RadioError>;
}
