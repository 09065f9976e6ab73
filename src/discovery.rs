use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::classify::{DiscoveryFilter, DriverModel, classify};
use crate::device::DeviceKind;
use crate::radio::{DeviceDescriptor, RadioClient};

/// Lifecycle of the discovery scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum DiscoveryState {
    /// No scan is running; the radio was unavailable or never started.
    #[display("idle")]
    Idle,
    /// A scan is running and descriptors are flowing.
    #[display("scanning")]
    Scanning,
    /// A device was matched; the scan is stopped until a restart.
    #[display("matched")]
    Matched,
    /// Discovery was shut down.
    #[display("stopped")]
    Stopped,
}

/// A classified device committed for adoption.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceMatch {
    model: DriverModel,
    descriptor: DeviceDescriptor,
}

impl DeviceMatch {
    /// Creates a match binding `model` to the device behind `descriptor`.
    #[must_use]
    pub fn new(model: DriverModel, descriptor: DeviceDescriptor) -> Self {
        Self { model, descriptor }
    }

    /// Vendor driver selected for the device.
    #[must_use]
    pub fn model(&self) -> DriverModel {
        self.model
    }

    /// Equipment category of the matched device.
    #[must_use]
    pub fn kind(&self) -> DeviceKind {
        self.model.kind()
    }

    /// Advertisement snapshot the match was made from.
    #[must_use]
    pub fn descriptor(&self) -> &DeviceDescriptor {
        &self.descriptor
    }
}

/// Drives the scan lifecycle from idle through match to stop.
///
/// The manager owns the radio transport. At most one scan runs at a time,
/// and the first classified device wins: its match is committed and the
/// scan stops before any driver is built.
pub struct DiscoveryManager {
    radio: Box<dyn RadioClient>,
    filter: DiscoveryFilter,
    state: DiscoveryState,
    descriptors: Option<mpsc::Receiver<DeviceDescriptor>>,
}

impl DiscoveryManager {
    /// Creates a manager scanning through `radio` and admitting devices per
    /// `filter`.
    #[must_use]
    pub fn new(radio: Box<dyn RadioClient>, filter: DiscoveryFilter) -> Self {
        Self {
            radio,
            filter,
            state: DiscoveryState::Idle,
            descriptors: None,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> DiscoveryState {
        self.state
    }

    /// Whether a scan is running right now.
    #[must_use]
    pub fn is_scanning(&self) -> bool {
        self.state == DiscoveryState::Scanning
    }

    /// Starts a scan unless one is already running or a match is held.
    ///
    /// A radio failure leaves the manager idle; discovery degrades rather
    /// than failing the caller.
    pub async fn start(&mut self) {
        if matches!(
            self.state,
            DiscoveryState::Scanning | DiscoveryState::Matched
        ) {
            debug!(state = %self.state, "discovery already engaged");
            return;
        }
        self.begin_scan().await;
    }

    /// Resumes scanning after a session ended; a no-op while already
    /// scanning.
    pub async fn restart(&mut self) {
        if self.state == DiscoveryState::Scanning {
            return;
        }
        self.begin_scan().await;
    }

    /// Waits for the next advertisement from the running scan.
    ///
    /// Returns `None` when no scan is running or the radio closed its
    /// discovery channel.
    pub async fn next_descriptor(&mut self) -> Option<DeviceDescriptor> {
        match &mut self.descriptors {
            Some(descriptors) => descriptors.recv().await,
            None => None,
        }
    }

    /// Classifies an advertisement and commits the first match.
    ///
    /// On a match the scan stops and the manager holds the match until
    /// [`restart`](Self::restart). Advertisements observed outside the
    /// scanning state are ignored.
    pub async fn on_device_discovered(
        &mut self,
        descriptor: &DeviceDescriptor,
    ) -> Option<DeviceMatch> {
        if self.state != DiscoveryState::Scanning {
            debug!(state = %self.state, "ignoring advertisement outside scanning");
            return None;
        }

        let model = classify(descriptor.name(), &self.filter)?;
        info!(name = descriptor.name(), %model, "matched supported device");
        self.descriptors = None;
        self.state = DiscoveryState::Matched;
        if let Err(error) = self.radio.stop_scan().await {
            debug!(%error, "failed to stop radio scan cleanly");
        }
        Some(DeviceMatch::new(model, descriptor.clone()))
    }

    /// Shuts discovery down for good.
    pub async fn stop(&mut self) {
        if self.state == DiscoveryState::Stopped {
            return;
        }

        self.descriptors = None;
        self.state = DiscoveryState::Stopped;
        if let Err(error) = self.radio.stop_scan().await {
            debug!(%error, "failed to stop radio scan cleanly");
        }
    }

    async fn begin_scan(&mut self) {
        match self.radio.start_scan().await {
            Ok(descriptors) => {
                self.descriptors = Some(descriptors);
                self.state = DiscoveryState::Scanning;
            }
            Err(error) => {
                warn!(%error, "bluetooth discovery is unavailable");
                self.descriptors = None;
                self.state = DiscoveryState::Idle;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::radio::{FakeRadio, FakeRadioConfig};

    fn manager(fixture: &str, filter: DiscoveryFilter) -> DiscoveryManager {
        let config = FakeRadioConfig::builder()
            .scan_fixture(fixture.parse().expect("fixture should parse"))
            .build();
        DiscoveryManager::new(Box::new(FakeRadio::new(config)), filter)
    }

    #[tokio::test]
    async fn start_enters_scanning_and_streams_descriptors() {
        let mut discovery = manager("JBL Flip|11:22:33:44:55|-", DiscoveryFilter::any());

        discovery.start().await;

        assert_eq!(DiscoveryState::Scanning, discovery.state());
        let descriptor = discovery
            .next_descriptor()
            .await
            .expect("fixture descriptor should arrive");
        assert_eq!("JBL Flip", descriptor.name());
    }

    #[tokio::test]
    async fn unavailable_radio_leaves_discovery_idle() {
        let config = FakeRadioConfig::builder()
            .scan_fixture("JBL Flip|11:22:33:44:55|-".parse().expect("fixture should parse"))
            .adapter_available(false)
            .build();
        let mut discovery =
            DiscoveryManager::new(Box::new(FakeRadio::new(config)), DiscoveryFilter::any());

        discovery.start().await;

        assert_eq!(DiscoveryState::Idle, discovery.state());
        assert_eq!(None, discovery.next_descriptor().await);
    }

    #[tokio::test]
    async fn first_match_commits_and_stops_the_scan() {
        let mut discovery = manager(
            "JBL Flip|11:22:33:44:55|-;Domyos Treadmill|AA:BB:CC:DD:EE|1796",
            DiscoveryFilter::any(),
        );
        discovery.start().await;

        let unsupported = discovery
            .next_descriptor()
            .await
            .expect("first descriptor should arrive");
        assert_eq!(None, discovery.on_device_discovered(&unsupported).await);
        assert_eq!(DiscoveryState::Scanning, discovery.state());

        let supported = discovery
            .next_descriptor()
            .await
            .expect("second descriptor should arrive");
        let matched = discovery
            .on_device_discovered(&supported)
            .await
            .expect("treadmill should match");

        assert_eq!(DriverModel::DomyosTreadmill, matched.model());
        assert_eq!(DeviceKind::Treadmill, matched.kind());
        assert_eq!("AA:BB:CC:DD:EE", matched.descriptor().address());
        assert_eq!(DiscoveryState::Matched, discovery.state());
        assert_eq!(None, discovery.next_descriptor().await);
    }

    #[tokio::test]
    async fn descriptors_outside_scanning_are_ignored() {
        let mut discovery = manager("Domyos Treadmill|AA:BB:CC:DD:EE|-", DiscoveryFilter::any());
        discovery.start().await;
        let descriptor = discovery
            .next_descriptor()
            .await
            .expect("descriptor should arrive");
        discovery
            .on_device_discovered(&descriptor)
            .await
            .expect("treadmill should match");

        assert_eq!(None, discovery.on_device_discovered(&descriptor).await);
    }

    #[tokio::test]
    async fn restart_after_a_match_rescans_from_the_top() {
        let mut discovery = manager("Domyos Treadmill|AA:BB:CC:DD:EE|-", DiscoveryFilter::any());
        discovery.start().await;
        let descriptor = discovery
            .next_descriptor()
            .await
            .expect("descriptor should arrive");
        discovery
            .on_device_discovered(&descriptor)
            .await
            .expect("treadmill should match");

        discovery.restart().await;

        assert_eq!(DiscoveryState::Scanning, discovery.state());
        let replayed = discovery
            .next_descriptor()
            .await
            .expect("restarted scan should replay the fixture");
        assert_eq!("Domyos Treadmill", replayed.name());
    }

    #[tokio::test]
    async fn stop_silences_discovery() {
        let mut discovery = manager("Domyos Treadmill|AA:BB:CC:DD:EE|-", DiscoveryFilter::any());
        discovery.start().await;

        discovery.stop().await;

        assert_eq!(DiscoveryState::Stopped, discovery.state());
        assert_eq!(None, discovery.next_descriptor().await);
        let descriptor = DeviceDescriptor::new("Domyos Treadmill", "AA:BB:CC:DD:EE", None);
        assert_eq!(None, discovery.on_device_discovered(&descriptor).await);
    }

    #[tokio::test]
    async fn exact_name_filter_overrides_vendor_prefixes() {
        let mut discovery = manager(
            "TOORX|11:22:33:44:55|-;TOORX Special|AA:BB:CC:DD:EE|-",
            DiscoveryFilter::exact_name("TOORX Special"),
        );
        discovery.start().await;

        let filtered_out = discovery
            .next_descriptor()
            .await
            .expect("first descriptor should arrive");
        assert_eq!(None, discovery.on_device_discovered(&filtered_out).await);

        let admitted = discovery
            .next_descriptor()
            .await
            .expect("second descriptor should arrive");
        let matched = discovery
            .on_device_discovered(&admitted)
            .await
            .expect("filtered name should match");
        assert_eq!(DriverModel::TrxAppGateUsbTreadmill, matched.model());
    }
}
