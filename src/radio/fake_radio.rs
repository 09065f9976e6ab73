use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use bon::Builder;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{DeviceDescriptor, RadioClient};
use crate::error::{FixtureError, RadioError};

/// Parsed fake scan fixture records.
#[derive(Debug, Clone, derive_more::Into)]
pub struct ScanFixture {
    devices: Vec<DeviceDescriptor>,
}

impl FromStr for ScanFixture {
    type Err = FixtureError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let devices = parse_scan_fixture(value)?;
        Ok(Self { devices })
    }
}

/// Settings for constructing a fake radio transport.
#[derive(Debug, Builder)]
pub struct FakeRadioConfig {
    scan_fixture: ScanFixture,
    #[builder(default)]
    discovery_delay: Duration,
    #[builder(default = true)]
    adapter_available: bool,
}

/// Fixture-driven radio used in tests and non-hardware environments.
#[derive(Debug)]
pub struct FakeRadio {
    devices: Vec<DeviceDescriptor>,
    discovery_delay: Duration,
    adapter_available: bool,
    scan: Option<RunningReplay>,
}

#[derive(Debug)]
struct RunningReplay {
    cancel: CancellationToken,
    replayer: JoinHandle<()>,
}

impl FakeRadio {
    /// Creates a fake radio from explicit settings.
    #[must_use]
    pub fn new(config: FakeRadioConfig) -> Self {
        Self {
            devices: config.scan_fixture.into(),
            discovery_delay: config.discovery_delay,
            adapter_available: config.adapter_available,
            scan: None,
        }
    }
}

#[async_trait]
impl RadioClient for FakeRadio {
    async fn start_scan(&mut self) -> Result<mpsc::Receiver<DeviceDescriptor>, RadioError> {
        if !self.adapter_available {
            return Err(RadioError::NoAdapters);
        }
        self.stop_scan().await?;

        let (descriptors, receiver) = mpsc::channel(super::DESCRIPTOR_CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();
        let replayer = tokio::spawn(replay_fixture(
            self.devices.clone(),
            self.discovery_delay,
            descriptors,
            cancel.clone(),
        ));
        self.scan = Some(RunningReplay { cancel, replayer });
        Ok(receiver)
    }

    async fn stop_scan(&mut self) -> Result<(), RadioError> {
        let Some(scan) = self.scan.take() else {
            return Ok(());
        };

        scan.cancel.cancel();
        if let Err(error) = scan.replayer.await {
            debug!(%error, "fixture replay task ended abnormally");
        }
        Ok(())
    }
}

async fn replay_fixture(
    devices: Vec<DeviceDescriptor>,
    discovery_delay: Duration,
    descriptors: mpsc::Sender<DeviceDescriptor>,
    cancel: CancellationToken,
) {
    let replay = async {
        if !discovery_delay.is_zero() {
            sleep(discovery_delay).await;
        }
        for descriptor in devices {
            if descriptors.send(descriptor).await.is_err() {
                return;
            }
        }
        // Replaying the fixture does not end the scan; hold the channel
        // open until the receiver goes away.
        descriptors.closed().await;
    };

    tokio::select! {
        () = cancel.cancelled() => {}
        () = replay => {}
    }
}

fn parse_scan_fixture(raw_fixture: &str) -> Result<Vec<DeviceDescriptor>, FixtureError> {
    if raw_fixture.trim().is_empty() {
        return Err(FixtureError::EmptyFixture);
    }

    raw_fixture
        .split(';')
        .map(parse_scan_record)
        .collect::<Result<Vec<_>, _>>()
}

fn parse_scan_record(raw_record: &str) -> Result<DeviceDescriptor, FixtureError> {
    let fields: Vec<&str> = raw_record.split('|').map(str::trim).collect();
    if fields.len() != 3 {
        return Err(FixtureError::InvalidRecordFieldCount);
    }
    if fields[0].is_empty() || fields[1].is_empty() || fields[2].is_empty() {
        return Err(FixtureError::EmptyRecordField);
    }

    let name = if fields[0] == "-" {
        String::new()
    } else {
        fields[0].to_string()
    };
    let device_class = if fields[2] == "-" {
        None
    } else {
        Some(fields[2].parse::<u32>()?)
    };

    Ok(DeviceDescriptor::new(
        name,
        fields[1].to_string(),
        device_class,
    ))
}
