use std::collections::HashSet;
use std::pin::Pin;

use async_trait::async_trait;
use btleplug::api::{
    Central, CentralEvent, Manager as _, Peripheral as _, PeripheralProperties, ScanFilter,
};
use btleplug::platform::{Adapter, Manager, PeripheralId};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::{Stream, StreamExt, StreamMap};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use super::{DeviceDescriptor, RadioClient};
use crate::error::RadioError;

type CentralEventStream = Pin<Box<dyn Stream<Item = CentralEvent> + Send>>;

/// Radio transport backed by `btleplug`.
#[derive(Debug, Default)]
pub struct BtleplugRadio {
    scan: Option<RunningScan>,
}

#[derive(Debug)]
struct RunningScan {
    cancel: CancellationToken,
    forwarder: JoinHandle<()>,
}

impl BtleplugRadio {
    /// Creates the real radio transport.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RadioClient for BtleplugRadio {
    #[instrument(skip(self), level = "debug")]
    async fn start_scan(&mut self) -> Result<mpsc::Receiver<DeviceDescriptor>, RadioError> {
        self.stop_scan().await?;

        let manager = Manager::new().await?;
        let adapters = manager.adapters().await?;
        if adapters.is_empty() {
            return Err(RadioError::NoAdapters);
        }

        let mut events = StreamMap::new();
        for (index, adapter) in adapters.iter().enumerate() {
            events.insert(index, adapter.events().await?);
        }
        for adapter in &adapters {
            adapter.start_scan(ScanFilter::default()).await?;
        }
        info!(
            adapter_count = adapters.len(),
            "started BLE advertisement scan"
        );

        let (descriptors, receiver) = mpsc::channel(super::DESCRIPTOR_CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();
        let forwarder = tokio::spawn(forward_discoveries(
            adapters,
            events,
            descriptors,
            cancel.clone(),
        ));
        self.scan = Some(RunningScan { cancel, forwarder });
        Ok(receiver)
    }

    #[instrument(skip(self), level = "debug")]
    async fn stop_scan(&mut self) -> Result<(), RadioError> {
        let Some(scan) = self.scan.take() else {
            return Ok(());
        };

        scan.cancel.cancel();
        if let Err(error) = scan.forwarder.await {
            debug!(%error, "discovery forwarder ended abnormally");
        }
        Ok(())
    }
}

async fn forward_discoveries(
    adapters: Vec<Adapter>,
    mut events: StreamMap<usize, CentralEventStream>,
    descriptors: mpsc::Sender<DeviceDescriptor>,
    cancel: CancellationToken,
) {
    let mut reported = HashSet::new();

    loop {
        let maybe_event = tokio::select! {
            () = cancel.cancelled() => break,
            maybe_event = events.next() => maybe_event,
        };
        let Some((adapter_index, event)) = maybe_event else {
            break;
        };
        let CentralEvent::DeviceDiscovered(peripheral_id) = event else {
            continue;
        };
        let Some(adapter) = adapters.get(adapter_index) else {
            continue;
        };

        let descriptor = match describe_peripheral(adapter, &peripheral_id).await {
            Ok(descriptor) => descriptor,
            Err(error) => {
                debug!(?error, "failed to read properties of discovered peripheral");
                continue;
            }
        };
        if !reported.insert(descriptor.address().to_string()) {
            continue;
        }

        debug!(
            name = descriptor.name(),
            address = descriptor.address(),
            "discovered peripheral"
        );
        if descriptors.send(descriptor).await.is_err() {
            break;
        }
    }

    stop_adapters(&adapters).await;
}

async fn describe_peripheral(
    adapter: &Adapter,
    peripheral_id: &PeripheralId,
) -> Result<DeviceDescriptor, RadioError> {
    let peripheral = adapter.peripheral(peripheral_id).await?;
    let properties = peripheral.properties().await?;
    let (name, device_class) = descriptor_fields(properties);
    Ok(DeviceDescriptor::new(
        name,
        peripheral_id.to_string(),
        device_class,
    ))
}

fn descriptor_fields(properties: Option<PeripheralProperties>) -> (String, Option<u32>) {
    properties.map_or((String::new(), None), |properties| {
        (properties.local_name.unwrap_or_default(), properties.class)
    })
}

async fn stop_adapters(adapters: &[Adapter]) {
    for adapter in adapters {
        if let Err(error) = adapter.stop_scan().await {
            debug!(?error, "failed to stop adapter scan cleanly");
        }
    }
}
