use tokio::sync::mpsc;
use tracing::{debug, info, instrument, trace, warn};

use crate::device::{
    DeviceEvent, DeviceKind, DriverConfig, DriverFactory, FitnessDevice, MetricUpdate,
};
use crate::discovery::DeviceMatch;
use crate::state_file::{SessionState, StateFile};

const DEVICE_EVENT_CAPACITY: usize = 32;

/// Owns the single active driver session and its persistence.
///
/// At most one driver exists at a time; adopting a new match releases the
/// previous driver first.
pub struct SessionController {
    factory: Box<dyn DriverFactory>,
    driver_config: DriverConfig,
    state_file: StateFile,
    active: Option<ActiveDriver>,
}

struct ActiveDriver {
    driver: Box<dyn FitnessDevice>,
    events: mpsc::Receiver<DeviceEvent>,
}

impl SessionController {
    /// Creates a controller building drivers through `factory`.
    #[must_use]
    pub fn new(
        factory: Box<dyn DriverFactory>,
        driver_config: DriverConfig,
        state_file: StateFile,
    ) -> Self {
        Self {
            factory,
            driver_config,
            state_file,
            active: None,
        }
    }

    /// Whether a driver session is active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// The active driver, if any.
    #[must_use]
    pub fn active_device(&self) -> Option<&dyn FitnessDevice> {
        self.active.as_ref().map(|active| active.driver.as_ref())
    }

    /// Builds and opens a driver for `device_match`.
    ///
    /// Treadmill drivers are seeded from the persisted session state before
    /// they connect, so a restart resumes where the last session left off.
    #[instrument(
        skip(self, device_match),
        level = "debug",
        fields(model = %device_match.model())
    )]
    pub fn adopt(&mut self, device_match: &DeviceMatch) {
        if self.release() {
            warn!("released a lingering driver before adopting a new device");
        }

        let mut driver = self.factory.build(device_match.model(), &self.driver_config);
        if driver.kind() == DeviceKind::Treadmill
            && let Some(saved) = self.state_file.load()
        {
            debug!(
                speed = saved.speed(),
                inclination = saved.inclination(),
                "seeding driver from saved session state"
            );
            driver.restore_metrics(saved.speed(), saved.inclination());
        }

        let (events, receiver) = mpsc::channel(DEVICE_EVENT_CAPACITY);
        driver.open(device_match.descriptor().clone(), events);
        info!(name = device_match.descriptor().name(), "opened driver session");
        self.active = Some(ActiveDriver {
            driver,
            events: receiver,
        });
    }

    /// Drops the active driver and its event channel.
    ///
    /// Returns whether a driver was actually released.
    pub fn release(&mut self) -> bool {
        let released = self.active.take().is_some();
        if released {
            debug!("released active driver session");
        }
        released
    }

    /// Waits for the next event from the active driver.
    ///
    /// Returns `None` when no session is active or the driver closed its
    /// event channel.
    pub async fn next_event(&mut self) -> Option<DeviceEvent> {
        match &mut self.active {
            Some(active) => active.events.recv().await,
            None => None,
        }
    }

    /// Persists the session snapshot a metric change belongs to.
    ///
    /// The payload only signals that something changed; the snapshot is read
    /// back from the driver. Sessions on non-treadmill equipment are never
    /// persisted.
    pub fn record_metric(&self, update: MetricUpdate) {
        let Some(active) = &self.active else {
            return;
        };
        if active.driver.kind() != DeviceKind::Treadmill {
            trace!(?update, "skipping persistence for non-treadmill metric");
            return;
        }

        let state = SessionState::now(
            active.driver.current_speed(),
            active.driver.current_inclination(),
        );
        trace!(
            ?update,
            speed = state.speed(),
            inclination = state.inclination(),
            "persisting session state"
        );
        if let Err(error) = self.state_file.save(&state) {
            warn!(%error, "failed to persist session state");
        }
    }
}
