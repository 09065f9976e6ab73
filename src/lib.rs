mod app;
mod classify;
mod cli;
mod device;
mod discovery;
mod error;
mod radio;
mod scripted;
mod session;
mod signal;
mod state_file;
mod telemetry;

pub use app::{
    Bridge, BridgeEvent, BridgeSettings, BridgeSummary, StopReason, fake_backends,
    fake_radio_client, real_radio_client, run, scripted_driver_factory,
};
pub use classify::{DiscoveryFilter, DriverModel, classify};
pub use cli::{Args, FakeArgs};
pub use device::{
    DEFAULT_POLL_INTERVAL, DeviceEvent, DeviceKind, DriverConfig, DriverFactory, FitnessDevice,
    MetricUpdate,
};
pub use discovery::{DeviceMatch, DiscoveryManager, DiscoveryState};
pub use error::{FixtureError, RadioError, StateFileError};
pub use radio::{
    BtleplugRadio, DeviceDescriptor, FakeRadio, FakeRadioConfig, RadioClient, ScanFixture,
};
pub use scripted::{DriverScript, ScriptStep, ScriptedDriverFactory};
pub use session::SessionController;
pub use signal::{SignalHandler, SignalOutcome};
pub use state_file::{SessionState, StateFile};
