use std::path::PathBuf;
use std::time::Duration;

use bon::Builder;
use clap::Parser;

use crate::app::BridgeSettings;
use crate::classify::DiscoveryFilter;
use crate::device::DriverConfig;
use crate::error::{CliConfigError, FixtureError};
use crate::radio::{FakeRadioConfig, ScanFixture};
use crate::scripted::DriverScript;

/// Command-line options for the gymlink equipment bridge.
#[derive(Debug, Parser)]
#[command(name = "gymlink", about = "Bridge BLE fitness equipment into a local session.")]
pub struct Args {
    /// Prints driver diagnostics and lowers the default log level.
    #[arg(long)]
    debug: bool,
    /// Restricts discovery to one exact advertised device name.
    #[arg(long)]
    name: Option<String>,
    /// Skips resistance writes to the device.
    #[arg(long)]
    no_resistance: bool,
    /// Skips the heart-rate service subscription.
    #[arg(long)]
    no_heart_service: bool,
    /// Interval between device metric polls (e.g. `200ms`, `1s`).
    #[arg(long, value_parser = parse_duration)]
    poll_interval: Option<Duration>,
    /// Suppresses driver console output.
    #[arg(long)]
    no_console: bool,
    /// Exercises resistance levels right after connecting.
    #[arg(long)]
    test_resistance: bool,
    /// Session-state file path; defaults to the platform state directory.
    #[arg(long)]
    state_file: Option<PathBuf>,
    /// Uses the fake radio transport with fixture-driven discovery.
    #[arg(long)]
    fake: bool,
    /// Fake scan fixtures in the form `name|address|device_class;...`.
    #[arg(long, requires = "fake", required_if_eq("fake", "true"))]
    fake_scan: Option<ScanFixture>,
    /// Fake driver script in the form `speed:12.5,incline:3.0,disconnect`.
    #[arg(long, requires = "fake")]
    fake_driver: Option<DriverScript>,
    /// Artificial fake scan delay (e.g. `250ms`, `2s`).
    #[arg(long, requires = "fake", value_parser = parse_duration)]
    fake_discovery_delay: Option<Duration>,
}

impl Args {
    /// Splits parsed CLI arguments into bridge settings and optional fake
    /// backend settings.
    ///
    /// # Errors
    ///
    /// Returns an error if fake backend configuration is incomplete.
    pub fn into_settings_and_backends(self) -> anyhow::Result<(BridgeSettings, Option<FakeArgs>)> {
        let Args {
            debug,
            name,
            no_resistance,
            no_heart_service,
            poll_interval,
            no_console,
            test_resistance,
            state_file,
            fake,
            fake_scan,
            fake_driver,
            fake_discovery_delay,
        } = self;

        let driver_config = DriverConfig::builder()
            .verbose(debug)
            .no_resistance_writes(no_resistance)
            .no_heart_service(no_heart_service)
            .maybe_poll_interval(poll_interval)
            .no_console(no_console)
            .test_resistance(test_resistance)
            .build();

        let settings = BridgeSettings::builder()
            .filter(name.map_or_else(DiscoveryFilter::any, DiscoveryFilter::exact_name))
            .driver_config(driver_config)
            .maybe_state_file(state_file)
            .build();

        let fake_args = if fake {
            let Some(scan_fixture) = fake_scan else {
                return Err(CliConfigError::MissingFakeScanFixture.into());
            };
            Some(FakeArgs {
                scan_fixture,
                driver_script: fake_driver,
                discovery_delay: fake_discovery_delay.unwrap_or(Duration::ZERO),
            })
        } else {
            None
        };

        Ok((settings, fake_args))
    }
}

/// Fake backend arguments for programmatic runs.
#[derive(Debug, Builder)]
pub struct FakeArgs {
    #[builder(with = |value: &str| -> std::result::Result<_, FixtureError> { value.parse() })]
    scan_fixture: ScanFixture,
    #[builder(with = |value: &str| -> std::result::Result<_, FixtureError> { value.parse() })]
    driver_script: Option<DriverScript>,
    #[builder(default)]
    discovery_delay: Duration,
}

impl FakeArgs {
    pub(crate) fn into_backend_configs(self) -> (FakeRadioConfig, DriverScript) {
        let Self {
            scan_fixture,
            driver_script,
            discovery_delay,
        } = self;

        let radio_config = FakeRadioConfig::builder()
            .scan_fixture(scan_fixture)
            .discovery_delay(discovery_delay)
            .build();

        (radio_config, driver_script.unwrap_or_default())
    }
}

fn parse_duration(value: &str) -> Result<Duration, String> {
    humantime::parse_duration(value).map_err(|error| error.to_string())
}
