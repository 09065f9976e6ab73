use thiserror::Error;

/// Errors returned by radio scan operations.
#[derive(Debug, Error)]
pub enum RadioError {
    #[error("BLE operation failed")]
    Ble(#[from] btleplug::Error),
    #[error("no BLE adapters were found")]
    NoAdapters,
}

/// Errors returned when writing or removing the session state document.
#[derive(Debug, Error)]
pub enum StateFileError {
    #[error("failed while accessing the session state document")]
    Io { source: std::io::Error },
    #[error("failed to serialise the session state document")]
    Serialise(#[from] quick_xml::SeError),
    #[error("failed to format the session timestamp")]
    Timestamp(#[from] time::error::Format),
}

/// Errors returned when parsing fake scan fixtures and driver scripts.
#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("the fake scan fixture is empty")]
    EmptyFixture,
    #[error("fixture records must contain three pipe-delimited fields")]
    InvalidRecordFieldCount,
    #[error("fixture records cannot contain empty mandatory fields")]
    EmptyRecordField,
    #[error("failed to parse device class value")]
    InvalidDeviceClass(#[from] std::num::ParseIntError),
    #[error("unknown driver script step `{step}`")]
    UnknownScriptStep { step: String },
    #[error("driver script step `{step}` carries an invalid value")]
    InvalidScriptValue { step: String },
}

/// Errors returned when validating runtime backend options.
#[derive(Debug, Error)]
pub(crate) enum CliConfigError {
    #[error("missing fake scan fixture while fake mode is enabled")]
    MissingFakeScanFixture,
}

/// Errors returned by telemetry initialisation.
#[derive(Debug, Error)]
pub(crate) enum TelemetryError {
    #[error("failed to install tracing subscriber")]
    Subscriber(#[from] tracing_subscriber::util::TryInitError),
}
