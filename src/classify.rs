use crate::device::DeviceKind;

const DOMYOS_BIKE_PREFIX: &str = "Domyos-Bike";
const DOMYOS_PREFIX: &str = "Domyos";
const DOMYOS_BRIDGE_PREFIX: &str = "DomyosBridge";
const TOORX_ROUTE_KEY_PREFIX: &str = "TRX ROUTE KEY";
const TOORX_PREFIX: &str = "TOORX";

/// Vendor driver selected for a discovered device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum DriverModel {
    #[display("Domyos bike")]
    DomyosBike,
    #[display("Domyos treadmill")]
    DomyosTreadmill,
    #[display("Toorx route-key treadmill")]
    ToorxTreadmill,
    #[display("Toorx AppGate USB treadmill")]
    TrxAppGateUsbTreadmill,
}

impl DriverModel {
    /// Equipment category this driver serves.
    #[must_use]
    pub fn kind(self) -> DeviceKind {
        match self {
            Self::DomyosBike => DeviceKind::Bike,
            Self::DomyosTreadmill | Self::ToorxTreadmill | Self::TrxAppGateUsbTreadmill => {
                DeviceKind::Treadmill
            }
        }
    }
}

/// Restricts discovery to a single advertised device name.
///
/// An empty filter admits every device; a named filter admits only devices
/// whose full advertised name matches case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryFilter {
    wanted_name: Option<String>,
}

impl DiscoveryFilter {
    /// A filter that admits every advertised device.
    #[must_use]
    pub fn any() -> Self {
        Self::default()
    }

    /// A filter that admits only devices advertising exactly `name`.
    #[must_use]
    pub fn exact_name(name: impl Into<String>) -> Self {
        Self {
            wanted_name: Some(name.into()),
        }
    }

    /// Whether a device advertising `name` passes the filter.
    #[must_use]
    pub fn admits(&self, name: &str) -> bool {
        self.wanted_name
            .as_deref()
            .is_none_or(|wanted| wanted.eq_ignore_ascii_case(name))
    }
}

/// Selects the vendor driver for an advertised device name.
///
/// Returns `None` when the name is filtered out, belongs to a relay bridge,
/// or matches no supported vendor prefix. Vendor prefixes are matched
/// case-sensitively; only the filter comparison ignores case.
#[must_use]
pub fn classify(name: &str, filter: &DiscoveryFilter) -> Option<DriverModel> {
    if !filter.admits(name) {
        return None;
    }

    let bridged = name.starts_with(DOMYOS_BRIDGE_PREFIX);
    if name.starts_with(DOMYOS_BIKE_PREFIX) && !bridged {
        return Some(DriverModel::DomyosBike);
    }
    if name.starts_with(DOMYOS_PREFIX) && !bridged {
        return Some(DriverModel::DomyosTreadmill);
    }
    if name.starts_with(TOORX_ROUTE_KEY_PREFIX) {
        return Some(DriverModel::ToorxTreadmill);
    }
    if name.starts_with(TOORX_PREFIX) {
        return Some(DriverModel::TrxAppGateUsbTreadmill);
    }

    None
}
