mod btleplug_radio;
mod client;
mod fake_radio;

pub use self::btleplug_radio::BtleplugRadio;
pub(crate) use self::client::DESCRIPTOR_CHANNEL_CAPACITY;
pub use self::client::{DeviceDescriptor, RadioClient};
pub use self::fake_radio::{FakeRadio, FakeRadioConfig, ScanFixture};
