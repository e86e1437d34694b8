/*!
# Shheissee DevKit - Stub sources and fixtures

Lets the kernel be tested without nmap, bluetoothctl or iwlist installed:
- Scripted network / Bluetooth / WiFi sources (responses, failures, delays)
- Scripted connection-monitor line streams
- Device fixture builders
*/

pub mod fixtures;
pub mod stub_sources;

pub use stub_sources::{StubBluetoothSource, StubNetworkSource, StubWifiSource};
