/*!
Device fixture builders
*/

use shheissee_probe::{BluetoothDevice, NetworkDevice, Port, WifiDevice};

pub fn host(ip: &str) -> NetworkDevice {
    NetworkDevice::new(ip)
}

pub fn host_with_mac(ip: &str, mac: &str) -> NetworkDevice {
    NetworkDevice {
        mac: Some(mac.to_string()),
        ..NetworkDevice::new(ip)
    }
}

fn service_name(port: u16) -> &'static str {
    match port {
        21 => "ftp",
        22 => "ssh",
        23 => "telnet",
        80 => "http",
        443 => "https",
        445 => "microsoft-ds",
        3389 => "ms-wbt-server",
        _ => "unknown",
    }
}

/// Open TCP ports as nmap would report them
pub fn open_ports(numbers: &[u16]) -> Vec<Port> {
    numbers
        .iter()
        .map(|&number| Port {
            number,
            protocol: "tcp".to_string(),
            service: service_name(number).to_string(),
            state: "open".to_string(),
        })
        .collect()
}

pub fn host_with_open_ports(ip: &str, numbers: &[u16]) -> NetworkDevice {
    NetworkDevice {
        ports: open_ports(numbers),
        ..NetworkDevice::new(ip)
    }
}

pub fn bt(address: &str) -> BluetoothDevice {
    BluetoothDevice::new(address)
}

pub fn bt_named(address: &str, name: &str) -> BluetoothDevice {
    BluetoothDevice {
        name: Some(name.to_string()),
        ..BluetoothDevice::new(address)
    }
}

pub fn bt_with_rssi(address: &str, rssi: i32) -> BluetoothDevice {
    BluetoothDevice {
        rssi: Some(rssi),
        ..BluetoothDevice::new(address)
    }
}

/// `count` unnamed devices whose addresses start with `prefix` (e.g. `"00"`)
pub fn bt_swarm(prefix: &str, count: usize) -> Vec<BluetoothDevice> {
    (0..count)
        .map(|i| BluetoothDevice::new(format!("{}:10:20:30:{:02X}:{:02X}", prefix, i / 256, i % 256)))
        .collect()
}

pub fn ap(address: &str, ssid: &str) -> WifiDevice {
    WifiDevice {
        ssid: Some(ssid.to_string()),
        ..WifiDevice::new(address)
    }
}

pub fn hidden_ap(address: &str) -> WifiDevice {
    WifiDevice::new(address)
}
