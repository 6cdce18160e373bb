//! Network reachability probe.
//!
//! The device build would ask the WiFi stack; on a host we settle for a
//! connected UDP socket toward a public resolver, which never sends a
//! packet but does reveal the local address the kernel would route from.

use std::net::UdpSocket;

use microclaw_tools::NetStatus;

pub fn probe(ssid: &str) -> NetStatus {
    let local_ip = UdpSocket::bind("0.0.0.0:0")
        .and_then(|s| {
            s.connect("8.8.8.8:53")?;
            s.local_addr()
        })
        .map(|a| a.ip().to_string());
    match local_ip {
        Ok(ip) => NetStatus {
            connected: true,
            ssid: ssid.to_string(),
            ip,
        },
        Err(_) => NetStatus::default(),
    }
}
