//! Device communication client.

use std::io::{Read, Write};
use std::time::{Duration, Instant};

use anyhow::Result;
use serialport::SerialPort;

use crate::protocol::{build_line, find_status, parse_reply, Reply};

/// Find ports that answer `AT` with `OK`.
///
/// Probing counts as a keep-alive, so the mode timeout is cancelled on
/// every port that answers.
pub fn find_at_ports() -> Result<Vec<String>> {
    let ports = serialport::available_ports()?;
    let mut at_ports = Vec::new();

    for port_info in ports {
        if let Ok(mut client) = DeviceClient::new(&port_info.port_name, 115200) {
            client.set_timeout(Duration::from_millis(500));
            if let Ok(reply) = client.send("AT") {
                if reply.status == crate::protocol::Status::Ok {
                    at_ports.push(port_info.port_name.clone());
                }
            }
        }
    }

    Ok(at_ports)
}

/// Resolve a port argument - returns the port path if not "auto", otherwise auto-detects.
pub fn resolve_port(port_arg: &str) -> Result<String> {
    if port_arg != "auto" {
        return Ok(port_arg.to_string());
    }
    match find_at_ports()?.into_iter().next() {
        Some(port) => Ok(port),
        None => anyhow::bail!("No AT port found - ensure the device was reset less than 10 s ago"),
    }
}

/// Client for the beacon's AT command port.
pub struct DeviceClient {
    port: Box<dyn SerialPort>,
    timeout: Duration,
}

impl DeviceClient {
    /// Create a new device client.
    pub fn new(port_name: &str, baud_rate: u32) -> Result<Self> {
        let port = serialport::new(port_name, baud_rate)
            .timeout(Duration::from_millis(100))
            .open()?;

        Ok(Self {
            port,
            timeout: Duration::from_secs(2),
        })
    }

    /// Set the response timeout.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Drain all pending data from the serial port.
    pub fn drain_buffer(&mut self) -> Result<()> {
        self.port.clear(serialport::ClearBuffer::All)?;
        let _ = self.read_for(Duration::from_millis(100))?;
        Ok(())
    }

    /// Send a command line and wait for its reply.
    pub fn send(&mut self, command: &str) -> Result<Reply> {
        self.send_raw(&build_line(command))
    }

    /// Send raw bytes and wait for a reply.
    pub fn send_raw(&mut self, bytes: &[u8]) -> Result<Reply> {
        self.port.write_all(bytes)?;
        self.port.flush()?;

        let text = self.read_reply()?;
        parse_reply(&text)
    }

    /// Send raw bytes without waiting for a status.
    ///
    /// Returns whatever arrives within `window`.
    pub fn send_unanswered(&mut self, bytes: &[u8], window: Duration) -> Result<String> {
        self.port.write_all(bytes)?;
        self.port.flush()?;
        self.read_for(window)
    }

    /// Read until a status marker arrives.
    fn read_reply(&mut self) -> Result<String> {
        let mut data = Vec::new();
        let mut buf = [0u8; 64];
        let start = Instant::now();

        while start.elapsed() < self.timeout {
            match self.port.read(&mut buf) {
                Ok(n) => {
                    data.extend_from_slice(&buf[..n]);
                    let text = String::from_utf8_lossy(&data);
                    if find_status(&text).is_some() {
                        return Ok(text.into_owned());
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => continue,
                Err(e) => return Err(e.into()),
            }
        }

        anyhow::bail!(
            "Timeout waiting for reply, got {} bytes: {:?}",
            data.len(),
            String::from_utf8_lossy(&data)
        );
    }

    /// Collect everything received within `window`.
    fn read_for(&mut self, window: Duration) -> Result<String> {
        let mut data = Vec::new();
        let mut buf = [0u8; 64];
        let start = Instant::now();

        while start.elapsed() < window {
            match self.port.read(&mut buf) {
                Ok(n) => data.extend_from_slice(&buf[..n]),
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Ok(String::from_utf8_lossy(&data).into_owned())
    }
}
