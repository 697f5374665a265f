//! Response formatting
//!
//! Turns [`Response`] values into the framed text fragments written back
//! to the host. A response may be several fragments (a data line followed
//! by a status), each handed to a [`ResponseSink`] as it is produced.

use core::fmt::Write;

use crate::config::at::{BUSY_STR, ERROR_STR, MAX_RESPONSE_LEN, OK_STR};
use crate::config::beacon::ADDRESS_LEN;
use heapless::String;
use log::debug;

/// Destination for response fragments
///
/// Implemented by the UART session for the wire and by plain closures, so
/// the dispatcher can be driven without a transport.
pub trait ResponseSink {
    /// Emit one fragment
    fn send(&mut self, fragment: &str);
}

impl<F: FnMut(&str)> ResponseSink for F {
    fn send(&mut self, fragment: &str) {
        self(fragment)
    }
}

/// Subsystem tags reported by the self-test
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureTag {
    /// Accelerometer
    Lis,
    /// Temperature, pressure and humidity sensor
    Bme,
    /// Ambient light sensor
    Apds,
}

impl FailureTag {
    fn as_str(&self) -> &'static str {
        match self {
            FailureTag::Lis => "\r\nLIS_ERROR\r\n",
            FailureTag::Bme => "\r\nBME_ERROR\r\n",
            FailureTag::Apds => "\r\nAPDS_ERROR\r\n",
        }
    }
}

/// Response to a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Bare success status
    Ok,
    /// Bare failure status
    Error,
    /// Identity change refused while advertising
    Busy,
    /// Build identity, version field omitted when `None`
    Identity {
        git_sha: &'static str,
        build_time: &'static str,
        fw_version: Option<&'static str>,
    },
    /// Device address in display byte order
    Address([u8; ADDRESS_LEN]),
    /// Model string
    Model(&'static str),
    /// Persisted transmit power
    TxPower(i8),
    /// A failing self-test check, sent before the final status
    SelfTestFailure(FailureTag),
}

/// Serialiser for response fragments
pub struct ResponseSerialiser;

impl ResponseSerialiser {
    /// Create a new response serialiser
    pub fn new() -> Self {
        Self
    }

    /// Write a response as one or more fragments
    pub fn write<S: ResponseSink + ?Sized>(&self, response: &Response, sink: &mut S) {
        match response {
            Response::Ok => sink.send(OK_STR),
            Response::Error => sink.send(ERROR_STR),
            Response::Busy => sink.send(BUSY_STR),
            Response::SelfTestFailure(tag) => sink.send(tag.as_str()),
            data => {
                let line = self.data_line(data);
                sink.send(&line);
                sink.send(OK_STR);
            }
        }
    }

    /// Format the data line of a data response
    fn data_line(&self, response: &Response) -> String<MAX_RESPONSE_LEN> {
        let mut line: String<MAX_RESPONSE_LEN> = String::new();

        let written = match response {
            Response::Identity {
                git_sha,
                build_time,
                fw_version: Some(version),
            } => write!(line, "\r\n\"{}\",\"{}\",\"{}\"", git_sha, build_time, version),
            Response::Identity {
                git_sha,
                build_time,
                fw_version: None,
            } => write!(line, "\r\n\"{}\",\"{}\"", git_sha, build_time),
            Response::Address([a, b, c, d, e, f]) => write!(
                line,
                "\r\n+UMLA:{:02X}{:02X}{:02X}{:02X}{:02X}{:02X}",
                a, b, c, d, e, f
            ),
            Response::Model(model) => write!(line, "\r\n\"{}\"", model),
            Response::TxPower(dbm) => write!(line, "\r\n+TXPWR:{}", dbm),
            _ => Ok(()),
        };
        if written.is_err() {
            // Overlong fields are cut at the bounded string's capacity
            debug!("Response line truncated: {}", line);
        }

        line
    }
}

impl Default for ResponseSerialiser {
    fn default() -> Self {
        Self::new()
    }
}
