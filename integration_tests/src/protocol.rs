//! AT protocol helpers shared with the firmware.

use anyhow::Result;

/// Line terminator expected by the firmware
pub const TERMINATOR: &str = "\r";

/// How a reply ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Error,
    /// Identity change refused while advertising
    Advertising,
}

/// A parsed reply to one command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Characters echoed back before the response
    pub echo: String,
    /// Information lines between echo and status
    pub lines: Vec<String>,
    pub status: Status,
}

impl Reply {
    /// The first information line, if any
    pub fn first_line(&self) -> Option<&str> {
        self.lines.first().map(String::as_str)
    }
}

/// Build the bytes sent for a command
pub fn build_line(command: &str) -> Vec<u8> {
    let mut line = command.as_bytes().to_vec();
    line.extend_from_slice(TERMINATOR.as_bytes());
    line
}

/// Find a complete status marker in received text
///
/// Returns the index just past the marker.
pub fn find_status(text: &str) -> Option<(Status, usize)> {
    [
        ("\r\nOK\r\n", Status::Ok),
        ("\r\nERROR\r\n", Status::Error),
        ("\r\nAdvertising\r\n", Status::Advertising),
    ]
    .iter()
    .filter_map(|(marker, status)| text.find(marker).map(|pos| (*status, pos + marker.len())))
    .min_by_key(|(_, end)| *end)
}

/// Parse the received text for one command into a reply
///
/// The text starts with the echo of the command line (the terminator is not
/// echoed), followed by `\r\n`-framed lines.
pub fn parse_reply(text: &str) -> Result<Reply> {
    let (status, end) = match find_status(text) {
        Some(found) => found,
        None => anyhow::bail!("No status in reply: {:?}", text),
    };
    let text = &text[..end];

    let (echo, rest) = match text.find("\r\n") {
        Some(pos) => text.split_at(pos),
        None => anyhow::bail!("Reply has no framed lines: {:?}", text),
    };
    let echo = echo.trim_end_matches('\r').to_string();

    let mut lines: Vec<String> = rest
        .split("\r\n")
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();
    // Last line is the status itself
    lines.pop();

    Ok(Reply { echo, lines, status })
}
