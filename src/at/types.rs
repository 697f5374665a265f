//! Command and error types for the AT protocol
//!
//! # Protocol Format
//!
//! Commands are ASCII lines terminated by a carriage return:
//! ```text
//! AT+TXPWR=4\r
//! ```
//!
//! Every accepted input byte is echoed back. Responses are framed with
//! line breaks and always end in one of two status terminators:
//! ```text
//! \r\nOK\r\n
//! \r\nERROR\r\n
//! ```
//!
//! Data responses put the data line in front of the status:
//! ```text
//! \r\n+TXPWR:4\r\nOK\r\n
//! ```

use crate::config::beacon::{INSTANCE_ID_LEN, NAMESPACE_LEN};

/// Eddystone namespace bytes
pub type Namespace = [u8; NAMESPACE_LEN];

/// Eddystone instance id bytes
pub type InstanceId = [u8; INSTANCE_ID_LEN];

/// Length condition attached to a command table entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthRule {
    /// Line length must equal the value (fixed-form commands)
    Exact(usize),
    /// Line length must be greater than the value (commands with a parameter)
    Longer(usize),
}

impl LengthRule {
    /// Check a line length against this rule
    pub fn accepts(&self, len: usize) -> bool {
        match *self {
            LengthRule::Exact(n) => len == n,
            LengthRule::Longer(n) => len > n,
        }
    }
}

/// Parsed AT command with associated data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// `ATI9`: build identity
    Identity,
    /// `AT+UMLA=1`: device address
    ReadAddress,
    /// `AT+TEST`: factory self-test
    SelfTest,
    /// `AT`: keep-alive
    KeepAlive,
    /// `AT+GMM`: model string
    Model,
    /// `AT+CPWROFF`: cold reset
    PowerOff,
    /// `AT+TXPWR=<n>`
    SetTxPower(i8),
    /// `AT+TXPWR?`
    GetTxPower,
    /// `AT+ADVENABLE=<0|1>` or `AT+ADV=<0|1>`
    SetAdvertising(bool),
    /// `AT+ADVINT=<ms>`
    SetAdvInterval(u16),
    /// `AT+ID=<namespace><instance>`
    SetIdentity {
        namespace: Namespace,
        instance_id: InstanceId,
    },
}

/// Reasons a line is answered with ERROR (or the busy response)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtError {
    /// No table entry matched the line
    UnknownCommand,
    /// Parameter is not a decimal integer
    InvalidParameter,
    /// Parameter parsed but is not an accepted value
    ParameterRange,
    /// Identity cannot change while advertising
    Busy,
    /// A collaborator failed while executing the command
    ExecutionFailed,
}

/// Selects which optional commands the dispatcher recognizes
///
/// Builds that do not ship an advertising controller, or that answer
/// `ATI9` without a firmware version, turn the matching entries off here.
/// Disabled entries fall through to ERROR like any unknown command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandProfile {
    /// Append the firmware version field to the `ATI9` response
    pub report_fw_version: bool,
    /// Recognize `AT+ADVENABLE=`, `AT+ADV=` and `AT+ADVINT=`
    pub advertising_commands: bool,
    /// Recognize `AT+ID=`
    pub identity_command: bool,
}

impl CommandProfile {
    /// Every canonical command enabled
    pub const fn full() -> Self {
        Self {
            report_fw_version: true,
            advertising_commands: true,
            identity_command: true,
        }
    }
}

impl Default for CommandProfile {
    fn default() -> Self {
        Self::full()
    }
}
