//! Command grammar table and matcher
//!
//! A completed line is matched against an ordered table of
//! (literal prefix, length rule, builder) entries. The first entry whose
//! prefix matches byte-for-byte and whose length rule holds is selected,
//! and no entry is tried after it. A selected entry with a bad parameter is
//! an error, it does not fall through to later entries.

use crate::at::types::{AtError, Command, CommandProfile, InstanceId, LengthRule, Namespace};
use crate::config::beacon::{
    ALLOWED_TX_POWERS, INSTANCE_ID_LEN, MAX_ADV_INTERVAL_MS, MIN_ADV_INTERVAL_MS, NAMESPACE_LEN,
};

/// Builds a command from the full matched line
type Builder = fn(&[u8]) -> Result<Command, AtError>;

/// Which part of the command profile gates an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Gate {
    Always,
    Advertising,
    Identity,
}

/// One row of the command table
struct CommandEntry {
    prefix: &'static [u8],
    length: LengthRule,
    gate: Gate,
    build: Builder,
}

const TXPWR_SET: &[u8] = b"AT+TXPWR=";
const ADVENABLE: &[u8] = b"AT+ADVENABLE=";
const ADV: &[u8] = b"AT+ADV=";
const ADVINT: &[u8] = b"AT+ADVINT=";
const ID: &[u8] = b"AT+ID=";

/// Command table in priority order
static COMMAND_TABLE: [CommandEntry; 12] = [
    CommandEntry {
        prefix: b"ATI9",
        length: LengthRule::Exact(4),
        gate: Gate::Always,
        build: |_| Ok(Command::Identity),
    },
    CommandEntry {
        prefix: b"AT+UMLA=1",
        length: LengthRule::Exact(9),
        gate: Gate::Always,
        build: |_| Ok(Command::ReadAddress),
    },
    CommandEntry {
        prefix: b"AT+TEST",
        length: LengthRule::Exact(7),
        gate: Gate::Always,
        build: |_| Ok(Command::SelfTest),
    },
    CommandEntry {
        prefix: b"AT",
        length: LengthRule::Exact(2),
        gate: Gate::Always,
        build: |_| Ok(Command::KeepAlive),
    },
    CommandEntry {
        prefix: b"AT+GMM",
        length: LengthRule::Exact(6),
        gate: Gate::Always,
        build: |_| Ok(Command::Model),
    },
    CommandEntry {
        prefix: b"AT+CPWROFF",
        length: LengthRule::Exact(10),
        gate: Gate::Always,
        build: |_| Ok(Command::PowerOff),
    },
    CommandEntry {
        prefix: TXPWR_SET,
        length: LengthRule::Longer(TXPWR_SET.len()),
        gate: Gate::Always,
        build: build_set_tx_power,
    },
    CommandEntry {
        prefix: b"AT+TXPWR?",
        length: LengthRule::Exact(9),
        gate: Gate::Always,
        build: |_| Ok(Command::GetTxPower),
    },
    CommandEntry {
        prefix: ADVENABLE,
        length: LengthRule::Longer(ADVENABLE.len()),
        gate: Gate::Advertising,
        build: |line| build_set_advertising(&line[ADVENABLE.len()..]),
    },
    CommandEntry {
        prefix: ADV,
        length: LengthRule::Longer(ADV.len()),
        gate: Gate::Advertising,
        build: |line| build_set_advertising(&line[ADV.len()..]),
    },
    CommandEntry {
        prefix: ADVINT,
        length: LengthRule::Longer(ADVINT.len()),
        gate: Gate::Advertising,
        build: build_set_adv_interval,
    },
    CommandEntry {
        prefix: ID,
        length: LengthRule::Exact(ID.len() + NAMESPACE_LEN + INSTANCE_ID_LEN),
        gate: Gate::Identity,
        build: build_set_identity,
    },
];

/// Matches completed lines against the command table
pub struct CommandParser {
    profile: CommandProfile,
}

impl CommandParser {
    /// Create a parser recognizing the commands enabled in `profile`
    pub fn new(profile: CommandProfile) -> Self {
        Self { profile }
    }

    /// Parse a completed, NUL-free line into a command
    pub fn parse(&self, line: &[u8]) -> Result<Command, AtError> {
        let entry = COMMAND_TABLE
            .iter()
            .filter(|entry| self.enabled(entry.gate))
            .find(|entry| line.starts_with(entry.prefix) && entry.length.accepts(line.len()))
            .ok_or(AtError::UnknownCommand)?;

        (entry.build)(line)
    }

    fn enabled(&self, gate: Gate) -> bool {
        match gate {
            Gate::Always => true,
            Gate::Advertising => self.profile.advertising_commands,
            Gate::Identity => self.profile.identity_command,
        }
    }
}

impl Default for CommandParser {
    fn default() -> Self {
        Self::new(CommandProfile::default())
    }
}

/// Check a transmit power against the radio's supported levels
pub fn is_valid_tx_power(dbm: i32) -> bool {
    ALLOWED_TX_POWERS.iter().any(|&level| i32::from(level) == dbm)
}

/// Parse a signed decimal integer parameter
///
/// The whole parameter must be the number. An optional sign is accepted,
/// anything else (blanks, trailing characters, overflow) is an error.
pub fn parse_int(param: &[u8]) -> Result<i32, AtError> {
    let text = core::str::from_utf8(param).map_err(|_| AtError::InvalidParameter)?;
    text.parse::<i32>().map_err(|_| AtError::InvalidParameter)
}

fn build_set_tx_power(line: &[u8]) -> Result<Command, AtError> {
    let power = parse_int(&line[TXPWR_SET.len()..])?;
    if !is_valid_tx_power(power) {
        return Err(AtError::ParameterRange);
    }
    let power = i8::try_from(power).map_err(|_| AtError::ParameterRange)?;
    Ok(Command::SetTxPower(power))
}

fn build_set_advertising(param: &[u8]) -> Result<Command, AtError> {
    match parse_int(param)? {
        0 => Ok(Command::SetAdvertising(false)),
        1 => Ok(Command::SetAdvertising(true)),
        _ => Err(AtError::ParameterRange),
    }
}

fn build_set_adv_interval(line: &[u8]) -> Result<Command, AtError> {
    let interval = parse_int(&line[ADVINT.len()..])?;
    let interval = u16::try_from(interval).map_err(|_| AtError::ParameterRange)?;
    if !(MIN_ADV_INTERVAL_MS..=MAX_ADV_INTERVAL_MS).contains(&interval) {
        return Err(AtError::ParameterRange);
    }
    Ok(Command::SetAdvInterval(interval))
}

fn build_set_identity(line: &[u8]) -> Result<Command, AtError> {
    let fields = &line[ID.len()..];
    let mut namespace: Namespace = [0; NAMESPACE_LEN];
    let mut instance_id: InstanceId = [0; INSTANCE_ID_LEN];
    namespace.copy_from_slice(&fields[..NAMESPACE_LEN]);
    instance_id.copy_from_slice(&fields[NAMESPACE_LEN..]);
    Ok(Command::SetIdentity {
        namespace,
        instance_id,
    })
}
