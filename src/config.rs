//! Configuration constants for the beacon AT command front-end

/// UART transport configuration
pub mod uart {
    pub const BAUD_RATE: u32 = 115200;
    /// Number of alternating receive buffers handed to the driver
    pub const RX_BUF_NUM: usize = 2;
    pub const RX_BUF_LEN: usize = 256;
    /// Inactivity period after which the driver reports received bytes
    pub const RX_TIMEOUT_US: u32 = 1;
}

/// AT protocol constants
pub mod at {
    /// Maximum command line length, reaching it completes the line
    pub const MAX_CMD_LEN: usize = 100;
    pub const LINE_TERMINATOR: u8 = b'\r';

    pub const OK_STR: &str = "\r\nOK\r\n";
    pub const ERROR_STR: &str = "\r\nERROR\r\n";
    /// Sent instead of OK when identity is changed while advertising
    pub const BUSY_STR: &str = "\r\nAdvertising\r\n";

    /// Maximum length of a single formatted response fragment
    pub const MAX_RESPONSE_LEN: usize = 100;
}

/// Timing used by the worker context
pub mod timing {
    /// Without a recognized command within this time the UART is shut down
    pub const MODE_TIMEOUT_MS: u64 = 10_000;
    /// Lets the OK response drain before the cold reset
    pub const POWER_OFF_GRACE_MS: u32 = 200;
    /// Settle time between stopping RX and suspending the UART
    pub const UART_SETTLE_MS: u32 = 100;
    /// Backoff between RX re-enable attempts
    pub const RX_RETRY_BACKOFF_MS: u32 = 5;
    /// How long to wait for the UART line to become valid at start
    pub const UART_READY_TIMEOUT_MS: u32 = 1000;
    /// Poll period while waiting for the UART line
    pub const UART_READY_POLL_MS: u32 = 10;
}

/// Beacon identity and radio defaults
pub mod beacon {
    /// Eddystone-UID namespace length
    pub const NAMESPACE_LEN: usize = 10;
    /// Eddystone-UID instance id length
    pub const INSTANCE_ID_LEN: usize = 6;
    pub const ADDRESS_LEN: usize = 6;

    pub const DEFAULT_NAMESPACE: [u8; NAMESPACE_LEN] = *b"NINA-B4TAG";
    pub const MODEL: &str = "NINA-B4-TAG";

    /// Used when no transmit power has been persisted
    pub const DEFAULT_TX_POWER: i8 = 4;
    /// Transmit power levels (dBm) the radio supports
    pub const ALLOWED_TX_POWERS: [i8; 15] = [-40, -30, -20, -16, -12, -8, -4, 0, 2, 3, 4, 5, 6, 7, 8];

    /// Advertising intervals cycled through by the board, first one is used at boot
    pub const ADV_INTERVALS_MS: [u16; 3] = [50, 100, 1000];
    pub const MIN_ADV_INTERVAL_MS: u16 = 20;
    pub const MAX_ADV_INTERVAL_MS: u16 = 10_240;
}

/// Persisted settings
pub mod storage {
    /// Flash taken by the settings log, one erase sector
    pub const SETTINGS_REGION_LEN: usize = 4096;
}

/// Build identity reported by ATI9
pub mod version {
    pub const GIT_SHA: &str = match option_env!("GIT_SHA") {
        Some(sha) => sha,
        None => "unknown",
    };
    pub const BUILD_TIME: &str = match option_env!("BUILD_TIME") {
        Some(time) => time,
        None => "unknown",
    };
    pub const FW_VERSION: &str = env!("CARGO_PKG_VERSION");
}
