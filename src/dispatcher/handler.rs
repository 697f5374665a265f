//! Command dispatcher
//!
//! Executes a completed line against the collaborators and writes the
//! response. The dispatcher never touches receive buffers or timers; the
//! session decides what a recognized command means for the mode guard.

use embedded_hal_async::delay::DelayNs;
use log::{debug, info, warn};

use crate::at::{
    AtError, Command, CommandParser, CommandProfile, FailureTag, InstanceId, Namespace, Response,
    ResponseSerialiser, ResponseSink,
};
use crate::beacon::{AdvParams, Advertiser, DeviceAddress};
use crate::config::beacon::{ADV_INTERVALS_MS, MODEL};
use crate::config::{timing, version};
use crate::sensors::SelfTestChecks;
use crate::storage::SettingsStore;
use crate::system::SystemControl;

/// Build identity reported by `ATI9`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildInfo {
    pub git_sha: &'static str,
    pub build_time: &'static str,
    pub fw_version: &'static str,
}

impl BuildInfo {
    /// Identity baked in at compile time
    pub const fn current() -> Self {
        Self {
            git_sha: version::GIT_SHA,
            build_time: version::BUILD_TIME,
            fw_version: version::FW_VERSION,
        }
    }
}

impl Default for BuildInfo {
    fn default() -> Self {
        Self::current()
    }
}

/// Command dispatcher
///
/// Owns the collaborators a command may need: settings store, advertising
/// controller, self-test checks and the reboot primitive.
pub struct CommandDispatcher<S, A, P, R> {
    parser: CommandParser,
    serialiser: ResponseSerialiser,
    profile: CommandProfile,
    build: BuildInfo,
    address: DeviceAddress,
    /// Interval the advertising set is (re)built with
    adv_interval_ms: u16,
    settings: S,
    advertiser: A,
    checks: P,
    system: R,
}

impl<S, A, P, R> CommandDispatcher<S, A, P, R>
where
    S: SettingsStore,
    A: Advertiser,
    P: SelfTestChecks,
    R: SystemControl,
{
    /// Create a dispatcher with every command enabled
    pub fn new(settings: S, advertiser: A, checks: P, system: R, address: DeviceAddress) -> Self {
        let profile = CommandProfile::full();
        Self {
            parser: CommandParser::new(profile),
            serialiser: ResponseSerialiser::new(),
            profile,
            build: BuildInfo::current(),
            address,
            adv_interval_ms: ADV_INTERVALS_MS[0],
            settings,
            advertiser,
            checks,
            system,
        }
    }

    /// Restrict the recognized commands
    pub fn with_profile(mut self, profile: CommandProfile) -> Self {
        self.parser = CommandParser::new(profile);
        self.profile = profile;
        self
    }

    /// Override the reported build identity
    pub fn with_build_info(mut self, build: BuildInfo) -> Self {
        self.build = build;
        self
    }

    /// Interval the advertising set was last configured with
    pub fn with_adv_interval(mut self, interval_ms: u16) -> Self {
        self.adv_interval_ms = interval_ms;
        self
    }

    pub fn settings(&self) -> &S {
        &self.settings
    }

    pub fn advertiser(&self) -> &A {
        &self.advertiser
    }

    pub fn checks(&self) -> &P {
        &self.checks
    }

    pub fn system(&self) -> &R {
        &self.system
    }

    pub fn adv_interval_ms(&self) -> u16 {
        self.adv_interval_ms
    }

    /// Dispatch a completed line and write its response to `out`
    ///
    /// Returns true if the line was a recognized command, including one
    /// refused as busy. Unknown lines and failed commands return false.
    pub async fn dispatch<O, D>(&mut self, line: &[u8], out: &mut O, delay: &mut D) -> bool
    where
        O: ResponseSink + ?Sized,
        D: DelayNs,
    {
        let command = match self.parser.parse(line) {
            Ok(command) => command,
            Err(error) => {
                debug!("Rejected line of {} bytes: {:?}", line.len(), error);
                self.respond(&Response::Error, out);
                return false;
            }
        };

        debug!("Command: {:?}", command);

        match self.execute(command, out, delay).await {
            Ok(()) => true,
            Err(AtError::Busy) => {
                // Refused, but the command itself was recognized
                self.respond(&Response::Busy, out);
                true
            }
            Err(error) => {
                warn!("{:?} failed: {:?}", command, error);
                self.respond(&Response::Error, out);
                false
            }
        }
    }

    /// Run a command, writing its success response
    async fn execute<O, D>(&mut self, command: Command, out: &mut O, delay: &mut D) -> Result<(), AtError>
    where
        O: ResponseSink + ?Sized,
        D: DelayNs,
    {
        match command {
            Command::Identity => {
                let response = Response::Identity {
                    git_sha: self.build.git_sha,
                    build_time: self.build.build_time,
                    fw_version: self.profile.report_fw_version.then_some(self.build.fw_version),
                };
                self.respond(&response, out);
            }
            Command::ReadAddress => {
                self.respond(&Response::Address(self.address.display_bytes()), out);
            }
            Command::SelfTest => self.handle_self_test(out).await,
            Command::KeepAlive => self.respond(&Response::Ok, out),
            Command::Model => self.respond(&Response::Model(MODEL), out),
            Command::PowerOff => {
                self.respond(&Response::Ok, out);
                delay.delay_ms(timing::POWER_OFF_GRACE_MS).await;
                self.system.cold_reset();
            }
            Command::SetTxPower(dbm) => {
                self.settings.set_tx_power(dbm).map_err(|error| {
                    warn!("Storing tx power failed: {:?}", error);
                    AtError::ExecutionFailed
                })?;
                info!("Tx power set to {} dBm", dbm);
                self.respond(&Response::Ok, out);
            }
            Command::GetTxPower => {
                self.respond(&Response::TxPower(self.settings.tx_power()), out);
            }
            Command::SetAdvertising(enable) => {
                self.handle_set_advertising(enable).await?;
                self.respond(&Response::Ok, out);
            }
            Command::SetAdvInterval(interval_ms) => {
                self.advertiser
                    .update_interval(interval_ms, interval_ms)
                    .await
                    .map_err(|error| {
                        warn!("Interval update failed: {:?}", error);
                        AtError::ExecutionFailed
                    })?;
                self.adv_interval_ms = interval_ms;
                info!("Advertising interval set to {} ms", interval_ms);
                self.respond(&Response::Ok, out);
            }
            Command::SetIdentity {
                namespace,
                instance_id,
            } => {
                self.handle_set_identity(&namespace, &instance_id).await?;
                self.respond(&Response::Ok, out);
            }
        }

        Ok(())
    }

    /// Run every check, tagging each failure, then report the aggregate
    async fn handle_self_test<O: ResponseSink + ?Sized>(&mut self, out: &mut O) {
        let mut passed = true;

        if !self.checks.lis2dw12().await {
            passed = false;
            self.respond(&Response::SelfTestFailure(FailureTag::Lis), out);
        }
        if !self.checks.bme280().await {
            passed = false;
            self.respond(&Response::SelfTestFailure(FailureTag::Bme), out);
        }
        if !self.checks.apds9306().await {
            passed = false;
            self.respond(&Response::SelfTestFailure(FailureTag::Apds), out);
        }

        info!("Self-test {}", if passed { "passed" } else { "failed" });
        let status = if passed { Response::Ok } else { Response::Error };
        self.respond(&status, out);
    }

    async fn handle_set_advertising(&mut self, enable: bool) -> Result<(), AtError> {
        let result = match (enable, self.advertiser.is_running()) {
            (true, false) => self.advertiser.start().await,
            (false, true) => self.advertiser.stop().await,
            _ => {
                debug!("Advertising already {}", if enable { "running" } else { "stopped" });
                Ok(())
            }
        };

        result.map_err(|error| {
            warn!("Advertising {} failed: {:?}", if enable { "start" } else { "stop" }, error);
            AtError::ExecutionFailed
        })
    }

    /// Persist a new identity and rebuild the advertising set with it
    async fn handle_set_identity(
        &mut self,
        namespace: &Namespace,
        instance_id: &InstanceId,
    ) -> Result<(), AtError> {
        if self.advertiser.is_running() {
            info!("Identity change refused while advertising");
            return Err(AtError::Busy);
        }

        self.settings
            .set_namespace(namespace)
            .and_then(|()| self.settings.set_instance_id(instance_id))
            .map_err(|error| {
                warn!("Storing identity failed: {:?}", error);
                AtError::ExecutionFailed
            })?;

        let params = AdvParams {
            interval_ms: self.adv_interval_ms,
            namespace: *namespace,
            instance_id: *instance_id,
            tx_power: self.settings.tx_power(),
        };
        self.advertiser.init(&params).await.map_err(|error| {
            warn!("Advertiser init failed: {:?}", error);
            AtError::ExecutionFailed
        })?;

        info!("Identity updated");
        Ok(())
    }

    fn respond<O: ResponseSink + ?Sized>(&self, response: &Response, out: &mut O) {
        self.serialiser.write(response, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::beacon::traits::mock::MockAdvertiser;
    use crate::beacon::AddressKind;
    use crate::config::beacon::{ALLOWED_TX_POWERS, DEFAULT_TX_POWER};
    use crate::sensors::traits::mock::MockChecks;
    use crate::storage::traits::mock::MockSettingsStore;
    use crate::system::mock::{MockDelay, MockSystem};

    type TestDispatcher = CommandDispatcher<MockSettingsStore, MockAdvertiser, MockChecks, MockSystem>;

    const ADDRESS: DeviceAddress =
        DeviceAddress::new(AddressKind::Public, [0x11, 0x22, 0x33, 0x44, 0x55, 0x66]);

    fn dispatcher_with(advertiser: MockAdvertiser, checks: MockChecks) -> TestDispatcher {
        CommandDispatcher::new(
            MockSettingsStore::new(),
            advertiser,
            checks,
            MockSystem::new(),
            ADDRESS,
        )
        .with_build_info(BuildInfo {
            git_sha: "abc123",
            build_time: "2024-06-01 10:00",
            fw_version: "1.0.0",
        })
    }

    fn dispatcher() -> TestDispatcher {
        dispatcher_with(MockAdvertiser::new(), MockChecks::new())
    }

    /// Dispatch a line, returning (recognized, output)
    fn run(dispatcher: &mut TestDispatcher, line: &[u8]) -> (bool, String) {
        let mut out = String::new();
        let mut delay = MockDelay::new();
        let recognized = futures::executor::block_on(dispatcher.dispatch(
            line,
            &mut |fragment: &str| out.push_str(fragment),
            &mut delay,
        ));
        (recognized, out)
    }

    #[test]
    fn test_keep_alive() {
        let mut dispatcher = dispatcher();

        assert_eq!(run(&mut dispatcher, b"AT"), (true, "\r\nOK\r\n".to_string()));
        // Repeating has no further effect
        assert_eq!(run(&mut dispatcher, b"AT"), (true, "\r\nOK\r\n".to_string()));
        assert_eq!(dispatcher.settings().writes(), 0);
    }

    #[test]
    fn test_unknown_and_empty_lines() {
        let mut dispatcher = dispatcher();

        assert_eq!(run(&mut dispatcher, b""), (false, "\r\nERROR\r\n".to_string()));
        assert_eq!(run(&mut dispatcher, b"HELLO"), (false, "\r\nERROR\r\n".to_string()));
        // Prefix matches but the length does not
        assert_eq!(run(&mut dispatcher, b"AT+GMMX"), (false, "\r\nERROR\r\n".to_string()));
    }

    #[test]
    fn test_identity() {
        let mut dispatcher = dispatcher();

        let (recognized, out) = run(&mut dispatcher, b"ATI9");
        assert!(recognized);
        assert_eq!(out, "\r\n\"abc123\",\"2024-06-01 10:00\",\"1.0.0\"\r\nOK\r\n");
    }

    #[test]
    fn test_identity_without_version() {
        let profile = CommandProfile {
            report_fw_version: false,
            ..CommandProfile::full()
        };
        let mut dispatcher = dispatcher().with_profile(profile);

        let (_, out) = run(&mut dispatcher, b"ATI9");
        assert_eq!(out, "\r\n\"abc123\",\"2024-06-01 10:00\"\r\nOK\r\n");
    }

    #[test]
    fn test_read_public_address_is_reversed() {
        let mut dispatcher = dispatcher();

        let (recognized, out) = run(&mut dispatcher, b"AT+UMLA=1");
        assert!(recognized);
        assert_eq!(out, "\r\n+UMLA:665544332211\r\nOK\r\n");
    }

    #[test]
    fn test_read_random_address_as_is() {
        let address = DeviceAddress::new(AddressKind::Random, [0xC1, 0x02, 0xAA, 0xBB, 0xCC, 0xDD]);
        let mut dispatcher = CommandDispatcher::new(
            MockSettingsStore::new(),
            MockAdvertiser::new(),
            MockChecks::new(),
            MockSystem::new(),
            address,
        );

        let (_, out) = run(&mut dispatcher, b"AT+UMLA=1");
        assert_eq!(out, "\r\n+UMLA:C102AABBCCDD\r\nOK\r\n");
    }

    #[test]
    fn test_model() {
        let mut dispatcher = dispatcher();

        assert_eq!(
            run(&mut dispatcher, b"AT+GMM"),
            (true, "\r\n\"NINA-B4-TAG\"\r\nOK\r\n".to_string())
        );
    }

    #[test]
    fn test_power_off_waits_then_resets() {
        let mut dispatcher = dispatcher();
        let mut out = String::new();
        let mut delay = MockDelay::new();

        let recognized = futures::executor::block_on(dispatcher.dispatch(
            b"AT+CPWROFF",
            &mut |fragment: &str| out.push_str(fragment),
            &mut delay,
        ));

        assert!(recognized);
        assert_eq!(out, "\r\nOK\r\n");
        assert_eq!(delay.sleeps_ms(), &[200]);
        assert_eq!(dispatcher.system().resets(), 1);
    }

    #[test]
    fn test_tx_power_default() {
        let mut dispatcher = dispatcher();

        let (_, out) = run(&mut dispatcher, b"AT+TXPWR?");
        assert_eq!(out, format!("\r\n+TXPWR:{}\r\nOK\r\n", DEFAULT_TX_POWER));
    }

    #[test]
    fn test_tx_power_round_trip() {
        let mut dispatcher = dispatcher();

        for dbm in ALLOWED_TX_POWERS {
            let line = format!("AT+TXPWR={}", dbm);
            assert_eq!(run(&mut dispatcher, line.as_bytes()), (true, "\r\nOK\r\n".to_string()));

            let (recognized, out) = run(&mut dispatcher, b"AT+TXPWR?");
            assert!(recognized);
            assert_eq!(out, format!("\r\n+TXPWR:{}\r\nOK\r\n", dbm));
        }
    }

    #[test]
    fn test_tx_power_rejected_leaves_state_unchanged() {
        let mut dispatcher = dispatcher();
        run(&mut dispatcher, b"AT+TXPWR=3");

        for line in [&b"AT+TXPWR=1"[..], b"AT+TXPWR=9", b"AT+TXPWR=abc", b"AT+TXPWR=3x"] {
            assert_eq!(run(&mut dispatcher, line), (false, "\r\nERROR\r\n".to_string()));
        }

        assert_eq!(dispatcher.settings().tx_power(), 3);
        assert_eq!(dispatcher.settings().writes(), 1);
    }

    #[test]
    fn test_tx_power_storage_failure() {
        let mut dispatcher = dispatcher();
        dispatcher
            .settings()
            .set_next_write_error(crate::storage::StorageError::Io);

        assert_eq!(run(&mut dispatcher, b"AT+TXPWR=0"), (false, "\r\nERROR\r\n".to_string()));
        assert_eq!(dispatcher.settings().tx_power(), DEFAULT_TX_POWER);
    }

    #[test]
    fn test_self_test_all_pass() {
        let mut dispatcher = dispatcher();

        assert_eq!(run(&mut dispatcher, b"AT+TEST"), (true, "\r\nOK\r\n".to_string()));
        assert_eq!(dispatcher.checks().calls().as_slice(), &["lis", "bme", "apds"]);
    }

    #[test]
    fn test_self_test_failures_are_tagged() {
        let mut dispatcher = dispatcher_with(MockAdvertiser::new(), MockChecks::with_results(false, true, false));

        let (recognized, out) = run(&mut dispatcher, b"AT+TEST");
        // A failing self-test is still a recognized command
        assert!(recognized);
        assert_eq!(out, "\r\nLIS_ERROR\r\n\r\nAPDS_ERROR\r\n\r\nERROR\r\n");
        assert_eq!(dispatcher.checks().calls().as_slice(), &["lis", "bme", "apds"]);
    }

    #[test]
    fn test_advertising_start_stop() {
        let mut dispatcher = dispatcher();

        assert_eq!(run(&mut dispatcher, b"AT+ADV=1"), (true, "\r\nOK\r\n".to_string()));
        assert!(dispatcher.advertiser().is_running());

        assert_eq!(run(&mut dispatcher, b"AT+ADVENABLE=0"), (true, "\r\nOK\r\n".to_string()));
        assert!(!dispatcher.advertiser().is_running());
    }

    #[test]
    fn test_advertising_requests_are_idempotent() {
        let mut dispatcher = dispatcher();

        // Stopping when already stopped succeeds without touching the radio
        assert_eq!(run(&mut dispatcher, b"AT+ADV=0"), (true, "\r\nOK\r\n".to_string()));
        assert_eq!(dispatcher.advertiser().stop_calls(), 0);

        run(&mut dispatcher, b"AT+ADV=1");
        run(&mut dispatcher, b"AT+ADV=1");
        assert_eq!(dispatcher.advertiser().start_calls(), 1);
    }

    #[test]
    fn test_advertising_failure_is_error() {
        let mut dispatcher = dispatcher();
        dispatcher.advertiser().set_next_error(crate::beacon::AdvError::Controller);

        assert_eq!(run(&mut dispatcher, b"AT+ADV=1"), (false, "\r\nERROR\r\n".to_string()));
        assert!(!dispatcher.advertiser().is_running());
    }

    #[test]
    fn test_adv_interval() {
        let mut dispatcher = dispatcher();

        assert_eq!(run(&mut dispatcher, b"AT+ADVINT=100"), (true, "\r\nOK\r\n".to_string()));
        assert_eq!(dispatcher.advertiser().interval(), Some((100, 100)));
        assert_eq!(dispatcher.adv_interval_ms(), 100);

        assert_eq!(run(&mut dispatcher, b"AT+ADVINT=10"), (false, "\r\nERROR\r\n".to_string()));
        assert_eq!(dispatcher.adv_interval_ms(), 100);
    }

    #[test]
    fn test_adv_interval_restarts_stopped_advertising() {
        let mut dispatcher = dispatcher();
        run(&mut dispatcher, b"AT+ID=ABCDEFGHIJ123456");
        assert!(!dispatcher.advertiser().is_running());

        assert_eq!(run(&mut dispatcher, b"AT+ADVINT=250"), (true, "\r\nOK\r\n".to_string()));
        assert_eq!(dispatcher.advertiser().interval(), Some((250, 250)));
        assert!(dispatcher.advertiser().is_running());
    }

    #[test]
    fn test_set_identity_while_stopped() {
        let mut dispatcher = dispatcher();
        run(&mut dispatcher, b"AT+TXPWR=-8");

        let (recognized, out) = run(&mut dispatcher, b"AT+ID=ABCDEFGHIJ123456");
        assert!(recognized);
        assert_eq!(out, "\r\nOK\r\n");

        assert_eq!(dispatcher.settings().namespace(), Some(*b"ABCDEFGHIJ"));
        assert_eq!(dispatcher.settings().instance_id(), Some(*b"123456"));
        assert_eq!(
            dispatcher.advertiser().params(),
            Some(AdvParams {
                interval_ms: ADV_INTERVALS_MS[0],
                namespace: *b"ABCDEFGHIJ",
                instance_id: *b"123456",
                tx_power: -8,
            })
        );
        // Re-initialised but not restarted
        assert!(!dispatcher.advertiser().is_running());
    }

    #[test]
    fn test_set_identity_refused_while_advertising() {
        let mut dispatcher = dispatcher_with(MockAdvertiser::running(), MockChecks::new());

        let (recognized, out) = run(&mut dispatcher, b"AT+ID=ABCDEFGHIJ123456");
        assert!(recognized);
        assert_eq!(out, "\r\nAdvertising\r\n");
        assert_eq!(dispatcher.settings().namespace(), None);
        assert_eq!(dispatcher.advertiser().params(), None);
    }

    #[test]
    fn test_profile_without_advertising_commands() {
        let profile = CommandProfile {
            advertising_commands: false,
            identity_command: false,
            ..CommandProfile::full()
        };
        let mut dispatcher = dispatcher().with_profile(profile);

        assert_eq!(run(&mut dispatcher, b"AT+ADV=1"), (false, "\r\nERROR\r\n".to_string()));
        assert_eq!(
            run(&mut dispatcher, b"AT+ID=ABCDEFGHIJ123456"),
            (false, "\r\nERROR\r\n".to_string())
        );
        assert!(!dispatcher.advertiser().is_running());
    }
}
