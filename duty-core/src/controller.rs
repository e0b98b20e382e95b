//! Controller tying the store, output channels and dispatcher together
//!
//! The controller owns all mutable state of the control loop. Each request
//! is handled to completion: parse, dispatch, then commit the handler's
//! change to memory, flash and hardware in that order.

use duty_hal::{FlashStorage, PwmDriver};
use duty_protocol::{messages, Command, ParseError, Verb};

use crate::command::{dispatch, ArgError, BoardInfo, Change, Response};
use crate::config::{BootReport, ConfigStore, Configuration, StoreError};
use crate::output::{OutputChannels, ProvisionReport};

/// What happened while handling one request line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handled {
    /// Response to send back
    pub response: Response,
    /// Resolved verb, or why the line never reached a handler
    pub request: Result<Verb, ParseError>,
    /// Set when an unknown verb was answered as `ping`
    pub fallback: bool,
    /// Outcome of the flash write, if the request persisted anything
    pub persisted: Option<Result<(), StoreError>>,
    /// Provisioning report, if the request rebuilt the outputs
    pub provision: Option<ProvisionReport>,
}

impl Handled {
    fn rejected(error: ParseError) -> Self {
        let message = match error {
            ParseError::TooLarge => messages::BAD_ARGS,
            ParseError::InvalidJson | ParseError::Empty => messages::BAD_JSON,
        };
        Self {
            response: Response::error(message),
            request: Err(error),
            fallback: false,
            persisted: None,
            provision: None,
        }
    }
}

/// Owner of configuration and outputs
pub struct Controller<S, D> {
    store: ConfigStore<S>,
    outputs: OutputChannels<D>,
    board: BoardInfo,
}

impl<S: FlashStorage, D: PwmDriver> Controller<S, D> {
    pub fn new(storage: S, driver: D, board: BoardInfo) -> Self {
        Self {
            store: ConfigStore::new(storage),
            outputs: OutputChannels::new(driver),
            board,
        }
    }

    /// Bring up storage, load the configuration and provision outputs
    pub async fn boot(&mut self) -> (BootReport, ProvisionReport) {
        let report = self.store.boot().await;
        let provision = self.outputs.provision(self.store.config().ports());
        (report, provision)
    }

    /// Handle one request line (terminator already stripped)
    ///
    /// A line that does not parse as a request is answered with `bad-json`
    /// and never reaches a handler. A well-formed request with more
    /// elements, or longer elements, than a request can hold is answered
    /// with `bad-args`.
    pub async fn handle_line(&mut self, line: &[u8]) -> Handled {
        match Command::parse(line) {
            Ok(command) => self.handle(&command).await,
            Err(e) => Handled::rejected(e),
        }
    }

    /// Dispatch a parsed command and commit its change
    pub async fn handle(&mut self, command: &Command) -> Handled {
        let outcome = dispatch(self.store.config(), command, &self.board);
        let mut handled = Handled {
            response: outcome.response,
            request: Ok(command.verb()),
            fallback: command.is_fallback(),
            persisted: None,
            provision: None,
        };

        let persist = outcome.change.persists();
        let rebuild = outcome.change.rebuilds();
        match outcome.change {
            Change::None => return handled,
            Change::Live(c) | Change::Persist(c) | Change::Rebuild(c) => self.store.replace(c),
            Change::Reload(document) => {
                if let Err(e) = self.store.load_from_document(document) {
                    handled.response = ArgError::from(e).into();
                    return handled;
                }
            }
        }

        if persist {
            handled.persisted = Some(self.store.dump().await);
        }
        if rebuild {
            handled.provision = Some(self.outputs.provision(self.store.config().ports()));
        }
        handled
    }

    /// Write the current live values to the outputs
    ///
    /// Returns the number of outputs whose level changed.
    pub fn apply_outputs(&mut self) -> usize {
        self.outputs.apply(self.store.config().values())
    }

    /// Erase stored configuration
    pub async fn wipe(&mut self) -> Result<(), StoreError> {
        self.store.wipe().await
    }

    pub fn config(&self) -> &Configuration {
        self.store.config()
    }

    pub fn store(&self) -> &ConfigStore<S> {
        &self.store
    }

    pub fn outputs(&self) -> &OutputChannels<D> {
        &self.outputs
    }

    pub fn board(&self) -> &BoardInfo {
        &self.board
    }

    /// Drop configuration and outputs, returning the storage
    pub fn into_storage(self) -> S {
        self.store.into_storage()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{decode_record, ConfigDocument, ConfigSource};
    use crate::testing::{MemFlash, MockPwm, PwmEvent};
    use duty_hal::{FlashError, PwmError};
    use embassy_futures::block_on;

    const BOARD: BoardInfo = BoardInfo {
        max_ports: 16,
        board_name: "test-board",
    };

    fn booted() -> Controller<MemFlash, MockPwm> {
        let mut controller = Controller::new(MemFlash::new(), MockPwm::new(), BOARD);
        block_on(controller.boot());
        controller
    }

    fn send(controller: &mut Controller<MemFlash, MockPwm>, line: &str) -> Handled {
        block_on(controller.handle_line(line.as_bytes()))
    }

    fn encoded(response: &Response) -> std::string::String {
        let mut buffer = [0u8; 256];
        let len = response.encode(&mut buffer).unwrap();
        std::string::String::from_utf8(buffer[..len].to_vec()).unwrap()
    }

    #[test]
    fn test_boot_provisions_default_port() {
        let mut controller = Controller::new(MemFlash::new(), MockPwm::new(), BOARD);
        let (report, provision) = block_on(controller.boot());
        assert!(matches!(report.source, ConfigSource::Defaults(_)));
        assert!(provision.is_complete());
        assert_eq!(controller.outputs().driver().attached(), vec![25]);

        assert_eq!(controller.apply_outputs(), 1);
        assert_eq!(controller.outputs().driver().level(25), Some(1023));
    }

    #[test]
    fn test_set_value_then_get_value() {
        let mut controller = booted();
        send(&mut controller, r#"["ports-setup","2","3","4"]"#);

        let handled = send(&mut controller, r#"["set-value","1","75"]"#);
        assert_eq!(handled.response, Response::ok());
        assert_eq!(handled.persisted, None);
        assert_eq!(handled.provision, None);

        let handled = send(&mut controller, r#"["get-value"]"#);
        assert_eq!(
            encoded(&handled.response),
            "{\"code\":\"ok\",\"data\":{\"values\":[0,75,0]}}\n"
        );
    }

    #[test]
    fn test_live_values_are_not_written_to_flash() {
        let mut controller = booted();
        send(&mut controller, r#"["set-value","0","5"]"#);
        assert_eq!(controller.store().storage().writes, 0);
    }

    #[test]
    fn test_ports_setup_persists_and_reprovisions() {
        let mut controller = booted();
        let handled = send(&mut controller, r#"["ports-setup","2","3","4"]"#);
        assert_eq!(handled.persisted, Some(Ok(())));
        assert_eq!(handled.provision.map(|p| p.provisioned), Some(3));

        let handled = send(&mut controller, r#"["get-config"]"#);
        assert_eq!(
            encoded(&handled.response),
            "{\"code\":\"ok\",\"data\":{\"ports\":[2,3,4],\"default_values\":[0,0,0],\"update_time\":120,\"values\":[0,0,0]}}\n"
        );

        let stored = controller.store().storage().record.clone().unwrap();
        assert_eq!(decode_record(&stored).unwrap().ports.as_slice(), &[2, 3, 4]);
        assert_eq!(controller.outputs().driver().attached(), vec![2, 3, 4]);
    }

    #[test]
    fn test_rejected_set_config_is_atomic() {
        let mut controller = booted();
        send(&mut controller, r#"["ports-setup","2","3"]"#);
        let before = encoded(&send(&mut controller, r#"["get-config"]"#).response);
        let writes = controller.store().storage().writes;
        let events = controller.outputs().driver().events.len();

        let handled = send(
            &mut controller,
            r#"["set-config","{\"ports\":[5,6,7],\"default_values\":[1,2]}"]"#,
        );
        assert_eq!(handled.response, Response::error(messages::BAD_ARGS));

        let after = encoded(&send(&mut controller, r#"["get-config"]"#).response);
        assert_eq!(before, after);
        assert_eq!(controller.store().storage().writes, writes);
        assert_eq!(controller.outputs().driver().events.len(), events);
    }

    #[test]
    fn test_set_config_through_escaped_argument() {
        let mut controller = booted();
        let handled = send(
            &mut controller,
            r#"["set-config","{\"ports\":[5,6],\"default_values\":[10,90],\"update_time\":40}"]"#,
        );
        assert_eq!(handled.response, Response::ok());
        assert_eq!(controller.config().ports(), &[5, 6]);
        assert_eq!(controller.config().values(), &[10, 90]);

        controller.apply_outputs();
        assert_eq!(controller.outputs().driver().level(5), Some(102));
        assert_eq!(controller.outputs().driver().level(6), Some(920));
    }

    #[test]
    fn test_load_default_config() {
        let mut controller = booted();
        send(&mut controller, r#"["ports-setup","2","3"]"#);
        send(&mut controller, r#"["load-default-config"]"#);

        let handled = send(&mut controller, r#"["get-config"]"#);
        assert_eq!(
            encoded(&handled.response),
            "{\"code\":\"ok\",\"data\":{\"ports\":[25],\"default_values\":[100],\"update_time\":120,\"values\":[100]}}\n"
        );
        assert_eq!(controller.outputs().driver().attached(), vec![25]);

        let stored = controller.store().storage().record.clone().unwrap();
        assert_eq!(decode_record(&stored).unwrap(), ConfigDocument::canonical());
    }

    #[test]
    fn test_set_config_is_written_to_flash() {
        let mut controller = booted();
        let handled = send(
            &mut controller,
            r#"["set-config","{\"ports\":[9,10],\"default_values\":[30,60]}"]"#,
        );
        assert_eq!(handled.request, Ok(Verb::SetConfig));
        assert_eq!(handled.persisted, Some(Ok(())));
        assert_eq!(handled.provision.map(|p| p.provisioned), Some(2));

        let stored = decode_record(&controller.store().storage().record.clone().unwrap()).unwrap();
        assert_eq!(stored.ports.as_slice(), &[9, 10]);
        assert_eq!(stored.default_values.as_slice(), &[30, 60]);
        assert_eq!(stored.update_time, 120);
        assert_eq!(controller.config().values(), &[30, 60]);
    }

    #[test]
    fn test_persisted_config_survives_reboot() {
        let mut controller = booted();
        send(&mut controller, r#"["ports-setup","7","8"]"#);
        send(&mut controller, r#"["set-default-value","1","33"]"#);
        send(&mut controller, r#"["set-update-time","900"]"#);
        send(&mut controller, r#"["set-value","0","99"]"#);

        let mut rebooted = Controller::new(controller.into_storage(), MockPwm::new(), BOARD);
        let (report, _) = block_on(rebooted.boot());
        assert_eq!(report.source, ConfigSource::Flash);
        assert_eq!(rebooted.config().ports(), &[7, 8]);
        assert_eq!(rebooted.config().default_values(), &[0, 33]);
        assert_eq!(rebooted.config().values(), &[0, 33]);
        assert_eq!(rebooted.config().update_time(), 900);
    }

    #[test]
    fn test_malformed_lines_touch_nothing() {
        let mut controller = booted();
        let events = controller.outputs().driver().events.clone();

        for line in [
            "not json",
            r#"["set-value","0""#,
            r#"["set-value",1,2]"#,
            "[]",
            r#"{"verb":"ping"}"#,
            r#"["ping"] trailing"#,
        ] {
            let handled = send(&mut controller, line);
            assert_eq!(handled.response, Response::error(messages::BAD_JSON), "{}", line);
            assert!(handled.request.is_err());
            assert_eq!(handled.persisted, None);
            assert_eq!(handled.provision, None);
        }
        assert_eq!(controller.store().storage().writes, 0);
        assert_eq!(controller.outputs().driver().events, events);
        assert_eq!(controller.config(), &Configuration::canonical());
    }

    #[test]
    fn test_oversized_requests_are_bad_args() {
        let mut controller = booted();
        let events = controller.outputs().driver().events.clone();

        let mut ports = std::string::String::from("[\"ports-setup\"");
        for port in 0..24 {
            ports.push_str(&std::format!(",\"{}\"", port));
        }
        ports.push(']');
        let long = std::format!("[\"set-config\",\"{}\"]", " ".repeat(300));

        for line in [ports.as_str(), long.as_str()] {
            let handled = send(&mut controller, line);
            assert_eq!(handled.response, Response::error(messages::BAD_ARGS));
            assert_eq!(handled.request, Err(ParseError::TooLarge));
            assert_eq!(handled.persisted, None);
            assert_eq!(handled.provision, None);
        }

        let seventeen = r#"["ports-setup","0","1","2","3","4","5","6","7","8","9","10","11","12","13","14","15","16"]"#;
        let handled = send(&mut controller, seventeen);
        assert_eq!(handled.response, Response::error(messages::BAD_ARGS));
        assert_eq!(handled.request, Ok(Verb::PortsSetup));

        assert_eq!(controller.store().storage().writes, 0);
        assert_eq!(controller.outputs().driver().events, events);
        assert_eq!(controller.config(), &Configuration::canonical());
    }

    #[test]
    fn test_unknown_verb_matches_ping() {
        let mut controller = booted();
        let ping = send(&mut controller, r#"["ping"]"#);
        let unknown = send(&mut controller, r#"["self-destruct"]"#);
        assert_eq!(ping.response, unknown.response);
        assert_eq!(unknown.request, Ok(Verb::Ping));
        assert!(unknown.fallback);
        assert!(!ping.fallback);
        assert_eq!(
            encoded(&unknown.response),
            "{\"code\":\"ok\",\"message\":\"pong\"}\n"
        );
    }

    #[test]
    fn test_failed_dump_keeps_new_config() {
        let mut flash = MemFlash::new();
        flash.fail_writes = true;
        let mut controller = Controller::new(flash, MockPwm::new(), BOARD);
        block_on(controller.boot());

        let handled = send(&mut controller, r#"["ports-setup","2"]"#);
        assert_eq!(handled.response, Response::ok());
        assert_eq!(
            handled.persisted,
            Some(Err(StoreError::Flash(FlashError::Flash)))
        );
        assert_eq!(controller.config().ports(), &[2]);
        assert_eq!(controller.outputs().driver().attached(), vec![2]);
    }

    #[test]
    fn test_reserved_port_is_accepted_but_not_driven() {
        let mut pwm = MockPwm::new();
        pwm.refuse(0, PwmError::Reserved);
        let mut controller = Controller::new(MemFlash::new(), pwm, BOARD);
        block_on(controller.boot());

        let handled = send(&mut controller, r#"["ports-setup","0","2"]"#);
        assert_eq!(handled.response, Response::ok());
        let report = handled.provision.unwrap();
        assert_eq!(report.provisioned, 1);
        assert_eq!(report.rejected.as_slice(), &[(0, PwmError::Reserved)]);

        assert_eq!(controller.config().ports(), &[0, 2]);
        assert_eq!(controller.outputs().driver().attached(), vec![2]);
    }

    #[test]
    fn test_apply_outputs_per_channel() {
        let mut controller = booted();
        send(&mut controller, r#"["ports-setup","2","3"]"#);
        send(&mut controller, r#"["set-value","0","25"]"#);
        send(&mut controller, r#"["set-value","1","100"]"#);
        assert_eq!(controller.apply_outputs(), 2);
        assert_eq!(controller.apply_outputs(), 0);

        let driver = controller.outputs().driver();
        assert_eq!(driver.level(2), Some(255));
        assert_eq!(driver.level(3), Some(1023));
        assert!(driver.events.contains(&PwmEvent::Level(2, 255)));
    }

    #[test]
    fn test_wipe_clears_record() {
        let mut controller = booted();
        send(&mut controller, r#"["set-update-time","10"]"#);
        assert!(controller.store().storage().record.is_some());
        block_on(controller.wipe()).unwrap();
        assert!(controller.store().storage().record.is_none());

        let mut rebooted = Controller::new(controller.into_storage(), MockPwm::new(), BOARD);
        let (report, _) = block_on(rebooted.boot());
        assert_eq!(
            report.source,
            ConfigSource::Defaults(StoreError::Flash(FlashError::NotFound))
        );
        assert_eq!(rebooted.config(), &Configuration::canonical());
    }
}
