//! Inventory controller
//!
//! Drives the reader through the handshake and starts and stops inventory
//! on top of a [`ReaderLink`]. Every wait goes through the link's
//! [`transact`](ReaderLink::transact) helper, which polls the router's
//! processing entry point and never parses on its own.

use embedded_hal::delay::DelayNs;
use tagwedge_protocol::command::command_name;
use tagwedge_protocol::{Command, ADDR_BROADCAST};

use crate::error::LinkError;
use crate::filter::FilterSummary;
use crate::router::{Ack, Mode, ProcessOutcome, ReaderLink};
use crate::traits::{InputControl, SettingsStore};

/// Reader handshake and inventory start/stop
pub struct InventoryController<'r, L, S, I, D> {
    link: &'r L,
    settings: S,
    input: I,
    delay: D,
    connected: bool,
    reader_address: u8,
    /// Last state reported through `input`
    running: bool,
}

impl<'r, L, S, I, D> InventoryController<'r, L, S, I, D>
where
    L: ReaderLink,
    S: SettingsStore,
    I: InputControl,
    D: DelayNs,
{
    pub fn new(link: &'r L, settings: S, input: I, delay: D) -> Self {
        let reader_address = settings.get_reader_address();
        Self {
            link,
            settings,
            input,
            delay,
            connected: false,
            reader_address,
            running: false,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Address commands are sent to
    pub fn reader_address(&self) -> u8 {
        self.reader_address
    }

    /// Inventory state as last reported to the input control
    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn link(&self) -> &'r L {
        self.link
    }

    /// Handshake with the reader
    ///
    /// Succeeds when at least one of the broadcast info query, the
    /// addressed info query or the work-mode command is answered. The
    /// stop command sent in between may go unanswered.
    pub fn connect(&mut self) -> Result<(), LinkError> {
        let config = self.link.config();
        let configured = self.settings.get_reader_address();
        self.connected = false;
        info!("connecting to reader {}", configured);

        let broadcast = self.request(ADDR_BROADCAST, &Command::ObtainReaderInfo)?;
        let addressed = self.request(configured, &Command::ObtainReaderInfo)?;

        // Fall back to whoever answered the broadcast
        let address = match (&addressed, &broadcast) {
            (Some(_), _) | (None, None) => configured,
            (None, Some(ack)) => {
                warn!(
                    "reader answers at {} instead of {}",
                    ack.address,
                    configured
                );
                ack.address
            }
        };
        self.reader_address = address;
        self.link.set_reader_address(address);

        if self.request(address, &Command::StopImmediately)?.is_none() {
            debug!("stop not acknowledged, reader was idle");
        }
        let work_mode = self.request(address, &Command::SetWorkMode(config.work_mode))?;

        if broadcast.is_none() && addressed.is_none() && work_mode.is_none() {
            error!("reader did not answer");
            return Err(LinkError::HandshakeFailed);
        }

        self.best_effort(&Command::SetAntennaCheck(false));
        self.best_effort(&Command::ModifyRfPower(self.settings.get_rf_power()));
        let antenna = self.settings.get_antenna_config();
        if antenna != 0 {
            self.best_effort(&Command::SetupAntennaMux(antenna));
        }

        self.connected = true;
        info!("reader connected at {}", address);
        Ok(())
    }

    /// Start inventory without waiting for the first tag
    ///
    /// Connects first when needed. The mode switches to `Inventory` before
    /// the start command is queued.
    pub fn start_inventory(&mut self) -> Result<(), LinkError> {
        if !self.connected {
            self.connect()?;
        }
        if self.link.inventory_active() && self.link.mode() == Mode::Inventory {
            debug!("inventory already running");
            return Ok(());
        }

        let strategy = self.link.config().strategy;
        self.link.clear_filter();
        self.link.set_mode(Mode::Inventory);
        if let Err(e) = self
            .link
            .send_command_to(self.reader_address, &strategy.start_command())
        {
            self.link.set_mode(Mode::Idle);
            error!("inventory start failed: {}", e);
            return Err(e);
        }
        self.link.arm_inventory();
        self.sync_running(true);
        info!("inventory started");
        Ok(())
    }

    /// Stop inventory and return the session totals
    ///
    /// The mode drops to `Idle` even when the stop command cannot be queued.
    pub fn stop_inventory(&mut self) -> Result<FilterSummary, LinkError> {
        let strategy = self.link.config().strategy;
        self.link.disarm_inventory();
        let summary = self.link.report_summary();
        let sent = self
            .link
            .send_command_to(self.reader_address, &strategy.stop_command());
        self.link.set_mode(Mode::Idle);
        self.sync_running(false);

        if let Err(e) = sent {
            warn!("stop command not sent: {}", e);
            return Err(e);
        }
        info!("inventory stopped");
        Ok(summary)
    }

    /// Start or stop inventory, returning the new state
    pub fn toggle_inventory(&mut self) -> Result<bool, LinkError> {
        if self.running {
            self.stop_inventory()?;
            Ok(false)
        } else {
            self.start_inventory()?;
            Ok(true)
        }
    }

    /// Send `command` to the reader and wait for an accepting response
    pub fn command(&mut self, command: &Command) -> Result<Ack, LinkError> {
        if !self.connected {
            return Err(LinkError::NotConnected);
        }
        let timeout = self.link.config().response_timeout_ms;
        self.link
            .transact(self.reader_address, command, timeout, &mut self.delay)?
            .ensure_ok()
    }

    /// Driver-loop entry point
    ///
    /// Processes received frames and reports inventory that ended on its
    /// own (single round done, antenna error) to the input control.
    pub fn poll(&mut self) -> ProcessOutcome {
        let outcome = self.link.process();
        if outcome != ProcessOutcome::Skipped {
            let running = self.link.inventory_active() && self.link.mode() == Mode::Inventory;
            self.sync_running(running);
        }
        outcome
    }

    /// One handshake step; `None` when the reader stayed silent
    fn request(&mut self, address: u8, command: &Command) -> Result<Option<Ack>, LinkError> {
        let timeout = self.link.config().response_timeout_ms;
        match self
            .link
            .transact(address, command, timeout, &mut self.delay)
        {
            Ok(ack) => {
                if !ack.status.is_ok() {
                    debug!(
                        "{} answered with {:?}",
                        command_name(ack.command),
                        ack.status
                    );
                }
                Ok(Some(ack))
            }
            Err(LinkError::Timeout { .. }) => Ok(None),
            Err(e @ (LinkError::NotRunning | LinkError::TxOverflow { .. })) => Err(e),
            Err(e) => {
                warn!("{} failed: {}", command_name(command.code()), e);
                Ok(None)
            }
        }
    }

    fn best_effort(&mut self, command: &Command) {
        let timeout = self.link.config().response_timeout_ms;
        let result = self
            .link
            .transact(self.reader_address, command, timeout, &mut self.delay)
            .and_then(Ack::ensure_ok);
        if let Err(e) = result {
            warn!("{} ignored: {}", command_name(command.code()), e);
        }
    }

    fn sync_running(&mut self, running: bool) {
        if self.running != running {
            self.running = running;
            self.input.set_inventory_running(running);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{InventoryStrategy, LinkConfig};
    use crate::link::LinkQueues;
    use crate::router::Router;
    use crate::traits::Clock;
    use crate::testing::{
        inventory_batch, FakeReader, FixedSettings, ManualClock, RecordingInput,
        RecordingNotifier, RecordingSink, TestRouter,
    };
    use tagwedge_protocol::command::{
        CMD_ENABLE_ANTENNA_CHECK, CMD_MODIFY_RF_POWER, CMD_OBTAIN_READER_INFO,
        CMD_SETUP_ANTENNA_MUX, CMD_SET_WORK_MODE, CMD_START_FAST_INVENTORY,
        CMD_STOP_FAST_INVENTORY, CMD_STOP_IMMEDIATELY, CMD_TAG_INVENTORY,
    };
    use tagwedge_protocol::command::{MemoryBank, TagSelector};
    use tagwedge_protocol::response::MemoryWords;
    use tagwedge_protocol::status::STATUS_OPERATION_COMPLETE;
    use tagwedge_protocol::Status;

    const EPC: [u8; 4] = [0x30, 0x08, 0x33, 0xB2];

    type Controller<'r, 'a, 'q> = InventoryController<
        'r,
        TestRouter<'a, 'q>,
        FixedSettings,
        &'a RecordingInput,
        FakeReader<'a, 'q>,
    >;

    struct Bench {
        clock: ManualClock,
        sink: RecordingSink,
        notifier: RecordingNotifier,
        input: RecordingInput,
    }

    impl Bench {
        fn new() -> Self {
            Self {
                clock: ManualClock::default(),
                sink: RecordingSink::default(),
                notifier: RecordingNotifier::default(),
                input: RecordingInput::default(),
            }
        }

        fn router<'a, 'q>(
            &'a self,
            queues: &'q mut LinkQueues,
            config: LinkConfig,
        ) -> (TestRouter<'a, 'q>, FakeReader<'a, 'q>) {
            let (serial, port) = queues.split();
            let router = Router::new(port, config, &self.clock, &self.sink, &self.notifier);
            router.start().unwrap();
            (router, FakeReader::new(serial, &self.clock))
        }

        fn controller<'r, 'a, 'q>(
            &'a self,
            router: &'r TestRouter<'a, 'q>,
            settings: FixedSettings,
            reader: FakeReader<'a, 'q>,
        ) -> Controller<'r, 'a, 'q> {
            InventoryController::new(router, settings, &self.input, reader)
        }
    }

    #[test]
    fn test_connect_sequence() {
        let bench = Bench::new();
        let mut queues = LinkQueues::new();
        let (router, reader) = bench.router(&mut queues, LinkConfig::default());
        let mut ctl = bench.controller(&router, FixedSettings::default(), reader);

        ctl.connect().unwrap();
        assert!(ctl.is_connected());
        assert_eq!(
            ctl.delay.codes(),
            [
                CMD_OBTAIN_READER_INFO,
                CMD_OBTAIN_READER_INFO,
                CMD_STOP_IMMEDIATELY,
                CMD_SET_WORK_MODE,
                CMD_ENABLE_ANTENNA_CHECK,
                CMD_MODIFY_RF_POWER,
            ]
        );
        assert_eq!(ctl.delay.received[0][1], ADDR_BROADCAST);
        assert_eq!(ctl.delay.received[1][1], 0x00);
        // Persisted RF power
        assert_eq!(ctl.delay.received[5][3], 20);
        assert!(router.reader_info().is_some());
    }

    #[test]
    fn test_connect_without_broadcast_answer() {
        let bench = Bench::new();
        let mut queues = LinkQueues::new();
        let (router, mut reader) = bench.router(&mut queues, LinkConfig::default());
        reader.ignore_broadcast = true;
        let mut ctl = bench.controller(&router, FixedSettings::default(), reader);

        ctl.connect().unwrap();
        assert!(ctl.is_connected());
    }

    #[test]
    fn test_connect_with_only_work_mode_answered() {
        let bench = Bench::new();
        let mut queues = LinkQueues::new();
        let (router, mut reader) = bench.router(&mut queues, LinkConfig::default());
        reader.mute.push(CMD_OBTAIN_READER_INFO);
        reader.mute.push(CMD_STOP_IMMEDIATELY);
        let mut ctl = bench.controller(&router, FixedSettings::default(), reader);

        ctl.connect().unwrap();
        assert!(ctl.is_connected());
    }

    #[test]
    fn test_connect_fails_when_reader_silent() {
        let bench = Bench::new();
        let mut queues = LinkQueues::new();
        let (router, mut reader) = bench.router(&mut queues, LinkConfig::default());
        reader.mute.extend([CMD_OBTAIN_READER_INFO, CMD_SET_WORK_MODE]);
        let mut ctl = bench.controller(&router, FixedSettings::default(), reader);

        assert_eq!(ctl.connect(), Err(LinkError::HandshakeFailed));
        assert!(!ctl.is_connected());
        // Each silent step waited for the full response timeout
        assert!(bench.clock.now_ms() >= 3 * 200);
        assert_eq!(
            ctl.start_inventory(),
            Err(LinkError::HandshakeFailed)
        );
        assert_eq!(router.mode(), Mode::Idle);
    }

    #[test]
    fn test_connect_adopts_broadcast_responder() {
        let bench = Bench::new();
        let mut queues = LinkQueues::new();
        let (router, mut reader) = bench.router(&mut queues, LinkConfig::default());
        reader.address = 0x05;
        let mut ctl = bench.controller(&router, FixedSettings::default(), reader);

        ctl.connect().unwrap();
        assert_eq!(ctl.reader_address(), 0x05);
        assert_eq!(router.reader_address(), 0x05);
        // Work mode went to the adopted address
        assert_eq!(ctl.delay.received[3][1], 0x05);
    }

    #[test]
    fn test_connect_requires_running_router() {
        let bench = Bench::new();
        let mut queues = LinkQueues::new();
        let (router, reader) = bench.router(&mut queues, LinkConfig::default());
        router.stop().unwrap();
        let mut ctl = bench.controller(&router, FixedSettings::default(), reader);

        assert_eq!(ctl.connect(), Err(LinkError::NotRunning));
    }

    #[test]
    fn test_best_effort_steps_do_not_fail_connect() {
        let bench = Bench::new();
        let mut queues = LinkQueues::new();
        let (router, mut reader) = bench.router(&mut queues, LinkConfig::default());
        reader.mute.extend([CMD_ENABLE_ANTENNA_CHECK, CMD_MODIFY_RF_POWER]);
        let settings = FixedSettings {
            antenna: 0x03,
            ..FixedSettings::default()
        };
        let mut ctl = bench.controller(&router, settings, reader);

        ctl.connect().unwrap();
        assert_eq!(ctl.delay.codes().last(), Some(&CMD_SETUP_ANTENNA_MUX));
        assert_eq!(ctl.delay.received.last().map(|f| f[3]), Some(0x03));
    }

    #[test]
    fn test_start_inventory_connects_first() {
        let bench = Bench::new();
        let mut queues = LinkQueues::new();
        let (router, mut reader) = bench.router(&mut queues, LinkConfig::default());
        reader.inventory_replies.push_back(std::vec![inventory_batch(
            0x00,
            STATUS_OPERATION_COMPLETE,
            &[&EPC],
        )]);
        let mut ctl = bench.controller(&router, FixedSettings::default(), reader);

        ctl.start_inventory().unwrap();
        assert!(ctl.is_connected());
        assert_eq!(router.mode(), Mode::Inventory);
        assert_eq!(*bench.input.states.borrow(), [true]);

        // Start command is queued, not yet answered
        assert_eq!(router.pending_tx(), 10);
        ctl.delay.pump();
        assert_eq!(ctl.delay.codes().last(), Some(&CMD_TAG_INVENTORY));

        ctl.poll();
        assert_eq!(bench.sink.tags(), ["300833B2"]);
        assert!(ctl.is_running());
    }

    #[test]
    fn test_start_failure_reverts_mode() {
        let bench = Bench::new();
        let mut queues = LinkQueues::new();
        let (router, reader) = bench.router(&mut queues, LinkConfig::default());
        let mut ctl = bench.controller(&router, FixedSettings::default(), reader);
        ctl.connect().unwrap();

        while router.send(&Command::StopImmediately).is_ok() {}
        assert!(matches!(
            ctl.start_inventory(),
            Err(LinkError::TxOverflow { .. })
        ));
        assert_eq!(router.mode(), Mode::Idle);
        assert!(!router.inventory_active());
        assert!(bench.input.states.borrow().is_empty());
    }

    #[test]
    fn test_stop_inventory() {
        let bench = Bench::new();
        let mut queues = LinkQueues::new();
        let (router, reader) = bench.router(&mut queues, LinkConfig::default());
        let mut ctl = bench.controller(&router, FixedSettings::default(), reader);
        ctl.start_inventory().unwrap();
        ctl.delay.pump();

        let summary = ctl.stop_inventory().unwrap();
        assert_eq!(summary, FilterSummary::default());
        assert_eq!(router.mode(), Mode::Idle);
        assert!(!router.inventory_active());
        assert_eq!(*bench.input.states.borrow(), [true, false]);

        // Stop goes out after the mode change
        ctl.delay.pump();
        assert_eq!(ctl.delay.codes().last(), Some(&CMD_STOP_IMMEDIATELY));
    }

    #[test]
    fn test_fast_strategy_commands() {
        let bench = Bench::new();
        let mut queues = LinkQueues::new();
        let config = LinkConfig {
            strategy: InventoryStrategy::Fast,
            ..LinkConfig::default()
        };
        let (router, reader) = bench.router(&mut queues, config);
        let mut ctl = bench.controller(&router, FixedSettings::default(), reader);

        ctl.start_inventory().unwrap();
        ctl.delay.pump();
        assert_eq!(ctl.delay.codes().last(), Some(&CMD_START_FAST_INVENTORY));

        // Acknowledgement of the start does not end fast inventory
        ctl.poll();
        assert_eq!(router.mode(), Mode::Inventory);

        ctl.stop_inventory().unwrap();
        ctl.delay.pump();
        assert_eq!(ctl.delay.codes().last(), Some(&CMD_STOP_FAST_INVENTORY));
    }

    #[test]
    fn test_poll_reports_finished_single_shot() {
        let bench = Bench::new();
        let mut queues = LinkQueues::new();
        let config = LinkConfig {
            strategy: InventoryStrategy::SingleShot,
            ..LinkConfig::default()
        };
        let (router, reader) = bench.router(&mut queues, config);
        let mut ctl = bench.controller(&router, FixedSettings::default(), reader);

        ctl.start_inventory().unwrap();
        ctl.delay.pump();
        ctl.poll();
        assert_eq!(router.mode(), Mode::Idle);
        assert!(!ctl.is_running());
        assert_eq!(*bench.input.states.borrow(), [true, false]);
    }

    #[test]
    fn test_toggle_inventory() {
        let bench = Bench::new();
        let mut queues = LinkQueues::new();
        let (router, reader) = bench.router(&mut queues, LinkConfig::default());
        let mut ctl = bench.controller(&router, FixedSettings::default(), reader);

        assert_eq!(ctl.toggle_inventory(), Ok(true));
        assert_eq!(ctl.toggle_inventory(), Ok(false));
        assert_eq!(router.mode(), Mode::Idle);
    }

    #[test]
    fn test_command_needs_connection() {
        let bench = Bench::new();
        let mut queues = LinkQueues::new();
        let (router, reader) = bench.router(&mut queues, LinkConfig::default());
        let mut ctl = bench.controller(&router, FixedSettings::default(), reader);

        assert_eq!(
            ctl.command(&Command::GetTagCount),
            Err(LinkError::NotConnected)
        );
        ctl.connect().unwrap();
        let ack = ctl.command(&Command::GetTagCount).unwrap();
        assert_eq!(ack.status, Status::Success);
        assert_eq!(router.last_tag_count(), Some(3));
    }

    #[test]
    fn test_command_returns_reply_payload() {
        let bench = Bench::new();
        let mut queues = LinkQueues::new();
        let (router, reader) = bench.router(&mut queues, LinkConfig::default());
        let mut ctl = bench.controller(&router, FixedSettings::default(), reader);
        ctl.connect().unwrap();

        let ack = ctl.command(&Command::ObtainReaderSerial).unwrap();
        assert_eq!(ack.payload.as_slice(), &[0x12, 0x34, 0x56, 0x78]);

        let read = Command::ReadData {
            selector: TagSelector::Epc(heapless::Vec::from_slice(&EPC).unwrap()),
            bank: MemoryBank::Tid,
            word_ptr: 0,
            word_count: 2,
            password: [0; 4],
        };
        let ack = ctl.command(&read).unwrap();
        let words = MemoryWords::decode(&ack.payload).unwrap();
        assert_eq!(words.words().collect::<std::vec::Vec<_>>(), [0xE200, 0x3412]);
        assert_eq!(ctl.delay.received.last().map(|f| f[2]), Some(0x02));
    }
}
