//! Frame router
//!
//! The router drains the inbound ring through the frame assembler, checks
//! and decodes each frame, and routes the result: tags go through the
//! duplicate filter to the tag sink, command responses are queued as
//! [`Ack`]s for the waiting caller, and inventory status codes drive the
//! `Idle`/`Inventory` mode machine.
//!
//! # Concurrency
//!
//! Every method takes `&self`, and all mutable state sits behind a blocking
//! mutex of the raw mutex type `M`. With a `Sync` raw mutex such as
//! `CriticalSectionRawMutex` the router is `Sync` (given a `Sync` clock and
//! `Send` sinks) and can be shared between the main loop and an interrupt
//! handler. `NoopRawMutex` keeps it in a single context. Each lock is held
//! for one field access, or for one sink call while a tag is emitted.
//!
//! [`Router::process`] is guarded by an atomic busy flag: a second caller
//! that finds it set returns [`ProcessOutcome::Skipped`] at once, without
//! touching any state. The wait helper ([`Router::transact`]) only ever goes
//! through `process`, and serves one outstanding request at a time.
//!
//! A mode change resets the receive side (inbound ring and assembler) and
//! leaves the outbound ring alone, so a command queued just before the
//! change is still transmitted. When the change happens while `process` is
//! running, the reset is deferred to the next point where the processing
//! side owns the receive path. A debounce change that finds the filter in
//! use is deferred the same way.

mod stats;

use core::cell::{Cell, RefCell};

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embedded_hal::delay::DelayNs;
use heapless::spsc::{Consumer, Producer};
use heapless::{Deque, Vec};
use portable_atomic::{AtomicBool, Ordering};

use tagwedge_protocol::command::{
    command_name, CMD_SINGLE_TAG_INVENTORY, CMD_START_FAST_INVENTORY, CMD_TAG_INVENTORY,
    RECMD_AUTO_UPLOAD,
};
use tagwedge_protocol::crc::CRC_LEN;
use tagwedge_protocol::response::HEADER_LEN;
use tagwedge_protocol::{
    format_epc, verify, AssemblerPhase, Command, FrameAssembler, ReaderInfo, Reply, Response,
    Status, TagRecord, ADDR_BROADCAST, ADDR_DEFAULT, MAX_FRAME_SIZE, MAX_RESPONSE_PAYLOAD,
};

use crate::config::{InventoryStrategy, LinkConfig};
use crate::error::LinkError;
use crate::filter::{DuplicateFilter, FilterSummary};
use crate::link::{LinkShared, RouterPort, RING_SIZE};
use crate::traits::{Clock, NotificationSink, SinkError, TagSink};

pub use stats::RouterStats;
use stats::{add, bump, Stats};

/// Responses kept for waiting callers
pub const ACK_QUEUE_LEN: usize = 4;

/// Router mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    Idle,
    Inventory,
}

/// Result of one [`Router::process`] call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProcessOutcome {
    /// Another caller was already processing
    Skipped,
    /// Router not started
    Stopped,
    Processed { frames: usize },
}

/// Response to a command
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Ack {
    pub address: u8,
    pub command: u8,
    pub status: Status,
    /// Raw response payload after the status byte
    pub payload: Vec<u8, MAX_RESPONSE_PAYLOAD>,
}

impl Ack {
    /// Turn an error status into [`LinkError::Rejected`]
    pub fn ensure_ok(self) -> Result<Self, LinkError> {
        if self.status.is_ok() {
            Ok(self)
        } else {
            Err(LinkError::Rejected {
                command: self.command,
                status: self.status,
            })
        }
    }

    /// Whether this answers `command` sent to `address`
    fn answers(&self, address: u8, command: u8) -> bool {
        self.command == command && (address == ADDR_BROADCAST || self.address == address)
    }
}

/// Operations the inventory controller needs from a router
pub trait ReaderLink {
    fn process(&self) -> ProcessOutcome;

    fn mode(&self) -> Mode;

    fn set_mode(&self, mode: Mode);

    fn config(&self) -> LinkConfig;

    fn set_reader_address(&self, address: u8);

    /// Queue `command` for `address` without waiting
    fn send_command_to(&self, address: u8, command: &Command) -> Result<usize, LinkError>;

    /// Queue `command` and poll until its response arrives or `timeout_ms` passes
    fn transact<D: DelayNs>(
        &self,
        address: u8,
        command: &Command,
        timeout_ms: u32,
        delay: &mut D,
    ) -> Result<Ack, LinkError>;

    fn clear_filter(&self);

    /// Log and return the duplicate-filter totals
    fn report_summary(&self) -> FilterSummary;

    /// Start the inventory schedule after the start command went out
    fn arm_inventory(&self);

    fn disarm_inventory(&self);

    fn inventory_active(&self) -> bool;
}

/// Clears the busy flag when dropped
struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Receive side owned by the processing path
struct RxPath<'q> {
    inbound: Consumer<'q, u8, RING_SIZE>,
    assembler: FrameAssembler,
}

impl RxPath<'_> {
    /// Pull bytes until a frame completes or the ring is empty
    fn next_frame(&mut self, now_ms: u64, stats: &Stats) -> Option<Vec<u8, MAX_FRAME_SIZE>> {
        while let Some(byte) = self.inbound.dequeue() {
            let errors = self.assembler.error_count();
            let result = self.assembler.push(byte, now_ms);
            add(
                &stats.frame_errors,
                self.assembler.error_count().wrapping_sub(errors),
            );
            match result {
                Ok(true) => {
                    let frame = self
                        .assembler
                        .frame()
                        .and_then(|f| Vec::from_slice(f).ok());
                    self.assembler.reset();
                    return frame;
                }
                Ok(false) => {}
                Err(e) => warn!("frame dropped: {:?}", e),
            }
        }
        None
    }

    fn reset(&mut self) {
        while self.inbound.dequeue().is_some() {}
        self.assembler.reset();
    }
}

/// Inventory timing
#[derive(Debug, Clone, Copy, Default)]
struct Schedule {
    active: bool,
    round_active: bool,
    next_trigger_ms: u64,
    round_deadline_ms: u64,
}

/// Mutable state shared by every context holding the router
type Shared<M, T> = Mutex<M, RefCell<T>>;

/// Copyable state shared by every context holding the router
type SharedCell<M, T> = Mutex<M, Cell<T>>;

fn load<M: RawMutex, T: Copy>(cell: &SharedCell<M, T>) -> T {
    cell.lock(Cell::get)
}

fn store<M: RawMutex, T: Copy>(cell: &SharedCell<M, T>, value: T) {
    cell.lock(|c| c.set(value));
}

/// Run `f` on the value unless another caller already has it borrowed
fn with<M: RawMutex, T, R>(shared: &Shared<M, T>, f: impl FnOnce(&mut T) -> R) -> Option<R> {
    shared.lock(|cell| cell.try_borrow_mut().ok().map(|mut value| f(&mut value)))
}

/// Protocol router for one reader link
pub struct Router<'q, M, C, T, N> {
    rx: Shared<M, RxPath<'q>>,
    tx: Shared<M, Producer<'q, u8, RING_SIZE>>,
    link: &'q LinkShared,
    mode: SharedCell<M, Mode>,
    busy: AtomicBool,
    rx_reset_pending: AtomicBool,
    running: AtomicBool,
    stats: Stats,
    filter: Shared<M, DuplicateFilter>,
    /// Debounce window waiting for the filter to be free
    debounce_pending: SharedCell<M, Option<u32>>,
    schedule: SharedCell<M, Schedule>,
    acks: Shared<M, Deque<Ack, ACK_QUEUE_LEN>>,
    /// (address, command) of the request `transact` is waiting on
    awaiting: SharedCell<M, Option<(u8, u8)>>,
    reader_info: SharedCell<M, Option<ReaderInfo>>,
    tag_count: SharedCell<M, Option<u16>>,
    temperature: SharedCell<M, Option<i16>>,
    reader_address: SharedCell<M, u8>,
    error_active: SharedCell<M, bool>,
    config: SharedCell<M, LinkConfig>,
    clock: C,
    sink: Shared<M, T>,
    notifier: Shared<M, N>,
}

impl<'q, M, C, T, N> Router<'q, M, C, T, N>
where
    M: RawMutex,
    C: Clock,
    T: TagSink,
    N: NotificationSink,
{
    /// Create a stopped router in `Idle` mode
    pub fn new(port: RouterPort<'q>, config: LinkConfig, clock: C, sink: T, notifier: N) -> Self {
        Self {
            rx: Mutex::new(RefCell::new(RxPath {
                inbound: port.inbound,
                assembler: FrameAssembler::new(),
            })),
            tx: Mutex::new(RefCell::new(port.outbound)),
            link: port.shared,
            mode: Mutex::new(Cell::new(Mode::Idle)),
            busy: AtomicBool::new(false),
            rx_reset_pending: AtomicBool::new(false),
            running: AtomicBool::new(false),
            stats: Stats::default(),
            filter: Mutex::new(RefCell::new(DuplicateFilter::new(config.debounce_ms))),
            debounce_pending: Mutex::new(Cell::new(None)),
            schedule: Mutex::new(Cell::new(Schedule::default())),
            acks: Mutex::new(RefCell::new(Deque::new())),
            awaiting: Mutex::new(Cell::new(None)),
            reader_info: Mutex::new(Cell::new(None)),
            tag_count: Mutex::new(Cell::new(None)),
            temperature: Mutex::new(Cell::new(None)),
            reader_address: Mutex::new(Cell::new(ADDR_DEFAULT)),
            error_active: Mutex::new(Cell::new(false)),
            config: Mutex::new(Cell::new(config)),
            clock,
            sink: Mutex::new(RefCell::new(sink)),
            notifier: Mutex::new(RefCell::new(notifier)),
        }
    }

    /// Start processing; bytes received before this point are discarded
    pub fn start(&self) -> Result<(), LinkError> {
        if self.running.swap(true, Ordering::AcqRel) {
            return Err(LinkError::AlreadyRunning);
        }
        store(&self.mode, Mode::Idle);
        self.rx_reset_pending.store(true, Ordering::Release);
        self.try_service_rx_reset();
        info!("router started");
        Ok(())
    }

    /// Stop processing and drop back to `Idle`
    pub fn stop(&self) -> Result<(), LinkError> {
        if !self.running.swap(false, Ordering::AcqRel) {
            return Err(LinkError::NotRunning);
        }
        self.disarm_inventory();
        self.set_mode(Mode::Idle);
        info!("router stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn mode(&self) -> Mode {
        load(&self.mode)
    }

    /// Change mode, resetting the receive side on an actual transition
    ///
    /// The outbound ring is never touched.
    pub fn set_mode(&self, mode: Mode) {
        let previous = self.mode.lock(|m| {
            let previous = m.replace(mode);
            if previous != mode {
                self.rx_reset_pending.store(true, Ordering::Release);
            }
            previous
        });
        if previous != mode {
            info!("mode {:?} -> {:?}", previous, mode);
            self.try_service_rx_reset();
        }
    }

    /// Drain received bytes and dispatch every complete frame
    pub fn process(&self) -> ProcessOutcome {
        let Some(_guard) = BusyGuard::acquire(&self.busy) else {
            return ProcessOutcome::Skipped;
        };
        if !self.is_running() {
            return ProcessOutcome::Stopped;
        }
        let now = self.clock.now_ms();

        if self.link.take_overrun() {
            warn!("rx overrun, partial frame discarded");
            with(&self.rx, |rx| rx.assembler.reset());
        }
        self.service_rx_reset();
        self.apply_pending_debounce();

        let mut frames = 0;
        loop {
            let frame = with(&self.rx, |rx| rx.next_frame(now, &self.stats)).flatten();
            let Some(frame) = frame else {
                break;
            };
            frames += 1;
            self.handle_frame(&frame, now);
            self.service_rx_reset();
        }

        self.apply_pending_debounce();
        self.run_schedule(now);
        ProcessOutcome::Processed { frames }
    }

    /// Queue `command` for the configured reader address
    pub fn send(&self, command: &Command) -> Result<usize, LinkError> {
        self.send_command_to(self.reader_address(), command)
    }

    /// Queue a command given by raw code and argument bytes
    pub fn send_command(&self, command_id: u8, args: &[u8]) -> Result<usize, LinkError> {
        let command = Command::from_raw(command_id, args)?;
        self.send(&command)
    }

    /// Queue `command` for `address`
    ///
    /// A frame that does not fit the outbound ring is dropped whole and
    /// counted; the call never waits for space.
    pub fn send_command_to(&self, address: u8, command: &Command) -> Result<usize, LinkError> {
        if !self.is_running() {
            return Err(LinkError::NotRunning);
        }
        let frame = command.encode_to_vec(address)?;
        let len = frame.len();
        let overflow = LinkError::TxOverflow {
            queued: 0,
            dropped: len,
        };

        let queued = with(&self.tx, |tx| {
            if tx.capacity() - tx.len() < len {
                return false;
            }
            for &byte in &frame {
                // Space checked above
                let _ = tx.enqueue(byte);
            }
            true
        });
        match queued {
            Some(true) => {
                debug!("tx {} to {}", command_name(command.code()), address);
                Ok(len)
            }
            Some(false) => {
                add(&self.stats.tx_dropped, len as u32);
                warn!("tx ring full, {} dropped", command_name(command.code()));
                Err(overflow)
            }
            None => Err(overflow),
        }
    }

    /// Queue `command` and poll until its response arrives
    ///
    /// Progress is detected through the frame counter; only `process` ever
    /// touches the receive path. Returns the response whatever its status;
    /// see [`Ack::ensure_ok`].
    ///
    /// While waiting, responses to inventory commands are only queued when
    /// they match this request, so a running inventory cannot push the
    /// response out of the queue.
    pub fn transact<D: DelayNs>(
        &self,
        address: u8,
        command: &Command,
        timeout_ms: u32,
        delay: &mut D,
    ) -> Result<Ack, LinkError> {
        let code = command.code();
        // Drop stale responses to an earlier request with the same code
        while self.take_ack(address, code).is_some() {}

        store(&self.awaiting, Some((address, code)));
        let result = self.await_ack(address, command, timeout_ms, delay);
        store(&self.awaiting, None);
        result
    }

    fn await_ack<D: DelayNs>(
        &self,
        address: u8,
        command: &Command,
        timeout_ms: u32,
        delay: &mut D,
    ) -> Result<Ack, LinkError> {
        let code = command.code();
        let mut seen = self.stats.frames();
        self.send_command_to(address, command)?;
        let deadline = self.clock.now_ms() + timeout_ms as u64;
        let poll_ms = self.config().poll_interval_ms.max(1);

        loop {
            self.process();
            let frames = self.stats.frames();
            if frames != seen {
                seen = frames;
                if let Some(ack) = self.take_ack(address, code) {
                    return Ok(ack);
                }
            }
            if self.clock.now_ms() >= deadline {
                debug!("no response to {}", command_name(code));
                return Err(LinkError::Timeout { command: code });
            }
            delay.delay_ms(poll_ms);
        }
    }

    /// Counter snapshot
    pub fn get_stats(&self) -> RouterStats {
        self.stats.snapshot(self.link)
    }

    pub fn reset_stats(&self) {
        self.stats.reset(self.link);
    }

    /// Change the duplicate-filter window
    ///
    /// When the filter is in use the new window is applied by the next
    /// [`process`](Self::process) call; [`config`](Self::config) reports it
    /// at once.
    pub fn set_debounce_seconds(&self, seconds: u32) {
        let ms = seconds.saturating_mul(1000);
        self.config.lock(|c| {
            let mut config = c.get();
            config.debounce_ms = ms;
            c.set(config);
        });
        self.update_debounce(ms);
    }

    pub fn config(&self) -> LinkConfig {
        load(&self.config)
    }

    /// Replace the configuration; takes effect on the next round
    pub fn set_config(&self, config: LinkConfig) {
        store(&self.config, config);
        self.update_debounce(config.debounce_ms);
    }

    pub fn reader_address(&self) -> u8 {
        load(&self.reader_address)
    }

    pub fn set_reader_address(&self, address: u8) {
        store(&self.reader_address, address);
    }

    /// Last reader-info response
    pub fn reader_info(&self) -> Option<ReaderInfo> {
        load(&self.reader_info)
    }

    /// Last get-tag-count response
    pub fn last_tag_count(&self) -> Option<u16> {
        load(&self.tag_count)
    }

    /// Last temperature response (°C)
    pub fn last_temperature(&self) -> Option<i16> {
        load(&self.temperature)
    }

    /// Duplicate-filter totals
    pub fn filter_summary(&self) -> FilterSummary {
        with(&self.filter, |f| f.summary()).unwrap_or_default()
    }

    pub fn clear_filter(&self) {
        with(&self.filter, |f| f.clear());
    }

    /// Log the session totals and every tracked tag
    pub fn report_summary(&self) -> FilterSummary {
        let group = self.config().epc_group_bytes as usize;
        with(&self.filter, |filter| {
            let summary = filter.summary();
            info!(
                "inventory summary: {} unique tags, {} reads",
                summary.unique_tags,
                summary.total_reads
            );
            for entry in filter.entries() {
                let epc = format_epc(&entry.epc, group);
                debug!(
                    "  {} x{} rssi {}..{}",
                    epc.as_str(),
                    entry.read_count,
                    entry.rssi_min,
                    entry.rssi_max
                );
            }
            summary
        })
        .unwrap_or_default()
    }

    pub fn arm_inventory(&self) {
        let now = self.clock.now_ms();
        let config = self.config();
        let polled = config.strategy.is_polled();
        store(
            &self.schedule,
            Schedule {
                active: true,
                round_active: polled,
                next_trigger_ms: now,
                round_deadline_ms: now + config.round_deadline_ms(),
            },
        );
        if polled {
            bump(&self.stats.rounds_started);
        }
        if self.error_active.lock(|e| e.replace(false)) {
            self.notify(|n| n.on_error(false));
        }
    }

    pub fn disarm_inventory(&self) {
        store(&self.schedule, Schedule::default());
    }

    pub fn inventory_active(&self) -> bool {
        load(&self.schedule).active
    }

    /// Bytes received but not yet processed
    pub fn pending_rx(&self) -> usize {
        with(&self.rx, |rx| rx.inbound.len()).unwrap_or(0)
    }

    /// Bytes waiting for the interrupt half to transmit
    pub fn pending_tx(&self) -> usize {
        with(&self.tx, |tx| tx.len()).unwrap_or(0)
    }

    /// Frame assembler phase, `None` while `process` holds the receive path
    pub fn assembler_phase(&self) -> Option<AssemblerPhase> {
        with(&self.rx, |rx| rx.assembler.phase())
    }

    fn try_service_rx_reset(&self) {
        if let Some(_guard) = BusyGuard::acquire(&self.busy) {
            self.service_rx_reset();
        }
    }

    /// Caller holds the busy flag
    fn service_rx_reset(&self) {
        if !self.rx_reset_pending.swap(false, Ordering::AcqRel) {
            return;
        }
        if with(&self.rx, RxPath::reset).is_none() {
            self.rx_reset_pending.store(true, Ordering::Release);
        }
    }

    fn update_debounce(&self, ms: u32) {
        if with(&self.filter, |f| f.set_debounce_ms(ms)).is_some() {
            store(&self.debounce_pending, None);
        } else {
            store(&self.debounce_pending, Some(ms));
        }
    }

    fn apply_pending_debounce(&self) {
        if let Some(ms) = self.debounce_pending.lock(Cell::take) {
            self.update_debounce(ms);
        }
    }

    fn handle_frame(&self, frame: &[u8], now: u64) {
        bump(&self.stats.frames_received);

        if !verify(frame) {
            bump(&self.stats.crc_errors);
            warn!("crc mismatch, frame dropped");
            return;
        }
        let response = match Response::parse(frame) {
            Ok(response) => response,
            Err(e) => {
                bump(&self.stats.parse_errors);
                warn!("parse error: {:?}", e);
                return;
            }
        };
        let header = response.header;
        trace!(
            "rx {} status {:?}",
            command_name(header.command),
            header.status
        );

        let round = matches!(
            header.command,
            CMD_TAG_INVENTORY | CMD_SINGLE_TAG_INVENTORY | CMD_START_FAST_INVENTORY
        );
        if header.command != RECMD_AUTO_UPLOAD {
            let ack = Ack {
                address: header.address,
                command: header.command,
                status: header.status,
                payload: Vec::from_slice(&frame[HEADER_LEN..frame.len() - CRC_LEN])
                    .unwrap_or_default(),
            };
            if !round || self.is_awaited(&ack) {
                self.push_ack(ack);
            }
        }

        match response.reply {
            Reply::AutoUpload(tag) => self.handle_tag(&tag, now),
            Reply::Inventory(batch) => {
                for tag in batch.tags().flatten() {
                    self.handle_tag(&tag, now);
                }
            }
            Reply::Statistics(s) => debug!(
                "antenna {}: {} reads/s, {} total",
                s.antenna,
                s.read_rate,
                s.total_count
            ),
            Reply::ReaderInfo(info) => {
                debug!(
                    "reader v{}.{} model {} power {}",
                    info.major(),
                    info.minor(),
                    info.model,
                    info.power
                );
                store(&self.reader_info, Some(info));
            }
            Reply::TagCount(count) => store(&self.tag_count, Some(count)),
            Reply::Temperature(celsius) => store(&self.temperature, Some(celsius)),
            Reply::ReadData(words) => debug!("read {} words", words.word_count()),
            Reply::GpioState(pins) => debug!("gpio state {}", pins),
            Reply::Other { .. } => {}
        }

        if round {
            self.on_round_status(header.status, now);
        }
    }

    fn handle_tag(&self, tag: &TagRecord, now: u64) {
        bump(&self.stats.tags_decoded);
        if self.mode() != Mode::Inventory {
            trace!("tag ignored while idle");
            return;
        }

        let emit = with(&self.filter, |f| f.check(&tag.epc, tag.rssi, now)).unwrap_or(false);
        if !emit {
            bump(&self.stats.tags_suppressed);
            return;
        }

        let epc = format_epc(&tag.epc, self.config().epc_group_bytes as usize);
        info!(
            "tag {} rssi {} antenna {}",
            epc.as_str(),
            tag.rssi,
            tag.antenna
        );
        let result =
            with(&self.sink, |sink| sink.emit_tag(epc.as_str())).unwrap_or(Err(SinkError::Busy));
        match result {
            Ok(()) => {
                bump(&self.stats.tags_emitted);
                self.notify(|n| n.on_tag_read());
            }
            Err(e) => {
                bump(&self.stats.sink_errors);
                warn!("tag sink: {}", e);
            }
        }
    }

    /// React to the status of an inventory response
    fn on_round_status(&self, status: Status, now: u64) {
        if self.mode() != Mode::Inventory {
            return;
        }
        if status == Status::AntennaError {
            error!("antenna error, inventory stopped");
            store(&self.error_active, true);
            self.notify(|n| n.on_error(true));
            self.disarm_inventory();
            self.set_mode(Mode::Idle);
            return;
        }

        let strategy = self.config().strategy;
        let mut schedule = load(&self.schedule);
        if !strategy.is_polled() || !status.is_round_terminal() || !schedule.active {
            return;
        }
        schedule.round_active = false;

        match strategy {
            InventoryStrategy::Repeating { interval_ms } => {
                schedule.next_trigger_ms = now + interval_ms as u64;
                store(&self.schedule, schedule);
            }
            _ => self.finish_single_shot(),
        }
    }

    fn finish_single_shot(&self) {
        self.disarm_inventory();
        self.report_summary();
        self.set_mode(Mode::Idle);
    }

    /// Re-trigger polled rounds and abandon silent ones
    fn run_schedule(&self, now: u64) {
        if self.mode() != Mode::Inventory {
            return;
        }
        let config = self.config();
        let mut schedule = load(&self.schedule);
        if !config.strategy.is_polled() || !schedule.active {
            return;
        }

        if schedule.round_active {
            if now < schedule.round_deadline_ms {
                return;
            }
            warn!("inventory round unanswered, abandoned");
            bump(&self.stats.round_timeouts);
            if config.strategy == InventoryStrategy::SingleShot {
                self.finish_single_shot();
                return;
            }
            schedule.round_active = false;
            schedule.next_trigger_ms = now;
        }

        if now < schedule.next_trigger_ms {
            store(&self.schedule, schedule);
            return;
        }

        let command = config.strategy.start_command();
        match self.send_command_to(self.reader_address(), &command) {
            Ok(_) => {
                bump(&self.stats.rounds_started);
                schedule.round_active = true;
                schedule.round_deadline_ms = now + config.round_deadline_ms();
            }
            Err(e) => {
                warn!("inventory re-trigger failed: {}", e);
                if let InventoryStrategy::Repeating { interval_ms } = config.strategy {
                    schedule.next_trigger_ms = now + interval_ms as u64;
                }
            }
        }
        store(&self.schedule, schedule);
    }

    fn is_awaited(&self, ack: &Ack) -> bool {
        load(&self.awaiting).is_some_and(|(address, command)| ack.answers(address, command))
    }

    /// Queue `ack`, evicting the oldest response nobody is waiting for
    fn push_ack(&self, ack: Ack) {
        let awaiting = load(&self.awaiting);
        let awaited = |ack: &Ack| awaiting.is_some_and(|(a, c)| ack.answers(a, c));
        with(&self.acks, |acks| {
            if acks.is_full() {
                let mut evicted = false;
                for _ in 0..acks.len() {
                    let Some(old) = acks.pop_front() else {
                        break;
                    };
                    if !evicted && !awaited(&old) {
                        evicted = true;
                    } else {
                        let _ = acks.push_back(old);
                    }
                }
                if !evicted {
                    acks.pop_front();
                }
            }
            let _ = acks.push_back(ack);
        });
    }

    /// Remove the oldest response to `command` from `address`
    fn take_ack(&self, address: u8, command: u8) -> Option<Ack> {
        with(&self.acks, |acks| {
            let mut found = None;
            for _ in 0..acks.len() {
                let Some(ack) = acks.pop_front() else {
                    break;
                };
                if found.is_none() && ack.answers(address, command) {
                    found = Some(ack);
                } else {
                    let _ = acks.push_back(ack);
                }
            }
            found
        })
        .flatten()
    }

    fn notify(&self, f: impl FnOnce(&mut N)) {
        with(&self.notifier, f);
    }
}

impl<M, C, T, N> ReaderLink for Router<'_, M, C, T, N>
where
    M: RawMutex,
    C: Clock,
    T: TagSink,
    N: NotificationSink,
{
    fn process(&self) -> ProcessOutcome {
        Router::process(self)
    }

    fn mode(&self) -> Mode {
        Router::mode(self)
    }

    fn set_mode(&self, mode: Mode) {
        Router::set_mode(self, mode)
    }

    fn config(&self) -> LinkConfig {
        Router::config(self)
    }

    fn set_reader_address(&self, address: u8) {
        Router::set_reader_address(self, address)
    }

    fn send_command_to(&self, address: u8, command: &Command) -> Result<usize, LinkError> {
        Router::send_command_to(self, address, command)
    }

    fn transact<D: DelayNs>(
        &self,
        address: u8,
        command: &Command,
        timeout_ms: u32,
        delay: &mut D,
    ) -> Result<Ack, LinkError> {
        Router::transact(self, address, command, timeout_ms, delay)
    }

    fn clear_filter(&self) {
        Router::clear_filter(self)
    }

    fn report_summary(&self) -> FilterSummary {
        Router::report_summary(self)
    }

    fn arm_inventory(&self) {
        Router::arm_inventory(self)
    }

    fn disarm_inventory(&self) {
        Router::disarm_inventory(self)
    }

    fn inventory_active(&self) -> bool {
        Router::inventory_active(self)
    }
}
