//! Test doubles shared by the unit tests

use core::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::string::String;
use std::vec::Vec;

use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embedded_hal::delay::DelayNs;
use tagwedge_protocol::command::{
    CMD_GET_TAG_COUNT, CMD_MEASURE_TEMPERATURE, CMD_OBTAIN_GPIO_STATE, CMD_OBTAIN_READER_INFO,
    CMD_OBTAIN_READER_SN, CMD_READ_DATA, CMD_TAG_INVENTORY,
};
use tagwedge_protocol::status::STATUS_NO_TAG_FOUND;
use tagwedge_protocol::{crc16, FrameAssembler, ADDR_BROADCAST, MIN_COMMAND_SIZE};

use crate::link::SerialPort;
use crate::router::Router;
use crate::traits::{
    Clock, InputControl, NotificationSink, SettingsStore, SinkError, TagSink, Transport,
};

pub type TestRouter<'a, 'q> =
    Router<'q, NoopRawMutex, &'a ManualClock, &'a RecordingSink, &'a RecordingNotifier>;

/// Clock advanced by hand
#[derive(Debug, Default)]
pub struct ManualClock(Cell<u64>);

impl ManualClock {
    pub fn advance(&self, ms: u64) {
        self.0.set(self.0.get() + ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.0.get()
    }
}

/// Keeps every emitted EPC
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub tags: RefCell<Vec<String>>,
    pub fail: Cell<bool>,
}

impl RecordingSink {
    pub fn tags(&self) -> Vec<String> {
        self.tags.borrow().clone()
    }
}

impl TagSink for &RecordingSink {
    fn emit_tag(&mut self, epc: &str) -> Result<(), SinkError> {
        if self.fail.get() {
            return Err(SinkError::Busy);
        }
        self.tags.borrow_mut().push(epc.into());
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct RecordingNotifier {
    pub reads: Cell<u32>,
    pub errors: RefCell<Vec<bool>>,
}

impl NotificationSink for &RecordingNotifier {
    fn on_tag_read(&mut self) {
        self.reads.set(self.reads.get() + 1);
    }

    fn on_error(&mut self, active: bool) {
        self.errors.borrow_mut().push(active);
    }
}

#[derive(Debug, Default)]
pub struct RecordingInput {
    pub states: RefCell<Vec<bool>>,
}

impl InputControl for &RecordingInput {
    fn set_inventory_running(&mut self, running: bool) {
        self.states.borrow_mut().push(running);
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedSettings {
    pub rf_power: u8,
    pub address: u8,
    pub antenna: u8,
}

impl Default for FixedSettings {
    fn default() -> Self {
        Self {
            rf_power: 20,
            address: 0x00,
            antenna: 0,
        }
    }
}

impl SettingsStore for FixedSettings {
    fn get_rf_power(&self) -> u8 {
        self.rf_power
    }

    fn get_reader_address(&self) -> u8 {
        self.address
    }

    fn get_antenna_config(&self) -> u8 {
        self.antenna
    }
}

/// Build a response frame with a valid checksum
pub fn response(address: u8, command: u8, status: u8, payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(payload.len() + 6);
    frame.push((payload.len() + 5) as u8);
    frame.extend_from_slice(&[address, command, status]);
    frame.extend_from_slice(payload);
    let crc = crc16(&frame);
    frame.extend_from_slice(&crc.to_le_bytes());
    frame
}

/// Auto-upload frame for one EPC
pub fn auto_upload(address: u8, epc: &[u8], rssi: u8) -> Vec<u8> {
    let mut payload = std::vec![0x01, epc.len() as u8];
    payload.extend_from_slice(epc);
    payload.push(rssi);
    response(address, 0xEE, 0x00, &payload)
}

/// Batch inventory frame with plain EPC blocks
pub fn inventory_batch(address: u8, status: u8, epcs: &[&[u8]]) -> Vec<u8> {
    let mut payload = std::vec![0x01, epcs.len() as u8];
    for epc in epcs {
        payload.push(epc.len() as u8);
        payload.extend_from_slice(epc);
        payload.push(0x50);
    }
    response(address, CMD_TAG_INVENTORY, status, &payload)
}

struct Wire(Vec<u8>);

impl Transport for Wire {
    fn send(&mut self, bytes: &[u8]) -> usize {
        self.0.extend_from_slice(bytes);
        bytes.len()
    }
}

/// Simulated reader module on the other end of the link
///
/// Every delay advances the clock, collects the commands the router queued
/// and answers them through the receive path.
pub struct FakeReader<'a, 'q> {
    port: SerialPort<'q>,
    clock: &'a ManualClock,
    commands: FrameAssembler,
    pub address: u8,
    /// Command frames seen, in order
    pub received: Vec<Vec<u8>>,
    /// Command codes left unanswered
    pub mute: Vec<u8>,
    pub ignore_broadcast: bool,
    /// Frames sent back for each tag-inventory command
    pub inventory_replies: VecDeque<Vec<Vec<u8>>>,
    /// Frames of a running inventory, sent before and after every reply
    pub chatter: Vec<Vec<u8>>,
}

impl<'a, 'q> FakeReader<'a, 'q> {
    pub fn new(port: SerialPort<'q>, clock: &'a ManualClock) -> Self {
        Self {
            port,
            clock,
            commands: FrameAssembler::with_min_frame_size(MIN_COMMAND_SIZE),
            address: 0x00,
            received: Vec::new(),
            mute: Vec::new(),
            ignore_broadcast: false,
            inventory_replies: VecDeque::new(),
            chatter: Vec::new(),
        }
    }

    /// Command codes seen, in order
    pub fn codes(&self) -> Vec<u8> {
        self.received.iter().map(|f| f[2]).collect()
    }

    /// Push raw bytes into the router's receive path
    pub fn inject(&mut self, bytes: &[u8]) -> usize {
        self.port.on_receive(bytes)
    }

    /// Transmit queued commands and answer them
    pub fn pump(&mut self) {
        let mut wire = Wire(Vec::new());
        self.port.service_tx(&mut wire);

        let now = self.clock.now_ms();
        let mut rest = wire.0.as_slice();
        while !rest.is_empty() {
            let used = self.commands.feed(rest, now);
            rest = &rest[used..];
            if let Some(frame) = self.commands.frame().map(|f| f.to_vec()) {
                self.commands.reset();
                self.answer(&frame);
            }
            if used == 0 {
                break;
            }
        }
    }

    fn answer(&mut self, frame: &[u8]) {
        self.received.push(frame.to_vec());
        let (address, code) = (frame[1], frame[2]);
        if self.mute.contains(&code) || (address == ADDR_BROADCAST && self.ignore_broadcast) {
            return;
        }

        let me = self.address;
        let replies = match code {
            CMD_OBTAIN_READER_INFO => std::vec![response(
                me,
                code,
                0x00,
                &[0x10, 0x02, 0x0F, 0x02, 0x4E, 0x00, 0x14, 0x0A, 0x80, 0x00, 0x00, 0x01],
            )],
            CMD_TAG_INVENTORY => self
                .inventory_replies
                .pop_front()
                .unwrap_or_else(|| std::vec![response(me, code, STATUS_NO_TAG_FOUND, &[])]),
            CMD_GET_TAG_COUNT => std::vec![response(me, code, 0x00, &[0x00, 0x03])],
            CMD_MEASURE_TEMPERATURE => std::vec![response(me, code, 0x00, &[0x01, 0x1E])],
            CMD_OBTAIN_READER_SN => std::vec![response(me, code, 0x00, &[0x12, 0x34, 0x56, 0x78])],
            CMD_READ_DATA => std::vec![response(me, code, 0x00, &[0xE2, 0x00, 0x34, 0x12])],
            CMD_OBTAIN_GPIO_STATE => std::vec![response(me, code, 0x00, &[0x05])],
            _ => std::vec![response(me, code, 0x00, &[])],
        };
        let chatter = self.chatter.clone();
        for frame in chatter.iter().chain(&replies).chain(&chatter) {
            self.port.on_receive(frame);
        }
    }
}

impl DelayNs for FakeReader<'_, '_> {
    fn delay_ns(&mut self, ns: u32) {
        self.clock.advance((ns as u64).div_ceil(1_000_000));
        self.pump();
    }

    fn delay_ms(&mut self, ms: u32) {
        self.clock.advance(ms as u64);
        self.pump();
    }
}
