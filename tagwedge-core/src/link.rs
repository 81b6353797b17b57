//! Interrupt-side ring buffers
//!
//! [`LinkQueues`] owns two single-producer/single-consumer rings. Splitting
//! it yields the [`SerialPort`] half, which belongs to the UART interrupt,
//! and the [`RouterPort`] half, which is handed to the router:
//!
//! ```text
//!              inbound ring
//! UART RX ──▶ SerialPort ──────────▶ Router (parse)
//! UART TX ◀── SerialPort ◀────────── Router (commands)
//!              outbound ring
//! ```
//!
//! The interrupt half never parses and never logs. When the inbound ring is
//! full it drops the bytes and raises the overrun flag; the router services
//! the flag on its next pass.

use heapless::spsc::{Consumer, Producer, Queue};
use portable_atomic::{AtomicBool, AtomicU32, Ordering};

use crate::traits::Transport;

/// Size of each ring buffer
pub const RING_SIZE: usize = 4096;

/// Byte ring shared between the interrupt and the router
pub type Ring = Queue<u8, RING_SIZE>;

/// Flags and counters written by the interrupt half
#[derive(Debug, Default)]
pub struct LinkShared {
    overrun: AtomicBool,
    rx_bytes: AtomicU32,
    tx_bytes: AtomicU32,
    overruns: AtomicU32,
}

impl LinkShared {
    pub const fn new() -> Self {
        Self {
            overrun: AtomicBool::new(false),
            rx_bytes: AtomicU32::new(0),
            tx_bytes: AtomicU32::new(0),
            overruns: AtomicU32::new(0),
        }
    }

    /// Clear the overrun flag, returning whether it was set
    pub fn take_overrun(&self) -> bool {
        self.overrun.swap(false, Ordering::AcqRel)
    }

    pub fn rx_bytes(&self) -> u32 {
        self.rx_bytes.load(Ordering::Relaxed)
    }

    pub fn tx_bytes(&self) -> u32 {
        self.tx_bytes.load(Ordering::Relaxed)
    }

    pub fn overruns(&self) -> u32 {
        self.overruns.load(Ordering::Relaxed)
    }

    pub(crate) fn reset_counters(&self) {
        self.rx_bytes.store(0, Ordering::Relaxed);
        self.tx_bytes.store(0, Ordering::Relaxed);
        self.overruns.store(0, Ordering::Relaxed);
    }
}

/// Storage for both rings, created once at startup
pub struct LinkQueues {
    inbound: Ring,
    outbound: Ring,
    shared: LinkShared,
}

impl Default for LinkQueues {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkQueues {
    pub const fn new() -> Self {
        Self {
            inbound: Queue::new(),
            outbound: Queue::new(),
            shared: LinkShared::new(),
        }
    }

    /// Split into the interrupt half and the router half
    pub fn split(&mut self) -> (SerialPort<'_>, RouterPort<'_>) {
        let (rx_producer, rx_consumer) = self.inbound.split();
        let (tx_producer, tx_consumer) = self.outbound.split();
        let shared = &self.shared;
        (
            SerialPort {
                inbound: rx_producer,
                outbound: tx_consumer,
                shared,
            },
            RouterPort {
                inbound: rx_consumer,
                outbound: tx_producer,
                shared,
            },
        )
    }
}

/// Interrupt half of the link
pub struct SerialPort<'q> {
    inbound: Producer<'q, u8, RING_SIZE>,
    outbound: Consumer<'q, u8, RING_SIZE>,
    shared: &'q LinkShared,
}

impl<'q> SerialPort<'q> {
    /// Append received bytes to the inbound ring
    ///
    /// Returns the number of bytes stored. Bytes that do not fit are
    /// dropped and the overrun flag is raised.
    pub fn on_receive(&mut self, bytes: &[u8]) -> usize {
        let mut stored = 0;
        for &byte in bytes {
            if self.inbound.enqueue(byte).is_err() {
                self.shared.overrun.store(true, Ordering::Release);
                self.shared.overruns.fetch_add(1, Ordering::Relaxed);
                break;
            }
            stored += 1;
        }
        self.shared
            .rx_bytes
            .fetch_add(stored as u32, Ordering::Relaxed);
        stored
    }

    /// Move queued outbound bytes into `transport` until it stops accepting
    ///
    /// Returns the number of bytes handed over.
    pub fn service_tx<T: Transport + ?Sized>(&mut self, transport: &mut T) -> usize {
        let mut sent = 0;
        while let Some(&byte) = self.outbound.peek() {
            if transport.send(&[byte]) == 0 {
                break;
            }
            self.outbound.dequeue();
            sent += 1;
        }
        self.shared.tx_bytes.fetch_add(sent as u32, Ordering::Relaxed);
        sent
    }

    /// Bytes waiting for transmission
    pub fn pending_tx(&self) -> usize {
        self.outbound.len()
    }

    pub fn shared(&self) -> &'q LinkShared {
        self.shared
    }
}

/// Router half of the link
pub struct RouterPort<'q> {
    pub(crate) inbound: Consumer<'q, u8, RING_SIZE>,
    pub(crate) outbound: Producer<'q, u8, RING_SIZE>,
    pub(crate) shared: &'q LinkShared,
}

impl RouterPort<'_> {
    /// Bytes received but not yet processed
    pub fn pending_rx(&self) -> usize {
        self.inbound.len()
    }

    /// Bytes queued for transmission
    pub fn pending_tx(&self) -> usize {
        self.outbound.len()
    }
}
