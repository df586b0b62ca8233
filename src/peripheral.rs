//! Server-role link state.
//!
//! The advertising side only needs a connection flag the arbitrator can
//! read, a way to be told to stop, and a framer for writes from the
//! companion app.  The GATT server task in the firmware drives it.

use core::cell::RefCell;
use core::sync::atomic::{AtomicBool, Ordering};

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::signal::Signal;

use crate::arbiter::PeripheralRole;
use crate::link::{Line, ReceiveFramer};

pub struct PeripheralLink<M: RawMutex> {
    connected: AtomicBool,
    stopped: AtomicBool,
    stop: Signal<M, ()>,
    rx: Mutex<M, RefCell<ReceiveFramer>>,
}

impl<M: RawMutex> PeripheralLink<M> {
    pub const fn new() -> Self {
        Self {
            connected: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            stop: Signal::new(),
            rx: Mutex::new(RefCell::new(ReceiveFramer::new())),
        }
    }

    pub fn on_connect(&self) {
        self.connected.store(true, Ordering::Release);
    }

    pub fn on_disconnect(&self) {
        self.connected.store(false, Ordering::Release);
        self.rx.lock(|f| f.borrow_mut().clear());
    }

    /// A write landed on the local RX characteristic.
    pub fn on_write(&self, data: &[u8]) {
        self.rx.lock(|f| f.borrow_mut().on_bytes(data));
    }

    /// Next non-empty line written by a connected peer.
    pub fn read_line(&self) -> Option<Line> {
        if !self.connected.load(Ordering::Acquire) {
            return None;
        }
        self.rx
            .lock(|f| f.borrow_mut().take_line())
            .filter(|line| !line.is_empty())
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Resolves once the role has been told to stop advertising.
    pub async fn wait_stop(&self) {
        if self.is_stopped() {
            return;
        }
        self.stop.wait().await
    }
}

impl<M: RawMutex> Default for PeripheralLink<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: RawMutex> PeripheralRole for PeripheralLink<M> {
    fn connected_to_peer(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    fn stop_advertising(&self) {
        self.stopped.store(true, Ordering::Release);
        self.connected.store(false, Ordering::Release);
        self.stop.signal(());
        #[cfg(feature = "defmt")]
        defmt::info!("BLE server advertising stopped");
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests (run on host, not embedded)
// ═══════════════════════════════════════════════════════════════════════════
