//! Central-role link to the sensor board.
//!
//! 1. **Scan** - offer every advertisement to the [`LinkListener`]; the
//!    first one whose name contains the filter token is captured and a
//!    connect is requested.
//! 2. **Connect** - [`CentralLinkManager`] opens the link from the poll
//!    context, resolves the service and both characteristics, registers
//!    for notifications and sends the model-name handshake.
//! 3. **Receive** - each notification is framed into a text line by the
//!    [`ReceiveFramer`] and drained by the poll loop.
//!
//! Stack callbacks never block: they only touch [`SharedLink`], which is
//! the single piece of state written from both execution contexts.

pub mod adv_parser;
pub mod binding;
pub mod central;
pub mod debounce;
pub mod framer;

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;
use heapless::{String, Vec};

use crate::config::{
    Millis, ScanParams, CONNECTION_DEBOUNCE_MS, DEVICE_NAME_CAPACITY, MAX_CHARACTERISTICS,
};
use crate::error::LinkError;

pub use binding::ServiceBinding;
pub use central::{CentralLinkManager, CentralState};
pub use debounce::ConnectionDebouncer;
pub use framer::{Command, Line, ReceiveFramer};

/// Advertised device name (truncated to [`DEVICE_NAME_CAPACITY`] bytes).
pub type DeviceName = String<DEVICE_NAME_CAPACITY>;

/// Raw BLE device address as reported by the stack.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PeerAddress {
    /// Public = 0, random static = 1, resolvable = 2, non-resolvable = 3.
    pub addr_type: u8,
    pub bytes: [u8; 6],
}

/// A peripheral whose advertisement matched the name filter.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DiscoveredDevice {
    pub address: PeerAddress,
    pub name: DeviceName,
    /// Received Signal Strength Indicator (dBm).
    pub rssi: i8,
}

/// GATT capability flags of a remote characteristic.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CharProps {
    pub writable: bool,
    pub notifiable: bool,
    pub indicatable: bool,
}

/// A characteristic found during service discovery.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RemoteCharacteristic {
    pub uuid: u128,
    pub value_handle: u16,
    /// Handle of the 0x2902 descriptor, if the peer exposes one.
    pub cccd_handle: Option<u16>,
    pub props: CharProps,
}

impl RemoteCharacteristic {
    /// Descriptor to write for notifications.  `None` when the
    /// characteristic does not notify or exposes no CCCD; neither is an
    /// error, the receive path just stays quiet.
    pub fn notify_cccd(&self) -> Option<u16> {
        self.cccd_handle.filter(|_| self.props.notifiable)
    }
}

/// Characteristics of one discovered service.
pub type RemoteService = Vec<RemoteCharacteristic, MAX_CHARACTERISTICS>;

/// Events the radio stack delivers from its own execution context.
///
/// Implementations must not block: check, copy, set flags, return.
pub trait LinkListener {
    /// Transport reported a connection. Returns whether it was accepted.
    fn on_connect(&self, now: Millis) -> bool;
    /// Transport reported a disconnection. Returns whether it was accepted.
    fn on_disconnect(&self, now: Millis) -> bool;
    /// A notification or indication arrived on the RX characteristic.
    fn on_notify(&self, data: &[u8]);
    /// An advertisement was received while scanning. Returns `true` when
    /// the scan should stop.
    fn on_advertisement(&self, device: &DiscoveredDevice) -> bool;
}

/// The radio stack as seen by the central role.
///
/// Everything here may block (await) and is only ever called from the
/// poll context, never from inside a [`LinkListener`] callback.
#[allow(async_fn_in_trait)]
pub trait CentralTransport {
    /// Run one scan pass, offering each advertisement to `listener`.
    ///
    /// Returns `Ok(())` once the listener asks to stop and
    /// `Err(LinkError::ScanNoMatch)` when the scan duration runs out.
    async fn scan<L: LinkListener>(
        &mut self,
        params: &ScanParams,
        listener: &L,
    ) -> Result<(), LinkError>;

    /// Open the transport-layer connection.
    async fn open(&mut self, device: &DiscoveredDevice) -> Result<(), LinkError>;

    /// Discover `service` and return its characteristics.
    async fn discover(&mut self, service: u128) -> Result<RemoteService, LinkError>;

    /// Route notifications from `rx` to the listener.
    async fn subscribe(&mut self, rx: &RemoteCharacteristic) -> Result<(), LinkError>;

    /// Write `data` to the attribute at `handle`.
    async fn write(&mut self, handle: u16, data: &[u8]) -> Result<(), LinkError>;

    /// Drop the connection, if any.
    fn disconnect(&mut self);
}

/// Link state as the poll loop observes it.
#[derive(Clone, Debug, Default)]
pub struct LinkState {
    pub connected: bool,
    pub framer: ReceiveFramer,
}

impl LinkState {
    pub const fn new() -> Self {
        Self {
            connected: false,
            framer: ReceiveFramer::new(),
        }
    }
}

struct LinkCell {
    state: LinkState,
    debouncer: ConnectionDebouncer,
    name_filter: DeviceName,
    pending: Option<DiscoveredDevice>,
    connect_requested: bool,
    scan_requested: bool,
}

impl LinkCell {
    const fn new(debounce_window: Millis) -> Self {
        Self {
            state: LinkState::new(),
            debouncer: ConnectionDebouncer::with_window(debounce_window),
            name_filter: String::new(),
            pending: None,
            connect_requested: false,
            scan_requested: false,
        }
    }
}

/// State shared between the stack callback context and the poll loop.
///
/// Firmware uses `CriticalSectionRawMutex` in a `static`; host tests use
/// `NoopRawMutex`.  Locks are held only for the duration of a closure and
/// never across an await.
pub struct SharedLink<M: RawMutex> {
    inner: Mutex<M, RefCell<LinkCell>>,
}

impl<M: RawMutex> SharedLink<M> {
    pub const fn new() -> Self {
        Self::with_debounce_window(CONNECTION_DEBOUNCE_MS)
    }

    /// Same as [`new`](Self::new) with a non-default debounce window.
    pub const fn with_debounce_window(window: Millis) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(LinkCell::new(window))),
        }
    }

    fn with<R>(&self, f: impl FnOnce(&mut LinkCell) -> R) -> R {
        self.inner.lock(|cell| f(&mut cell.borrow_mut()))
    }

    /// Arm scanning for devices whose name contains `filter`.
    pub fn request_scan(&self, filter: &str) {
        self.with(|c| {
            c.name_filter.clear();
            for ch in filter.chars() {
                if c.name_filter.push(ch).is_err() {
                    break;
                }
            }
            c.scan_requested = true;
        });
    }

    pub fn scan_requested(&self) -> bool {
        self.with(|c| c.scan_requested)
    }

    pub fn connect_requested(&self) -> bool {
        self.with(|c| c.connect_requested)
    }

    /// Consume the pending connect request raised by a matching advertisement.
    pub fn take_connect_request(&self) -> Option<DiscoveredDevice> {
        self.with(|c| {
            if !c.connect_requested {
                return None;
            }
            c.connect_requested = false;
            c.pending.take()
        })
    }

    pub fn is_connected(&self) -> bool {
        self.with(|c| c.state.connected)
    }

    pub fn set_connected(&self, connected: bool) {
        self.with(|c| c.state.connected = connected);
    }

    /// Raw framer access: the pending line regardless of link state.
    pub fn take_line(&self) -> Option<Line> {
        self.with(|c| c.state.framer.take_line())
    }

    /// Next non-empty line received over a live link.
    ///
    /// Empty deliveries are consumed and dropped; nothing is consumed while
    /// disconnected.
    pub fn read_line(&self) -> Option<Line> {
        self.with(|c| {
            if !c.state.connected {
                return None;
            }
            c.state.framer.take_line().filter(|line| !line.is_empty())
        })
    }

    pub fn last_connection_change(&self) -> Millis {
        self.with(|c| c.debouncer.last_connection_change())
    }

    /// Reset local link state and withdraw scan/connect requests.
    ///
    /// Best effort: an established transport is left open.
    pub fn shutdown(&self) {
        self.with(|c| {
            c.state.connected = false;
            c.state.framer.clear();
            c.connect_requested = false;
            c.scan_requested = false;
            c.pending = None;
        });
    }
}

impl<M: RawMutex> Default for SharedLink<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: RawMutex> LinkListener for SharedLink<M> {
    fn on_connect(&self, now: Millis) -> bool {
        let accepted = self.with(|c| {
            if !c.debouncer.accept(now) {
                return false;
            }
            c.debouncer.record(now);
            true
        });
        #[cfg(feature = "defmt")]
        {
            if accepted {
                defmt::info!("central link: connected");
            } else {
                defmt::debug!("central link: connect event debounced");
            }
        }
        accepted
    }

    fn on_disconnect(&self, now: Millis) -> bool {
        let accepted = self.with(|c| {
            if !c.debouncer.accept(now) {
                return false;
            }
            c.state.connected = false;
            c.state.framer.clear();
            c.debouncer.record(now);
            true
        });
        #[cfg(feature = "defmt")]
        {
            if accepted {
                defmt::info!("central link: disconnected");
            } else {
                defmt::debug!("central link: disconnect event debounced");
            }
        }
        accepted
    }

    fn on_notify(&self, data: &[u8]) {
        self.with(|c| c.state.framer.on_bytes(data));
    }

    fn on_advertisement(&self, device: &DiscoveredDevice) -> bool {
        self.with(|c| {
            if c.connect_requested {
                // First match already captured.
                return true;
            }
            if !c.scan_requested {
                return true;
            }
            if !device.name.contains(c.name_filter.as_str()) {
                return false;
            }
            #[cfg(feature = "defmt")]
            defmt::info!("advertised device found: {}", device.name.as_str());
            c.pending = Some(device.clone());
            c.connect_requested = true;
            c.scan_requested = false;
            true
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests (run on host, not embedded)
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;

    fn device(name: &str) -> DiscoveredDevice {
        let mut n = DeviceName::new();
        n.push_str(name).unwrap();
        DiscoveredDevice {
            address: PeerAddress {
                addr_type: 1,
                bytes: [0xC0, 0x01, 0x02, 0x03, 0x04, 0x05],
            },
            name: n,
            rssi: -60,
        }
    }

    #[test]
    fn advertisement_ignored_until_scan_requested() {
        let link = SharedLink::<NoopRawMutex>::new();
        assert!(link.on_advertisement(&device("BBC micro:bit [vatip]")));
        assert!(!link.connect_requested());
    }

    #[test]
    fn matching_advertisement_requests_exactly_one_connect() {
        let link = SharedLink::<NoopRawMutex>::new();
        link.request_scan("BBC");

        assert!(!link.on_advertisement(&device("Keyboard")));
        assert!(link.on_advertisement(&device("BBC micro:bit [pogiv]")));
        assert!(link.on_advertisement(&device("BBC micro:bit [vatip]")));

        let first = link.take_connect_request().unwrap();
        assert_eq!(first.name.as_str(), "BBC micro:bit [pogiv]");
        assert_eq!(link.take_connect_request(), None);
        assert!(!link.scan_requested());
    }

    #[test]
    fn filter_is_case_sensitive_substring() {
        let link = SharedLink::<NoopRawMutex>::new();
        link.request_scan("BBC");
        assert!(!link.on_advertisement(&device("bbc micro:bit")));
        assert!(link.on_advertisement(&device("my BBC board")));
    }

    #[test]
    fn disconnect_clears_link_state() {
        let link = SharedLink::<NoopRawMutex>::new();
        link.set_connected(true);
        link.on_notify(b"kup\n");

        assert!(link.on_disconnect(5_000));
        assert!(!link.is_connected());
        assert_eq!(link.take_line(), None);
        assert_eq!(link.last_connection_change(), 5_000);
    }

    #[test]
    fn connect_then_quick_disconnect_keeps_link() {
        let link = SharedLink::<NoopRawMutex>::new();
        assert!(link.on_connect(3_000));
        link.set_connected(true);

        assert!(!link.on_disconnect(3_400));
        assert!(link.is_connected());
        assert!(link.on_disconnect(4_000));
        assert!(!link.is_connected());
    }

    #[test]
    fn read_line_requires_connection_and_content() {
        let link = SharedLink::<NoopRawMutex>::new();
        link.on_notify(b"kbalance\r\n");
        assert_eq!(link.read_line(), None);

        link.set_connected(true);
        assert_eq!(link.read_line().as_deref(), Some("kbalance"));
        assert_eq!(link.read_line(), None);

        link.on_notify(b"\n");
        assert_eq!(link.read_line(), None);
    }

    #[test]
    fn shutdown_resets_flags_and_buffer() {
        let link = SharedLink::<NoopRawMutex>::new();
        link.request_scan("BBC");
        link.on_advertisement(&device("BBC x"));
        link.set_connected(true);
        link.on_notify(b"d");

        link.shutdown();

        assert!(!link.is_connected());
        assert!(!link.scan_requested());
        assert!(!link.connect_requested());
        assert_eq!(link.take_connect_request(), None);
        assert_eq!(link.take_line(), None);
    }

    #[test]
    fn notify_cccd_only_for_notifiable_with_descriptor() {
        let mut rx = RemoteCharacteristic {
            uuid: 0,
            value_handle: 0x20,
            cccd_handle: Some(0x21),
            props: CharProps {
                notifiable: true,
                ..Default::default()
            },
        };
        assert_eq!(rx.notify_cccd(), Some(0x21));

        rx.cccd_handle = None;
        assert_eq!(rx.notify_cccd(), None);

        rx.cccd_handle = Some(0x21);
        rx.props = CharProps {
            indicatable: true,
            ..Default::default()
        };
        assert_eq!(rx.notify_cccd(), None);
    }
}
