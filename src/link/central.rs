//! Central-role connection manager.
//!
//! Drives `Idle → Scanning → Connecting → Bound | Failed`.  All blocking
//! stack calls happen here, in the poll context; callbacks only raise
//! flags in the [`SharedLink`] that [`poll`](CentralLinkManager::poll)
//! later consumes.

use core::fmt::Write;

use embassy_sync::blocking_mutex::raw::RawMutex;
use heapless::String;

use crate::config::{LinkConfig, CCCD_ENABLE_INDICATIONS, DEVICE_NAME_CAPACITY};
use crate::error::LinkError;
use crate::link::{CentralTransport, DiscoveredDevice, ServiceBinding, SharedLink};

/// Lifecycle of the central role.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CentralState {
    Idle,
    Scanning,
    Connecting,
    Bound,
    Failed,
}

/// Owns the scan → connect → resolve → subscribe sequence.
pub struct CentralLinkManager<'a, T: CentralTransport, M: RawMutex> {
    transport: T,
    shared: &'a SharedLink<M>,
    config: LinkConfig,
    state: CentralState,
    binding: Option<ServiceBinding>,
}

impl<'a, T: CentralTransport, M: RawMutex> CentralLinkManager<'a, T, M> {
    pub fn new(transport: T, shared: &'a SharedLink<M>, config: LinkConfig) -> Self {
        Self {
            transport,
            shared,
            config,
            state: CentralState::Idle,
            binding: None,
        }
    }

    pub fn state(&self) -> CentralState {
        self.state
    }

    pub fn binding(&self) -> Option<&ServiceBinding> {
        self.binding.as_ref()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Scan until a device whose name contains `filter` is seen or the
    /// scan duration runs out.
    ///
    /// On a match the pending connect is left for [`poll`](Self::poll) and
    /// the state is `Connecting`.  Otherwise the state returns to `Idle`
    /// and `ScanNoMatch` (or the stack's scan error) is returned.
    pub async fn start_scan(&mut self, filter: &str) -> Result<(), LinkError> {
        self.shared.request_scan(filter);
        self.state = CentralState::Scanning;
        #[cfg(feature = "defmt")]
        defmt::info!("BLE scan starting ({} s window)", self.config.scan.duration_secs);

        let result = self.transport.scan(&self.config.scan, self.shared).await;

        if self.shared.connect_requested() {
            self.state = CentralState::Connecting;
            return Ok(());
        }

        self.state = CentralState::Idle;
        let err = result.err().unwrap_or(LinkError::ScanNoMatch);
        #[cfg(feature = "defmt")]
        defmt::info!("BLE scan ended without a match: {}", err);
        Err(err)
    }

    /// Open and bind the link to `device`.
    ///
    /// A failure after the transport opened closes it again.  Either way
    /// the link is left disconnected in `Failed`; no retry here.
    pub async fn connect(
        &mut self,
        device: &DiscoveredDevice,
    ) -> Result<ServiceBinding, LinkError> {
        self.state = CentralState::Connecting;
        self.binding = None;
        #[cfg(feature = "defmt")]
        defmt::info!("connecting to {}", device.name.as_str());

        match self.establish(device).await {
            Ok(binding) => {
                self.shared.set_connected(true);
                self.binding = Some(binding);
                self.state = CentralState::Bound;
                Ok(binding)
            }
            Err(e) => {
                self.shared.set_connected(false);
                self.state = CentralState::Failed;
                #[cfg(feature = "defmt")]
                defmt::warn!("connect to {} failed: {}", device.name.as_str(), e);
                Err(e)
            }
        }
    }

    async fn establish(&mut self, device: &DiscoveredDevice) -> Result<ServiceBinding, LinkError> {
        self.transport.open(device).await?;
        match self.resolve().await {
            Ok(binding) => Ok(binding),
            Err(e) => {
                self.transport.disconnect();
                Err(e)
            }
        }
    }

    async fn resolve(&mut self) -> Result<ServiceBinding, LinkError> {
        let service = self.transport.discover(self.config.service_uuid).await?;
        let binding = ServiceBinding::resolve(
            self.config.service_uuid,
            &service,
            self.config.tx_uuid,
            self.config.rx_uuid,
        )?;

        if binding.rx_can_push() {
            self.transport.subscribe(&binding.rx).await?;
            #[cfg(feature = "defmt")]
            defmt::debug!("registered for RX notifications");
        } else {
            #[cfg(feature = "defmt")]
            defmt::warn!("RX can neither notify nor indicate; receive path disabled");
        }

        if binding.rx.props.indicatable {
            let cccd = binding.rx.cccd_handle.ok_or(LinkError::DescriptorNotFound)?;
            self.transport.write(cccd, &CCCD_ENABLE_INDICATIONS).await?;
        }

        Ok(binding)
    }

    /// Poll-loop step: act on a connect request raised by the scan
    /// callback, then introduce ourselves to the peer.
    ///
    /// Returns the connect outcome when an attempt was made.
    pub async fn poll(&mut self) -> Option<Result<ServiceBinding, LinkError>> {
        if self.state == CentralState::Bound && !self.shared.is_connected() {
            #[cfg(feature = "defmt")]
            defmt::info!("central link lost");
            self.state = CentralState::Idle;
            self.binding = None;
        }

        let device = self.shared.take_connect_request()?;
        let result = self.connect(&device).await;
        if let Ok(binding) = &result {
            self.send_handshake(binding).await;
            #[cfg(feature = "defmt")]
            defmt::info!("now connected to {}", device.name.as_str());
        }
        Some(result)
    }

    async fn send_handshake(&mut self, binding: &ServiceBinding) {
        let mut msg: String<{ DEVICE_NAME_CAPACITY + 1 }> = String::new();
        if writeln!(msg, "{}", self.config.device_model).is_err() {
            #[cfg(feature = "defmt")]
            defmt::warn!("device model too long for handshake");
            return;
        }
        if let Err(_e) = self.transport.write(binding.tx.value_handle, msg.as_bytes()).await {
            #[cfg(feature = "defmt")]
            defmt::warn!("handshake write failed: {}", _e);
        }
    }

    /// Withdraw the central role: clear link state and pending requests.
    ///
    /// An established transport is not torn down here; the peer or the
    /// supervision timeout closes it.
    pub fn shutdown(&mut self) {
        self.shared.shutdown();
        self.state = CentralState::Idle;
        self.binding = None;
        #[cfg(feature = "defmt")]
        defmt::info!("BLE client scanning stopped");
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests (run on host, not embedded)
// ═══════════════════════════════════════════════════════════════════════════
