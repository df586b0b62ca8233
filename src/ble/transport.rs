//! [`CentralTransport`] over the SoftDevice central + GATT client APIs.
//!
//! The UART service is discovered with a hand-written `gatt_client::Client`
//! rather than the derive macro: the derive binds characteristics by UUID,
//! while the link manager needs the raw property bits to assign TX/RX by
//! capability.

use ble_arbiter::config::{
    ScanParams, BLE_CONN_INTERVAL_MAX, BLE_CONN_INTERVAL_MIN, BLE_SLAVE_LATENCY, BLE_SUP_TIMEOUT,
    CCCD_ENABLE_NOTIFICATIONS, CCCD_UUID, CHARACTERISTIC_UUID_RX, CHARACTERISTIC_UUID_TX,
    MAX_NOTIFICATION_LEN, SERVICE_UUID,
};
use ble_arbiter::error::LinkError;
use ble_arbiter::link::{
    CentralTransport, CharProps, DiscoveredDevice, LinkListener, RemoteCharacteristic,
    RemoteService, SharedLink,
};
use defmt::{info, warn};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use heapless::Vec;
use nrf_softdevice::ble::gatt_client::{self, DiscoverError};
use nrf_softdevice::ble::{central, Address, Connection, HvxType, Uuid};
use nrf_softdevice::{raw, Softdevice};

use crate::ble::{now_ms, scanner, uuid128};

pub type CentralLink = SharedLink<CriticalSectionRawMutex>;

/// Discovered connection handed to the notification task.
pub static DISCOVERED: Signal<CriticalSectionRawMutex, (Connection, UartClient)> = Signal::new();

/// Raw GATT client for the UART service.
pub struct UartClient {
    characteristics: RemoteService,
}

impl UartClient {
    pub fn characteristics(&self) -> &RemoteService {
        &self.characteristics
    }
}

impl gatt_client::Client for UartClient {
    type Event = Vec<u8, MAX_NOTIFICATION_LEN>;

    fn on_hvx(
        &self,
        _conn: &Connection,
        _type_: HvxType,
        _handle: u16,
        data: &[u8],
    ) -> Option<Self::Event> {
        let len = data.len().min(MAX_NOTIFICATION_LEN);
        Vec::from_slice(&data[..len]).ok()
    }

    fn uuid() -> Uuid {
        uuid128(SERVICE_UUID)
    }

    fn new_undiscovered(_conn: Connection) -> Self {
        Self {
            characteristics: Vec::new(),
        }
    }

    fn discovered_characteristic(
        &mut self,
        characteristic: &gatt_client::Characteristic,
        descriptors: &[gatt_client::Descriptor],
    ) {
        // 128-bit UUIDs come back as vendor-base aliases, so match against
        // the ones we know instead of decoding.
        let Some(uuid) = [CHARACTERISTIC_UUID_TX, CHARACTERISTIC_UUID_RX]
            .into_iter()
            .find(|&u| characteristic.uuid == Some(uuid128(u)))
        else {
            return;
        };
        let cccd = Uuid::new_16(CCCD_UUID);
        let props = &characteristic.props;
        let remote = RemoteCharacteristic {
            uuid,
            value_handle: characteristic.handle_value,
            cccd_handle: descriptors
                .iter()
                .find(|d| d.uuid == Some(cccd))
                .map(|d| d.handle),
            props: CharProps {
                writable: props.write() != 0 || props.write_wo_resp() != 0,
                notifiable: props.notify() != 0,
                indicatable: props.indicate() != 0,
            },
        };
        if self.characteristics.push(remote).is_err() {
            warn!("too many characteristics, ignoring {}", remote.value_handle);
        }
    }

    fn discovery_complete(&mut self) -> Result<(), DiscoverError> {
        // Missing RX/TX is reported by the binding step, not here.
        Ok(())
    }
}

/// Central-role transport bound to one SoftDevice instance.
pub struct SoftdeviceTransport {
    sd: &'static Softdevice,
    link: &'static CentralLink,
    conn: Option<Connection>,
}

impl SoftdeviceTransport {
    pub fn new(sd: &'static Softdevice, link: &'static CentralLink) -> Self {
        Self {
            sd,
            link,
            conn: None,
        }
    }

    fn connection(&self) -> Result<&Connection, LinkError> {
        self.conn.as_ref().ok_or(LinkError::ConnectFailed)
    }
}

impl CentralTransport for SoftdeviceTransport {
    async fn scan<L: LinkListener>(
        &mut self,
        params: &ScanParams,
        listener: &L,
    ) -> Result<(), LinkError> {
        scanner::scan(self.sd, params, listener).await
    }

    async fn open(&mut self, device: &DiscoveredDevice) -> Result<(), LinkError> {
        // SAFETY: plain C struct, all-zero is a valid value.
        let mut addr: raw::ble_gap_addr_t = unsafe { core::mem::zeroed() };
        addr.set_addr_type(device.address.addr_type);
        addr.addr = device.address.bytes;
        let address = Address::from_raw(addr);

        let whitelist = [&address];
        let conn_cfg = central::ConnectConfig {
            scan_config: central::ScanConfig {
                whitelist: Some(&whitelist),
                ..Default::default()
            },
            conn_params: raw::ble_gap_conn_params_t {
                min_conn_interval: BLE_CONN_INTERVAL_MIN,
                max_conn_interval: BLE_CONN_INTERVAL_MAX,
                slave_latency: BLE_SLAVE_LATENCY,
                conn_sup_timeout: BLE_SUP_TIMEOUT,
            },
            ..Default::default()
        };

        let conn = central::connect(self.sd, &conn_cfg)
            .await
            .map_err(|_| LinkError::ConnectFailed)?;
        self.conn = Some(conn);
        self.link.on_connect(now_ms());
        Ok(())
    }

    async fn discover(&mut self, service: u128) -> Result<RemoteService, LinkError> {
        if service != SERVICE_UUID {
            return Err(LinkError::ServiceNotFound);
        }
        let conn = self.connection()?;
        info!("Discovering UART service...");
        let client: UartClient = gatt_client::discover(conn).await.map_err(|e| match e {
            DiscoverError::ServiceNotFound => LinkError::ServiceNotFound,
            _ => LinkError::ConnectFailed,
        })?;

        let characteristics = client.characteristics().clone();
        // The notification task owns event delivery (and disconnect
        // detection) for the rest of this connection.
        DISCOVERED.signal((conn.clone(), client));
        Ok(characteristics)
    }

    async fn subscribe(&mut self, rx: &RemoteCharacteristic) -> Result<(), LinkError> {
        // Indications are enabled by the link manager.
        match rx.notify_cccd() {
            Some(cccd) => self.write(cccd, &CCCD_ENABLE_NOTIFICATIONS).await,
            None => {
                if rx.props.notifiable {
                    warn!("RX has no CCCD, notifications not enabled");
                }
                Ok(())
            }
        }
    }

    async fn write(&mut self, handle: u16, data: &[u8]) -> Result<(), LinkError> {
        let conn = self.connection()?;
        gatt_client::write(conn, handle, data)
            .await
            .map_err(|_| LinkError::WriteFailed)
    }

    fn disconnect(&mut self) {
        if let Some(conn) = self.conn.take() {
            let _ = conn.disconnect();
        }
    }
}

/// Deliver notifications of each discovered connection to the shared
/// link, and report the disconnect when the connection ends.
#[embassy_executor::task]
pub async fn notification_task(link: &'static CentralLink) {
    loop {
        let (conn, client) = DISCOVERED.wait().await;
        info!("UART notification loop started");

        let _ = gatt_client::run(&conn, &client, |data| link.on_notify(&data)).await;

        link.on_disconnect(now_ms());
        info!("UART notification loop ended (connection closed)");
    }
}
