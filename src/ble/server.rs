//! Peripheral role: advertise the UART service to the companion app.
//!
//! Writes to RX are framed into lines on the shared [`PeripheralLink`];
//! the task stops advertising for good once the arbitrator picks the
//! central role.

use ble_arbiter::config::{ADVERTISED_NAME, MAX_NOTIFICATION_LEN, SERVICE_UUID};
use ble_arbiter::error::Error;
use ble_arbiter::peripheral::PeripheralLink;
use defmt::{info, warn};
use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use heapless::Vec;
use nrf_softdevice::ble::advertisement_builder::{
    Flag, LegacyAdvertisementBuilder, LegacyAdvertisementPayload, ServiceList,
};
use nrf_softdevice::ble::{gatt_server, peripheral};
use nrf_softdevice::Softdevice;

pub type ServerLink = PeripheralLink<CriticalSectionRawMutex>;

#[nrf_softdevice::gatt_service(uuid = "6e400001-b5a3-f393-e0a9-e50e24dcca9e")]
pub struct UartService {
    /// Companion app → device.
    #[characteristic(uuid = "6e400002-b5a3-f393-e0a9-e50e24dcca9e", write, write_without_response)]
    rx: Vec<u8, MAX_NOTIFICATION_LEN>,

    /// Device → companion app.
    #[characteristic(uuid = "6e400003-b5a3-f393-e0a9-e50e24dcca9e", notify)]
    tx: Vec<u8, MAX_NOTIFICATION_LEN>,
}

#[nrf_softdevice::gatt_server]
pub struct Server {
    uart: UartService,
}

static ADV_DATA: LegacyAdvertisementPayload = LegacyAdvertisementBuilder::new()
    .flags(&[Flag::GeneralDiscovery, Flag::LE_Only])
    .full_name(ADVERTISED_NAME)
    .build();

const SERVICE_UUID_LE: [u8; 16] = SERVICE_UUID.to_le_bytes();

// The 128-bit service UUID does not fit next to the name.
static SCAN_DATA: LegacyAdvertisementPayload = LegacyAdvertisementBuilder::new()
    .services_128(ServiceList::Complete, &[SERVICE_UUID_LE])
    .build();

/// Register the GATT table.  Must run before the SoftDevice starts.
pub fn register(sd: &mut Softdevice) -> Result<Server, Error> {
    Server::new(sd).map_err(|_| Error::GattServer)
}

/// Advertise, serve one connection at a time, repeat, until stopped.
#[embassy_executor::task]
pub async fn server_task(
    sd: &'static Softdevice,
    server: &'static Server,
    link: &'static ServerLink,
) {
    match serve(sd, server, link).await {
        Ok(()) => info!("BLE server role finished"),
        Err(e) => warn!("BLE server role failed: {}", e),
    }
}

async fn serve(sd: &'static Softdevice, server: &Server, link: &ServerLink) -> Result<(), Error> {
    let config = peripheral::Config::default();

    while !link.is_stopped() {
        let adv = peripheral::ConnectableAdvertisement::ScannableUndirected {
            adv_data: &ADV_DATA,
            scan_data: &SCAN_DATA,
        };
        info!("advertising as {}", ADVERTISED_NAME);

        let advertise = peripheral::advertise_connectable(sd, adv, &config);
        let conn = match select(advertise, link.wait_stop()).await {
            Either::First(Ok(conn)) => conn,
            Either::First(Err(_)) => return Err(Error::AdvertiseFailed),
            Either::Second(()) => break,
        };
        if link.is_stopped() {
            // Lost the race against the arbitrator.
            let _ = conn.disconnect();
            break;
        }

        link.on_connect();
        info!("companion app connected");

        let _ = gatt_server::run(&conn, server, |event| match event {
            ServerEvent::Uart(UartServiceEvent::RxWrite(data)) => link.on_write(&data),
            ServerEvent::Uart(UartServiceEvent::TxCccdWrite { notifications }) => {
                info!("TX notifications: {}", notifications)
            }
        })
        .await;

        link.on_disconnect();
        info!("companion app disconnected");
    }

    Ok(())
}
