//! SoftDevice S140 glue for both BLE roles.
//!
//! 1. **Scanner** - feeds every advertisement to the shared link's
//!    listener until it asks to stop or the scan window closes.
//! 2. **Transport** - [`CentralTransport`](ble_arbiter::link::CentralTransport)
//!    over `central::connect` and the raw GATT client.
//! 3. **Server** - advertises the UART service and frames writes from
//!    the companion app until the arbitrator stops it.
//!
//! All state the arbitrator reads lives in the library's `SharedLink`
//! and `PeripheralLink`; nothing here decides which role wins.

pub mod scanner;
pub mod server;
pub mod transport;

use ble_arbiter::config::Millis;
use nrf_softdevice::ble::Uuid;

/// Milliseconds since boot.
pub fn now_ms() -> Millis {
    embassy_time::Instant::now().as_millis()
}

/// SoftDevice keeps 128-bit UUIDs little-endian.
pub fn uuid128(uuid: u128) -> Uuid {
    Uuid::new_128(&uuid.to_le_bytes())
}
