//! Application-wide constants and compile-time configuration.
//!
//! All timing parameters, GATT identifiers and protocol constants live
//! here so they can be tuned in one place.  The grouped structs at the
//! bottom bundle them for components that accept overrides (tests use
//! shorter windows, for example).

use crate::arbiter::RolesEnabled;

/// Milliseconds since boot.  All timing in the core is expressed in this
/// unit so it can be driven from `embassy_time::Instant` on target and
/// from plain integers in host tests.
pub type Millis = u64;

// Roles

/// Which BLE roles this build brings up.  Read once at startup.
pub const ROLES_ENABLED: RolesEnabled = RolesEnabled::Both;

// Arbitration

/// How often the arbitrator re-evaluates role state (ms).
pub const ARBITRATION_POLL_INTERVAL_MS: Millis = 1_000;

/// Budget for a role to connect before the server role wins by default (ms).
pub const ARBITRATION_DECISION_TIMEOUT_MS: Millis = 30_000;

/// Cooperative tick of the firmware main loop (ms).
pub const MAIN_LOOP_TICK_MS: u64 = 100;

/// Settling delay after bringing up each role at boot (ms).
pub const ROLE_STARTUP_DELAY_MS: u64 = 100;

// Central link

/// Connect/disconnect events closer together than this are dropped (ms).
pub const CONNECTION_DEBOUNCE_MS: Millis = 1_000;

/// Token that must appear in the advertised name of the sensor board.
pub const DEVICE_NAME_FILTER: &str = "BBC";

/// Model name sent to the sensor board right after binding.
pub const DEVICE_MODEL: &str = "Bittle";

/// Scan interval (0.625 ms units).
pub const BLE_SCAN_INTERVAL: u32 = 2_000;

/// Scan window (0.625 ms units).
pub const BLE_SCAN_WINDOW: u32 = 1_000;

/// Duration of one scan pass (seconds).
pub const BLE_SCAN_DURATION_SECS: u16 = 10;

/// Pause before retrying a scan that found nothing (ms).
pub const BLE_RESCAN_DELAY_MS: u64 = 500;

/// BLE connection interval range (in 1.25 ms units).
pub const BLE_CONN_INTERVAL_MIN: u16 = 12;
pub const BLE_CONN_INTERVAL_MAX: u16 = 24;

/// BLE slave latency (number of connection events the peripheral can skip).
pub const BLE_SLAVE_LATENCY: u16 = 0;

/// BLE supervision timeout (in 10 ms units). 400 = 4 s.
pub const BLE_SUP_TIMEOUT: u16 = 400;

// GATT identifiers (UART-style service shared by both roles)

pub const SERVICE_UUID: u128 = 0x6e40_0001_b5a3_f393_e0a9_e50e_24dc_ca9e;
pub const CHARACTERISTIC_UUID_RX: u128 = 0x6e40_0002_b5a3_f393_e0a9_e50e_24dc_ca9e;
pub const CHARACTERISTIC_UUID_TX: u128 = 0x6e40_0003_b5a3_f393_e0a9_e50e_24dc_ca9e;

/// Client Characteristic Configuration Descriptor.
pub const CCCD_UUID: u16 = 0x2902;

/// CCCD value that enables indications.
pub const CCCD_ENABLE_INDICATIONS: [u8; 2] = [0x02, 0x00];

/// CCCD value that enables notifications.
pub const CCCD_ENABLE_NOTIFICATIONS: [u8; 2] = [0x01, 0x00];

// Peripheral role

/// Name advertised to the companion application.
pub const ADVERTISED_NAME: &str = "Bittle_BLE";

// Buffers

/// Longest line the receive framer keeps; extra bytes are dropped.
pub const RX_LINE_CAPACITY: usize = 256;

/// Advertised names are truncated to this many bytes.
pub const DEVICE_NAME_CAPACITY: usize = 32;

/// Characteristics remembered per discovered service.
pub const MAX_CHARACTERISTICS: usize = 8;

/// Largest single notification payload forwarded from the stack.
pub const MAX_NOTIFICATION_LEN: usize = 244;

/// Scan parameters handed to the radio stack.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ScanParams {
    /// Scan interval (0.625 ms units).
    pub interval: u32,
    /// Scan window (0.625 ms units).
    pub window: u32,
    /// Scan duration (seconds).
    pub duration_secs: u16,
    /// Active scanning requests scan responses (which carry most names).
    pub active: bool,
}

impl Default for ScanParams {
    fn default() -> Self {
        Self {
            interval: BLE_SCAN_INTERVAL,
            window: BLE_SCAN_WINDOW,
            duration_secs: BLE_SCAN_DURATION_SECS,
            active: true,
        }
    }
}

/// Central link settings.
#[derive(Clone, Copy, Debug)]
pub struct LinkConfig {
    pub scan: ScanParams,
    pub service_uuid: u128,
    pub rx_uuid: u128,
    pub tx_uuid: u128,
    /// Sent newline-terminated on TX once a bind succeeds.
    pub device_model: &'static str,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            scan: ScanParams::default(),
            service_uuid: SERVICE_UUID,
            rx_uuid: CHARACTERISTIC_UUID_RX,
            tx_uuid: CHARACTERISTIC_UUID_TX,
            device_model: DEVICE_MODEL,
        }
    }
}

/// Arbitration timing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ArbitrationConfig {
    pub poll_interval_ms: Millis,
    pub decision_timeout_ms: Millis,
}

impl Default for ArbitrationConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: ARBITRATION_POLL_INTERVAL_MS,
            decision_timeout_ms: ARBITRATION_DECISION_TIMEOUT_MS,
        }
    }
}
