//! ble-arbiter firmware for nRF52840 + SoftDevice S140.
//!
//! Brings up the server role (advertising the UART service), then the
//! client role (scanning for the sensor board), and keeps whichever one
//! links first.  The main loop polls the arbitrator and hands received
//! lines to the command parser.

#![no_std]
#![no_main]

mod ble;

use ble_arbiter::arbiter::ModeArbitrator;
use ble_arbiter::config::{
    LinkConfig, ADVERTISED_NAME, BLE_RESCAN_DELAY_MS, DEVICE_NAME_FILTER, MAIN_LOOP_TICK_MS,
    ROLES_ENABLED, ROLE_STARTUP_DELAY_MS,
};
use ble_arbiter::link::{CentralLinkManager, CentralState, Command, Line};
use defmt::{info, warn};
use embassy_executor::Spawner;
use embassy_nrf::interrupt;
use embassy_time::{Duration, Ticker, Timer};
use nrf_softdevice::{self as sd, Softdevice};
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use crate::ble::now_ms;
use crate::ble::server::{self, Server, ServerLink};
use crate::ble::transport::{self, CentralLink, SoftdeviceTransport};

static CENTRAL_LINK: CentralLink = CentralLink::new();
static SERVER_LINK: ServerLink = ServerLink::new();

#[embassy_executor::task]
async fn softdevice_task(sd: &'static Softdevice) -> ! {
    sd.run().await
}

/// Scan for the sensor board and bind to it.  Rescans after a window with
/// no match for as long as the role has not been withdrawn.
#[embassy_executor::task]
async fn central_task(sd: &'static Softdevice) {
    let transport = SoftdeviceTransport::new(sd, &CENTRAL_LINK);
    let mut manager = CentralLinkManager::new(transport, &CENTRAL_LINK, LinkConfig::default());

    let _ = manager.start_scan(DEVICE_NAME_FILTER).await;
    loop {
        if manager.state() == CentralState::Idle && CENTRAL_LINK.scan_requested() {
            Timer::after_millis(BLE_RESCAN_DELAY_MS).await;
            // Withdrawn while we were waiting.
            if CENTRAL_LINK.scan_requested() {
                let _ = manager.start_scan(DEVICE_NAME_FILTER).await;
            }
        }

        if let Some(Err(e)) = manager.poll().await {
            warn!("sensor board link not established: {}", e);
        }

        Timer::after_millis(MAIN_LOOP_TICK_MS).await;
    }
}

fn dispatch(source: &str, line: &Line) {
    if let Some(cmd) = Command::parse(line) {
        info!("{} command '{}' {}", source, cmd.token, cmd.payload);
    }
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("ble-arbiter starting (roles: {})", ROLES_ENABLED);

    let mut c = embassy_nrf::config::Config::default();
    c.gpiote_interrupt_priority = interrupt::Priority::P2;
    c.time_interrupt_priority = interrupt::Priority::P2;
    let _p = embassy_nrf::init(c);

    let config = sd::Config {
        clock: Some(sd::raw::nrf_clock_lf_cfg_t {
            source: sd::raw::NRF_CLOCK_LF_SRC_RC as u8,
            rc_ctiv: 16,
            rc_temp_ctiv: 2,
            accuracy: sd::raw::NRF_CLOCK_LF_ACCURACY_500_PPM as u8,
        }),
        conn_gap: Some(sd::raw::ble_gap_conn_cfg_t {
            // One link per role.
            conn_count: 2,
            event_length: 24,
        }),
        conn_gatt: Some(sd::raw::ble_gatt_conn_cfg_t { att_mtu: 256 }),
        gatts_attr_tab_size: Some(sd::raw::ble_gatts_cfg_attr_tab_size_t {
            attr_tab_size: sd::raw::BLE_GATTS_ATTR_TAB_SIZE_DEFAULT,
        }),
        gap_role_count: Some(sd::raw::ble_gap_cfg_role_count_t {
            adv_set_count: 1,
            periph_role_count: 1,
            central_role_count: 1,
            central_sec_count: 0,
            _bitfield_1: sd::raw::ble_gap_cfg_role_count_t::new_bitfield_1(0),
        }),
        gap_device_name: Some(sd::raw::ble_gap_cfg_device_name_t {
            p_value: ADVERTISED_NAME.as_ptr() as _,
            current_len: ADVERTISED_NAME.len() as u16,
            max_len: ADVERTISED_NAME.len() as u16,
            write_perm: unsafe { core::mem::zeroed() },
            _bitfield_1: sd::raw::ble_gap_cfg_device_name_t::new_bitfield_1(
                sd::raw::BLE_GATTS_VLOC_STACK as u8,
            ),
        }),
        ..Default::default()
    };

    let sd = Softdevice::enable(&config);

    static SERVER: StaticCell<Server> = StaticCell::new();
    let gatt_server = match server::register(sd) {
        Ok(s) => Some(&*SERVER.init(s)),
        Err(e) => {
            warn!("server role unavailable: {}", e);
            None
        }
    };

    let sd: &'static Softdevice = sd;
    spawner.must_spawn(softdevice_task(sd));

    // Server first, then client, each given a moment to settle.
    if ROLES_ENABLED.server_enabled() {
        if let Some(gatt_server) = gatt_server {
            spawner.must_spawn(server::server_task(sd, gatt_server, &SERVER_LINK));
        }
        Timer::after_millis(ROLE_STARTUP_DELAY_MS).await;
    }
    if ROLES_ENABLED.client_enabled() {
        spawner.must_spawn(transport::notification_task(&CENTRAL_LINK));
        spawner.must_spawn(central_task(sd));
        Timer::after_millis(ROLE_STARTUP_DELAY_MS).await;
    }

    // Without a GATT table the server can never link.
    let roles = match gatt_server {
        Some(_) => ROLES_ENABLED,
        None => ROLES_ENABLED.without_server(),
    };
    let mut arbiter = ModeArbitrator::new(roles, now_ms());
    let mut ticker = Ticker::every(Duration::from_millis(MAIN_LOOP_TICK_MS));
    let mut last = arbiter.decision();

    loop {
        let decision = arbiter.poll(now_ms(), &SERVER_LINK, &CENTRAL_LINK);
        if decision != last {
            info!("role decision: {}", decision);
            last = decision;
        }

        if let Some(line) = CENTRAL_LINK.read_line() {
            dispatch("client", &line);
        }
        if let Some(line) = SERVER_LINK.read_line() {
            dispatch("server", &line);
        }

        ticker.next().await;
    }
}
