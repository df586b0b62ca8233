//! BLE GAP scanner.
//!
//! Uses the SoftDevice Central-role scanning API.  The listener decides
//! which advertisement wins; this module only decodes the report.

use ble_arbiter::config::ScanParams;
use ble_arbiter::error::LinkError;
use ble_arbiter::link::adv_parser::local_name;
use ble_arbiter::link::{DiscoveredDevice, LinkListener, PeerAddress};
use defmt::{info, warn};
use embassy_futures::select::{select, Either};
use embassy_time::{Duration, Timer};
use nrf_softdevice::ble::central;
use nrf_softdevice::{raw, Softdevice};

/// Run one scan pass with `params`, offering each named advertisement to
/// `listener`.
///
/// `Ok` once the listener stops the scan, `ScanNoMatch` when the scan
/// duration elapses first.
pub async fn scan<L: LinkListener>(
    sd: &Softdevice,
    params: &ScanParams,
    listener: &L,
) -> Result<(), LinkError> {
    let config = central::ScanConfig {
        // Active scan to retrieve scan-response data (device names).
        active: params.active,
        interval: params.interval,
        window: params.window,
        ..Default::default()
    };

    let scan_fut = central::scan(sd, &config, |report| {
        let data =
            unsafe { core::slice::from_raw_parts(report.data.p_data, report.data.len as usize) };

        let name = local_name(data)?;
        let device = DiscoveredDevice {
            address: peer_address(&report.peer_addr),
            name,
            rssi: report.rssi,
        };

        // Return None to keep scanning, Some(()) to stop.
        listener.on_advertisement(&device).then_some(())
    });
    let timeout_fut = Timer::after(Duration::from_secs(u64::from(params.duration_secs)));

    match select(scan_fut, timeout_fut).await {
        Either::First(Ok(())) => Ok(()),
        Either::First(Err(_)) => {
            warn!("BLE scan ended with error");
            Err(LinkError::ScanFailed)
        }
        Either::Second(()) => {
            info!("BLE scan window closed");
            Err(LinkError::ScanNoMatch)
        }
    }
}

fn peer_address(addr: &raw::ble_gap_addr_t) -> PeerAddress {
    PeerAddress {
        addr_type: addr.addr_type(),
        bytes: addr.addr,
    }
}
