//! TX/RX characteristic assignment.
//!
//! The two UART characteristics are looked up by UUID, but boards disagree
//! on which side of the link each UUID names.  The final assignment is by
//! capability: TX is whichever one accepts writes.

use crate::error::LinkError;
use crate::link::RemoteCharacteristic;

/// The resolved service with its write (TX) and receive (RX) sides.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ServiceBinding {
    pub service: u128,
    pub tx: RemoteCharacteristic,
    pub rx: RemoteCharacteristic,
}

impl ServiceBinding {
    /// Pick TX and RX out of the discovered characteristics.
    ///
    /// Fails with `CharacteristicNotFound` if either UUID is absent and
    /// with `CharacteristicNotWritable` if neither side accepts writes.
    pub fn resolve(
        service: u128,
        characteristics: &[RemoteCharacteristic],
        tx_uuid: u128,
        rx_uuid: u128,
    ) -> Result<Self, LinkError> {
        let find = |uuid: u128| {
            characteristics
                .iter()
                .find(|c| c.uuid == uuid)
                .copied()
                .ok_or(LinkError::CharacteristicNotFound)
        };
        let mut tx = find(tx_uuid)?;
        let mut rx = find(rx_uuid)?;

        if !tx.props.writable {
            core::mem::swap(&mut tx, &mut rx);
        }
        if !tx.props.writable {
            return Err(LinkError::CharacteristicNotWritable);
        }

        Ok(Self { service, tx, rx })
    }

    /// Whether the peer can push data to us on RX at all.
    pub fn rx_can_push(&self) -> bool {
        self.rx.props.notifiable || self.rx.props.indicatable
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests (run on host, not embedded)
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::CharProps;

    const SERVICE: u128 = 0x10;
    const TX: u128 = 0x11;
    const RX: u128 = 0x12;

    fn chr(uuid: u128, handle: u16, writable: bool, notifiable: bool) -> RemoteCharacteristic {
        RemoteCharacteristic {
            uuid,
            value_handle: handle,
            cccd_handle: Some(handle + 1),
            props: CharProps {
                writable,
                notifiable,
                indicatable: false,
            },
        }
    }

    #[test]
    fn keeps_uuid_order_when_tx_writable() {
        let chars = [chr(TX, 10, true, false), chr(RX, 20, false, true)];
        let b = ServiceBinding::resolve(SERVICE, &chars, TX, RX).unwrap();
        assert_eq!(b.tx.uuid, TX);
        assert_eq!(b.rx.uuid, RX);
        assert!(b.rx_can_push());
    }

    #[test]
    fn swaps_when_tx_not_writable() {
        let chars = [chr(TX, 10, false, true), chr(RX, 20, true, false)];
        let b = ServiceBinding::resolve(SERVICE, &chars, TX, RX).unwrap();
        assert_eq!(b.tx.uuid, RX);
        assert!(b.tx.props.writable);
        assert_eq!(b.rx.uuid, TX);
        assert_eq!(b.rx.value_handle, 10);
    }

    #[test]
    fn neither_writable_is_rejected() {
        let chars = [chr(TX, 10, false, true), chr(RX, 20, false, true)];
        assert_eq!(
            ServiceBinding::resolve(SERVICE, &chars, TX, RX),
            Err(LinkError::CharacteristicNotWritable)
        );
    }

    #[test]
    fn missing_characteristic() {
        let only_tx = [chr(TX, 10, true, false)];
        assert_eq!(
            ServiceBinding::resolve(SERVICE, &only_tx, TX, RX),
            Err(LinkError::CharacteristicNotFound)
        );
        assert_eq!(
            ServiceBinding::resolve(SERVICE, &[], TX, RX),
            Err(LinkError::CharacteristicNotFound)
        );
    }

    #[test]
    fn rx_without_push_capability() {
        let chars = [chr(TX, 10, true, false), chr(RX, 20, false, false)];
        let b = ServiceBinding::resolve(SERVICE, &chars, TX, RX).unwrap();
        assert!(!b.rx_can_push());
    }
}
