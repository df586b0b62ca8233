//! Advertisement / scan-response payload parsing.
//!
//! Payloads are a sequence of AD structures: `[len][type][len - 1 bytes]`.

use crate::link::DeviceName;

const AD_SHORTENED_LOCAL_NAME: u8 = 0x08;
const AD_COMPLETE_LOCAL_NAME: u8 = 0x09;

/// Iterate `(ad_type, payload)` pairs, stopping at the first malformed
/// length.
pub fn ad_structures(data: &[u8]) -> impl Iterator<Item = (u8, &[u8])> {
    let mut rest = data;
    core::iter::from_fn(move || {
        let (&len, tail) = rest.split_first()?;
        let len = len as usize;
        if len == 0 || len > tail.len() {
            rest = &[];
            return None;
        }
        let (field, next) = tail.split_at(len);
        rest = next;
        let (&ad_type, payload) = field.split_first()?;
        Some((ad_type, payload))
    })
}

/// Local name from the payload, preferring the complete name over the
/// shortened one.  Truncated to the name capacity.
pub fn local_name(data: &[u8]) -> Option<DeviceName> {
    let mut shortened = None;
    for (ad_type, payload) in ad_structures(data) {
        match ad_type {
            AD_COMPLETE_LOCAL_NAME => return Some(name_from_bytes(payload)),
            AD_SHORTENED_LOCAL_NAME if shortened.is_none() => {
                shortened = Some(name_from_bytes(payload))
            }
            _ => {}
        }
    }
    shortened
}

fn name_from_bytes(bytes: &[u8]) -> DeviceName {
    let mut name = DeviceName::new();
    for &b in bytes {
        if name.push(b as char).is_err() {
            break;
        }
    }
    name
}

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests (run on host, not embedded)
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_complete_local_name() {
        let ad_data = [
            0x02, 0x01, 0x06, // Flags
            0x09, 0x09, b'B', b'B', b'C', b' ', b'b', b'i', b't', b'!',
        ];
        assert_eq!(local_name(&ad_data).unwrap().as_str(), "BBC bit!");
    }

    #[test]
    fn extract_shortened_local_name() {
        let ad_data = [0x04, 0x08, b'B', b'B', b'C'];
        assert_eq!(local_name(&ad_data).unwrap().as_str(), "BBC");
    }

    #[test]
    fn complete_name_wins_over_shortened() {
        let ad_data = [
            0x03, 0x08, b'B', b'B', //
            0x05, 0x09, b'B', b'B', b'C', b'1',
        ];
        assert_eq!(local_name(&ad_data).unwrap().as_str(), "BBC1");
    }

    #[test]
    fn no_name_in_advertisement() {
        let ad_data = [0x02, 0x01, 0x06];
        assert_eq!(local_name(&ad_data), None);
        assert_eq!(local_name(&[]), None);
    }

    #[test]
    fn malformed_lengths_stop_parsing() {
        assert_eq!(ad_structures(&[0x00, 0x09, b'x']).count(), 0);
        // Claims 5 bytes, only 2 follow.
        assert_eq!(local_name(&[0x05, 0x09, b'B']), None);
    }

    #[test]
    fn name_truncated_to_capacity() {
        let mut ad_data = [0u8; 40];
        ad_data[0] = 36;
        ad_data[1] = 0x09;
        for b in ad_data.iter_mut().skip(2).take(35) {
            *b = b'X';
        }
        assert_eq!(local_name(&ad_data).unwrap().len(), 32);
    }
}
