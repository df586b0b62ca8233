//! Notification payload → text line framing.
//!
//! The sensor board sends one logical command per notification, so each
//! delivery replaces (never appends to) the held line.  CR and LF are
//! stripped; the downstream parser sees a bare line.

use crate::config::RX_LINE_CAPACITY;
use heapless::String;

/// Bytes ≥ 0x80 widen to two UTF-8 bytes each.
const LINE_UTF8_CAPACITY: usize = 2 * RX_LINE_CAPACITY;

/// One completed, CR/LF-stripped line of up to `RX_LINE_CAPACITY`
/// received bytes, each mapped to one char.
pub type Line = String<LINE_UTF8_CAPACITY>;

/// Holds the most recent notification as text plus a ready flag.
#[derive(Clone, Debug, Default)]
pub struct ReceiveFramer {
    buffer: Line,
    ready: bool,
}

impl ReceiveFramer {
    pub const fn new() -> Self {
        Self {
            buffer: String::new(),
            ready: false,
        }
    }

    /// Handle one notification delivery.
    ///
    /// A zero-length delivery keeps the previous contents but still marks
    /// the framer ready; the stack has been seen to do this and the read
    /// side relies on the flag alone.
    pub fn on_bytes(&mut self, data: &[u8]) {
        if !data.is_empty() {
            self.buffer.clear();
            let kept = data
                .iter()
                .filter(|&&b| b != b'\r' && b != b'\n')
                .take(RX_LINE_CAPACITY);
            for &b in kept {
                if self.buffer.push(b as char).is_err() {
                    break;
                }
            }
        }
        self.ready = true;
    }

    /// Take the pending line, if any, leaving the framer empty.
    pub fn take_line(&mut self) -> Option<Line> {
        if !self.ready {
            return None;
        }
        self.ready = false;
        Some(core::mem::take(&mut self.buffer))
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn peek(&self) -> &str {
        self.buffer.as_str()
    }

    /// Drop any held bytes and the ready flag.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.ready = false;
    }
}

/// A line split the way the command parser consumes it: the first
/// character selects the command, the rest is its argument text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Command<'a> {
    pub token: char,
    pub payload: &'a str,
}

impl<'a> Command<'a> {
    /// Split `line`; `None` for an empty line.
    pub fn parse(line: &'a str) -> Option<Self> {
        let mut chars = line.chars();
        let token = chars.next()?;
        Some(Self {
            token,
            payload: chars.as_str(),
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests (run on host, not embedded)
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_crlf_and_takes_once() {
        let mut f = ReceiveFramer::new();
        f.on_bytes(b"A\r\nB");
        assert_eq!(f.take_line().as_deref(), Some("AB"));
        assert_eq!(f.take_line(), None);
    }

    #[test]
    fn nothing_before_first_delivery() {
        let mut f = ReceiveFramer::new();
        assert!(!f.is_ready());
        assert_eq!(f.take_line(), None);
    }

    #[test]
    fn each_delivery_replaces_previous() {
        let mut f = ReceiveFramer::new();
        f.on_bytes(b"kwkF\n");
        f.on_bytes(b"ksit\n");
        assert_eq!(f.take_line().as_deref(), Some("ksit"));
    }

    #[test]
    fn zero_length_delivery_keeps_stale_line_but_marks_ready() {
        let mut f = ReceiveFramer::new();
        f.on_bytes(b"m0 45");
        f.on_bytes(&[]);
        assert!(f.is_ready());
        assert_eq!(f.peek(), "m0 45");

        let _ = f.take_line();
        f.on_bytes(&[]);
        assert_eq!(f.take_line().as_deref(), Some(""));
    }

    #[test]
    fn only_line_endings_yields_empty_line() {
        let mut f = ReceiveFramer::new();
        f.on_bytes(b"\r\n");
        assert_eq!(f.take_line().as_deref(), Some(""));
    }

    #[test]
    fn oversized_payload_is_truncated() {
        let mut f = ReceiveFramer::new();
        let data = [b'x'; RX_LINE_CAPACITY + 40];
        f.on_bytes(&data);
        assert_eq!(f.take_line().map(|l| l.len()), Some(RX_LINE_CAPACITY));
    }

    #[test]
    fn non_ascii_payload_keeps_every_byte() {
        let mut f = ReceiveFramer::new();
        f.on_bytes(&[0xE9; 200]);
        let line = f.take_line().unwrap();
        assert_eq!(line.chars().count(), 200);
        assert!(line.chars().all(|c| c == '\u{e9}'));

        f.on_bytes(&[0xE9; RX_LINE_CAPACITY + 10]);
        assert_eq!(
            f.take_line().map(|l| l.chars().count()),
            Some(RX_LINE_CAPACITY)
        );
    }

    #[test]
    fn non_ascii_bytes_map_to_latin1() {
        let mut f = ReceiveFramer::new();
        f.on_bytes(&[b'i', 0xE9]);
        assert_eq!(f.take_line().as_deref(), Some("i\u{e9}"));
    }

    #[test]
    fn clear_resets_everything() {
        let mut f = ReceiveFramer::new();
        f.on_bytes(b"d");
        f.clear();
        assert!(!f.is_ready());
        assert_eq!(f.peek(), "");
    }

    #[test]
    fn command_split() {
        let cmd = Command::parse("m0 45").unwrap();
        assert_eq!(cmd.token, 'm');
        assert_eq!(cmd.payload, "0 45");

        let bare = Command::parse("d").unwrap();
        assert_eq!(bare.token, 'd');
        assert_eq!(bare.payload, "");

        assert_eq!(Command::parse(""), None);
    }
}
