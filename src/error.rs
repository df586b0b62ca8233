//! Unified error types for ble-arbiter.
//!
//! We avoid `alloc` - all error variants carry only fixed-size data.
//! Implements `defmt::Format` for efficient on-target logging.

use core::fmt;

/// Failures while establishing or using the central-role link.
///
/// All of these are absorbed by the link manager: the transport is closed,
/// local state is reset, and the caller only sees the `Result`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkError {
    /// No advertisement matched the name filter before the scan ended.
    ScanNoMatch,
    /// The stack refused to start or continue the scan.
    ScanFailed,
    /// The transport-layer connection could not be opened.
    ConnectFailed,
    /// The peer does not expose the configured service.
    ServiceNotFound,
    /// The RX or TX characteristic is missing from the service.
    CharacteristicNotFound,
    /// Neither characteristic can be written, so there is no usable TX.
    CharacteristicNotWritable,
    /// RX can indicate but has no CCCD (0x2902) to enable it with.
    DescriptorNotFound,
    /// A GATT write was rejected or the link dropped mid-write.
    WriteFailed,
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            LinkError::ScanNoMatch => "no matching device found",
            LinkError::ScanFailed => "scan failed",
            LinkError::ConnectFailed => "connection failed",
            LinkError::ServiceNotFound => "service not found",
            LinkError::CharacteristicNotFound => "characteristic not found",
            LinkError::CharacteristicNotWritable => "no writable characteristic",
            LinkError::DescriptorNotFound => "CCCD descriptor not found",
            LinkError::WriteFailed => "write failed",
        };
        f.write_str(msg)
    }
}

/// Top-level error type used across the firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Central-role link failure.
    Link(LinkError),

    /// Advertising could not be started.
    AdvertiseFailed,

    /// The local GATT server could not be registered.
    GattServer,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Link(e) => write!(f, "link: {}", e),
            Error::AdvertiseFailed => f.write_str("advertising failed"),
            Error::GattServer => f.write_str("GATT server registration failed"),
        }
    }
}

// Convenience conversions

impl From<LinkError> for Error {
    fn from(e: LinkError) -> Self {
        Error::Link(e)
    }
}
