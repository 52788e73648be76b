//! Control displays using the DDC/CI protocol.
//!
//! Provides the transport abstraction, the error/status model and the
//! exchange engine that drives request/reply cycles with retries.

/// DDC/CI command messages.
pub mod ci;

/// edid data parsing
pub mod edid;

/// write/read exchanges with retries
pub mod exchange;

pub mod retry;
pub mod sleep;

#[cfg(target_os = "linux")]
pub mod linux;

#[cfg(feature = "usb-hid")]
pub mod usb;

#[cfg(test)]
pub(crate) mod testing;

use std::{fmt, io, time::Duration};

use thiserror::Error;

use self::{ci::DdcCiProtocolError, edid::EdidParseError};
use crate::mccs::capabilities::CapabilitiesParseError;

/// Kind of physical channel a display is reached through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TransportKind {
    /// `/dev/i2c-N` device node
    I2c,
    /// GPU vendor adapter API
    Adapter,
    /// USB HID monitor control interface
    Usb,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TransportKind::I2c => "I2C",
            TransportKind::Adapter => "ADL",
            TransportKind::Usb => "USB",
        })
    }
}

/// Transport specific location of a display.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TransportAddress {
    I2c { bus: u32 },
    Adapter { adapter: i32, display: i32 },
    Usb { bus: u16, device: u16 },
}

impl TransportAddress {
    pub fn kind(&self) -> TransportKind {
        match self {
            TransportAddress::I2c { .. } => TransportKind::I2c,
            TransportAddress::Adapter { .. } => TransportKind::Adapter,
            TransportAddress::Usb { .. } => TransportKind::Usb,
        }
    }
}

impl fmt::Display for TransportAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportAddress::I2c { bus } => write!(f, "/dev/i2c-{bus}"),
            TransportAddress::Adapter { adapter, display } => {
                write!(f, "adapter {adapter}.{display}")
            }
            TransportAddress::Usb { bus, device } => write!(f, "usb {bus}:{device}"),
        }
    }
}

/// Failure reported by a transport.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("{}", io::Error::from_raw_os_error(*.0))]
    Errno(i32),
    #[error("vendor adapter status {0}")]
    Adapter(i32),
    #[error("transport does not support {0}")]
    Unimplemented(&'static str),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TransportError {
    pub fn errno(&self) -> Option<i32> {
        match self {
            TransportError::Errno(errno) => Some(*errno),
            _ => None,
        }
    }
}

impl From<io::Error> for TransportError {
    fn from(err: io::Error) -> Self {
        match err.raw_os_error() {
            Some(errno) => TransportError::Errno(errno),
            None => TransportError::Other(err.into()),
        }
    }
}

/// implement this trait to let the exchange engine talk to your device
pub trait DdcTransport: Send {
    fn kind(&self) -> TransportKind;

    /// raw write of `data` to the 7 bit bus address `addr`
    fn transmit(&mut self, addr: u8, data: &[u8]) -> Result<(), TransportError>;

    /// raw read of at most `max_len` bytes from `addr`, the returned bytes
    /// start with the reply source byte
    fn receive(&mut self, addr: u8, max_len: usize) -> Result<Vec<u8>, TransportError>;

    /// blocking delay between protocol phases
    fn delay(&self, delay_ms: u64) {
        std::thread::sleep(Duration::from_millis(delay_ms))
    }

    /// read the first 128 bytes of the display EDID
    fn read_edid(&mut self) -> Result<Vec<u8>, TransportError> {
        Err(TransportError::Unimplemented("EDID retrieval"))
    }

    /// release the underlying descriptor
    fn close(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Opens transports for addresses produced by display enumeration.
pub trait TransportConnector: Send + Sync {
    fn connect(&self, address: &TransportAddress) -> Result<Box<dyn DdcTransport>, TransportError>;
}

/// Reasons a DDC operation fails.
#[derive(Debug, Error)]
pub enum DdcError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("DDC/CI protocol error: {0}")]
    Protocol(#[from] DdcCiProtocolError),
    #[error("all response bytes are zero")]
    AllZero,
    #[error("adapter read returned the request bytes")]
    ReadEqualsWrite,
    #[error("multi-part fragment at offset {actual}, expected {expected}")]
    FragmentOffset { expected: u16, actual: u16 },
    #[error("maximum retries exceeded after {tries} tries")]
    RetriesExceeded { tries: u8, causes: Vec<DdcError> },
    #[error("all {tries} tries returned zero bytes")]
    AllTriesZero { tries: u8 },
    #[error("feature 0x{0:02x} is reported unsupported by the display")]
    ReportedUnsupported(u8),
    #[error("feature 0x{0:02x} is determined unsupported")]
    DeterminedUnsupported(u8),
    #[error("verification of feature 0x{feature:02x} failed: wrote {written}, read {read}")]
    Verify {
        feature: u8,
        written: String,
        read: String,
    },
    #[error("display has no EDID")]
    EdidMissing,
    #[error("Error Parsing Edid Data {0}")]
    Edid(#[from] EdidParseError),
    #[error("Error Parsing Capabilities {0}")]
    Capabilities(#[from] CapabilitiesParseError),
    #[error("operation not supported: {0}")]
    Unimplemented(&'static str),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("display not found: {0}")]
    InvalidDisplay(String),
}

/// DDC specific status values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DdcStatus {
    MalformedFrame,
    UnexpectedType,
    UnexpectedSubtype,
    NullResponse,
    InvalidData,
    AllZero,
    ReadEqualsWrite,
    FragmentOffset,
    RetriesExceeded,
    AllTriesZero,
    ReportedUnsupported,
    DeterminedUnsupported,
    Verify,
}

/// Library internal status values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BaseStatus {
    EdidMissing,
    ParseError,
    Unimplemented,
    InvalidArgument,
    InvalidDisplay,
    Other,
}

/// Domain tagged status of a failed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    Errno(i32),
    Adapter(i32),
    Ddc(DdcStatus),
    Base(BaseStatus),
}

impl DdcError {
    pub fn status(&self) -> StatusCode {
        match self {
            DdcError::Transport(TransportError::Errno(errno)) => StatusCode::Errno(*errno),
            DdcError::Transport(TransportError::Adapter(code)) => StatusCode::Adapter(*code),
            DdcError::Transport(TransportError::Unimplemented(_)) | DdcError::Unimplemented(_) => {
                StatusCode::Base(BaseStatus::Unimplemented)
            }
            DdcError::Transport(TransportError::Other(_)) => StatusCode::Base(BaseStatus::Other),
            DdcError::Protocol(err) => StatusCode::Ddc(match err {
                DdcCiProtocolError::MalformedFrame(_) | DdcCiProtocolError::ParserError(_) => {
                    DdcStatus::MalformedFrame
                }
                DdcCiProtocolError::UnexpectedType { .. } => DdcStatus::UnexpectedType,
                DdcCiProtocolError::UnexpectedSubtype { .. } => DdcStatus::UnexpectedSubtype,
                DdcCiProtocolError::NullResponse => DdcStatus::NullResponse,
                DdcCiProtocolError::InvalidData(_) | DdcCiProtocolError::PayloadTooLong(_) => {
                    DdcStatus::InvalidData
                }
            }),
            DdcError::AllZero => StatusCode::Ddc(DdcStatus::AllZero),
            DdcError::ReadEqualsWrite => StatusCode::Ddc(DdcStatus::ReadEqualsWrite),
            DdcError::FragmentOffset { .. } => StatusCode::Ddc(DdcStatus::FragmentOffset),
            DdcError::RetriesExceeded { .. } => StatusCode::Ddc(DdcStatus::RetriesExceeded),
            DdcError::AllTriesZero { .. } => StatusCode::Ddc(DdcStatus::AllTriesZero),
            DdcError::ReportedUnsupported(_) => StatusCode::Ddc(DdcStatus::ReportedUnsupported),
            DdcError::DeterminedUnsupported(_) => {
                StatusCode::Ddc(DdcStatus::DeterminedUnsupported)
            }
            DdcError::Verify { .. } => StatusCode::Ddc(DdcStatus::Verify),
            DdcError::EdidMissing => StatusCode::Base(BaseStatus::EdidMissing),
            DdcError::Edid(_) | DdcError::Capabilities(_) => {
                StatusCode::Base(BaseStatus::ParseError)
            }
            DdcError::InvalidArgument(_) => StatusCode::Base(BaseStatus::InvalidArgument),
            DdcError::InvalidDisplay(_) => StatusCode::Base(BaseStatus::InvalidDisplay),
        }
    }

    /// The display does not implement the feature, either by flag or by idiom.
    pub fn is_unsupported(&self) -> bool {
        matches!(
            self,
            DdcError::ReportedUnsupported(_) | DdcError::DeterminedUnsupported(_)
        )
    }

    pub fn is_null_response(&self) -> bool {
        matches!(self, DdcError::Protocol(DdcCiProtocolError::NullResponse))
    }

    /// Per attempt failures collected by a retrying exchange.
    pub fn try_errors(&self) -> &[DdcError] {
        match self {
            DdcError::RetriesExceeded { causes, .. } => causes,
            _ => &[],
        }
    }
}
