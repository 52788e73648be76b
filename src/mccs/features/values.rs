//! Feature values as read from or written to a display.

use std::fmt::Write;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::ddc::ci::FeatureReply;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum VcpValueType {
    NonTable,
    Table,
}

/// Value of one VCP feature as read from or written to a display.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SingleVcpValue {
    /// `mh:ml` is the maximum, `sh:sl` the current value
    NonTable {
        code: u8,
        mh: u8,
        ml: u8,
        sh: u8,
        sl: u8,
    },
    Table {
        code: u8,
        bytes: Vec<u8>,
    },
}

impl SingleVcpValue {
    pub fn non_table(code: u8, [mh, ml, sh, sl]: [u8; 4]) -> Self {
        Self::NonTable {
            code,
            mh,
            ml,
            sh,
            sl,
        }
    }

    pub fn continuous(code: u8, max: u16, cur: u16) -> Self {
        let [mh, ml] = max.to_be_bytes();
        let [sh, sl] = cur.to_be_bytes();
        Self::non_table(code, [mh, ml, sh, sl])
    }

    /// Value to write, the maximum is not sent to the display.
    pub fn new_value(code: u8, value: u16) -> Self {
        Self::continuous(code, 0, value)
    }

    pub fn table(code: u8, bytes: impl Into<Vec<u8>>) -> Self {
        Self::Table {
            code,
            bytes: bytes.into(),
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            Self::NonTable { code, .. } | Self::Table { code, .. } => *code,
        }
    }

    pub fn value_type(&self) -> VcpValueType {
        match self {
            Self::NonTable { .. } => VcpValueType::NonTable,
            Self::Table { .. } => VcpValueType::Table,
        }
    }

    pub fn max_value(&self) -> Option<u16> {
        match self {
            Self::NonTable { mh, ml, .. } => Some(u16::from_be_bytes([*mh, *ml])),
            Self::Table { .. } => None,
        }
    }

    pub fn cur_value(&self) -> Option<u16> {
        match self {
            Self::NonTable { sh, sl, .. } => Some(u16::from_be_bytes([*sh, *sl])),
            Self::Table { .. } => None,
        }
    }

    pub fn sl(&self) -> Option<u8> {
        match self {
            Self::NonTable { sl, .. } => Some(*sl),
            Self::Table { .. } => None,
        }
    }

    pub fn bytes(&self) -> Option<&[u8]> {
        match self {
            Self::NonTable { .. } => None,
            Self::Table { bytes, .. } => Some(bytes),
        }
    }

    /// Compares a value read back after a write. Displays only reliably
    /// echo the SL byte of non table values.
    pub fn matches_written(&self, written: &SingleVcpValue) -> bool {
        match (self, written) {
            (Self::NonTable { code: a, sl: x, .. }, Self::NonTable { code: b, sl: y, .. }) => {
                a == b && x == y
            }
            (Self::Table { code: a, bytes: x }, Self::Table { code: b, bytes: y }) => {
                a == b && x == y
            }
            _ => false,
        }
    }

    /// Short raw rendering used in diagnostics.
    pub fn raw_string(&self) -> String {
        match self {
            Self::NonTable { mh, ml, sh, sl, .. } => {
                format!("mh=0x{mh:02x}, ml=0x{ml:02x}, sh=0x{sh:02x}, sl=0x{sl:02x}")
            }
            Self::Table { bytes, .. } => hex_bytes(bytes),
        }
    }
}

impl From<FeatureReply> for SingleVcpValue {
    fn from(reply: FeatureReply) -> Self {
        Self::non_table(reply.vcp_feature(), reply.bytes())
    }
}

/// Space separated lower case hex.
pub fn hex_bytes(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 3);
    for (i, b) in bytes.iter().enumerate() {
        if i > 0 {
            s.push(' ');
        }
        let _ = write!(s, "{b:02x}");
    }
    s
}
