//! Saving and restoring feature values as a line based text file.
//!
//! ```text
//! # comment
//! TIMESTAMP_MILLIS 1700000000000
//! MFG_ID  ABC
//! MODEL   Mon1
//! SN      SN1
//! EDID    00FFFFFFFFFFFF00...
//! VCP 10    50
//! ```

use std::{
    fmt::{self, Write},
    time::{SystemTime, UNIX_EPOCH},
};

use log::{debug, warn};
use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    ddc::{edid::EDID_LENGTH, DdcError},
    display::{DisplayHandle, DisplayIdentifier, DisplayRegistry},
    mccs::features::{code, SingleVcpValue, VcpValueType},
};

/// Features captured by [`DumpLoadData::from_handle`].
pub const PROFILE_FEATURES: [u8; 9] = [
    code::LUMINANCE,
    code::CONTRAST,
    code::SELECT_COLOR_PRESET,
    0x16, // red gain
    0x18, // green gain
    0x1a, // blue gain
    0x6c, // red black level
    0x6e, // green black level
    0x70, // blue black level
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpLineError {
    pub line: usize,
    pub reason: String,
}

impl fmt::Display for DumpLineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.reason)
    }
}

#[derive(Debug, Error)]
pub enum DumpLoadError {
    #[error("invalid dump data ({} bad lines)", .0.len())]
    InvalidLines(Vec<DumpLineError>),
    #[error("dump data does not identify a display")]
    NoIdentity,
    #[error(transparent)]
    Ddc(#[from] DdcError),
}

/// Identity of a display and a set of its feature values.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DumpLoadData {
    pub timestamp_millis: Option<u64>,
    pub mfg_id: String,
    pub model: String,
    pub serial_ascii: String,
    pub edid: Option<Vec<u8>>,
    /// feature code and current value
    pub values: Vec<(u8, u16)>,
}

impl DumpLoadData {
    /// Parses dump text.
    ///
    /// Every line is checked and all bad lines are reported together.
    pub fn parse(text: &str) -> Result<Self, DumpLoadError> {
        let mut data = DumpLoadData::default();
        let mut errors = Vec::new();

        for (idx, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('*') {
                continue;
            }
            if let Err(reason) = data.parse_line(line) {
                warn!("invalid dump data at line {}: {reason}: {line}", idx + 1);
                errors.push(DumpLineError {
                    line: idx + 1,
                    reason,
                });
            }
        }

        if errors.is_empty() {
            Ok(data)
        } else {
            Err(DumpLoadError::InvalidLines(errors))
        }
    }

    fn parse_line(&mut self, line: &str) -> Result<(), String> {
        let (keyword, rest) = line
            .split_once(char::is_whitespace)
            .map(|(k, r)| (k, r.trim()))
            .ok_or_else(|| "missing value".to_string())?;

        match keyword {
            "BUS" | "TIMESTAMP_TEXT" => {}
            "TIMESTAMP_MILLIS" => {
                let millis = rest.parse().map_err(|_| format!("bad timestamp {rest:?}"))?;
                self.timestamp_millis = Some(millis);
            }
            "MFG_ID" => self.mfg_id = rest.to_string(),
            "MODEL" => self.model = rest.to_string(),
            "SN" => self.serial_ascii = rest.to_string(),
            "EDID" | "EDIDSTR" => self.edid = Some(parse_hex(rest)?),
            "VCP" => {
                let mut fields = rest.split_whitespace();
                let (Some(feature), Some(value), None) = (fields.next(), fields.next(), fields.next())
                else {
                    return Err("VCP needs a feature code and a value".into());
                };
                let feature = u8::from_str_radix(feature, 16)
                    .map_err(|_| format!("bad feature code {feature:?}"))?;
                let value = value
                    .parse()
                    .map_err(|_| format!("bad value {value:?} for feature {feature:02X}"))?;
                self.values.push((feature, value));
            }
            other => return Err(format!("unexpected field {other:?}")),
        }
        Ok(())
    }

    /// Renders the dump text accepted by [`DumpLoadData::parse`].
    pub fn format(&self) -> String {
        let mut out = String::new();
        if let Some(millis) = self.timestamp_millis {
            let _ = writeln!(out, "TIMESTAMP_MILLIS {millis}");
        }
        for (keyword, value) in [
            ("MFG_ID", &self.mfg_id),
            ("MODEL", &self.model),
            ("SN", &self.serial_ascii),
        ] {
            if !value.is_empty() {
                let _ = writeln!(out, "{keyword:<7} {value}");
            }
        }
        if let Some(edid) = &self.edid {
            out.push_str("EDID    ");
            for b in edid {
                let _ = write!(out, "{b:02X}");
            }
            out.push('\n');
        }
        for (feature, value) in &self.values {
            let _ = writeln!(out, "VCP {feature:02X} {value:5}");
        }
        out
    }

    /// Captures the profile features of an open display.
    ///
    /// Features the display does not support are left out.
    pub fn from_handle(handle: &mut DisplayHandle) -> Result<Self, DdcError> {
        let edid = handle.edid().ok_or(DdcError::EdidMissing)?;
        let mut values = Vec::new();
        for feature in PROFILE_FEATURES {
            match handle.get_value(feature, VcpValueType::NonTable) {
                Ok(value) => values.push((feature, value.cur_value().unwrap_or_default())),
                Err(err) if err.is_unsupported() => {
                    debug!("skipping unsupported feature 0x{feature:02x}")
                }
                Err(err) => return Err(err),
            }
        }
        let timestamp_millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .ok()
            .map(|d| d.as_millis() as u64);
        Ok(Self {
            timestamp_millis,
            mfg_id: edid.mfg_id(),
            model: edid.model_name().to_string(),
            serial_ascii: edid.serial_ascii().to_string(),
            edid: Some(edid.bytes().to_vec()),
            values,
        })
    }

    /// Writes every captured value to an open display.
    pub fn apply_to(&self, handle: &mut DisplayHandle) -> Result<(), DdcError> {
        for (feature, value) in &self.values {
            handle.set_value(&SingleVcpValue::new_value(*feature, *value))?;
        }
        Ok(())
    }

    /// The display this dump was taken from, by EDID if present.
    pub fn identifier(&self) -> Option<DisplayIdentifier> {
        if let Some(edid) = self.edid.as_ref().filter(|e| e.len() == EDID_LENGTH) {
            return Some(DisplayIdentifier::Edid(edid.clone()));
        }
        let field = |s: &str| (!s.is_empty()).then(|| s.to_string());
        let (mfg_id, model, serial) = (
            field(&self.mfg_id),
            field(&self.model),
            field(&self.serial_ascii),
        );
        if mfg_id.is_none() && model.is_none() && serial.is_none() {
            return None;
        }
        Some(DisplayIdentifier::MfgModelSerial {
            mfg_id,
            model,
            serial,
        })
    }

    /// Finds the display this dump belongs to and applies the values.
    pub fn load(&self, registry: &DisplayRegistry) -> Result<(), DumpLoadError> {
        let id = self.identifier().ok_or(DumpLoadError::NoIdentity)?;
        let dref = registry.find(&id)?;
        debug!("loading {} values into {dref}", self.values.len());
        let mut handle = registry.open(&dref)?;
        self.apply_to(&mut handle)?;
        handle.close();
        Ok(())
    }
}

fn parse_hex(s: &str) -> Result<Vec<u8>, String> {
    if s.len() % 2 != 0 || !s.is_ascii() {
        return Err(format!("bad hex string of length {}", s.len()));
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).map_err(|_| format!("bad hex at {i}")))
        .collect()
}
