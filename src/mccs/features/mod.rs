//! VCP feature metadata and value interpretation.
//!
//! The meaning of a feature code depends on the MCCS version the display
//! implements. [`FeatureTableEntry`] carries one [`VersionFeature`] per
//! version, [`feature_metadata`] resolves it for a display.

pub mod dynamic;
pub mod format;
mod table;
pub mod values;

use std::borrow::Cow;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use self::dynamic::DynamicFeatures;
pub use self::{
    format::format_value,
    table::{find_feature, FEATURE_TABLE},
    values::{SingleVcpValue, VcpValueType},
};
use super::{Version, VersionSpec};

/// Feature codes addressed by name in this crate.
pub mod code {
    pub const NEW_CONTROL_VALUE: u8 = 0x02;
    pub const SOFT_CONTROLS: u8 = 0x03;
    pub const LUMINANCE: u8 = 0x10;
    pub const CONTRAST: u8 = 0x12;
    pub const SELECT_COLOR_PRESET: u8 = 0x14;
    pub const ACTIVE_CONTROL: u8 = 0x52;
    pub const INPUT_SOURCE: u8 = 0x60;
    pub const DISPLAY_CONTROLLER_TYPE: u8 = 0xc8;
    pub const FIRMWARE_LEVEL: u8 = 0xc9;
    pub const OSD: u8 = 0xca;
    pub const OSD_LANGUAGE: u8 = 0xcc;
    pub const VCP_VERSION: u8 = 0xdf;
    /// first manufacturer specific code
    pub const MANUFACTURER_SPECIFIC: u8 = 0xe0;
}

/// Features that are readable but must not be read back after a write.
pub const UNREREADABLE_FEATURES: [u8; 3] = [
    code::NEW_CONTROL_VALUE,
    code::SOFT_CONTROLS,
    code::INPUT_SOURCE,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FeatureKind {
    /// current/max value pair
    Continuous,
    /// the SL byte selects one of a set of values
    SimpleNonContinuous,
    /// all four bytes carry meaning
    ComplexNonContinuous,
    /// multi-part byte sequence
    Table,
}

impl FeatureKind {
    pub fn value_type(&self) -> VcpValueType {
        match self {
            FeatureKind::Table => VcpValueType::Table,
            _ => VcpValueType::NonTable,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Access {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

impl Access {
    pub fn is_readable(&self) -> bool {
        !matches!(self, Access::WriteOnly)
    }

    pub fn is_writable(&self) -> bool {
        !matches!(self, Access::ReadOnly)
    }
}

/// Named value of a simple non continuous feature.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SlValue {
    pub value: u8,
    pub name: Cow<'static, str>,
}

impl SlValue {
    pub const fn new(value: u8, name: &'static str) -> Self {
        Self {
            value,
            name: Cow::Borrowed(name),
        }
    }
}

/// Looks up the name of `value` in an SL table.
pub fn sl_value_name(table: &[SlValue], value: u8) -> Option<&str> {
    table
        .iter()
        .find(|entry| entry.value == value)
        .map(|entry| entry.name.as_ref())
}

/// Formatting of non table values that are not plain SL lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum NonTableFormat {
    Standard,
    /// `sh.sl`
    Version,
    /// usage time in hours, mh..sl
    Hours,
    /// sh:sl as one 16 bit number
    Word,
}

/// Interpretation of a feature under one MCCS version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionFeature {
    pub kind: FeatureKind,
    pub access: Access,
    pub sl_values: Option<&'static [SlValue]>,
    pub format: NonTableFormat,
}

/// Static description of a feature code across MCCS versions.
#[derive(Debug)]
pub struct FeatureTableEntry {
    pub code: u8,
    pub name: &'static str,
    pub v20: Option<VersionFeature>,
    pub v21: Option<VersionFeature>,
    pub v30: Option<VersionFeature>,
    pub v22: Option<VersionFeature>,
}

impl FeatureTableEntry {
    /// Interpretation under `version`, falling back to the closest earlier
    /// version that defines the feature. An unknown version is taken as 2.2.
    pub fn for_version(&self, version: VersionSpec) -> Option<&VersionFeature> {
        let version = version.version().unwrap_or(Version::V2_2);
        let chain = if version >= Version::V3_0 {
            [&self.v30, &self.v21, &self.v20]
        } else if version >= Version::V2_2 {
            [&self.v22, &self.v21, &self.v20]
        } else if version >= Version::V2_1 {
            [&self.v21, &self.v20, &None]
        } else {
            [&self.v20, &None, &None]
        };
        chain.into_iter().find_map(Option::as_ref)
    }
}

/// Where resolved metadata came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum MetadataSource {
    /// per monitor model definition
    Dynamic,
    /// built in feature table
    Builtin,
    /// code not in the table
    Synthetic,
}

/// Feature description resolved for one display.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FeatureMetadata {
    pub code: u8,
    pub name: Cow<'static, str>,
    pub kind: FeatureKind,
    pub access: Access,
    pub sl_values: Option<Cow<'static, [SlValue]>>,
    pub format: NonTableFormat,
    pub source: MetadataSource,
}

impl FeatureMetadata {
    fn builtin(entry: &'static FeatureTableEntry, info: &VersionFeature) -> Self {
        Self {
            code: entry.code,
            name: Cow::Borrowed(entry.name),
            kind: info.kind,
            access: info.access,
            sl_values: info.sl_values.map(Cow::Borrowed),
            format: info.format,
            source: MetadataSource::Builtin,
        }
    }

    /// Placeholder for codes without a table entry.
    pub fn synthetic(code: u8) -> Self {
        let name = if is_manufacturer_specific(code) {
            "Manufacturer Specific"
        } else {
            "Unknown feature"
        };
        Self {
            code,
            name: Cow::Borrowed(name),
            kind: FeatureKind::ComplexNonContinuous,
            access: Access::ReadWrite,
            sl_values: None,
            format: NonTableFormat::Standard,
            source: MetadataSource::Synthetic,
        }
    }

    pub fn value_type(&self) -> VcpValueType {
        self.kind.value_type()
    }

    pub fn sl_value_name(&self, value: u8) -> Option<&str> {
        self.sl_values
            .as_deref()
            .and_then(|table| sl_value_name(table, value))
    }
}

pub fn is_manufacturer_specific(code: u8) -> bool {
    code >= code::MANUFACTURER_SPECIFIC
}

/// Resolves the metadata of `code` for a display: its dynamic definition
/// first, then the built in table, then a synthetic entry.
pub fn feature_metadata(
    code: u8,
    version: VersionSpec,
    dynamic: Option<&DynamicFeatures>,
) -> FeatureMetadata {
    if let Some(meta) = dynamic.and_then(|d| d.get(code)) {
        return meta.clone();
    }
    find_feature(code)
        .and_then(|entry| {
            entry
                .for_version(version)
                .map(|info| FeatureMetadata::builtin(entry, info))
        })
        .unwrap_or_else(|| FeatureMetadata::synthetic(code))
}

/// Whether a feature may be read back to verify a write.
pub fn is_rereadable(code: u8, version: VersionSpec) -> bool {
    if UNREREADABLE_FEATURES.contains(&code) || is_manufacturer_specific(code) {
        return false;
    }
    find_feature(code)
        .and_then(|entry| entry.for_version(version))
        .map(|info| info.access.is_readable())
        .unwrap_or(false)
}

/// Input source selection, feature 0x60
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum InputSource {
    Analog1,
    Analog2,
    Dvi1,
    Dvi2,
    Composite1,
    Composite2,
    SVideo1,
    SVideo2,
    Tuner1,
    Tuner2,
    Tuner3,
    Component1,
    Component2,
    Component3,
    DisplayPort1,
    DisplayPort2,
    Hdmi1,
    Hdmi2,
    Reserved(u8),
}

impl From<u8> for InputSource {
    fn from(value: u8) -> Self {
        match value {
            0x01 => Self::Analog1,
            0x02 => Self::Analog2,
            0x03 => Self::Dvi1,
            0x04 => Self::Dvi2,
            0x05 => Self::Composite1,
            0x06 => Self::Composite2,
            0x07 => Self::SVideo1,
            0x08 => Self::SVideo2,
            0x09 => Self::Tuner1,
            0x0a => Self::Tuner2,
            0x0b => Self::Tuner3,
            0x0c => Self::Component1,
            0x0d => Self::Component2,
            0x0e => Self::Component3,
            0x0f => Self::DisplayPort1,
            0x10 => Self::DisplayPort2,
            0x11 => Self::Hdmi1,
            0x12 => Self::Hdmi2,
            other => Self::Reserved(other),
        }
    }
}

impl From<InputSource> for u8 {
    fn from(value: InputSource) -> Self {
        match value {
            InputSource::Analog1 => 0x01,
            InputSource::Analog2 => 0x02,
            InputSource::Dvi1 => 0x03,
            InputSource::Dvi2 => 0x04,
            InputSource::Composite1 => 0x05,
            InputSource::Composite2 => 0x06,
            InputSource::SVideo1 => 0x07,
            InputSource::SVideo2 => 0x08,
            InputSource::Tuner1 => 0x09,
            InputSource::Tuner2 => 0x0a,
            InputSource::Tuner3 => 0x0b,
            InputSource::Component1 => 0x0c,
            InputSource::Component2 => 0x0d,
            InputSource::Component3 => 0x0e,
            InputSource::DisplayPort1 => 0x0f,
            InputSource::DisplayPort2 => 0x10,
            InputSource::Hdmi1 => 0x11,
            InputSource::Hdmi2 => 0x12,
            InputSource::Reserved(value) => value,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn version_fallback() {
        // 0x10 is only described for 2.0
        let entry = find_feature(code::LUMINANCE).unwrap();
        for version in [Version::V2_0, Version::V2_1, Version::V2_2, Version::V3_0] {
            assert_eq!(
                entry.for_version(version.into()).unwrap().kind,
                FeatureKind::Continuous
            );
        }

        let preset = find_feature(code::SELECT_COLOR_PRESET).unwrap();
        assert_eq!(
            preset.for_version(Version::V2_0.into()).unwrap().kind,
            FeatureKind::SimpleNonContinuous
        );
        assert_eq!(
            preset.for_version(Version::V3_0.into()).unwrap().kind,
            FeatureKind::ComplexNonContinuous
        );
        // unqueried is read as 2.2
        assert_eq!(
            preset.for_version(VersionSpec::Unqueried),
            preset.for_version(Version::V2_2.into())
        );
    }

    #[test]
    fn metadata_sources() {
        let meta = feature_metadata(code::LUMINANCE, VersionSpec::Unknown, None);
        assert_eq!(meta.source, MetadataSource::Builtin);
        assert_eq!(meta.name, "Brightness");

        let meta = feature_metadata(0xe5, VersionSpec::Unknown, None);
        assert_eq!(meta.source, MetadataSource::Synthetic);
        assert_eq!(meta.name, "Manufacturer Specific");
        assert_eq!(feature_metadata(0x07, VersionSpec::Unknown, None).name, "Unknown feature");
    }

    #[test]
    fn rereadable() {
        assert!(is_rereadable(code::LUMINANCE, VersionSpec::Unqueried));
        assert!(!is_rereadable(code::INPUT_SOURCE, VersionSpec::Unqueried));
        assert!(!is_rereadable(code::NEW_CONTROL_VALUE, Version::V2_1.into()));
        // restore factory defaults is write only
        assert!(!is_rereadable(0x04, Version::V2_1.into()));
        assert!(!is_rereadable(0xe0, Version::V2_1.into()));
        assert!(!is_rereadable(0x07, Version::V2_1.into()));
    }

    #[test]
    fn input_source_codes() {
        assert_eq!(InputSource::from(0x0f), InputSource::DisplayPort1);
        assert_eq!(u8::from(InputSource::Hdmi2), 0x12);
        assert_eq!(InputSource::from(0x1b), InputSource::Reserved(0x1b));
    }
}
