//! Human readable rendering of feature values.

use super::{
    values::hex_bytes, FeatureKind, FeatureMetadata, NonTableFormat, SingleVcpValue,
};

/// Renders `value` as described by `meta`.
///
/// The metadata is version specific, so the same bytes can read differently
/// on displays implementing different MCCS versions.
pub fn format_value(meta: &FeatureMetadata, value: &SingleVcpValue) -> String {
    match value {
        SingleVcpValue::Table { bytes, .. } => hex_bytes(bytes),
        SingleVcpValue::NonTable { mh, ml, sh, sl, .. } => match meta.kind {
            FeatureKind::Continuous => format!(
                "current value = {:5}, max value = {:5}",
                u16::from_be_bytes([*sh, *sl]),
                u16::from_be_bytes([*mh, *ml])
            ),
            FeatureKind::SimpleNonContinuous => sl_lookup(meta, *sl),
            FeatureKind::ComplexNonContinuous => match meta.format {
                NonTableFormat::Version => format!("{sh}.{sl}"),
                NonTableFormat::Hours => {
                    format!("{} hours", u32::from_be_bytes([*mh, *ml, *sh, *sl]))
                }
                NonTableFormat::Word => u16::from_be_bytes([*sh, *sl]).to_string(),
                NonTableFormat::Standard if meta.sl_values.is_some() => format!(
                    "{}, mh=0x{mh:02x}, ml=0x{ml:02x}, sh=0x{sh:02x}",
                    sl_lookup(meta, *sl)
                ),
                NonTableFormat::Standard => value.raw_string(),
            },
            // table feature answered with a non table reply
            FeatureKind::Table => value.raw_string(),
        },
    }
}

fn sl_lookup(meta: &FeatureMetadata, sl: u8) -> String {
    if meta.sl_values.is_none() {
        return format!("0x{sl:02x}");
    }
    let name = meta.sl_value_name(sl).unwrap_or("Unrecognized value");
    format!("{name} (sl=0x{sl:02x})")
}
