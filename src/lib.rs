//! DDC/CI Protocol Engine
//!
//! Query and control VESA MCCS compliant monitors over I2C, vendor adapter
//! APIs or USB HID. Platform enumeration produces [`DisplayCandidate`]s,
//! [`detect_displays`] checks them and builds the [`DisplayRegistry`] that
//! sessions are opened from.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use libddcci::{
//!     detect_displays, DdcConfig, DdcContext, DdcError, DisplayCandidate, DisplayIdentifier,
//!     DynamicFeatureRegistry, TransportAddress, TransportConnector,
//! };
//!
//! fn brightness(connector: Arc<dyn TransportConnector>) -> Result<f64, DdcError> {
//!     let ctx = DdcContext::shared(DdcConfig::default());
//!     let candidates = vec![DisplayCandidate::new(TransportAddress::I2c { bus: 4 })];
//!     let registry = detect_displays(ctx, connector, candidates, &DynamicFeatureRegistry::new());
//!     let dref = registry.find(&DisplayIdentifier::DisplayNumber(1))?;
//!     registry.open(&dref)?.get_luminance()
//! }
//! ```

pub mod config;
pub mod ddc;
pub mod display;
pub mod dumpload;
pub mod mccs;

pub use config::{DdcConfig, DdcContext};
pub use ddc::{
    DdcError, DdcTransport, StatusCode, TransportAddress, TransportConnector, TransportError,
    TransportKind,
};
pub use display::{
    detect_displays, ControllerInfo, DisplayCandidate, DisplayHandle, DisplayIdentifier,
    DisplayRef, DisplayRegistry,
};
pub use dumpload::{DumpLoadData, DumpLoadError};
pub use mccs::{
    capabilities::{parse_capabilities, Capabilities},
    features::{dynamic::DynamicFeatureRegistry, SingleVcpValue, VcpValueType},
    Version, VersionSpec,
};

#[cfg(target_os = "linux")]
pub use ddc::linux::I2cConnector;
