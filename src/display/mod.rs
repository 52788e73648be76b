//! Displays known to the library and how callers name them.

pub mod detect;
pub mod session;

use std::{fmt, sync::Arc};

use log::debug;
use parking_lot::Mutex;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub use self::{
    detect::{detect_displays, DisplayCandidate},
    session::{ControllerInfo, DisplayHandle},
};
use crate::{
    config::DdcContext,
    ddc::{
        edid::{Edid, EDID_LENGTH},
        DdcError, TransportAddress, TransportConnector, TransportKind,
    },
    mccs::{features::dynamic::DynamicFeatures, VersionSpec},
};

/// Display number of a display whose DDC communication failed.
pub const DISPNO_INVALID: i32 = -1;
/// Display number before detection assigned one.
pub const DISPNO_UNASSIGNED: i32 = 0;

/// Ways a caller can name a display.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DisplayIdentifier {
    /// number assigned by detection, starting at 1
    DisplayNumber(i32),
    Bus(u32),
    Adapter {
        adapter: i32,
        display: i32,
    },
    /// matches every field that is set
    MfgModelSerial {
        mfg_id: Option<String>,
        model: Option<String>,
        serial: Option<String>,
    },
    /// the 128 byte base EDID block
    Edid(Vec<u8>),
    Usb {
        bus: u16,
        device: u16,
    },
}

impl fmt::Display for DisplayIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayIdentifier::DisplayNumber(n) => write!(f, "display {n}"),
            DisplayIdentifier::Bus(bus) => write!(f, "bus /dev/i2c-{bus}"),
            DisplayIdentifier::Adapter { adapter, display } => {
                write!(f, "adapter {adapter}.{display}")
            }
            DisplayIdentifier::MfgModelSerial {
                mfg_id,
                model,
                serial,
            } => write!(
                f,
                "mfg {:?}, model {:?}, serial {:?}",
                mfg_id.as_deref().unwrap_or("*"),
                model.as_deref().unwrap_or("*"),
                serial.as_deref().unwrap_or("*")
            ),
            DisplayIdentifier::Edid(bytes) => write!(f, "edid of {} bytes", bytes.len()),
            DisplayIdentifier::Usb { bus, device } => write!(f, "usb {bus}:{device}"),
        }
    }
}

/// Results of the one time communication checks.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DisplayFlags {
    pub ddc_checked: bool,
    pub ddc_working: bool,
    /// answers unsupported features with a null response
    pub uses_null_response: bool,
}

#[derive(Debug, Default)]
struct DisplayRefState {
    dispno: i32,
    edid: Option<Edid>,
    vcp_version: VersionSpec,
    flags: DisplayFlags,
    dynamic: Option<Arc<DynamicFeatures>>,
}

/// A physical display as found by enumeration.
///
/// Probe results are cached here so that later handles on the same display
/// do not repeat them.
#[derive(Debug)]
pub struct DisplayRef {
    address: TransportAddress,
    transient: bool,
    state: Mutex<DisplayRefState>,
}

impl DisplayRef {
    pub fn new(address: TransportAddress, edid: Option<Edid>) -> Self {
        Self {
            address,
            transient: false,
            state: Mutex::new(DisplayRefState {
                edid,
                ..Default::default()
            }),
        }
    }

    /// Ref outside the registry, created for a bus or adapter that was named
    /// directly. It carries no validation results.
    pub fn transient(address: TransportAddress) -> Self {
        Self {
            transient: true,
            ..Self::new(address, None)
        }
    }

    pub fn address(&self) -> &TransportAddress {
        &self.address
    }

    pub fn kind(&self) -> TransportKind {
        self.address.kind()
    }

    pub fn is_transient(&self) -> bool {
        self.transient
    }

    pub fn dispno(&self) -> i32 {
        self.state.lock().dispno
    }

    pub(crate) fn set_dispno(&self, dispno: i32) {
        self.state.lock().dispno = dispno;
    }

    pub fn edid(&self) -> Option<Edid> {
        self.state.lock().edid.clone()
    }

    pub(crate) fn set_edid(&self, edid: Edid) {
        self.state.lock().edid = Some(edid);
    }

    pub fn vcp_version(&self) -> VersionSpec {
        self.state.lock().vcp_version
    }

    pub(crate) fn set_vcp_version(&self, version: VersionSpec) {
        self.state.lock().vcp_version = version;
    }

    pub fn flags(&self) -> DisplayFlags {
        self.state.lock().flags
    }

    pub(crate) fn set_flags(&self, flags: DisplayFlags) {
        self.state.lock().flags = flags;
    }

    pub fn dynamic_features(&self) -> Option<Arc<DynamicFeatures>> {
        self.state.lock().dynamic.clone()
    }

    pub fn set_dynamic_features(&self, features: Option<Arc<DynamicFeatures>>) {
        self.state.lock().dynamic = features;
    }

    fn matches(&self, id: &DisplayIdentifier) -> bool {
        match (id, &self.address) {
            (DisplayIdentifier::DisplayNumber(n), _) => *n > 0 && self.dispno() == *n,
            (DisplayIdentifier::Bus(b), TransportAddress::I2c { bus }) => b == bus,
            (
                DisplayIdentifier::Adapter { adapter, display },
                TransportAddress::Adapter {
                    adapter: a,
                    display: d,
                },
            ) => adapter == a && display == d,
            (DisplayIdentifier::Usb { bus, device }, TransportAddress::Usb { bus: b, device: d }) => {
                bus == b && device == d
            }
            (
                DisplayIdentifier::MfgModelSerial {
                    mfg_id,
                    model,
                    serial,
                },
                _,
            ) => {
                let state = self.state.lock();
                let Some(edid) = state.edid.as_ref() else {
                    return false;
                };
                mfg_id.as_deref().map_or(true, |m| edid.mfg_id() == m)
                    && model.as_deref().map_or(true, |m| edid.model_name() == m)
                    && serial.as_deref().map_or(true, |s| edid.serial_ascii() == s)
            }
            (DisplayIdentifier::Edid(bytes), _) => self
                .state
                .lock()
                .edid
                .as_ref()
                .is_some_and(|edid| edid.bytes() == bytes.as_slice()),
            _ => false,
        }
    }
}

impl fmt::Display for DisplayRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        write!(f, "Display {} ({}, {})", state.dispno, self.kind(), self.address)?;
        if let Some(edid) = &state.edid {
            write!(f, " {} {}", edid.mfg_id(), edid.model_name())?;
        }
        Ok(())
    }
}

/// Displays found at startup.
///
/// Built once by [`detect_displays`], afterwards only the probe caches inside
/// the refs change.
pub struct DisplayRegistry {
    displays: Vec<Arc<DisplayRef>>,
    connector: Arc<dyn TransportConnector>,
    ctx: Arc<DdcContext>,
}

impl DisplayRegistry {
    pub(crate) fn new(
        displays: Vec<Arc<DisplayRef>>,
        connector: Arc<dyn TransportConnector>,
        ctx: Arc<DdcContext>,
    ) -> Self {
        Self {
            displays,
            connector,
            ctx,
        }
    }

    pub fn context(&self) -> &Arc<DdcContext> {
        &self.ctx
    }

    /// Every detected display, including ones that failed the checks.
    pub fn displays(&self) -> &[Arc<DisplayRef>] {
        &self.displays
    }

    /// Displays with working DDC communication, in display number order.
    pub fn valid_displays(&self) -> impl Iterator<Item = &Arc<DisplayRef>> {
        self.displays.iter().filter(|d| d.dispno() > 0)
    }

    /// Resolves `id` to a display.
    ///
    /// A bus or adapter that is not in the registry yields a transient ref
    /// that has not been validated.
    pub fn find(&self, id: &DisplayIdentifier) -> Result<Arc<DisplayRef>, DdcError> {
        match id {
            DisplayIdentifier::MfgModelSerial {
                mfg_id: None,
                model: None,
                serial: None,
            } => {
                return Err(DdcError::InvalidArgument(
                    "at least one of mfg id, model and serial required".into(),
                ))
            }
            DisplayIdentifier::Edid(bytes) if bytes.len() != EDID_LENGTH => {
                return Err(DdcError::InvalidArgument(format!(
                    "EDID must be {EDID_LENGTH} bytes, got {}",
                    bytes.len()
                )))
            }
            _ => {}
        }

        if let Some(found) = self.displays.iter().find(|d| d.matches(id)) {
            return Ok(found.clone());
        }
        let transient = match id {
            DisplayIdentifier::Bus(bus) => Some(TransportAddress::I2c { bus: *bus }),
            DisplayIdentifier::Adapter { adapter, display } => Some(TransportAddress::Adapter {
                adapter: *adapter,
                display: *display,
            }),
            _ => None,
        };
        match transient {
            Some(address) => {
                debug!("{id} is not a detected display, using transient ref");
                Ok(Arc::new(DisplayRef::transient(address)))
            }
            None => Err(DdcError::InvalidDisplay(id.to_string())),
        }
    }

    /// Opens a session on `dref` through the registry's connector.
    pub fn open(&self, dref: &Arc<DisplayRef>) -> Result<DisplayHandle, DdcError> {
        DisplayHandle::open(dref.clone(), self.connector.as_ref(), self.ctx.clone())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        config::DdcConfig,
        ddc::{
            edid::{parse_edid, sample_edid},
            testing::SimulatedConnector,
        },
    };

    fn registry() -> DisplayRegistry {
        let displays = [
            (3, "ABC", "Mon1", "SN1"),
            (4, "XYZ", "Mon2", "SN2"),
            (5, "ABC", "Mon1", "SN3"),
        ]
        .into_iter()
        .enumerate()
        .map(|(i, (bus, mfg, model, sn))| {
            let edid = parse_edid(&sample_edid(mfg, model, sn)).unwrap();
            let dref = DisplayRef::new(TransportAddress::I2c { bus }, Some(edid));
            dref.set_dispno(i as i32 + 1);
            Arc::new(dref)
        })
        .collect();
        DisplayRegistry::new(
            displays,
            Arc::new(SimulatedConnector::default()),
            DdcContext::shared(DdcConfig::default()),
        )
    }

    fn bus_of(dref: &DisplayRef) -> u32 {
        match dref.address() {
            TransportAddress::I2c { bus } => *bus,
            other => panic!("unexpected {other}"),
        }
    }

    #[test]
    fn find_by_number_and_bus() {
        let registry = registry();
        let found = registry.find(&DisplayIdentifier::DisplayNumber(2)).unwrap();
        assert_eq!(bus_of(&found), 4);
        assert!(!found.is_transient());
        let found = registry.find(&DisplayIdentifier::Bus(5)).unwrap();
        assert_eq!(found.dispno(), 3);
        assert!(matches!(
            registry.find(&DisplayIdentifier::DisplayNumber(7)),
            Err(DdcError::InvalidDisplay(_))
        ));
        assert!(registry.find(&DisplayIdentifier::DisplayNumber(-1)).is_err());
    }

    #[test]
    fn unknown_bus_is_transient() {
        let registry = registry();
        let found = registry.find(&DisplayIdentifier::Bus(9)).unwrap();
        assert!(found.is_transient());
        assert_eq!(found.dispno(), DISPNO_UNASSIGNED);
        let found = registry
            .find(&DisplayIdentifier::Adapter {
                adapter: 0,
                display: 1,
            })
            .unwrap();
        assert_eq!(found.kind(), TransportKind::Adapter);
        assert!(registry
            .find(&DisplayIdentifier::Usb { bus: 1, device: 2 })
            .is_err());
    }

    #[test]
    fn find_by_identity() {
        let registry = registry();
        let found = registry
            .find(&DisplayIdentifier::MfgModelSerial {
                mfg_id: Some("ABC".into()),
                model: None,
                serial: Some("SN3".into()),
            })
            .unwrap();
        assert_eq!(bus_of(&found), 5);

        // first match in detection order
        let found = registry
            .find(&DisplayIdentifier::MfgModelSerial {
                mfg_id: None,
                model: Some("Mon1".into()),
                serial: None,
            })
            .unwrap();
        assert_eq!(bus_of(&found), 3);

        assert!(matches!(
            registry.find(&DisplayIdentifier::MfgModelSerial {
                mfg_id: None,
                model: None,
                serial: None
            }),
            Err(DdcError::InvalidArgument(_))
        ));
    }

    #[test]
    fn find_by_edid() {
        let registry = registry();
        let found = registry
            .find(&DisplayIdentifier::Edid(sample_edid("XYZ", "Mon2", "SN2")))
            .unwrap();
        assert_eq!(bus_of(&found), 4);
        assert!(matches!(
            registry.find(&DisplayIdentifier::Edid(vec![0; 12])),
            Err(DdcError::InvalidArgument(_))
        ));
    }
}
