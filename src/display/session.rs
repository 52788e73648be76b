//! Open sessions on a display and the feature operations run over them.

use std::sync::Arc;

use log::{debug, info, warn};

use super::{DisplayFlags, DisplayRef};
use crate::{
    config::DdcContext,
    ddc::{
        ci::{DdcCiMessage, DdcCiProtocolError, DdcOpcode, DdcResponse, FeatureReply},
        edid::{parse_edid, Edid},
        exchange::{Exchange, MAX_NON_TABLE_READ_BYTES},
        sleep::{tuned_sleep, SleepEvent},
        DdcError, DdcTransport, TransportConnector, TransportKind,
    },
    mccs::{
        capabilities::{parse_capabilities, Capabilities},
        features::{
            self, code, is_rereadable, FeatureMetadata, InputSource, SingleVcpValue, VcpValueType,
        },
        Version, VersionSpec,
    },
};

/// Display controller identification, features 0xC8 and 0xC9.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerInfo {
    pub manufacturer: String,
    pub firmware: String,
}

const UNSPECIFIED: &str = "Unspecified";

/// An open session on one display.
///
/// The transport is released when the handle is closed or dropped.
pub struct DisplayHandle {
    dref: Arc<DisplayRef>,
    ctx: Arc<DdcContext>,
    transport: Box<dyn DdcTransport>,
    vcp_version: VersionSpec,
    capabilities_string: Option<String>,
    capabilities: Option<Capabilities>,
    closed: bool,
}

impl DisplayHandle {
    pub fn open(
        dref: Arc<DisplayRef>,
        connector: &dyn TransportConnector,
        ctx: Arc<DdcContext>,
    ) -> Result<Self, DdcError> {
        let transport = connector.connect(dref.address())?;
        Self::with_transport(dref, transport, ctx)
    }

    /// Wraps an already connected transport.
    ///
    /// Reads the EDID unless the ref already carries one. Without an EDID
    /// the open fails unless `force_open` is configured.
    pub fn with_transport(
        dref: Arc<DisplayRef>,
        transport: Box<dyn DdcTransport>,
        ctx: Arc<DdcContext>,
    ) -> Result<Self, DdcError> {
        let mut handle = Self {
            vcp_version: dref.vcp_version(),
            dref,
            ctx,
            transport,
            capabilities_string: None,
            capabilities: None,
            closed: false,
        };
        tuned_sleep(&handle.ctx, handle.transport.as_ref(), SleepEvent::PostOpen);

        if handle.dref.edid().is_none() {
            match handle.read_edid() {
                Ok(edid) => handle.dref.set_edid(edid),
                Err(err) if handle.ctx.config().force_open => {
                    warn!("{}: no usable EDID ({err}), opening anyway", handle.dref.address());
                }
                Err(err) => {
                    debug!("{}: no usable EDID: {err}", handle.dref.address());
                    return Err(DdcError::EdidMissing);
                }
            }
        }
        debug!("opened {}", handle.dref);
        Ok(handle)
    }

    fn read_edid(&mut self) -> Result<Edid, DdcError> {
        let bytes = self.transport.read_edid()?;
        Ok(parse_edid(&bytes)?)
    }

    pub fn display_ref(&self) -> &Arc<DisplayRef> {
        &self.dref
    }

    pub fn kind(&self) -> TransportKind {
        self.transport.kind()
    }

    pub fn edid(&self) -> Option<Edid> {
        self.dref.edid()
    }

    /// Releases the transport. Close errors are logged, not returned.
    pub fn close(mut self) {
        self.release();
    }

    fn exchange(&mut self) -> Exchange<'_> {
        Exchange::new(self.transport.as_mut(), &self.ctx)
    }

    /// Reads the raw reply of a non table feature.
    ///
    /// A set unsupported flag yields [`DdcError::ReportedUnsupported`], a
    /// null response yields [`DdcError::DeterminedUnsupported`].
    pub fn get_nontable_reply(&mut self, code: u8) -> Result<FeatureReply, DdcError> {
        let request = DdcCiMessage::get_vcp_request(code);
        let response = self.exchange().write_read_with_retry(
            &request,
            MAX_NON_TABLE_READ_BYTES,
            DdcOpcode::VcpReply,
            Some(code),
            false,
        );
        match response {
            Ok(DdcResponse::NonTable(reply)) if reply.is_supported() => Ok(reply),
            Ok(DdcResponse::NonTable(_)) => Err(DdcError::ReportedUnsupported(code)),
            Ok(_) => Err(DdcCiProtocolError::InvalidData("expected feature reply").into()),
            Err(err) if err.is_null_response() => Err(DdcError::DeterminedUnsupported(code)),
            Err(err) => Err(err),
        }
    }

    /// Reads a feature as the given value type.
    pub fn get_value(
        &mut self,
        code: u8,
        value_type: VcpValueType,
    ) -> Result<SingleVcpValue, DdcError> {
        match value_type {
            VcpValueType::NonTable => self.get_nontable_reply(code).map(SingleVcpValue::from),
            VcpValueType::Table if self.kind() == TransportKind::Usb => {
                Err(DdcError::Unimplemented("table read over USB"))
            }
            VcpValueType::Table => {
                let bytes = self.exchange().multi_part_read_with_retry(
                    DdcOpcode::TableReadRequest,
                    code,
                    true,
                )?;
                Ok(SingleVcpValue::table(code, bytes))
            }
        }
    }

    /// Reads a feature with the value type its metadata declares.
    pub fn read_feature(&mut self, code: u8) -> Result<SingleVcpValue, DdcError> {
        let value_type = self.feature_metadata(code).value_type();
        self.get_value(code, value_type)
    }

    /// Writes a feature value.
    ///
    /// With `verify_setvcp` configured, rereadable features are read back and
    /// a differing value fails with [`DdcError::Verify`].
    pub fn set_value(&mut self, value: &SingleVcpValue) -> Result<(), DdcError> {
        let code = value.code();
        match value {
            SingleVcpValue::NonTable { sh, sl, .. } => {
                let request = DdcCiMessage::set_vcp_request(code, u16::from_be_bytes([*sh, *sl]));
                self.exchange().write_only_with_retry(&request)?;
            }
            SingleVcpValue::Table { .. } if self.kind() == TransportKind::Usb => {
                return Err(DdcError::Unimplemented("table write over USB"));
            }
            SingleVcpValue::Table { bytes, .. } => {
                self.exchange().multi_part_write_with_retry(code, bytes)?;
            }
        }

        if !self.ctx.config().verify_setvcp {
            return Ok(());
        }
        let version = self.get_vcp_version();
        if !is_rereadable(code, version) {
            debug!("feature 0x{code:02x} is not rereadable, skipping verification");
            return Ok(());
        }
        let read = self.get_value(code, value.value_type())?;
        if read.matches_written(value) {
            debug!("verified feature 0x{code:02x}");
            Ok(())
        } else {
            warn!(
                "feature 0x{code:02x} reads {} after writing {}",
                read.raw_string(),
                value.raw_string()
            );
            Err(DdcError::Verify {
                feature: code,
                written: value.raw_string(),
                read: read.raw_string(),
            })
        }
    }

    /// Asks the display to persist its current settings.
    pub fn save_current_settings(&mut self) -> Result<(), DdcError> {
        if self.kind() == TransportKind::Usb {
            return Err(DdcError::Unimplemented("save current settings over USB"));
        }
        self.exchange()
            .write_only_with_retry(&DdcCiMessage::save_current_settings_request())?;
        tuned_sleep(&self.ctx, self.transport.as_ref(), SleepEvent::PostSaveSettings);
        Ok(())
    }

    /// Raw capabilities string, read once per handle.
    pub fn get_capabilities_string(&mut self) -> Result<&str, DdcError> {
        if self.capabilities_string.is_none() {
            let bytes = self.exchange().multi_part_read_with_retry(
                DdcOpcode::CapabilitiesRequest,
                0,
                false,
            )?;
            let caps = String::from_utf8_lossy(&bytes)
                .trim_end_matches('\0')
                .to_string();
            debug!("capabilities of {}: {caps}", self.dref.address());
            self.capabilities_string = Some(caps);
        }
        Ok(self.capabilities_string.as_deref().unwrap_or_default())
    }

    /// Parsed capabilities, read and parsed once per handle.
    pub fn get_capabilities(&mut self) -> Result<&Capabilities, DdcError> {
        if self.capabilities.is_none() {
            let parsed = parse_capabilities(self.get_capabilities_string()?)?;
            self.capabilities = Some(parsed);
        }
        self.capabilities
            .as_ref()
            .ok_or(DdcError::Unimplemented("capabilities"))
    }

    /// MCCS version of the display.
    ///
    /// Asks feature 0xDF first and falls back to the capabilities string.
    /// The result is cached on the handle and on its display ref.
    pub fn get_vcp_version(&mut self) -> VersionSpec {
        if self.vcp_version.is_queried() {
            return self.vcp_version;
        }
        let cached = self.dref.vcp_version();
        if cached.is_queried() {
            self.vcp_version = cached;
            return cached;
        }

        let version = match self.get_nontable_reply(code::VCP_VERSION) {
            Ok(reply) => {
                let [_, _, sh, sl] = reply.bytes();
                (sh != 0 || sl != 0).then(|| Version::new(sh, sl))
            }
            Err(err) => {
                debug!("reading VCP version failed: {err}");
                None
            }
        };
        let version = version.or_else(|| match self.get_capabilities() {
            Ok(caps) => caps.mccs_version,
            Err(err) => {
                debug!("no version from capabilities: {err}");
                None
            }
        });

        let spec = version.map_or(VersionSpec::Unknown, VersionSpec::Known);
        info!("{} implements MCCS {spec:?}", self.dref.address());
        self.vcp_version = spec;
        self.dref.set_vcp_version(spec);
        spec
    }

    /// Metadata of `code` interpreted for this display.
    pub fn feature_metadata(&mut self, code: u8) -> FeatureMetadata {
        let version = self.get_vcp_version();
        let dynamic = self.dref.dynamic_features();
        features::feature_metadata(code, version, dynamic.as_deref())
    }

    /// Renders a value read from this display.
    pub fn format_value(&mut self, value: &SingleVcpValue) -> String {
        let meta = self.feature_metadata(value.code());
        features::format_value(&meta, value)
    }

    pub fn controller_info(&mut self) -> Result<ControllerInfo, DdcError> {
        let manufacturer = match self.get_nontable_reply(code::DISPLAY_CONTROLLER_TYPE) {
            Ok(reply) => {
                let sl = reply.bytes()[3];
                let meta = self.feature_metadata(code::DISPLAY_CONTROLLER_TYPE);
                meta.sl_value_name(sl)
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("Unrecognized manufacturer (0x{sl:02x})"))
            }
            Err(err) if err.is_unsupported() => UNSPECIFIED.to_string(),
            Err(err) => return Err(err),
        };
        let firmware = match self.get_nontable_reply(code::FIRMWARE_LEVEL) {
            Ok(reply) => {
                let [_, _, sh, sl] = reply.bytes();
                format!("{sh}.{sl}")
            }
            Err(err) if err.is_unsupported() => UNSPECIFIED.to_string(),
            Err(err) => return Err(err),
        };
        Ok(ControllerInfo {
            manufacturer,
            firmware,
        })
    }

    fn get_fraction(&mut self, code: u8) -> Result<f64, DdcError> {
        let reply = self.get_nontable_reply(code)?;
        if reply.max_value() == 0 {
            return Err(DdcCiProtocolError::InvalidData("maximum value is zero").into());
        }
        Ok(reply.cur_value() as f64 / reply.max_value() as f64)
    }

    fn set_fraction(&mut self, code: u8, fraction: f64) -> Result<(), DdcError> {
        if !(0.0..=1.0).contains(&fraction) {
            return Err(DdcError::InvalidArgument(format!(
                "{fraction} is outside of 0..=1"
            )));
        }
        let max = self.get_nontable_reply(code)?.max_value();
        let value = (max as f64 * fraction).round() as u16;
        self.set_value(&SingleVcpValue::new_value(code, value))
    }

    /// current brightness as a fraction of its maximum
    pub fn get_luminance(&mut self) -> Result<f64, DdcError> {
        self.get_fraction(code::LUMINANCE)
    }

    /// set the brightness, `lum` must be in `0..=1`
    pub fn set_luminance(&mut self, lum: f64) -> Result<(), DdcError> {
        self.set_fraction(code::LUMINANCE, lum)
    }

    pub fn get_contrast(&mut self) -> Result<f64, DdcError> {
        self.get_fraction(code::CONTRAST)
    }

    pub fn set_contrast(&mut self, contrast: f64) -> Result<(), DdcError> {
        self.set_fraction(code::CONTRAST, contrast)
    }

    pub fn get_input_source(&mut self) -> Result<InputSource, DdcError> {
        let reply = self.get_nontable_reply(code::INPUT_SOURCE)?;
        Ok(InputSource::from(reply.bytes()[3]))
    }

    pub fn set_input_source(&mut self, source: InputSource) -> Result<(), DdcError> {
        let value = u8::from(source) as u16;
        self.set_value(&SingleVcpValue::new_value(code::INPUT_SOURCE, value))
    }

    /// One time communication checks, cached on the display ref.
    ///
    /// Communication works if brightness can be read or is reported
    /// unsupported. Working displays are also probed for the null response
    /// idiom and asked for their MCCS version.
    pub fn initial_checks(&mut self) -> bool {
        let flags = self.dref.flags();
        if flags.ddc_checked {
            return flags.ddc_working;
        }

        let working = match self.get_nontable_reply(code::LUMINANCE) {
            Ok(_) => true,
            Err(err) if err.is_unsupported() => true,
            Err(err) => {
                warn!("{}: DDC communication failed: {err}", self.dref.address());
                false
            }
        };
        let uses_null_response = working && self.probe_null_response();
        self.dref.set_flags(DisplayFlags {
            ddc_checked: true,
            ddc_working: working,
            uses_null_response,
        });
        if working {
            self.get_vcp_version();
        }
        working
    }

    /// Feature 0x00 is never implemented, so its reply shows how the display
    /// reports unsupported features.
    fn probe_null_response(&mut self) -> bool {
        let result = self.exchange().write_read(
            &DdcCiMessage::get_vcp_request(0x00),
            MAX_NON_TABLE_READ_BYTES,
            DdcOpcode::VcpReply,
            Some(0x00),
            false,
        );
        let null = matches!(&result, Err(err) if err.is_null_response());
        if null {
            debug!("{} uses null response for unsupported features", self.dref.address());
        }
        null
    }

    fn release(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(err) = self.transport.close() {
            warn!("closing {} failed: {err}", self.dref.address());
        }
    }
}

impl Drop for DisplayHandle {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        config::DdcConfig,
        ddc::{
            edid::sample_edid,
            testing::{init_logging, SimulatedConnector, SimulatedMonitor},
            TransportAddress,
        },
    };

    const BUS: TransportAddress = TransportAddress::I2c { bus: 4 };

    fn open_with(monitor: &SimulatedMonitor, config: DdcConfig) -> DisplayHandle {
        init_logging();
        let edid = parse_edid(&sample_edid("ABC", "Mon1", "SN1")).unwrap();
        let dref = Arc::new(DisplayRef::new(BUS, Some(edid)));
        DisplayHandle::with_transport(
            dref,
            monitor.transport(TransportKind::I2c),
            DdcContext::shared(config),
        )
        .unwrap()
    }

    fn open(monitor: &SimulatedMonitor) -> DisplayHandle {
        open_with(monitor, DdcConfig::default())
    }

    #[test]
    fn open_reads_edid() {
        let monitor = SimulatedMonitor::new().with_edid(sample_edid("XYZ", "Mon2", "SN2"));
        let connector = SimulatedConnector::default().with_monitor(BUS, monitor.clone());
        let dref = Arc::new(DisplayRef::new(BUS, None));
        let ctx = DdcContext::shared(DdcConfig::default());
        let handle = DisplayHandle::open(dref.clone(), &connector, ctx).unwrap();
        assert_eq!(dref.edid().unwrap().model_name(), "Mon2");
        assert_eq!(handle.edid().unwrap().mfg_id(), "XYZ");
        assert_eq!(connector.connects.lock().as_slice(), &[BUS]);
        handle.close();
        assert!(monitor.state.lock().closed);
    }

    #[test]
    fn open_without_edid() {
        let monitor = SimulatedMonitor::new();
        let ctx = DdcContext::shared(DdcConfig::default());
        let dref = Arc::new(DisplayRef::new(BUS, None));
        let result =
            DisplayHandle::with_transport(dref, monitor.transport(TransportKind::I2c), ctx);
        assert!(matches!(result, Err(DdcError::EdidMissing)));
        assert!(monitor.state.lock().closed);

        let ctx = DdcContext::shared(DdcConfig::default().with_force_open(true));
        let dref = Arc::new(DisplayRef::new(BUS, None));
        let handle =
            DisplayHandle::with_transport(dref, monitor.transport(TransportKind::I2c), ctx).unwrap();
        assert!(handle.edid().is_none());
    }

    #[test]
    fn unknown_connector_address() {
        let connector = SimulatedConnector::default();
        let dref = Arc::new(DisplayRef::new(BUS, None));
        let result =
            DisplayHandle::open(dref, &connector, DdcContext::shared(DdcConfig::default()));
        assert!(matches!(result, Err(DdcError::Transport(_))));
    }

    #[test]
    fn close_errors_are_not_fatal() {
        let monitor = SimulatedMonitor::new().with_feature(code::LUMINANCE, 100, 40);
        monitor.state.lock().fail_close = true;
        let mut handle = open(&monitor);
        handle.set_value(&SingleVcpValue::new_value(code::LUMINANCE, 60)).unwrap();
        handle.close();
        assert!(monitor.state.lock().closed);
        assert_eq!(monitor.value(code::LUMINANCE), Some(60));
    }

    #[test]
    fn drop_releases_transport() {
        let monitor = SimulatedMonitor::new();
        drop(open(&monitor));
        assert!(monitor.state.lock().closed);
    }

    #[test]
    fn get_supported_and_unsupported() {
        let monitor = SimulatedMonitor::new().with_feature(code::LUMINANCE, 100, 40);
        let mut handle = open(&monitor);
        let value = handle.get_value(code::LUMINANCE, VcpValueType::NonTable).unwrap();
        assert_eq!(value, SingleVcpValue::continuous(code::LUMINANCE, 100, 40));
        assert!(matches!(
            handle.get_value(code::CONTRAST, VcpValueType::NonTable),
            Err(DdcError::ReportedUnsupported(0x12))
        ));
    }

    #[test]
    fn null_response_is_unsupported() {
        let monitor = SimulatedMonitor::new().with_null_response_idiom();
        let mut handle = open(&monitor);
        assert!(matches!(
            handle.get_nontable_reply(code::CONTRAST),
            Err(DdcError::DeterminedUnsupported(0x12))
        ));
        // the null response ends the retries
        assert_eq!(monitor.reads_of(code::CONTRAST), 1);
    }

    #[test]
    fn set_and_verify() {
        let monitor = SimulatedMonitor::new().with_feature(code::LUMINANCE, 100, 40);
        let mut handle = open_with(&monitor, DdcConfig::default().with_verify_setvcp(true));
        handle
            .set_value(&SingleVcpValue::new_value(code::LUMINANCE, 70))
            .unwrap();
        assert_eq!(monitor.value(code::LUMINANCE), Some(70));
        assert_eq!(monitor.reads_of(code::LUMINANCE), 1);
    }

    #[test]
    fn verify_detects_ignored_write() {
        let monitor = SimulatedMonitor::new()
            .with_feature(code::CONTRAST, 100, 50)
            .with_sticky(code::CONTRAST);
        let mut handle = open_with(&monitor, DdcConfig::default().with_verify_setvcp(true));
        match handle.set_value(&SingleVcpValue::new_value(code::CONTRAST, 80)) {
            Err(DdcError::Verify { feature, .. }) => assert_eq!(feature, code::CONTRAST),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(monitor.value(code::CONTRAST), Some(50));
    }

    #[test]
    fn input_source_is_not_reread() {
        let monitor = SimulatedMonitor::new()
            .with_feature(code::INPUT_SOURCE, 0x12, 0x0f)
            .with_sticky(code::INPUT_SOURCE);
        let mut handle = open_with(&monitor, DdcConfig::default().with_verify_setvcp(true));
        handle.set_input_source(InputSource::Hdmi1).unwrap();
        assert_eq!(monitor.reads_of(code::INPUT_SOURCE), 0);
    }

    #[test]
    fn no_verification_by_default() {
        let monitor = SimulatedMonitor::new()
            .with_feature(code::CONTRAST, 100, 50)
            .with_sticky(code::CONTRAST);
        let mut handle = open(&monitor);
        handle
            .set_value(&SingleVcpValue::new_value(code::CONTRAST, 80))
            .unwrap();
        assert_eq!(monitor.reads_of(code::CONTRAST), 0);
    }

    #[test]
    fn save_settings() {
        let monitor = SimulatedMonitor::new();
        let mut handle = open(&monitor);
        handle.save_current_settings().unwrap();
        assert_eq!(monitor.state.lock().saves, 1);
        let ctx = handle.ctx.clone();
        assert_eq!(
            ctx.sleep_stats().event_count(SleepEvent::PostSaveSettings),
            1
        );
    }

    #[test]
    fn usb_limits() {
        let monitor = SimulatedMonitor::new();
        let dref = Arc::new(DisplayRef::new(
            TransportAddress::Usb { bus: 1, device: 3 },
            None,
        ));
        let ctx = DdcContext::shared(DdcConfig::default().with_force_open(true));
        let mut handle =
            DisplayHandle::with_transport(dref, monitor.transport(TransportKind::Usb), ctx)
                .unwrap();
        assert!(matches!(
            handle.save_current_settings(),
            Err(DdcError::Unimplemented(_))
        ));
        assert!(matches!(
            handle.get_value(0x73, VcpValueType::Table),
            Err(DdcError::Unimplemented(_))
        ));
        assert!(matches!(
            handle.set_value(&SingleVcpValue::table(0x73, [1u8])),
            Err(DdcError::Unimplemented(_))
        ));
    }

    #[test]
    fn capabilities_are_cached() {
        let caps = "(prot(monitor)type(lcd)model(Mon1)cmds(01 02 03 0c f3)vcp(10 12 60(0f 11))mccs_ver(2.1))";
        let monitor = SimulatedMonitor::new().with_capabilities(caps);
        let mut handle = open(&monitor);
        assert_eq!(handle.get_capabilities_string().unwrap(), caps);
        let requests = monitor.state.lock().requests.len();
        let parsed = handle.get_capabilities().unwrap();
        assert_eq!(parsed.mccs_version, Some(Version::V2_1));
        assert!(parsed.supports_feature(code::INPUT_SOURCE));
        assert_eq!(monitor.state.lock().requests.len(), requests);
    }

    #[test]
    fn version_from_feature() {
        let monitor = SimulatedMonitor::new().with_feature(code::VCP_VERSION, 0, 0x0201);
        let mut handle = open(&monitor);
        assert_eq!(handle.get_vcp_version(), VersionSpec::Known(Version::V2_1));
        assert_eq!(
            handle.display_ref().vcp_version(),
            VersionSpec::Known(Version::V2_1)
        );
        handle.get_vcp_version();
        assert_eq!(monitor.reads_of(code::VCP_VERSION), 1);
    }

    #[test]
    fn version_from_capabilities() {
        let monitor = SimulatedMonitor::new().with_capabilities("(prot(monitor)mccs_ver(2.2))");
        let mut handle = open(&monitor);
        assert_eq!(handle.get_vcp_version(), VersionSpec::Known(Version::V2_2));
    }

    #[test]
    fn version_unknown() {
        let monitor = SimulatedMonitor::new();
        let mut handle = open(&monitor);
        assert_eq!(handle.get_vcp_version(), VersionSpec::Unknown);
    }

    #[test]
    fn table_roundtrip() {
        let stored: Vec<u8> = (0..40).collect();
        let monitor = SimulatedMonitor::new().with_table(0x73, &stored);
        let mut handle = open(&monitor);
        let value = handle.get_value(0x73, VcpValueType::Table).unwrap();
        assert_eq!(value.bytes(), Some(stored.as_slice()));

        let written: Vec<u8> = (100..150).collect();
        handle
            .set_value(&SingleVcpValue::table(0x73, written.clone()))
            .unwrap();
        assert_eq!(monitor.state.lock().tables.get(&0x73), Some(&written));

        assert!(matches!(
            handle.get_value(0x74, VcpValueType::Table),
            Err(DdcError::DeterminedUnsupported(0x74))
        ));
    }

    #[test]
    fn read_and_format_for_version() {
        let monitor = SimulatedMonitor::new()
            .with_feature(code::VCP_VERSION, 0, 0x0300)
            .with_feature(code::OSD, 0x00ff, 0x0001);
        let mut handle = open(&monitor);
        let value = handle.read_feature(code::OSD).unwrap();
        assert_eq!(value.sl(), Some(0x01));
        assert_eq!(
            handle.format_value(&value),
            "OSD disabled, button events enabled (sl=0x01)"
        );
    }

    #[test]
    fn controller() {
        let monitor = SimulatedMonitor::new()
            .with_feature(code::DISPLAY_CONTROLLER_TYPE, 0, 0x0009)
            .with_feature(code::FIRMWARE_LEVEL, 0, 0x0102);
        let info = open(&monitor).controller_info().unwrap();
        assert_eq!(info.manufacturer, "RealTek");
        assert_eq!(info.firmware, "1.2");

        let info = open(&SimulatedMonitor::new()).controller_info().unwrap();
        assert_eq!(info.manufacturer, UNSPECIFIED);
        assert_eq!(info.firmware, UNSPECIFIED);
    }

    #[test]
    fn luminance_fraction() {
        let monitor = SimulatedMonitor::new().with_feature(code::LUMINANCE, 200, 50);
        let mut handle = open(&monitor);
        assert_eq!(handle.get_luminance().unwrap(), 0.25);
        handle.set_luminance(0.5).unwrap();
        assert_eq!(monitor.value(code::LUMINANCE), Some(100));
        assert!(matches!(
            handle.set_luminance(1.5),
            Err(DdcError::InvalidArgument(_))
        ));
    }

    #[test]
    fn initial_checks_cache_flags() {
        let monitor = SimulatedMonitor::new()
            .with_feature(code::LUMINANCE, 100, 10)
            .with_null_response_idiom();
        let mut handle = open(&monitor);
        assert!(handle.initial_checks());
        let flags = handle.display_ref().flags();
        assert!(flags.ddc_checked && flags.ddc_working && flags.uses_null_response);

        let requests = monitor.state.lock().requests.len();
        assert!(handle.initial_checks());
        assert_eq!(monitor.state.lock().requests.len(), requests);
    }

    #[test]
    fn initial_checks_failure() {
        let monitor = SimulatedMonitor::new().with_feature(code::LUMINANCE, 100, 10);
        monitor.state.lock().fail_reads = usize::MAX;
        let mut handle = open_with(
            &monitor,
            DdcConfig::default()
                .with_max_tries(crate::ddc::retry::RetryOperation::WriteRead, 2),
        );
        assert!(!handle.initial_checks());
        let flags = handle.display_ref().flags();
        assert!(flags.ddc_checked && !flags.ddc_working);
    }
}
