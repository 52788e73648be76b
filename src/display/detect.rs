//! Builds the display registry from enumerated candidates.

use std::{sync::Arc, thread};

use log::{debug, info, warn};

use super::{DisplayHandle, DisplayRef, DisplayRegistry, DISPNO_INVALID};
use crate::{
    config::DdcContext,
    ddc::{edid::parse_edid, TransportAddress, TransportConnector, TransportKind},
    mccs::features::dynamic::DynamicFeatureRegistry,
};

/// A display found by platform enumeration, not yet checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayCandidate {
    pub address: TransportAddress,
    /// EDID read during enumeration, if any
    pub edid: Option<Vec<u8>>,
}

impl DisplayCandidate {
    pub fn new(address: TransportAddress) -> Self {
        Self {
            address,
            edid: None,
        }
    }

    pub fn with_edid(mut self, edid: Vec<u8>) -> Self {
        self.edid = Some(edid);
        self
    }
}

/// Vendor adapter libraries are not thread safe, so their displays are always
/// checked one at a time.
pub fn should_detect_concurrently(count: usize, threshold: usize, any_adapter: bool) -> bool {
    count > threshold && !any_adapter
}

/// Checks every candidate and numbers the working displays.
///
/// Display numbers are assigned from 1 in candidate order regardless of
/// which check finishes first. Displays that fail the checks stay in the
/// registry with an invalid number.
pub fn detect_displays(
    ctx: Arc<DdcContext>,
    connector: Arc<dyn TransportConnector>,
    candidates: Vec<DisplayCandidate>,
    dynamic: &DynamicFeatureRegistry,
) -> DisplayRegistry {
    let displays: Vec<Arc<DisplayRef>> = candidates
        .into_iter()
        .map(|candidate| {
            let edid = candidate.edid.and_then(|bytes| match parse_edid(&bytes) {
                Ok(edid) => Some(edid),
                Err(err) => {
                    warn!("{}: ignoring invalid EDID: {err}", candidate.address);
                    None
                }
            });
            let dref = DisplayRef::new(candidate.address, edid);
            attach_dynamic_features(&dref, dynamic);
            Arc::new(dref)
        })
        .collect();

    let any_adapter = displays.iter().any(|d| d.kind() == TransportKind::Adapter);
    let concurrent = should_detect_concurrently(
        displays.len(),
        ctx.config().concurrent_detection_threshold,
        any_adapter,
    );
    debug!(
        "checking {} displays {}",
        displays.len(),
        if concurrent { "concurrently" } else { "sequentially" }
    );

    let results: Vec<bool> = if concurrent {
        thread::scope(|s| {
            let workers: Vec<_> = displays
                .iter()
                .map(|dref| {
                    let (ctx, connector) = (&ctx, &connector);
                    s.spawn(move || check_display(dref, connector.as_ref(), ctx, dynamic))
                })
                .collect();
            workers
                .into_iter()
                .map(|worker| worker.join().unwrap_or(false))
                .collect()
        })
    } else {
        displays
            .iter()
            .map(|dref| check_display(dref, connector.as_ref(), &ctx, dynamic))
            .collect()
    };

    let mut dispno = 0;
    for (dref, working) in displays.iter().zip(results) {
        if working {
            dispno += 1;
            dref.set_dispno(dispno);
        } else {
            dref.set_dispno(DISPNO_INVALID);
        }
    }
    info!("detected {dispno} working of {} displays", displays.len());

    DisplayRegistry::new(displays, connector, ctx)
}

/// Looks up per-model overrides once the ref has an EDID.
fn attach_dynamic_features(dref: &DisplayRef, dynamic: &DynamicFeatureRegistry) {
    if dref.dynamic_features().is_some() {
        return;
    }
    if let Some(edid) = dref.edid() {
        dref.set_dynamic_features(dynamic.for_edid(&edid));
    }
}

fn check_display(
    dref: &Arc<DisplayRef>,
    connector: &dyn TransportConnector,
    ctx: &Arc<DdcContext>,
    dynamic: &DynamicFeatureRegistry,
) -> bool {
    let mut handle = match DisplayHandle::open(dref.clone(), connector, ctx.clone()) {
        Ok(handle) => handle,
        Err(err) => {
            warn!("{}: open failed: {err}", dref.address());
            return false;
        }
    };
    // the EDID may only have been read by the open
    attach_dynamic_features(dref, dynamic);
    let working = handle.initial_checks();
    handle.close();
    working
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        config::DdcConfig,
        ddc::{
            edid::sample_edid,
            testing::{init_logging, SimulatedConnector, SimulatedMonitor},
        },
        display::DisplayIdentifier,
        mccs::{
            features::{
                code,
                dynamic::{DynamicFeatures, MonitorModelKey},
                Access, MetadataSource,
            },
            VersionSpec,
        },
    };

    fn bus(bus: u32) -> TransportAddress {
        TransportAddress::I2c { bus }
    }

    fn monitor(serial: &str) -> SimulatedMonitor {
        SimulatedMonitor::new()
            .with_feature(code::LUMINANCE, 100, 50)
            .with_edid(sample_edid("ABC", "Mon1", serial))
    }

    fn detect(config: DdcConfig, connector: SimulatedConnector, buses: &[u32]) -> DisplayRegistry {
        init_logging();
        let candidates = buses.iter().map(|b| DisplayCandidate::new(bus(*b))).collect();
        detect_displays(
            DdcContext::shared(config),
            Arc::new(connector),
            candidates,
            &DynamicFeatureRegistry::new(),
        )
    }

    #[test]
    fn concurrency_decision() {
        assert!(!should_detect_concurrently(3, 3, false));
        assert!(should_detect_concurrently(4, 3, false));
        assert!(!should_detect_concurrently(8, 3, true));
        assert!(should_detect_concurrently(1, 0, false));
    }

    #[test]
    fn numbers_follow_candidate_order() {
        for threshold in [0, 100] {
            let connector = SimulatedConnector::default()
                .with_monitor(bus(2), monitor("SN2"))
                .with_monitor(bus(5), monitor("SN5"))
                .with_monitor(bus(7), monitor("SN7"));
            let registry = detect(
                DdcConfig::default().with_concurrent_detection_threshold(threshold),
                connector,
                &[2, 3, 5, 7],
            );
            let numbers: Vec<i32> = registry.displays().iter().map(|d| d.dispno()).collect();
            assert_eq!(numbers, vec![1, DISPNO_INVALID, 2, 3]);
            assert_eq!(registry.valid_displays().count(), 3);
            let found = registry.find(&DisplayIdentifier::DisplayNumber(2)).unwrap();
            assert_eq!(found.edid().unwrap().serial_ascii(), "SN5");
        }
    }

    #[test]
    fn failed_checks_are_kept() {
        let broken = monitor("SN1");
        broken.state.lock().fail_reads = usize::MAX;
        let connector = SimulatedConnector::default()
            .with_monitor(bus(1), broken)
            .with_monitor(bus(2), monitor("SN2"));
        let registry = detect(
            DdcConfig::default().with_max_tries(crate::ddc::retry::RetryOperation::WriteRead, 1),
            connector,
            &[1, 2],
        );
        let first = registry.find(&DisplayIdentifier::Bus(1)).unwrap();
        assert_eq!(first.dispno(), DISPNO_INVALID);
        assert!(first.flags().ddc_checked);
        assert!(!first.flags().ddc_working);
        assert_eq!(registry.find(&DisplayIdentifier::Bus(2)).unwrap().dispno(), 1);
    }

    #[test]
    fn registry_opens_checked_display() {
        let target = monitor("SN3").with_feature(code::VCP_VERSION, 0, 0x0300);
        let connector = SimulatedConnector::default().with_monitor(bus(3), target.clone());
        let registry = detect(DdcConfig::default(), connector, &[3]);
        let dref = registry.find(&DisplayIdentifier::DisplayNumber(1)).unwrap();
        assert_eq!(dref.vcp_version(), VersionSpec::Known(crate::mccs::Version::V3_0));

        let reads = target.reads_of(code::VCP_VERSION);
        let mut handle = registry.open(&dref).unwrap();
        assert_eq!(handle.get_luminance().unwrap(), 0.5);
        handle.get_vcp_version();
        assert_eq!(target.reads_of(code::VCP_VERSION), reads);
    }

    fn eco_mode_registry(edid: &[u8]) -> DynamicFeatureRegistry {
        let parsed = parse_edid(edid).unwrap();
        let mut dynamic = DynamicFeatureRegistry::new();
        dynamic.register(
            DynamicFeatures::new(MonitorModelKey::from_edid(&parsed)).with_simple_feature(
                0xe1,
                "Eco mode",
                Access::ReadWrite,
                [(0x00, "Off".to_string())],
            ),
        );
        dynamic
    }

    #[test]
    fn edid_read_on_open_attaches_dynamic_features() {
        let dynamic = eco_mode_registry(&sample_edid("ABC", "Mon1", "SN4"));
        let connector = SimulatedConnector::default()
            .with_monitor(bus(4), monitor("SN4"))
            .with_monitor(bus(5), monitor("SN5"));
        let registry = detect_displays(
            DdcContext::shared(DdcConfig::default()),
            Arc::new(connector),
            vec![DisplayCandidate::new(bus(4)), DisplayCandidate::new(bus(5))],
            &dynamic,
        );
        let dref = registry.find(&DisplayIdentifier::Bus(4)).unwrap();
        assert!(dref.dynamic_features().is_some());
        let mut handle = registry.open(&dref).unwrap();
        assert_eq!(handle.feature_metadata(0xe1).source, MetadataSource::Dynamic);
    }

    #[test]
    fn enumerated_edid_attaches_dynamic_features() {
        let edid = sample_edid("ABC", "Mon1", "SN4");
        let dynamic = eco_mode_registry(&edid);
        let connector = SimulatedConnector::default().with_monitor(bus(4), monitor("SN4"));
        let registry = detect_displays(
            DdcContext::shared(DdcConfig::default()),
            Arc::new(connector),
            vec![DisplayCandidate::new(bus(4)).with_edid(edid)],
            &dynamic,
        );
        let dref = registry.find(&DisplayIdentifier::Bus(4)).unwrap();
        let mut handle = registry.open(&dref).unwrap();
        assert_eq!(handle.feature_metadata(0xe1).source, MetadataSource::Dynamic);
    }
}
