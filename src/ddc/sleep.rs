//! Tuned delays between protocol phases.

use std::{collections::BTreeMap, fmt::Write};

use log::trace;

use super::{DdcTransport, TransportKind};
use crate::config::DdcContext;

/// Default DDC/CI settle time.
pub const DDC_TIMEOUT_MILLIS_DEFAULT: u64 = 50;
/// Settle time after a save settings request.
pub const DDC_TIMEOUT_POST_SAVE_SETTINGS: u64 = 200;

/// Protocol phase a delay precedes or follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SleepEvent {
    WriteToRead,
    PostWrite,
    PostRead,
    PostOpen,
    PostSaveSettings,
    PreMultiPartRead,
}

impl SleepEvent {
    pub fn name(&self) -> &'static str {
        match self {
            SleepEvent::WriteToRead => "write to read",
            SleepEvent::PostWrite => "post write",
            SleepEvent::PostRead => "post read",
            SleepEvent::PostOpen => "post open",
            SleepEvent::PostSaveSettings => "post save settings",
            SleepEvent::PreMultiPartRead => "pre multi-part read",
        }
    }

    /// Unscaled delay for this phase on a transport kind.
    pub fn base_millis(&self, kind: TransportKind) -> u64 {
        match kind {
            TransportKind::Usb => 0,
            TransportKind::I2c | TransportKind::Adapter => match self {
                SleepEvent::PostSaveSettings => DDC_TIMEOUT_POST_SAVE_SETTINGS,
                SleepEvent::PreMultiPartRead => 200,
                _ => DDC_TIMEOUT_MILLIS_DEFAULT,
            },
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct SleepStats {
    total_calls: u64,
    requested_millis: u64,
    per_event: BTreeMap<SleepEvent, u64>,
}

impl SleepStats {
    pub fn record(&mut self, event: SleepEvent, millis: u64) {
        self.total_calls += 1;
        self.requested_millis += millis;
        *self.per_event.entry(event).or_default() += 1;
    }

    pub fn total_calls(&self) -> u64 {
        self.total_calls
    }

    pub fn requested_millis(&self) -> u64 {
        self.requested_millis
    }

    pub fn event_count(&self, event: SleepEvent) -> u64 {
        self.per_event.get(&event).copied().unwrap_or(0)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn report(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Sleep call statistics:");
        let _ = writeln!(out, "   Total sleep calls:              {:8}", self.total_calls);
        let _ = writeln!(out, "   Requested sleep time (millis):  {:8}", self.requested_millis);
        for (event, count) in &self.per_event {
            let _ = writeln!(out, "   {:<30}  {count:8}", event.name());
        }
        out
    }
}

/// Sleeps for the delay configured for `event` on the transport and records it.
pub fn tuned_sleep(ctx: &DdcContext, transport: &dyn DdcTransport, event: SleepEvent) {
    let base = event.base_millis(transport.kind());
    let millis = (base as f64 * ctx.config().sleep_multiplier).round().max(0.0) as u64;
    ctx.sleep_stats().record(event, millis);
    if millis > 0 {
        trace!("tuned sleep: {} for {millis} ms", event.name());
        transport.delay(millis);
    }
}
