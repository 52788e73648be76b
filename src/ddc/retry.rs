//! Retry policy and try statistics.
//!
//! Whether a failed attempt is retried depends on the exchange class, the
//! transport kind and the class of the failure. The defaults follow the
//! behaviour observed on real hardware; every cell can be overridden.

use std::{collections::HashMap, fmt::Write};

use super::{ci::DdcCiProtocolError, DdcError, TransportError, TransportKind};

/// Upper bound for any configured try count.
pub const MAX_MAX_TRIES: u8 = 15;

/// Exchange classes with their own try budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RetryOperation {
    WriteOnly,
    WriteRead,
    MultiPartRead,
    MultiPartWrite,
}

impl RetryOperation {
    pub const ALL: [RetryOperation; 4] = [
        RetryOperation::WriteOnly,
        RetryOperation::WriteRead,
        RetryOperation::MultiPartRead,
        RetryOperation::MultiPartWrite,
    ];

    pub fn default_max_tries(&self) -> u8 {
        match self {
            RetryOperation::WriteOnly => 4,
            RetryOperation::WriteRead => 10,
            RetryOperation::MultiPartRead | RetryOperation::MultiPartWrite => 8,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            RetryOperation::WriteOnly => "write only exchange",
            RetryOperation::WriteRead => "write/read exchange",
            RetryOperation::MultiPartRead => "multi-part read exchange",
            RetryOperation::MultiPartWrite => "multi-part write exchange",
        }
    }
}

/// Failure classes the policy distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    NullResponse,
    AllZero,
    /// EIO
    TransientIo,
    /// EBADF
    FatalIo,
    OtherIo,
    /// malformed frame, unexpected type or subtype, invalid data
    Protocol,
    ReadEqualsWrite,
    /// a nested retrying exchange ran out of tries
    Exhausted,
}

impl ErrorClass {
    /// `None` for errors that are never retried, such as semantic failures.
    pub fn of(err: &DdcError) -> Option<Self> {
        Some(match err {
            DdcError::Protocol(DdcCiProtocolError::NullResponse) => ErrorClass::NullResponse,
            DdcError::Protocol(_) | DdcError::FragmentOffset { .. } => ErrorClass::Protocol,
            DdcError::AllZero | DdcError::AllTriesZero { .. } => ErrorClass::AllZero,
            DdcError::ReadEqualsWrite => ErrorClass::ReadEqualsWrite,
            DdcError::RetriesExceeded { .. } => ErrorClass::Exhausted,
            DdcError::Transport(TransportError::Errno(libc::EIO)) => ErrorClass::TransientIo,
            DdcError::Transport(TransportError::Errno(libc::EBADF)) => ErrorClass::FatalIo,
            DdcError::Transport(TransportError::Unimplemented(_)) => return None,
            DdcError::Transport(_) => ErrorClass::OtherIo,
            _ => return None,
        })
    }

    const ALL: [ErrorClass; 8] = [
        ErrorClass::NullResponse,
        ErrorClass::AllZero,
        ErrorClass::TransientIo,
        ErrorClass::FatalIo,
        ErrorClass::OtherIo,
        ErrorClass::Protocol,
        ErrorClass::ReadEqualsWrite,
        ErrorClass::Exhausted,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry,
    Terminal,
}

type PolicyKey = (RetryOperation, TransportKind, ErrorClass);

/// Table mapping (exchange class, transport, failure class) to a decision.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    rules: HashMap<PolicyKey, RetryDecision>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        use ErrorClass::*;
        use RetryDecision::*;

        let mut policy = RetryPolicy {
            rules: HashMap::new(),
        };
        for kind in [TransportKind::I2c, TransportKind::Adapter, TransportKind::Usb] {
            for class in ErrorClass::ALL {
                let write_read = match (kind, class) {
                    (_, NullResponse) => Terminal,
                    (_, AllZero) => Retry,
                    (TransportKind::Adapter, _) => Terminal,
                    (_, FatalIo) => Terminal,
                    _ => Retry,
                };
                let write_only = match (kind, class) {
                    (TransportKind::Adapter, _) => Retry,
                    (_, TransientIo) => Retry,
                    _ => Terminal,
                };
                let multi_part_read = match class {
                    NullResponse | AllZero | FatalIo => Terminal,
                    _ => Retry,
                };
                let multi_part_write = match class {
                    FatalIo => Terminal,
                    _ => Retry,
                };
                policy.set(RetryOperation::WriteRead, kind, class, write_read);
                policy.set(RetryOperation::WriteOnly, kind, class, write_only);
                policy.set(RetryOperation::MultiPartRead, kind, class, multi_part_read);
                policy.set(RetryOperation::MultiPartWrite, kind, class, multi_part_write);
            }
        }
        policy
    }
}

impl RetryPolicy {
    pub fn set(
        &mut self,
        operation: RetryOperation,
        kind: TransportKind,
        class: ErrorClass,
        decision: RetryDecision,
    ) {
        self.rules.insert((operation, kind, class), decision);
    }

    pub fn with_rule(
        mut self,
        operation: RetryOperation,
        kind: TransportKind,
        class: ErrorClass,
        decision: RetryDecision,
    ) -> Self {
        self.set(operation, kind, class, decision);
        self
    }

    pub fn decide(
        &self,
        operation: RetryOperation,
        kind: TransportKind,
        err: &DdcError,
    ) -> RetryDecision {
        match ErrorClass::of(err) {
            Some(class) => self
                .rules
                .get(&(operation, kind, class))
                .copied()
                .unwrap_or(RetryDecision::Retry),
            None => RetryDecision::Terminal,
        }
    }
}

/// Outcome counters of one exchange class.
///
/// Slot 0 counts fatal failures, slot 1 exhausted try budgets and slot
/// `n + 1` successes on try `n`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TryCounts {
    counters: [u32; MAX_MAX_TRIES as usize + 2],
}

impl Default for TryCounts {
    fn default() -> Self {
        Self {
            counters: [0; MAX_MAX_TRIES as usize + 2],
        }
    }
}

impl TryCounts {
    pub fn fatal(&self) -> u32 {
        self.counters[0]
    }

    pub fn exhausted(&self) -> u32 {
        self.counters[1]
    }

    /// Number of exchanges that succeeded on try `tries`.
    pub fn succeeded_at(&self, tries: u8) -> u32 {
        self.counters
            .get(tries as usize + 1)
            .copied()
            .filter(|_| tries > 0)
            .unwrap_or(0)
    }

    pub fn successes(&self) -> u32 {
        self.counters[2..].iter().sum()
    }

    pub fn total(&self) -> u32 {
        self.counters.iter().sum()
    }
}

/// Try statistics per exchange class.
#[derive(Debug, Default, Clone)]
pub struct TryStats {
    counts: HashMap<RetryOperation, TryCounts>,
}

impl TryStats {
    fn slot(&mut self, operation: RetryOperation) -> &mut TryCounts {
        self.counts.entry(operation).or_default()
    }

    pub fn record_success(&mut self, operation: RetryOperation, tries: u8) {
        let index = (tries.clamp(1, MAX_MAX_TRIES) as usize) + 1;
        self.slot(operation).counters[index] += 1;
    }

    pub fn record_exhausted(&mut self, operation: RetryOperation) {
        self.slot(operation).counters[1] += 1;
    }

    pub fn record_fatal(&mut self, operation: RetryOperation) {
        self.slot(operation).counters[0] += 1;
    }

    pub fn counts(&self, operation: RetryOperation) -> TryCounts {
        self.counts.get(&operation).cloned().unwrap_or_default()
    }

    pub fn reset(&mut self) {
        self.counts.clear();
    }

    pub fn report(&self) -> String {
        let mut out = String::new();
        for operation in RetryOperation::ALL {
            let counts = self.counts(operation);
            let _ = writeln!(out, "Retry statistics for {}", operation.description());
            if counts.total() == 0 {
                let _ = writeln!(out, "   No tries attempted");
                continue;
            }
            let _ = writeln!(out, "   Successful attempts by number of tries required:");
            for tries in 1..=MAX_MAX_TRIES {
                let n = counts.succeeded_at(tries);
                if n > 0 {
                    let _ = writeln!(out, "      {tries:2}:  {n:3}");
                }
            }
            let _ = writeln!(out, "   Total successful attempts:        {:3}", counts.successes());
            let _ = writeln!(out, "   Failed due to max tries exceeded: {:3}", counts.exhausted());
            let _ = writeln!(out, "   Failed due to fatal error:        {:3}", counts.fatal());
            let _ = writeln!(out, "   Total attempts:                   {:3}", counts.total());
        }
        out
    }
}
