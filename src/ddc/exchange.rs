//! Request/reply exchanges with retries.

use log::{debug, trace, warn};

use super::{
    ci::{
        decode_response, DdcCiMessage, DdcCiProtocolError, DdcOpcode, DdcResponse,
        DDC_MAX_DATA_FRAGMENT_LENGTH,
    },
    retry::{RetryDecision, RetryOperation},
    sleep::{tuned_sleep, SleepEvent},
    DdcError, DdcTransport, TransportKind,
};
use crate::config::DdcContext;

/// Bytes of a feature reply as read from the bus.
pub const MAX_NON_TABLE_READ_BYTES: usize = 11;
/// Bytes of a full multi-part fragment as read from the bus.
pub const MAX_FRAGMENT_READ_BYTES: usize = DDC_MAX_DATA_FRAGMENT_LENGTH + 6;

/// Drives exchanges over one open transport.
pub struct Exchange<'a> {
    transport: &'a mut dyn DdcTransport,
    ctx: &'a DdcContext,
}

impl<'a> Exchange<'a> {
    pub fn new(transport: &'a mut dyn DdcTransport, ctx: &'a DdcContext) -> Self {
        Self { transport, ctx }
    }

    fn kind(&self) -> TransportKind {
        self.transport.kind()
    }

    fn sleep(&self, event: SleepEvent) {
        tuned_sleep(self.ctx, &*self.transport, event);
    }

    /// Single write followed by a read, no retries.
    pub fn write_read(
        &mut self,
        request: &DdcCiMessage,
        max_read_bytes: usize,
        expected_type: DdcOpcode,
        expected_subtype: Option<u8>,
        accept_all_zero: bool,
    ) -> Result<DdcResponse, DdcError> {
        let addr = request.addr();
        let request_bytes = request.transmit_buffer();
        trace!("write_read request: {request_bytes:02x?}");
        self.transport.transmit(addr, &request_bytes)?;
        self.sleep(SleepEvent::WriteToRead);
        let raw = self.transport.receive(addr, max_read_bytes)?;
        self.sleep(SleepEvent::PostRead);
        trace!("write_read response: {raw:02x?}");

        if !raw.is_empty() && raw.iter().all(|b| *b == 0) {
            return if accept_all_zero {
                Ok(DdcResponse::AllZero)
            } else {
                Err(DdcError::AllZero)
            };
        }
        if self.kind() == TransportKind::Adapter && raw.starts_with(&request_bytes) {
            return Err(DdcError::ReadEqualsWrite);
        }

        // the bus read starts at the source byte, restore the destination
        let mut frame = Vec::with_capacity(raw.len() + 1);
        frame.push(addr << 1 | 1);
        frame.extend_from_slice(&raw);
        Ok(decode_response(&frame, expected_type, expected_subtype)?)
    }

    pub fn write_only(&mut self, request: &DdcCiMessage) -> Result<(), DdcError> {
        let request_bytes = request.transmit_buffer();
        trace!("write_only request: {request_bytes:02x?}");
        self.transport.transmit(request.addr(), &request_bytes)?;
        self.sleep(SleepEvent::PostWrite);
        Ok(())
    }

    /// Runs `attempt` until it succeeds, fails terminally or the try budget
    /// of `operation` is used up.
    fn with_retry<T>(
        &mut self,
        operation: RetryOperation,
        mut attempt: impl FnMut(&mut Self) -> Result<T, DdcError>,
    ) -> Result<T, DdcError> {
        let max_tries = self.ctx.config().max_tries(operation);
        let kind = self.kind();
        let mut causes = Vec::new();
        let mut all_zero = 0;

        for try_ct in 1..=max_tries {
            match attempt(self) {
                Ok(value) => {
                    if try_ct > 1 {
                        debug!("{} succeeded after {try_ct} tries", operation.description());
                    }
                    self.ctx.try_stats().record_success(operation, try_ct);
                    return Ok(value);
                }
                Err(err) => {
                    debug!(
                        "{} try {try_ct}/{max_tries} failed: {err}",
                        operation.description()
                    );
                    if self.ctx.config().retry_policy.decide(operation, kind, &err)
                        == RetryDecision::Terminal
                    {
                        self.ctx.try_stats().record_fatal(operation);
                        return Err(err);
                    }
                    if matches!(err, DdcError::AllZero) {
                        all_zero += 1;
                    }
                    causes.push(err);
                }
            }
        }

        self.ctx.try_stats().record_exhausted(operation);
        if all_zero == max_tries as usize {
            Err(DdcError::AllTriesZero { tries: max_tries })
        } else {
            Err(DdcError::RetriesExceeded {
                tries: max_tries,
                causes,
            })
        }
    }

    pub fn write_read_with_retry(
        &mut self,
        request: &DdcCiMessage,
        max_read_bytes: usize,
        expected_type: DdcOpcode,
        expected_subtype: Option<u8>,
        accept_all_zero: bool,
    ) -> Result<DdcResponse, DdcError> {
        self.with_retry(RetryOperation::WriteRead, |ex| {
            ex.write_read(
                request,
                max_read_bytes,
                expected_type,
                expected_subtype,
                accept_all_zero,
            )
        })
    }

    pub fn write_only_with_retry(&mut self, request: &DdcCiMessage) -> Result<(), DdcError> {
        self.with_retry(RetryOperation::WriteOnly, |ex| ex.write_only(request))
    }

    /// Reads a capabilities string (`request_type` 0xF3) or a table feature
    /// (`request_type` 0xE2, `subtype` the feature code).
    ///
    /// A null response or a feature that only ever answers with zero bytes is
    /// reported as [`DdcError::DeterminedUnsupported`].
    pub fn multi_part_read_with_retry(
        &mut self,
        request_type: DdcOpcode,
        subtype: u8,
        accept_all_zero: bool,
    ) -> Result<Vec<u8>, DdcError> {
        let result = self.with_retry(RetryOperation::MultiPartRead, |ex| {
            ex.try_multi_part_read(request_type, subtype, accept_all_zero)
        });
        match result {
            Err(err) if err.is_null_response() || matches!(err, DdcError::AllTriesZero { .. }) => {
                Err(DdcError::DeterminedUnsupported(subtype))
            }
            other => other,
        }
    }

    fn try_multi_part_read(
        &mut self,
        request_type: DdcOpcode,
        subtype: u8,
        accept_all_zero: bool,
    ) -> Result<Vec<u8>, DdcError> {
        let reply_type = request_type.multi_part_reply().ok_or_else(|| {
            DdcError::InvalidArgument(format!("{request_type:?} is not a multi-part request"))
        })?;
        let max_fragments = self.ctx.config().max_multi_part_fragments;
        self.sleep(SleepEvent::PreMultiPartRead);

        let mut buffer = Vec::new();
        let mut offset: u16 = 0;
        for _ in 0..max_fragments {
            let request = DdcCiMessage::multi_part_read_request(request_type, subtype, offset);
            let fragment = match self.write_read_with_retry(
                &request,
                MAX_FRAGMENT_READ_BYTES,
                reply_type,
                None,
                accept_all_zero,
            )? {
                DdcResponse::Fragment(fragment) => fragment,
                DdcResponse::AllZero => return Ok(buffer),
                _ => {
                    return Err(DdcCiProtocolError::InvalidData("expected multi-part fragment").into())
                }
            };
            if fragment.offset != offset {
                return Err(DdcError::FragmentOffset {
                    expected: offset,
                    actual: fragment.offset,
                });
            }
            if fragment.bytes.is_empty() {
                trace!("multi-part read complete, {} bytes", buffer.len());
                return Ok(buffer);
            }
            offset = offset.wrapping_add(fragment.bytes.len() as u16);
            buffer.extend_from_slice(&fragment.bytes);
        }
        warn!("multi-part read of {request_type:?} stopped after {max_fragments} fragments without end marker");
        Ok(buffer)
    }

    /// Writes a table feature in fragments followed by an empty terminating fragment.
    pub fn multi_part_write_with_retry(&mut self, feature: u8, bytes: &[u8]) -> Result<(), DdcError> {
        self.with_retry(RetryOperation::MultiPartWrite, |ex| {
            ex.try_multi_part_write(feature, bytes)
        })
    }

    fn try_multi_part_write(&mut self, feature: u8, bytes: &[u8]) -> Result<(), DdcError> {
        let mut offset: u16 = 0;
        for chunk in bytes.chunks(DDC_MAX_DATA_FRAGMENT_LENGTH) {
            let request = DdcCiMessage::table_write_request(feature, offset, chunk)?;
            self.write_only_with_retry(&request)?;
            offset = offset.wrapping_add(chunk.len() as u16);
        }
        let request = DdcCiMessage::table_write_request(feature, offset, &[])?;
        self.write_only_with_retry(&request)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        config::DdcConfig,
        ddc::{
            retry::RetryOperation,
            testing::{Reply, ScriptedTransport, SimulatedMonitor},
            ci::DdcResponse,
        },
    };

    fn vcp_reply(code: u8, cur: u16) -> Reply {
        let [sh, sl] = cur.to_be_bytes();
        Reply::frame(
            DdcCiMessage::reply(DdcOpcode::VcpReply)
                .set_data(&[0, code, 0, 0, 100, sh, sl])
                .unwrap(),
        )
    }

    fn read_brightness(ex: &mut Exchange, accept_all_zero: bool) -> Result<DdcResponse, DdcError> {
        ex.write_read_with_retry(
            &DdcCiMessage::get_vcp_request(0x10),
            MAX_NON_TABLE_READ_BYTES,
            DdcOpcode::VcpReply,
            Some(0x10),
            accept_all_zero,
        )
    }

    #[test]
    fn retry_bound() {
        let ctx = DdcContext::new(DdcConfig::default().with_max_tries(RetryOperation::WriteRead, 5));
        let mut transport = ScriptedTransport::new(TransportKind::I2c).always(Reply::Errno(libc::EIO));
        let result = read_brightness(&mut Exchange::new(&mut transport, &ctx), false);
        match result {
            Err(DdcError::RetriesExceeded { tries, causes }) => {
                assert_eq!(tries, 5);
                assert_eq!(causes.len(), 5);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(transport.reads, 5);
        assert_eq!(transport.writes.len(), 5);
        assert_eq!(ctx.try_stats().counts(RetryOperation::WriteRead).exhausted(), 1);
    }

    #[test]
    fn null_response_short_circuit() {
        let ctx = DdcContext::new(DdcConfig::default().with_max_tries(RetryOperation::WriteRead, 15));
        let mut transport = ScriptedTransport::new(TransportKind::I2c).always(Reply::null());
        let result = read_brightness(&mut Exchange::new(&mut transport, &ctx), false);
        assert!(result.unwrap_err().is_null_response());
        assert_eq!(transport.reads, 1);
        assert_eq!(ctx.try_stats().counts(RetryOperation::WriteRead).fatal(), 1);
    }

    #[test]
    fn all_zero_semantics() {
        let ctx = DdcContext::new(DdcConfig::default());
        let mut transport = ScriptedTransport::new(TransportKind::I2c).always(Reply::all_zero());
        let result = Exchange::new(&mut transport, &ctx).write_read(
            &DdcCiMessage::get_vcp_request(0x10),
            MAX_NON_TABLE_READ_BYTES,
            DdcOpcode::VcpReply,
            Some(0x10),
            true,
        );
        assert_eq!(result.unwrap(), DdcResponse::AllZero);

        let mut transport = ScriptedTransport::new(TransportKind::I2c).always(Reply::all_zero());
        let result = read_brightness(&mut Exchange::new(&mut transport, &ctx), false);
        assert!(matches!(result, Err(DdcError::AllTriesZero { tries: 10 })));
        assert_eq!(transport.reads, 10);
    }

    #[test]
    fn recovers_after_transient_errors() {
        let ctx = DdcContext::new(DdcConfig::default());
        let mut transport = ScriptedTransport::new(TransportKind::I2c)
            .then(Reply::Errno(libc::EIO))
            .then(Reply::Bytes(vec![0x6e, 0x88, 0x02, 0xff]))
            .then(vcp_reply(0x10, 42));
        match read_brightness(&mut Exchange::new(&mut transport, &ctx), false).unwrap() {
            DdcResponse::NonTable(reply) => assert_eq!(reply.cur_value(), 42),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(ctx.try_stats().counts(RetryOperation::WriteRead).succeeded_at(3), 1);
    }

    #[test]
    fn bad_descriptor_is_fatal() {
        let ctx = DdcContext::new(DdcConfig::default());
        let mut transport =
            ScriptedTransport::new(TransportKind::I2c).always(Reply::Errno(libc::EBADF));
        let err = read_brightness(&mut Exchange::new(&mut transport, &ctx), false).unwrap_err();
        assert_eq!(err.status(), crate::ddc::StatusCode::Errno(libc::EBADF));
        assert_eq!(transport.reads, 1);
    }

    #[test]
    fn adapter_echo_is_read_equals_write() {
        let ctx = DdcContext::new(DdcConfig::default());
        let request = DdcCiMessage::get_vcp_request(0x10);
        let mut transport = ScriptedTransport::new(TransportKind::Adapter)
            .always(Reply::Bytes(request.transmit_buffer()));
        let err = Exchange::new(&mut transport, &ctx)
            .write_read(&request, 11, DdcOpcode::VcpReply, Some(0x10), false)
            .unwrap_err();
        assert!(matches!(err, DdcError::ReadEqualsWrite));
    }

    #[test]
    fn write_only_sleeps_after_write() {
        let ctx = DdcContext::new(DdcConfig::default());
        let mut transport = ScriptedTransport::new(TransportKind::I2c);
        Exchange::new(&mut transport, &ctx)
            .write_only_with_retry(&DdcCiMessage::set_vcp_request(0x10, 30))
            .unwrap();
        assert_eq!(transport.writes.len(), 1);
        assert_eq!(transport.slept_millis(), vec![50]);
    }

    #[test]
    fn multi_part_read_concatenates() {
        let caps = "(prot(monitor)type(lcd)model(TEST)cmds(01 02 03 0c e3 f3)vcp(02 10 12 14(05 06 08 0b) 60(0f 11 12))mccs_ver(2.1))";
        let monitor = SimulatedMonitor::new().with_capabilities(caps);
        let mut transport = monitor.transport(TransportKind::I2c);
        let ctx = DdcContext::new(DdcConfig::default());
        let bytes = Exchange::new(transport.as_mut(), &ctx)
            .multi_part_read_with_retry(DdcOpcode::CapabilitiesRequest, 0, false)
            .unwrap();
        assert_eq!(bytes, caps.as_bytes());
    }

    #[test]
    fn multi_part_read_unsupported_table() {
        let monitor = SimulatedMonitor::new();
        let mut transport = monitor.transport(TransportKind::I2c);
        let ctx = DdcContext::new(DdcConfig::default());
        let err = Exchange::new(transport.as_mut(), &ctx)
            .multi_part_read_with_retry(DdcOpcode::TableReadRequest, 0x73, false)
            .unwrap_err();
        assert!(matches!(err, DdcError::DeterminedUnsupported(0x73)));
    }

    #[test]
    fn multi_part_read_offset_mismatch() {
        let ctx = DdcContext::new(
            DdcConfig::default().with_max_tries(RetryOperation::MultiPartRead, 2),
        );
        let wrong = Reply::frame(
            DdcCiMessage::reply(DdcOpcode::CapabilitiesReply)
                .set_offset(4)
                .set_data(b"(vcp")
                .unwrap(),
        );
        let mut transport = ScriptedTransport::new(TransportKind::I2c).always(wrong);
        let err = Exchange::new(&mut transport, &ctx)
            .multi_part_read_with_retry(DdcOpcode::CapabilitiesRequest, 0, false)
            .unwrap_err();
        match err {
            DdcError::RetriesExceeded { tries, causes } => {
                assert_eq!(tries, 2);
                assert!(matches!(
                    causes[0],
                    DdcError::FragmentOffset {
                        expected: 0,
                        actual: 4
                    }
                ));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn multi_part_write_fragments() {
        let monitor = SimulatedMonitor::new();
        let mut transport = monitor.transport(TransportKind::I2c);
        let ctx = DdcContext::new(DdcConfig::default());
        let table: Vec<u8> = (0..70).collect();
        Exchange::new(transport.as_mut(), &ctx)
            .multi_part_write_with_retry(0x73, &table)
            .unwrap();
        let state = monitor.state.lock();
        assert_eq!(state.tables.get(&0x73), Some(&table));
        // 32 + 32 + 6 bytes and the terminating empty fragment
        assert_eq!(state.requests.len(), 4);
    }
}
