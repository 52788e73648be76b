//! Transport stubs for unit tests.

use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::Arc,
};

use parking_lot::Mutex;

use super::{
    ci::{DdcCiMessage, DdcOpcode, DDC_MAX_DATA_FRAGMENT_LENGTH, DDC_NULL_RESPONSE},
    DdcTransport, TransportAddress, TransportConnector, TransportError, TransportKind,
};

/// Routes `log` output of the code under test through the test harness.
pub(crate) fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// One scripted bus read.
#[derive(Debug, Clone)]
pub(crate) enum Reply {
    Bytes(Vec<u8>),
    Errno(i32),
}

impl Reply {
    /// A reply frame as read from the bus, without the destination byte.
    pub fn frame(msg: DdcCiMessage) -> Self {
        Reply::Bytes(msg.frame()[1..].to_vec())
    }

    pub fn null() -> Self {
        Reply::Bytes(DDC_NULL_RESPONSE[1..].to_vec())
    }

    pub fn all_zero() -> Self {
        Reply::Bytes(vec![0; 11])
    }
}

/// Replays a fixed list of reads, repeating `fallback` once the list is used up.
pub(crate) struct ScriptedTransport {
    kind: TransportKind,
    script: VecDeque<Reply>,
    fallback: Option<Reply>,
    pub writes: Vec<Vec<u8>>,
    pub reads: usize,
    slept: Mutex<Vec<u64>>,
}

impl ScriptedTransport {
    pub fn new(kind: TransportKind) -> Self {
        Self {
            kind,
            script: VecDeque::new(),
            fallback: None,
            writes: Vec::new(),
            reads: 0,
            slept: Mutex::new(Vec::new()),
        }
    }

    pub fn then(mut self, reply: Reply) -> Self {
        self.script.push_back(reply);
        self
    }

    pub fn always(mut self, reply: Reply) -> Self {
        self.fallback = Some(reply);
        self
    }

    pub fn slept_millis(&self) -> Vec<u64> {
        self.slept.lock().clone()
    }
}

impl DdcTransport for ScriptedTransport {
    fn kind(&self) -> TransportKind {
        self.kind
    }

    fn transmit(&mut self, _addr: u8, data: &[u8]) -> Result<(), TransportError> {
        self.writes.push(data.to_vec());
        Ok(())
    }

    fn receive(&mut self, _addr: u8, max_len: usize) -> Result<Vec<u8>, TransportError> {
        self.reads += 1;
        let reply = self
            .script
            .pop_front()
            .or_else(|| self.fallback.clone())
            .unwrap_or(Reply::Errno(libc::EIO));
        match reply {
            Reply::Bytes(mut bytes) => {
                bytes.truncate(max_len);
                Ok(bytes)
            }
            Reply::Errno(errno) => Err(TransportError::Errno(errno)),
        }
    }

    fn delay(&self, delay_ms: u64) {
        self.slept.lock().push(delay_ms);
    }
}

#[derive(Debug, Default)]
pub(crate) struct MonitorState {
    pub features: HashMap<u8, (u16, u16)>,
    pub tables: HashMap<u8, Vec<u8>>,
    pub capabilities: Vec<u8>,
    /// answer unsupported features with the null response
    pub null_for_unsupported: bool,
    /// features whose value reads back differently than written
    pub sticky: HashSet<u8>,
    pub edid: Option<Vec<u8>>,
    pub fail_reads: usize,
    pub requests: Vec<DdcCiMessage>,
    pub saves: usize,
    pub closed: bool,
    /// closing the transport fails with EIO
    pub fail_close: bool,
    staged_table: Vec<u8>,
    pending: Option<DdcCiMessage>,
}

/// A monitor answering requests from its feature map.
#[derive(Clone, Default)]
pub(crate) struct SimulatedMonitor {
    pub state: Arc<Mutex<MonitorState>>,
}

impl SimulatedMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_feature(self, code: u8, max: u16, cur: u16) -> Self {
        self.state.lock().features.insert(code, (max, cur));
        self
    }

    pub fn with_table(self, code: u8, bytes: &[u8]) -> Self {
        self.state.lock().tables.insert(code, bytes.to_vec());
        self
    }

    pub fn with_capabilities(self, caps: &str) -> Self {
        self.state.lock().capabilities = caps.as_bytes().to_vec();
        self
    }

    pub fn with_edid(self, edid: Vec<u8>) -> Self {
        self.state.lock().edid = Some(edid);
        self
    }

    pub fn with_null_response_idiom(self) -> Self {
        self.state.lock().null_for_unsupported = true;
        self
    }

    pub fn with_sticky(self, code: u8) -> Self {
        self.state.lock().sticky.insert(code);
        self
    }

    pub fn transport(&self, kind: TransportKind) -> Box<dyn DdcTransport> {
        Box::new(SimulatedTransport {
            kind,
            monitor: self.clone(),
        })
    }

    pub fn value(&self, code: u8) -> Option<u16> {
        self.state.lock().features.get(&code).map(|(_, cur)| *cur)
    }

    /// Number of Get VCP Feature requests seen for `code`.
    pub fn reads_of(&self, code: u8) -> usize {
        self.state
            .lock()
            .requests
            .iter()
            .filter(|msg| {
                msg.get_opcode() == Some(DdcOpcode::VcpRequest) && msg.get_vcp_feature() == Some(code)
            })
            .count()
    }
}

pub(crate) struct SimulatedTransport {
    kind: TransportKind,
    monitor: SimulatedMonitor,
}

fn feature_reply(rc: u8, code: u8, max: u16, cur: u16) -> DdcCiMessage {
    let [mh, ml] = max.to_be_bytes();
    let [sh, sl] = cur.to_be_bytes();
    DdcCiMessage::reply(DdcOpcode::VcpReply)
        .set_data(&[rc, code, 0, mh, ml, sh, sl])
        .unwrap()
}

fn fragment(reply_type: DdcOpcode, source: &[u8], offset: u16) -> DdcCiMessage {
    let start = (offset as usize).min(source.len());
    let end = (start + DDC_MAX_DATA_FRAGMENT_LENGTH).min(source.len());
    DdcCiMessage::reply(reply_type)
        .set_offset(offset)
        .set_data(&source[start..end])
        .unwrap()
}

impl DdcTransport for SimulatedTransport {
    fn kind(&self) -> TransportKind {
        self.kind
    }

    fn transmit(&mut self, _addr: u8, data: &[u8]) -> Result<(), TransportError> {
        let mut frame = vec![0x6e];
        frame.extend_from_slice(data);
        let msg = DdcCiMessage::verify_frame(&frame)
            .map_err(|err| TransportError::Other(anyhow::anyhow!("bad request: {err}")))?;
        let mut state = self.monitor.state.lock();
        state.requests.push(msg.clone());
        match msg.get_opcode() {
            Some(DdcOpcode::SetVcp) => {
                let code = msg.get_vcp_feature().unwrap_or_default();
                let value = u16::from_be_bytes([msg.get_data()[0], msg.get_data()[1]]);
                let sticky = state.sticky.contains(&code);
                if let Some(entry) = state.features.get_mut(&code) {
                    if !sticky {
                        entry.1 = value;
                    }
                }
            }
            Some(DdcOpcode::TableWrite) => {
                let code = msg.get_vcp_feature().unwrap_or_default();
                if msg.get_data().is_empty() {
                    let staged = std::mem::take(&mut state.staged_table);
                    state.tables.insert(code, staged);
                } else {
                    let offset = msg.get_offset().unwrap_or_default() as usize;
                    state.staged_table.truncate(offset);
                    state.staged_table.extend_from_slice(msg.get_data());
                }
            }
            Some(DdcOpcode::SaveCurrentSettings) => state.saves += 1,
            _ => state.pending = Some(msg),
        }
        Ok(())
    }

    fn receive(&mut self, _addr: u8, max_len: usize) -> Result<Vec<u8>, TransportError> {
        let mut state = self.monitor.state.lock();
        if state.fail_reads > 0 {
            state.fail_reads -= 1;
            return Err(TransportError::Errno(libc::EIO));
        }
        let request = state
            .pending
            .take()
            .ok_or(TransportError::Errno(libc::EIO))?;
        let reply = match request.get_opcode() {
            Some(DdcOpcode::VcpRequest) => {
                let code = request.get_vcp_feature().unwrap_or_default();
                match state.features.get(&code) {
                    Some((max, cur)) => Some(feature_reply(0, code, *max, *cur)),
                    None if state.null_for_unsupported => None,
                    None => Some(feature_reply(1, code, 0, 0)),
                }
            }
            Some(DdcOpcode::CapabilitiesRequest) => Some(fragment(
                DdcOpcode::CapabilitiesReply,
                &state.capabilities,
                request.get_offset().unwrap_or_default(),
            )),
            Some(DdcOpcode::TableReadRequest) => {
                let code = request.get_vcp_feature().unwrap_or_default();
                state.tables.get(&code).map(|table| {
                    fragment(
                        DdcOpcode::TableReadReply,
                        table,
                        request.get_offset().unwrap_or_default(),
                    )
                })
            }
            _ => None,
        };
        let mut bytes = match reply {
            Some(msg) => msg.frame()[1..].to_vec(),
            None => DDC_NULL_RESPONSE[1..].to_vec(),
        };
        bytes.truncate(max_len);
        Ok(bytes)
    }

    fn delay(&self, _delay_ms: u64) {}

    fn read_edid(&mut self) -> Result<Vec<u8>, TransportError> {
        self.monitor
            .state
            .lock()
            .edid
            .clone()
            .ok_or(TransportError::Errno(libc::ENXIO))
    }

    fn close(&mut self) -> Result<(), TransportError> {
        let mut state = self.monitor.state.lock();
        state.closed = true;
        if state.fail_close {
            return Err(TransportError::Errno(libc::EIO));
        }
        Ok(())
    }
}

/// Connects addresses to simulated monitors, anything else fails with ENXIO.
#[derive(Default)]
pub(crate) struct SimulatedConnector {
    monitors: HashMap<TransportAddress, SimulatedMonitor>,
    pub connects: Mutex<Vec<TransportAddress>>,
}

impl SimulatedConnector {
    pub fn with_monitor(mut self, address: TransportAddress, monitor: SimulatedMonitor) -> Self {
        self.monitors.insert(address, monitor);
        self
    }
}

impl TransportConnector for SimulatedConnector {
    fn connect(&self, address: &TransportAddress) -> Result<Box<dyn DdcTransport>, TransportError> {
        self.connects.lock().push(address.clone());
        self.monitors
            .get(address)
            .map(|monitor| monitor.transport(address.kind()))
            .ok_or(TransportError::Errno(libc::ENXIO))
    }
}
