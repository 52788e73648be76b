//! DDC/CI packet framing.
//!
//! Requests are built with [`DdcCiMessage`] and serialized with
//! [`DdcCiMessage::transmit_buffer`]; replies are validated and classified with
//! [`decode_response`].

use std::fmt;

use nom::bytes::complete::take;
use nom::number::complete::{be_u16, le_u8};
use nom::IResult;
use thiserror::Error;

/// What is structurally wrong with a received frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameDefect {
    /// Fewer bytes than the length byte announces.
    Truncated,
    /// The length byte lacks the `0x80` marker or disagrees with the frame size.
    InvalidLength,
    /// The trailing checksum does not match the frame contents.
    InvalidChecksum,
}

impl fmt::Display for FrameDefect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FrameDefect::Truncated => "truncated frame",
            FrameDefect::InvalidLength => "invalid packet length",
            FrameDefect::InvalidChecksum => "checksum invalid",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DdcCiProtocolError {
    #[error("malformed frame: {0}")]
    MalformedFrame(FrameDefect),
    #[error("unexpected response type 0x{actual:02x}, expected 0x{expected:02x}")]
    UnexpectedType { expected: u8, actual: u8 },
    #[error("unexpected response subtype 0x{actual:02x}, expected 0x{expected:02x}")]
    UnexpectedSubtype { expected: u8, actual: u8 },
    #[error("DDC null response")]
    NullResponse,
    #[error("invalid data in response: {0}")]
    InvalidData(&'static str),
    #[error("payload of {0} bytes exceeds the fragment limit")]
    PayloadTooLong(usize),
    #[error("Error parsing DDC CI Message: {0}")]
    ParserError(String),
}

/// 7 bit I2C address of the DDC/CI command channel.
pub const DDC_CI_ADDR: u8 = 0x37;

/// Destination byte of a display reply, `DDC_CI_ADDR << 1 | 1`.
pub const DDC_SLAVE_SEND_ADDR: u8 = 0x6f;
/// Destination byte of a host request and source byte of a display reply.
pub const DDC_SLAVE_RECV_ADDR: u8 = 0x6e;
/// Source byte of a host request.
pub const DDC_MASTER_SEND_ADDR: u8 = 0x51;
/// Virtual host address substituted for `0x6f` when checksumming replies.
pub const DDC_MASTER_RECV_ADDR: u8 = 0x50;

const LENGTH_PREFIX: u8 = 0x80;

pub const DDC_MAX_DATA_FRAGMENT_LENGTH: usize = 32;

/// Fixed byte pattern some monitors send instead of flagging a feature unsupported.
pub const DDC_NULL_RESPONSE: [u8; 4] = [DDC_SLAVE_SEND_ADDR, DDC_SLAVE_RECV_ADDR, LENGTH_PREFIX, 0xbe];

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DdcOpcode {
    IdentificationRequest,
    IdentificationReply,
    CapabilitiesRequest,
    CapabilitiesReply,
    DisplaySelfTestRequest,
    DisplaySelfTestReply,
    TimingRequest,
    TimingReply,
    VcpRequest,
    VcpReply,
    SetVcp,
    ResetVcp,
    TableReadRequest,
    TableReadReply,
    TableWrite,
    EnableApplicationReport,
    SaveCurrentSettings,
    Unknown(u8),
}

impl From<DdcOpcode> for u8 {
    fn from(value: DdcOpcode) -> Self {
        match value {
            DdcOpcode::Unknown(value) => value,
            DdcOpcode::IdentificationRequest => 0xf1,
            DdcOpcode::IdentificationReply => 0xe1,
            DdcOpcode::CapabilitiesRequest => 0xf3,
            DdcOpcode::CapabilitiesReply => 0xe3,
            DdcOpcode::DisplaySelfTestRequest => 0xb1,
            DdcOpcode::DisplaySelfTestReply => 0xa1,
            DdcOpcode::TimingRequest => 0x07,
            DdcOpcode::TimingReply => 0x06,
            DdcOpcode::VcpRequest => 0x01,
            DdcOpcode::VcpReply => 0x02,
            DdcOpcode::SetVcp => 0x03,
            DdcOpcode::ResetVcp => 0x09,
            DdcOpcode::TableReadRequest => 0xe2,
            DdcOpcode::TableReadReply => 0xe4,
            DdcOpcode::TableWrite => 0xe7,
            DdcOpcode::EnableApplicationReport => 0xf5,
            DdcOpcode::SaveCurrentSettings => 0x0c,
        }
    }
}

impl From<u8> for DdcOpcode {
    fn from(value: u8) -> Self {
        match value {
            0xf1 => Self::IdentificationRequest,
            0xe1 => Self::IdentificationReply,
            0xf3 => Self::CapabilitiesRequest,
            0xe3 => Self::CapabilitiesReply,
            0xb1 => Self::DisplaySelfTestRequest,
            0xa1 => Self::DisplaySelfTestReply,
            0x07 => Self::TimingRequest,
            0x06 => Self::TimingReply,
            0x01 => Self::VcpRequest,
            0x02 => Self::VcpReply,
            0x03 => Self::SetVcp,
            0x09 => Self::ResetVcp,
            0xe2 => Self::TableReadRequest,
            0xe4 => Self::TableReadReply,
            0xe7 => Self::TableWrite,
            0xf5 => Self::EnableApplicationReport,
            0x0c => Self::SaveCurrentSettings,
            _ => Self::Unknown(value),
        }
    }
}

impl DdcOpcode {
    /// check if opcode carries a two byte offset field, used for parsing
    fn has_offset(&self) -> bool {
        matches!(
            self,
            DdcOpcode::CapabilitiesRequest
                | DdcOpcode::CapabilitiesReply
                | DdcOpcode::TableReadRequest
                | DdcOpcode::TableReadReply
                | DdcOpcode::TableWrite
        )
    }

    /// the reply opcode a multi part request is answered with
    pub fn multi_part_reply(&self) -> Option<DdcOpcode> {
        match self {
            DdcOpcode::CapabilitiesRequest => Some(DdcOpcode::CapabilitiesReply),
            DdcOpcode::TableReadRequest => Some(DdcOpcode::TableReadReply),
            _ => None,
        }
    }
}

#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum ResultCode {
    NoError,
    UnsupportedCode,
}

fn parse_result_code(i: &[u8]) -> IResult<&[u8], ResultCode> {
    let (i, rc) = le_u8(i)?;
    match rc {
        0x00 => Ok((i, ResultCode::NoError)),
        0x01 => Ok((i, ResultCode::UnsupportedCode)),
        _ => Err(nom::Err::Failure(nom::error::Error::new(
            i,
            nom::error::ErrorKind::Fail,
        ))),
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum VcpType {
    SetParameter,
    Momentary,
}

fn parse_vcp_type(i: &[u8]) -> IResult<&[u8], VcpType> {
    let (i, ty) = le_u8(i)?;
    match ty {
        0x00 => Ok((i, VcpType::SetParameter)),
        0x01 => Ok((i, VcpType::Momentary)),
        _ => Err(nom::Err::Failure(nom::error::Error::new(
            i,
            nom::error::ErrorKind::Fail,
        ))),
    }
}

/// Reply to a Get VCP Feature request.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct FeatureReply {
    result_code: ResultCode,
    vcp_feature: u8,
    type_code: VcpType,
    mh: u8,
    ml: u8,
    sh: u8,
    sl: u8,
}

impl FeatureReply {
    pub fn result_code(&self) -> ResultCode {
        self.result_code
    }

    pub fn is_supported(&self) -> bool {
        self.result_code == ResultCode::NoError
    }

    pub fn vcp_feature(&self) -> u8 {
        self.vcp_feature
    }

    pub fn type_code(&self) -> VcpType {
        self.type_code
    }

    /// The raw `mh`, `ml`, `sh`, `sl` bytes.
    pub fn bytes(&self) -> [u8; 4] {
        [self.mh, self.ml, self.sh, self.sl]
    }

    pub fn max_value(&self) -> u16 {
        u16::from_be_bytes([self.mh, self.ml])
    }

    pub fn cur_value(&self) -> u16 {
        u16::from_be_bytes([self.sh, self.sl])
    }
}

/// Parses the data following the `0x02` opcode of a feature reply.
pub fn parse_feature_reply(i: &[u8]) -> IResult<&[u8], FeatureReply> {
    let (i, result_code) = parse_result_code(i)?;
    let (i, vcp_feature) = le_u8(i)?;
    let (i, type_code) = parse_vcp_type(i)?;
    let (i, mh) = le_u8(i)?;
    let (i, ml) = le_u8(i)?;
    let (i, sh) = le_u8(i)?;
    let (i, sl) = le_u8(i)?;
    Ok((
        i,
        FeatureReply {
            result_code,
            vcp_feature,
            type_code,
            mh,
            ml,
            sh,
            sl,
        },
    ))
}

/// One fragment of a capabilities or table read.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct MultiPartFragment {
    pub offset: u16,
    pub bytes: Vec<u8>,
}

/// A validated reply, classified by shape.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum DdcResponse {
    /// Non-table VCP feature reply.
    NonTable(FeatureReply),
    /// Capabilities or table read fragment; an empty fragment ends the transfer.
    Fragment(MultiPartFragment),
    /// Any other well formed reply of the expected type.
    Other(DdcCiMessage),
    /// An all-zero read the caller declared acceptable.
    AllZero,
}

/// A single DDC/CI frame, either outbound or inbound.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct DdcCiMessage {
    target: u8,
    sender: u8,
    opcode: Option<DdcOpcode>,
    vcp_feature: Option<u8>,
    offset: Option<u16>,
    data: Vec<u8>,
}

fn xor_checksum(seed: u8, bytes: &[u8]) -> u8 {
    bytes.iter().fold(seed, |acc, b| acc ^ b)
}

fn checksum_seed(target: u8) -> u8 {
    if target == DDC_SLAVE_SEND_ADDR {
        DDC_MASTER_RECV_ADDR
    } else {
        target
    }
}

impl DdcCiMessage {
    fn protocol_length(&self) -> u8 {
        let mut length = self.data.len() as u8;
        if self.opcode.is_some() {
            length += 1;
        }
        if self.vcp_feature.is_some() {
            length += 1;
        }
        if self.offset.is_some() {
            length += 2;
        }
        length
    }

    /// Frame bytes between the destination byte and the checksum.
    fn body(&self) -> Vec<u8> {
        let mut body = Vec::with_capacity(self.protocol_length() as usize + 2);
        body.push(self.sender);
        body.push(LENGTH_PREFIX | self.protocol_length());
        if let Some(opcode) = self.opcode {
            body.push(opcode.into());
        }
        if let Some(vcp_feature) = self.vcp_feature {
            body.push(vcp_feature);
        }
        if let Some(offset) = self.offset {
            body.extend_from_slice(&offset.to_be_bytes());
        }
        body.extend_from_slice(&self.data);
        body
    }

    fn compute_checksum(&self) -> u8 {
        xor_checksum(checksum_seed(self.target), &self.body())
    }

    /// The frame a display sends when it has nothing to say.
    pub fn null_response() -> Self {
        Self {
            target: DDC_SLAVE_SEND_ADDR,
            sender: DDC_SLAVE_RECV_ADDR,
            opcode: None,
            vcp_feature: None,
            offset: None,
            data: Vec::new(),
        }
    }

    /// Builds a host to display request.
    pub fn from_opcode(opcode: DdcOpcode) -> Self {
        Self {
            target: DDC_SLAVE_RECV_ADDR,
            sender: DDC_MASTER_SEND_ADDR,
            opcode: Some(opcode),
            vcp_feature: None,
            offset: None,
            data: Vec::new(),
        }
    }

    /// Builds a display to host reply, mostly useful for simulating monitors.
    pub fn reply(opcode: DdcOpcode) -> Self {
        Self {
            target: DDC_SLAVE_SEND_ADDR,
            sender: DDC_SLAVE_RECV_ADDR,
            ..Self::from_opcode(opcode)
        }
    }

    pub fn get_vcp_request(feature: u8) -> Self {
        Self::from_opcode(DdcOpcode::VcpRequest).set_vcp_feature(feature)
    }

    pub fn set_vcp_request(feature: u8, value: u16) -> Self {
        let mut msg = Self::from_opcode(DdcOpcode::SetVcp).set_vcp_feature(feature);
        msg.data = value.to_be_bytes().to_vec();
        msg
    }

    /// Request for a capabilities fragment (`subtype` ignored) or a table
    /// fragment of feature `subtype`.
    pub fn multi_part_read_request(request_type: DdcOpcode, subtype: u8, offset: u16) -> Self {
        let msg = Self::from_opcode(request_type).set_offset(offset);
        if request_type == DdcOpcode::TableReadRequest {
            msg.set_vcp_feature(subtype)
        } else {
            msg
        }
    }

    pub fn table_write_request(
        feature: u8,
        offset: u16,
        bytes: &[u8],
    ) -> Result<Self, DdcCiProtocolError> {
        Self::from_opcode(DdcOpcode::TableWrite)
            .set_vcp_feature(feature)
            .set_offset(offset)
            .set_data(bytes)
    }

    pub fn save_current_settings_request() -> Self {
        Self::from_opcode(DdcOpcode::SaveCurrentSettings)
    }

    pub fn get_opcode(&self) -> Option<DdcOpcode> {
        self.opcode
    }

    pub fn set_vcp_feature(mut self, feature: u8) -> Self {
        self.vcp_feature = Some(feature);
        self
    }

    pub fn get_vcp_feature(&self) -> Option<u8> {
        self.vcp_feature
    }

    pub fn set_offset(mut self, offset: u16) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn get_offset(&self) -> Option<u16> {
        self.offset
    }

    pub fn set_data(mut self, data: &[u8]) -> Result<Self, DdcCiProtocolError> {
        if data.len() > DDC_MAX_DATA_FRAGMENT_LENGTH {
            return Err(DdcCiProtocolError::PayloadTooLong(data.len()));
        }
        self.data = data.to_vec();
        Ok(self)
    }

    pub fn get_data(&self) -> &[u8] {
        &self.data
    }

    pub fn get_data_len(&self) -> usize {
        self.data.len()
    }

    /// 7 bit bus address the frame is exchanged on.
    pub fn addr(&self) -> u8 {
        self.target >> 1
    }

    pub fn is_null_response(&self) -> bool {
        self.opcode.is_none() && self.sender == DDC_SLAVE_RECV_ADDR
    }

    /// Bytes put on the bus; the destination byte is implied by the bus address.
    pub fn transmit_buffer(&self) -> Vec<u8> {
        let mut data = self.body();
        data.push(self.compute_checksum());
        data
    }

    /// Complete frame including the destination byte.
    pub fn frame(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(self.protocol_length() as usize + 4);
        data.push(self.target);
        data.extend(self.transmit_buffer());
        data
    }

    /// Parses a frame that starts with its destination byte. Bytes after the
    /// checksum are ignored since fixed size bus reads pad the reply.
    pub fn parse_buffer(data: &[u8]) -> Result<Self, DdcCiProtocolError> {
        Self::parse_frame(data).map(|(msg, _)| msg)
    }

    /// Like [`DdcCiMessage::parse_buffer`] but the frame must fill `data` exactly.
    pub fn verify_frame(data: &[u8]) -> Result<Self, DdcCiProtocolError> {
        let (msg, rest) = Self::parse_frame(data)?;
        if rest != 0 {
            return Err(DdcCiProtocolError::MalformedFrame(FrameDefect::InvalidLength));
        }
        Ok(msg)
    }

    fn parse_frame(data: &[u8]) -> Result<(Self, usize), DdcCiProtocolError> {
        let truncated = DdcCiProtocolError::MalformedFrame(FrameDefect::Truncated);
        let (i, target) =
            le_u8::<&[u8], nom::error::Error<_>>(data).map_err(|_| truncated.clone())?;
        let (i, sender) = le_u8::<&[u8], nom::error::Error<_>>(i).map_err(|_| truncated.clone())?;
        let (i, length) = le_u8::<&[u8], nom::error::Error<_>>(i).map_err(|_| truncated.clone())?;
        if (length & LENGTH_PREFIX) != LENGTH_PREFIX {
            return Err(DdcCiProtocolError::MalformedFrame(FrameDefect::InvalidLength));
        }
        let length = (length & !LENGTH_PREFIX) as usize;
        let (i, payload) = take::<usize, &[u8], nom::error::Error<&[u8]>>(length)(i)
            .map_err(|_| truncated.clone())?;
        let (i, check_sum) = le_u8::<&[u8], nom::error::Error<_>>(i).map_err(|_| truncated)?;

        let covered = &data[1..3 + length];
        if xor_checksum(checksum_seed(target), covered) != check_sum {
            return Err(DdcCiProtocolError::MalformedFrame(FrameDefect::InvalidChecksum));
        }

        let mut message = Self {
            target,
            sender,
            opcode: None,
            vcp_feature: None,
            offset: None,
            data: Vec::new(),
        };
        if let Some((&opcode, rest)) = payload.split_first() {
            let opcode: DdcOpcode = opcode.into();
            message.opcode = Some(opcode);
            let mut rest = rest;
            if matches!(
                opcode,
                DdcOpcode::VcpRequest
                    | DdcOpcode::SetVcp
                    | DdcOpcode::TableReadRequest
                    | DdcOpcode::TableWrite
            ) {
                if let Some((&feature, tail)) = rest.split_first() {
                    message.vcp_feature = Some(feature);
                    rest = tail;
                }
            }
            if opcode.has_offset() && rest.len() >= 2 {
                let (tail, offset) = be_u16::<&[u8], nom::error::Error<_>>(rest)?;
                message.offset = Some(offset);
                rest = tail;
            }
            message.data = rest.to_vec();
        }
        Ok((message, i.len()))
    }
}

/// Builds the bus bytes of a request: sender, length, opcode, optional
/// feature code, payload and checksum.
///
/// Payloads longer than one fragment are rejected.
pub fn encode_request(
    command: DdcOpcode,
    feature_code: Option<u8>,
    payload: &[u8],
) -> Result<Vec<u8>, DdcCiProtocolError> {
    let mut msg = DdcCiMessage::from_opcode(command).set_data(payload)?;
    msg.vcp_feature = feature_code;
    Ok(msg.transmit_buffer())
}

/// Validates a reply frame (starting with its destination byte) and checks it
/// is of `expected_type`. For feature replies the echoed feature code must
/// equal `expected_subtype` when one is given.
pub fn decode_response(
    bytes: &[u8],
    expected_type: DdcOpcode,
    expected_subtype: Option<u8>,
) -> Result<DdcResponse, DdcCiProtocolError> {
    let msg = DdcCiMessage::parse_buffer(bytes)?;
    if msg.is_null_response() {
        return Err(DdcCiProtocolError::NullResponse);
    }
    let opcode = msg
        .get_opcode()
        .ok_or(DdcCiProtocolError::InvalidData("missing opcode"))?;
    if opcode != expected_type {
        return Err(DdcCiProtocolError::UnexpectedType {
            expected: expected_type.into(),
            actual: opcode.into(),
        });
    }
    match opcode {
        DdcOpcode::VcpReply => {
            if msg.get_data_len() != 7 {
                return Err(DdcCiProtocolError::InvalidData(
                    "feature reply must carry 7 data bytes",
                ));
            }
            let (_, reply) = parse_feature_reply(msg.get_data())
                .map_err(|_| DdcCiProtocolError::InvalidData("invalid feature reply"))?;
            if let Some(expected) = expected_subtype {
                if reply.vcp_feature() != expected {
                    return Err(DdcCiProtocolError::UnexpectedSubtype {
                        expected,
                        actual: reply.vcp_feature(),
                    });
                }
            }
            Ok(DdcResponse::NonTable(reply))
        }
        DdcOpcode::CapabilitiesReply | DdcOpcode::TableReadReply => {
            let offset = msg
                .get_offset()
                .ok_or(DdcCiProtocolError::InvalidData("fragment without offset"))?;
            Ok(DdcResponse::Fragment(MultiPartFragment {
                offset,
                bytes: msg.data,
            }))
        }
        _ => Ok(DdcResponse::Other(msg)),
    }
}

impl<T> From<nom::Err<T>> for DdcCiProtocolError
where
    T: core::fmt::Debug,
{
    fn from(value: nom::Err<T>) -> Self {
        DdcCiProtocolError::ParserError(format!("{value:?}"))
    }
}
