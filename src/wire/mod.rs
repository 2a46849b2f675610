//! Hand-rolled gRPC-web / protobuf wire codec.
//!
//! The binary-protocol engines speak a gRPC-web endpoint carrying
//! protobuf-encoded messages, but there is no `.proto` schema to compile
//! against: the message layout is reverse-engineered from captured payloads.
//! Decoding therefore never maps onto fixed structs. Instead a message
//! decodes into a map from field number to an ordered list of raw values,
//! so repeated fields survive and unknown fields are never silently dropped,
//! and accessor helpers pull out whatever a caller has learned to expect.
//!
//! Only wire types 0 (varint) and 2 (length-delimited) appear in these
//! protocols; anything else is a hard decode failure, as are truncated
//! frames and malformed varints. Those indicate transport corruption or a
//! server-side outage and must surface loudly, unlike a merely missing
//! field.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use std::borrow::Cow;
use std::collections::BTreeMap;

/// Varint scalar
pub const WIRE_VARINT: u8 = 0;
/// Length-delimited bytes / string / nested message
pub const WIRE_LEN: u8 = 2;

/// gRPC-web frame type for data frames; other types carry trailers.
pub const FRAME_DATA: u8 = 0x00;

/// Protocol-level corruption. Never produced for merely missing fields.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("truncated varint at offset {0}")]
    TruncatedVarint(usize),

    #[error("varint exceeds 64 bits at offset {0}")]
    VarintOverflow(usize),

    #[error("unsupported wire type {wire_type} for field {field}")]
    UnsupportedWireType { field: u32, wire_type: u8 },

    #[error("truncated frame: header declares {declared} bytes, {available} available")]
    TruncatedFrame { declared: usize, available: usize },

    #[error("truncated field payload: need {need} bytes at offset {offset}")]
    TruncatedField { offset: usize, need: usize },

    #[error("field key overflows u32 at offset {0}")]
    KeyOverflow(usize),

    #[error("server rejected request: {0}")]
    ServerStatus(String),
}

// ===== Varint (unsigned LEB128) =====

/// Append the LEB128 encoding of `value` to `buf`.
pub fn encode_varint(mut value: u64, buf: &mut Vec<u8>) {
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            buf.push(byte);
            return;
        }
        buf.push(byte | 0x80);
    }
}

/// Decode a LEB128 varint starting at `*pos`, advancing `*pos` past it.
///
/// Accumulated shift is capped at 64 bits; malformed input errors instead of
/// looping forever.
pub fn decode_varint(buf: &[u8], pos: &mut usize) -> Result<u64, WireError> {
    let start = *pos;
    let mut value: u64 = 0;
    let mut shift: u32 = 0;

    loop {
        let byte = *buf.get(*pos).ok_or(WireError::TruncatedVarint(start))?;
        *pos += 1;

        if shift >= 64 {
            return Err(WireError::VarintOverflow(start));
        }
        value |= u64::from(byte & 0x7F) << shift;

        if byte & 0x80 == 0 {
            return Ok(value);
        }
        shift += 7;
    }
}

// ===== gRPC-web framing =====

/// One gRPC-web frame: 1-byte type, 4-byte big-endian length, payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub frame_type: u8,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn is_data(&self) -> bool {
        self.frame_type == FRAME_DATA
    }
}

/// Wrap a message payload in a data-frame header for transmission.
pub fn encode_frame(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 5);
    out.push(FRAME_DATA);
    out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    out.extend_from_slice(payload);
    out
}

/// Split a gRPC-web response body into frames.
///
/// Responses sometimes arrive base64-wrapped (`grpc-web-text`); that is
/// detected and decoded before splitting.
pub fn decode_frames(body: &[u8]) -> Result<Vec<Frame>, WireError> {
    let body = unwrap_base64(body);
    let mut frames = Vec::new();
    let mut pos = 0usize;

    while pos < body.len() {
        if body.len() - pos < 5 {
            return Err(WireError::TruncatedFrame {
                declared: 5,
                available: body.len() - pos,
            });
        }
        let frame_type = body[pos];
        let len = u32::from_be_bytes([body[pos + 1], body[pos + 2], body[pos + 3], body[pos + 4]])
            as usize;
        pos += 5;

        if body.len() - pos < len {
            return Err(WireError::TruncatedFrame {
                declared: len,
                available: body.len() - pos,
            });
        }
        frames.push(Frame {
            frame_type,
            payload: body[pos..pos + len].to_vec(),
        });
        pos += len;
    }

    Ok(frames)
}

/// Concatenated payload of all data frames in a body.
pub fn data_payload(body: &[u8]) -> Result<Vec<u8>, WireError> {
    let mut out = Vec::new();
    for frame in decode_frames(body)? {
        if frame.is_data() {
            out.extend_from_slice(&frame.payload);
        }
    }
    Ok(out)
}

/// Decode the body as base64 if it plausibly is; otherwise pass it through.
fn unwrap_base64(body: &[u8]) -> Cow<'_, [u8]> {
    // A raw frame always starts with a frame-type byte < 0x20; printable
    // ASCII throughout is the base64 signature.
    if body.is_empty() || !body.iter().all(|b| b.is_ascii_graphic() || b.is_ascii_whitespace()) {
        return Cow::Borrowed(body);
    }
    let compact: Vec<u8> = body
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    match BASE64.decode(&compact) {
        Ok(decoded) => Cow::Owned(decoded),
        Err(_) => Cow::Borrowed(body),
    }
}

// ===== Message decoding =====

/// One decoded field occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Varint(u64),
    Bytes(Vec<u8>),
}

impl FieldValue {
    pub fn wire_type(&self) -> u8 {
        match self {
            FieldValue::Varint(_) => WIRE_VARINT,
            FieldValue::Bytes(_) => WIRE_LEN,
        }
    }
}

/// A protobuf message decoded without a schema: field number → occurrences
/// in wire order. Repeated fields are preserved, never overwritten.
#[derive(Debug, Clone, Default)]
pub struct Message {
    fields: BTreeMap<u32, Vec<FieldValue>>,
}

impl Message {
    /// Decode a message payload.
    pub fn decode(buf: &[u8]) -> Result<Self, WireError> {
        let mut fields: BTreeMap<u32, Vec<FieldValue>> = BTreeMap::new();
        let mut pos = 0usize;

        while pos < buf.len() {
            let key_offset = pos;
            let key = decode_varint(buf, &mut pos)?;
            let field = u32::try_from(key >> 3).map_err(|_| WireError::KeyOverflow(key_offset))?;
            let wire_type = (key & 0x7) as u8;

            let value = match wire_type {
                WIRE_VARINT => FieldValue::Varint(decode_varint(buf, &mut pos)?),
                WIRE_LEN => {
                    let len = decode_varint(buf, &mut pos)? as usize;
                    if buf.len() - pos < len {
                        return Err(WireError::TruncatedField {
                            offset: pos,
                            need: len,
                        });
                    }
                    let bytes = buf[pos..pos + len].to_vec();
                    pos += len;
                    FieldValue::Bytes(bytes)
                }
                other => {
                    return Err(WireError::UnsupportedWireType {
                        field,
                        wire_type: other,
                    })
                }
            };

            fields.entry(field).or_default().push(value);
        }

        Ok(Self { fields })
    }

    /// Whether the field appeared at all.
    pub fn has(&self, field: u32) -> bool {
        self.fields.contains_key(&field)
    }

    /// Field numbers present, ascending.
    pub fn field_numbers(&self) -> Vec<u32> {
        self.fields.keys().copied().collect()
    }

    /// All occurrences of a field, in wire order.
    pub fn values(&self, field: u32) -> &[FieldValue] {
        self.fields.get(&field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// First varint at the field, if any.
    pub fn first_varint(&self, field: u32) -> Option<u64> {
        self.values(field).iter().find_map(|v| match v {
            FieldValue::Varint(n) => Some(*n),
            _ => None,
        })
    }

    /// First length-delimited payload at the field, if any.
    pub fn first_bytes(&self, field: u32) -> Option<&[u8]> {
        self.values(field).iter().find_map(|v| match v {
            FieldValue::Bytes(b) => Some(b.as_slice()),
            _ => None,
        })
    }

    /// All valid UTF-8 string values at the field, in order.
    pub fn strings(&self, field: u32) -> Vec<String> {
        self.values(field)
            .iter()
            .filter_map(|v| match v {
                FieldValue::Bytes(b) => String::from_utf8(b.clone()).ok(),
                _ => None,
            })
            .collect()
    }

    /// First non-empty string at the field. Repeated string fields in these
    /// responses often lead with an empty placeholder, so first-non-empty is
    /// the useful accessor.
    pub fn first_string(&self, field: u32) -> Option<String> {
        self.strings(field)
            .into_iter()
            .find(|s| !s.trim().is_empty())
    }

    /// Recursively decode every length-delimited occurrence of the field as
    /// a sub-message. Occurrences that do not parse are skipped with a debug
    /// log: an undecodable repeated element is a benign schema gap, not
    /// transport corruption.
    pub fn messages(&self, field: u32) -> Vec<Message> {
        self.values(field)
            .iter()
            .filter_map(|v| match v {
                FieldValue::Bytes(b) => match Message::decode(b) {
                    Ok(msg) => Some(msg),
                    Err(e) => {
                        tracing::debug!(field, error = %e, "skipping undecodable sub-message");
                        None
                    }
                },
                _ => None,
            })
            .collect()
    }

    /// First occurrence of the field decoded as a sub-message.
    pub fn first_message(&self, field: u32) -> Option<Message> {
        self.first_bytes(field).and_then(|b| Message::decode(b).ok())
    }
}

// ===== Message encoding =====

/// Builder assembling an outbound message from tag+varint and
/// tag+length+bytes primitives.
#[derive(Debug, Default, Clone)]
pub struct MessageBuilder {
    buf: Vec<u8>,
}

impl MessageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn tag(&mut self, field: u32, wire_type: u8) {
        encode_varint(u64::from(field) << 3 | u64::from(wire_type), &mut self.buf);
    }

    /// Append a varint field.
    pub fn varint(mut self, field: u32, value: u64) -> Self {
        self.tag(field, WIRE_VARINT);
        encode_varint(value, &mut self.buf);
        self
    }

    /// Append a length-delimited bytes field.
    pub fn bytes(mut self, field: u32, value: &[u8]) -> Self {
        self.tag(field, WIRE_LEN);
        encode_varint(value.len() as u64, &mut self.buf);
        self.buf.extend_from_slice(value);
        self
    }

    /// Append a string field.
    pub fn string(self, field: u32, value: &str) -> Self {
        self.bytes(field, value.as_bytes())
    }

    /// Append a nested message field.
    pub fn message(self, field: u32, nested: MessageBuilder) -> Self {
        let payload = nested.encode();
        self.bytes(field, &payload)
    }

    /// The raw message payload.
    pub fn encode(self) -> Vec<u8> {
        self.buf
    }

    /// The message wrapped in a gRPC-web data frame, ready to POST.
    pub fn into_frame(self) -> Vec<u8> {
        encode_frame(&self.buf)
    }
}
