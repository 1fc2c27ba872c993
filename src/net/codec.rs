use crate::net::layout::{FieldType, PacketLayouts};
use crate::net::packet::{PacketReader, PacketWriter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Number(i64),
    Text(String),
    Bytes(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    UnknownLayout(String),
    UnhandledKey { message: String, key: String },
    TypeMismatch { message: String, key: String },
    PayloadTooLarge { message: String, len: usize },
}

impl std::fmt::Display for EncodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EncodeError::UnknownLayout(name) => write!(f, "no packet layout named {}", name),
            EncodeError::UnhandledKey { message, key } => {
                write!(f, "unhandled key {} for message {}", key, message)
            }
            EncodeError::TypeMismatch { message, key } => {
                write!(f, "key {} of message {} has the wrong value type", key, message)
            }
            EncodeError::PayloadTooLarge { message, len } => {
                write!(f, "message {} payload of {} bytes does not fit a frame", message, len)
            }
        }
    }
}

impl std::error::Error for EncodeError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    UnknownOpcode(u8),
    UnknownLayout(String),
    Truncated { message: String, key: String },
    UnhandledKey { message: String, key: String },
    LengthMismatch { expected: usize, found: usize },
    Invalid { message: String, reason: String },
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::UnknownOpcode(opcode) => write!(f, "unknown opcode {}", opcode),
            DecodeError::UnknownLayout(name) => write!(f, "no packet layout named {}", name),
            DecodeError::Truncated { message, key } => {
                write!(f, "message {} truncated at key {}", message, key)
            }
            DecodeError::UnhandledKey { message, key } => {
                write!(f, "unhandled key {} for message {}", key, message)
            }
            DecodeError::LengthMismatch { expected, found } => {
                write!(f, "frame declares {} payload bytes, found {}", expected, found)
            }
            DecodeError::Invalid { message, reason } => write!(f, "invalid {}: {}", message, reason),
        }
    }
}

impl std::error::Error for DecodeError {}

/// A message whose wire form is described by a packet layout. The encoder is
/// asked for each key the layout lists, in layout order.
pub trait MessageEncoder {
    fn layout_name(&self) -> &'static str;

    fn extract(&self, key: &str) -> Result<FieldValue, EncodeError>;
}

/// Receives the fields of a frame in layout order.
pub trait MessageDecoder {
    fn read_field(
        &mut self,
        key: &str,
        kind: FieldType,
        reader: &mut PacketReader<'_>,
    ) -> Result<(), DecodeError>;
}

pub fn unhandled_key(message: &str, key: &str) -> EncodeError {
    EncodeError::UnhandledKey {
        message: message.to_string(),
        key: key.to_string(),
    }
}

pub fn unhandled_decode_key(message: &str, key: &str) -> DecodeError {
    DecodeError::UnhandledKey {
        message: message.to_string(),
        key: key.to_string(),
    }
}

pub fn truncated(message: &str, key: &str) -> DecodeError {
    DecodeError::Truncated {
        message: message.to_string(),
        key: key.to_string(),
    }
}

/// Frame = opcode (u8), payload length (u16), payload.
pub fn encode(layouts: &PacketLayouts, message: &dyn MessageEncoder) -> Result<Vec<u8>, EncodeError> {
    let name = message.layout_name();
    let layout = layouts
        .get(name)
        .ok_or_else(|| EncodeError::UnknownLayout(name.to_string()))?;
    let mut payload = PacketWriter::new();
    for field in &layout.fields {
        let value = message.extract(&field.key)?;
        let mismatch = || EncodeError::TypeMismatch {
            message: name.to_string(),
            key: field.key.clone(),
        };
        match (field.kind, value) {
            (FieldType::Byte, FieldValue::Number(value)) => payload.write_u8(value as u8),
            (FieldType::Short, FieldValue::Number(value)) => payload.write_u16(value as u16),
            (FieldType::Int, FieldValue::Number(value)) => payload.write_i32(value as i32),
            (FieldType::String, FieldValue::Text(text)) => payload.write_string(&text),
            (FieldType::Bytes, FieldValue::Bytes(bytes)) => payload.write_bytes(&bytes),
            _ => return Err(mismatch()),
        }
    }
    if payload.len() > u16::MAX as usize {
        return Err(EncodeError::PayloadTooLarge {
            message: name.to_string(),
            len: payload.len(),
        });
    }
    let mut frame = PacketWriter::with_capacity(payload.len() + 3);
    frame.write_u8(layout.opcode);
    frame.write_u16(payload.len() as u16);
    frame.write_bytes(payload.as_slice());
    Ok(frame.into_vec())
}

/// Opcode and payload of a frame, checking the declared length.
pub fn split_frame(frame: &[u8]) -> Result<(u8, &[u8]), DecodeError> {
    let mut reader = PacketReader::new(frame);
    let opcode = reader.read_u8().ok_or(DecodeError::LengthMismatch {
        expected: 3,
        found: frame.len(),
    })?;
    let len = reader.read_u16().ok_or(DecodeError::LengthMismatch {
        expected: 3,
        found: frame.len(),
    })? as usize;
    if reader.remaining() != len {
        return Err(DecodeError::LengthMismatch {
            expected: len,
            found: reader.remaining(),
        });
    }
    let payload = reader.read_bytes(len).unwrap_or(&[]);
    Ok((opcode, payload))
}

pub fn decode(
    layouts: &PacketLayouts,
    name: &str,
    frame: &[u8],
    decoder: &mut dyn MessageDecoder,
) -> Result<(), DecodeError> {
    let layout = layouts
        .get(name)
        .ok_or_else(|| DecodeError::UnknownLayout(name.to_string()))?;
    let (opcode, payload) = split_frame(frame)?;
    if opcode != layout.opcode {
        return Err(DecodeError::Invalid {
            message: name.to_string(),
            reason: format!("opcode {} does not match {}", opcode, layout.opcode),
        });
    }
    let mut reader = PacketReader::new(payload);
    for field in &layout.fields {
        decoder.read_field(&field.key, field.kind, &mut reader)?;
    }
    if reader.remaining() != 0 {
        return Err(DecodeError::Invalid {
            message: name.to_string(),
            reason: format!("{} trailing bytes", reader.remaining()),
        });
    }
    Ok(())
}

/// Reads a numeric field according to its declared width.
pub fn read_number(kind: FieldType, reader: &mut PacketReader<'_>) -> Option<i64> {
    match kind {
        FieldType::Byte => reader.read_u8().map(i64::from),
        FieldType::Short => reader.read_u16().map(i64::from),
        FieldType::Int => reader.read_i32().map(i64::from),
        FieldType::String | FieldType::Bytes => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Sample {
        value: i32,
    }

    impl MessageEncoder for Sample {
        fn layout_name(&self) -> &'static str {
            "sample"
        }

        fn extract(&self, key: &str) -> Result<FieldValue, EncodeError> {
            match key {
                "value" => Ok(FieldValue::Number(i64::from(self.value))),
                _ => Err(unhandled_key("sample", key)),
            }
        }
    }

    #[derive(Default)]
    struct SampleDecoder {
        value: Option<i64>,
    }

    impl MessageDecoder for SampleDecoder {
        fn read_field(
            &mut self,
            key: &str,
            kind: FieldType,
            reader: &mut PacketReader<'_>,
        ) -> Result<(), DecodeError> {
            match key {
                "value" => {
                    self.value = Some(read_number(kind, reader).ok_or_else(|| truncated("sample", key))?);
                    Ok(())
                }
                _ => Err(unhandled_decode_key("sample", key)),
            }
        }
    }

    fn layouts(fields: &str) -> PacketLayouts {
        PacketLayouts::parse(&format!("- {{ name: sample, opcode: 9, fields: [{}] }}\n", fields))
            .expect("layouts")
    }

    #[test]
    fn frame_carries_opcode_and_length() {
        let frame = encode(&layouts("{ key: value, type: int }"), &Sample { value: -2 }).expect("encode");
        assert_eq!(frame, vec![9, 0, 4, 0xff, 0xff, 0xff, 0xfe]);
        let mut decoder = SampleDecoder::default();
        decode(&layouts("{ key: value, type: int }"), "sample", &frame, &mut decoder).expect("decode");
        assert_eq!(decoder.value, Some(-2));
    }

    #[test]
    fn unknown_key_is_fatal() {
        let err = encode(
            &layouts("{ key: value, type: int }, { key: colour, type: byte }"),
            &Sample { value: 1 },
        )
        .expect_err("must fail");
        assert_eq!(
            err,
            EncodeError::UnhandledKey {
                message: "sample".to_string(),
                key: "colour".to_string()
            }
        );
    }

    #[test]
    fn value_type_must_match_layout() {
        let err = encode(&layouts("{ key: value, type: string }"), &Sample { value: 1 }).expect_err("must fail");
        assert!(matches!(err, EncodeError::TypeMismatch { .. }));
    }

    #[test]
    fn length_mismatch_is_reported() {
        assert!(matches!(
            split_frame(&[9, 0, 4, 1]),
            Err(DecodeError::LengthMismatch { expected: 4, found: 1 })
        ));
    }
}
