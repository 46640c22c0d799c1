//! Information element codecs
//!
//! The scalar payload kinds carried by information objects: normalized and
//! scaled values, short floats, binary counter readings, command fields and
//! their qualifiers. All multi-byte fields are little-endian.

use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};

use crate::error::CodecError;
use crate::types::{DoublePointValue, StepCommandValue};

fn check(src: &[u8], offset: usize, size: usize) -> Result<(), CodecError> {
    if offset + size > src.len() {
        return Err(CodecError::Truncated);
    }
    Ok(())
}

/// Normalized value: an i16 representing the range [-1, 1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NormalizedValue(pub i16);

impl NormalizedValue {
    pub const SIZE: usize = 2;

    /// Clamp a float in [-1, 1) to the closest representable value
    pub fn from_f32(value: f32) -> Self {
        let scaled = (value * 32768.0).round();
        Self(scaled.clamp(-32768.0, 32767.0) as i16)
    }

    /// Value as a float in [-1, 1)
    pub fn to_f32(self) -> f32 {
        f32::from(self.0) / 32768.0
    }

    pub fn encode(&self, dst: &mut [u8], offset: usize) -> Result<usize, CodecError> {
        check(dst, offset, Self::SIZE)?;
        LittleEndian::write_i16(&mut dst[offset..], self.0);
        Ok(offset + Self::SIZE)
    }

    pub fn decode(src: &[u8], offset: usize) -> Result<(Self, usize), CodecError> {
        check(src, offset, Self::SIZE)?;
        Ok((
            Self(LittleEndian::read_i16(&src[offset..])),
            offset + Self::SIZE,
        ))
    }
}

pub(crate) fn encode_i16(value: i16, dst: &mut [u8], offset: usize) -> Result<usize, CodecError> {
    check(dst, offset, 2)?;
    LittleEndian::write_i16(&mut dst[offset..], value);
    Ok(offset + 2)
}

pub(crate) fn decode_i16(src: &[u8], offset: usize) -> Result<(i16, usize), CodecError> {
    check(src, offset, 2)?;
    Ok((LittleEndian::read_i16(&src[offset..]), offset + 2))
}

pub(crate) fn encode_f32(value: f32, dst: &mut [u8], offset: usize) -> Result<usize, CodecError> {
    check(dst, offset, 4)?;
    LittleEndian::write_f32(&mut dst[offset..], value);
    Ok(offset + 4)
}

pub(crate) fn decode_f32(src: &[u8], offset: usize) -> Result<(f32, usize), CodecError> {
    check(src, offset, 4)?;
    Ok((LittleEndian::read_f32(&src[offset..]), offset + 4))
}

pub(crate) fn encode_u32(value: u32, dst: &mut [u8], offset: usize) -> Result<usize, CodecError> {
    check(dst, offset, 4)?;
    LittleEndian::write_u32(&mut dst[offset..], value);
    Ok(offset + 4)
}

pub(crate) fn decode_u32(src: &[u8], offset: usize) -> Result<(u32, usize), CodecError> {
    check(src, offset, 4)?;
    Ok((LittleEndian::read_u32(&src[offset..]), offset + 4))
}

pub(crate) fn encode_u16(value: u16, dst: &mut [u8], offset: usize) -> Result<usize, CodecError> {
    check(dst, offset, 2)?;
    LittleEndian::write_u16(&mut dst[offset..], value);
    Ok(offset + 2)
}

pub(crate) fn decode_u16(src: &[u8], offset: usize) -> Result<(u16, usize), CodecError> {
    check(src, offset, 2)?;
    Ok((LittleEndian::read_u16(&src[offset..]), offset + 2))
}

pub(crate) fn encode_u24(value: u32, dst: &mut [u8], offset: usize) -> Result<usize, CodecError> {
    check(dst, offset, 3)?;
    LittleEndian::write_u24(&mut dst[offset..], value & 0x00ff_ffff);
    Ok(offset + 3)
}

pub(crate) fn decode_u24(src: &[u8], offset: usize) -> Result<(u32, usize), CodecError> {
    check(src, offset, 3)?;
    Ok((LittleEndian::read_u24(&src[offset..]), offset + 3))
}

/// Binary counter reading (BCR): counter value plus sequence and flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BinaryCounterReading {
    /// Counter value
    pub value: i32,
    /// Sequence number of the freeze operation (0..=31)
    pub sequence: u8,
    /// Counter overflowed since the last reading
    pub carry: bool,
    /// Counter was adjusted since the last reading
    pub adjusted: bool,
    /// Reading is invalid
    pub invalid: bool,
}

impl BinaryCounterReading {
    pub const SIZE: usize = 5;

    pub fn new(value: i32, sequence: u8) -> Self {
        Self {
            value,
            sequence,
            carry: false,
            adjusted: false,
            invalid: false,
        }
    }

    pub fn encode(&self, dst: &mut [u8], offset: usize) -> Result<usize, CodecError> {
        check(dst, offset, Self::SIZE)?;
        LittleEndian::write_i32(&mut dst[offset..], self.value);
        let mut b4 = self.sequence & 0x1f;
        if self.carry {
            b4 |= 0x20;
        }
        if self.adjusted {
            b4 |= 0x40;
        }
        if self.invalid {
            b4 |= 0x80;
        }
        dst[offset + 4] = b4;
        Ok(offset + Self::SIZE)
    }

    pub fn decode(src: &[u8], offset: usize) -> Result<(Self, usize), CodecError> {
        check(src, offset, Self::SIZE)?;
        let value = LittleEndian::read_i32(&src[offset..]);
        let b4 = src[offset + 4];
        Ok((
            Self {
                value,
                sequence: b4 & 0x1f,
                carry: b4 & 0x20 != 0,
                adjusted: b4 & 0x40 != 0,
                invalid: b4 & 0x80 != 0,
            },
            offset + Self::SIZE,
        ))
    }
}

/// Single command (SCO)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SingleCommand {
    /// Commanded state
    pub state: bool,
    /// Qualifier of command (QU, 0..=31)
    pub qualifier: u8,
    /// Select (true) or execute (false)
    pub select: bool,
}

impl SingleCommand {
    /// Direct execute command with default qualifier
    pub fn execute(state: bool) -> Self {
        Self {
            state,
            qualifier: 0,
            select: false,
        }
    }

    pub fn from_byte(value: u8) -> Self {
        Self {
            state: value & 0x01 != 0,
            qualifier: (value >> 2) & 0x1f,
            select: value & 0x80 != 0,
        }
    }

    pub fn to_byte(self) -> u8 {
        let mut value = 0u8;
        if self.state {
            value |= 0x01;
        }
        value |= (self.qualifier & 0x1f) << 2;
        if self.select {
            value |= 0x80;
        }
        value
    }
}

/// Double command (DCO)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoubleCommand {
    /// Commanded state
    pub state: DoublePointValue,
    /// Qualifier of command (QU, 0..=31)
    pub qualifier: u8,
    /// Select (true) or execute (false)
    pub select: bool,
}

impl DoubleCommand {
    pub fn execute(state: DoublePointValue) -> Self {
        Self {
            state,
            qualifier: 0,
            select: false,
        }
    }

    pub fn from_byte(value: u8) -> Self {
        Self {
            state: DoublePointValue::from_bits(value),
            qualifier: (value >> 2) & 0x1f,
            select: value & 0x80 != 0,
        }
    }

    pub fn to_byte(self) -> u8 {
        let mut value = self.state.to_bits();
        value |= (self.qualifier & 0x1f) << 2;
        if self.select {
            value |= 0x80;
        }
        value
    }
}

/// Regulating step command (RCO)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepCommand {
    /// Commanded step direction
    pub step: StepCommandValue,
    /// Qualifier of command (QU, 0..=31)
    pub qualifier: u8,
    /// Select (true) or execute (false)
    pub select: bool,
}

impl StepCommand {
    pub fn execute(step: StepCommandValue) -> Self {
        Self {
            step,
            qualifier: 0,
            select: false,
        }
    }

    pub fn from_byte(value: u8) -> Self {
        Self {
            step: StepCommandValue::from_bits(value),
            qualifier: (value >> 2) & 0x1f,
            select: value & 0x80 != 0,
        }
    }

    pub fn to_byte(self) -> u8 {
        let mut value = self.step.to_bits();
        value |= (self.qualifier & 0x1f) << 2;
        if self.select {
            value |= 0x80;
        }
        value
    }
}

/// Qualifier of set-point command (QOS)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SetpointQualifier {
    /// Qualifier value (QL, 0..=127)
    pub ql: u8,
    /// Select (true) or execute (false)
    pub select: bool,
}

impl SetpointQualifier {
    pub fn from_byte(value: u8) -> Self {
        Self {
            ql: value & 0x7f,
            select: value & 0x80 != 0,
        }
    }

    pub fn to_byte(self) -> u8 {
        let mut value = self.ql & 0x7f;
        if self.select {
            value |= 0x80;
        }
        value
    }
}

/// Step position value (VTI): -64..=63 plus transient flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StepPosition {
    /// Position value (-64..=63)
    pub value: i8,
    /// Equipment is in transient state
    pub transient: bool,
}

impl StepPosition {
    pub fn from_byte(value: u8) -> Self {
        // sign-extend the 7 bit two's complement value
        let raw = value & 0x7f;
        let signed = if raw & 0x40 != 0 {
            (raw | 0x80) as i8
        } else {
            raw as i8
        };
        Self {
            value: signed,
            transient: value & 0x80 != 0,
        }
    }

    pub fn to_byte(self) -> u8 {
        let mut byte = (self.value as u8) & 0x7f;
        if self.transient {
            byte |= 0x80;
        }
        byte
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_value_scale() {
        assert_eq!(NormalizedValue::from_f32(0.0).0, 0);
        assert_eq!(NormalizedValue::from_f32(-1.0).0, -32768);
        assert_eq!(NormalizedValue::from_f32(0.5).0, 16384);
        // +1.0 is not representable and clamps to the maximum
        assert_eq!(NormalizedValue::from_f32(1.0).0, 32767);
        let value = NormalizedValue(16384);
        assert!((value.to_f32() - 0.5).abs() < 1.0 / 65536.0);
    }

    #[test]
    fn normalized_value_wire_format() {
        let mut buf = [0u8; 2];
        NormalizedValue(0x1234).encode(&mut buf, 0).unwrap();
        assert_eq!(buf, [0x34, 0x12]);
        let (decoded, _) = NormalizedValue::decode(&buf, 0).unwrap();
        assert_eq!(decoded.0, 0x1234);
    }

    #[test]
    fn short_float_wire_format() {
        let mut buf = [0u8; 4];
        encode_f32(3.14, &mut buf, 0).unwrap();
        assert_eq!(buf, [0xc3, 0xf5, 0x48, 0x40]);
        let (decoded, _) = decode_f32(&buf, 0).unwrap();
        assert_eq!(decoded, 3.14);
    }

    #[test]
    fn counter_reading_flags() {
        let bcr = BinaryCounterReading {
            value: -5,
            sequence: 17,
            carry: true,
            adjusted: false,
            invalid: true,
        };
        let mut buf = [0u8; 5];
        bcr.encode(&mut buf, 0).unwrap();
        assert_eq!(buf[..4], [0xfb, 0xff, 0xff, 0xff]);
        assert_eq!(buf[4], 17 | 0x20 | 0x80);
        let (decoded, _) = BinaryCounterReading::decode(&buf, 0).unwrap();
        assert_eq!(decoded, bcr);
    }

    #[test]
    fn single_command_byte() {
        let cmd = SingleCommand {
            state: true,
            qualifier: 1,
            select: true,
        };
        assert_eq!(cmd.to_byte(), 0x01 | 0x04 | 0x80);
        assert_eq!(SingleCommand::from_byte(cmd.to_byte()), cmd);
        assert_eq!(SingleCommand::execute(true).to_byte(), 0x01);
    }

    #[test]
    fn double_command_byte() {
        let cmd = DoubleCommand::execute(DoublePointValue::On);
        assert_eq!(cmd.to_byte(), 0x02);
        let decoded = DoubleCommand::from_byte(0x82);
        assert_eq!(decoded.state, DoublePointValue::On);
        assert!(decoded.select);
    }

    #[test]
    fn step_command_byte() {
        let cmd = StepCommand::execute(StepCommandValue::Higher);
        assert_eq!(cmd.to_byte(), 0x02);
        assert_eq!(StepCommand::from_byte(0x02), cmd);
    }

    #[test]
    fn step_position_sign_extension() {
        assert_eq!(StepPosition::from_byte(0x3f).value, 63);
        assert_eq!(StepPosition::from_byte(0x40).value, -64);
        assert_eq!(StepPosition::from_byte(0x7f).value, -1);
        let pos = StepPosition {
            value: -3,
            transient: true,
        };
        assert_eq!(StepPosition::from_byte(pos.to_byte()), pos);
    }

    #[test]
    fn setpoint_qualifier_byte() {
        let q = SetpointQualifier {
            ql: 5,
            select: true,
        };
        assert_eq!(q.to_byte(), 0x85);
        assert_eq!(SetpointQualifier::from_byte(0x85), q);
    }
}
