//! FT1.2 frame codec
//!
//! The CS101 link layer frame formats: the fixed-length frame for control
//! and acknowledgement, the variable-length frame for user data and the
//! single character acknowledgement 0xE5. The checksum is the 8 bit modular
//! sum over control, address and payload.

use bytes::{Buf, BytesMut};

use crate::constants::MAX_FRAME_SIZE;
use crate::error::{CodecError, ProtocolError};
use crate::frame::Frame;

pub const START_FIXED: u8 = 0x10;
pub const START_VARIABLE: u8 = 0x68;
pub const END_FRAME: u8 = 0x16;
pub const SINGLE_CHAR_ACK: u8 = 0xe5;

/// Function codes sent by the primary station
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PrimaryFunction {
    ResetRemoteLink = 0,
    ResetUserProcess = 1,
    TestFunction = 2,
    UserDataConfirmed = 3,
    UserDataNoReply = 4,
    RequestLinkStatus = 9,
    RequestUserData1 = 10,
    RequestUserData2 = 11,
}

impl PrimaryFunction {
    pub fn from_bits(value: u8) -> Option<Self> {
        Some(match value & 0x0f {
            0 => Self::ResetRemoteLink,
            1 => Self::ResetUserProcess,
            2 => Self::TestFunction,
            3 => Self::UserDataConfirmed,
            4 => Self::UserDataNoReply,
            9 => Self::RequestLinkStatus,
            10 => Self::RequestUserData1,
            11 => Self::RequestUserData2,
            _ => return None,
        })
    }
}

/// Function codes sent by a secondary station
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SecondaryFunction {
    Ack = 0,
    Nack = 1,
    UserData = 8,
    NackNoData = 9,
    StatusOfLink = 11,
    LinkNotFunctioning = 14,
    LinkNotImplemented = 15,
}

impl SecondaryFunction {
    pub fn from_bits(value: u8) -> Option<Self> {
        Some(match value & 0x0f {
            0 => Self::Ack,
            1 => Self::Nack,
            8 => Self::UserData,
            9 => Self::NackNoData,
            11 => Self::StatusOfLink,
            14 => Self::LinkNotFunctioning,
            15 => Self::LinkNotImplemented,
            _ => return None,
        })
    }
}

/// Decoded FT1.2 control byte.
///
/// Bit 6 (PRM) selects the direction; bit 5 carries FCB from the primary and
/// ACD from a secondary, bit 4 carries FCV from the primary and DFC from a
/// secondary. The low nibble is the function code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkControl {
    pub prm: bool,
    pub fcb_acd: bool,
    pub fcv_dfc: bool,
    pub function: u8,
}

impl LinkControl {
    pub fn primary(function: PrimaryFunction, fcb: bool, fcv: bool) -> Self {
        Self {
            prm: true,
            fcb_acd: fcb,
            fcv_dfc: fcv,
            function: function as u8,
        }
    }

    pub fn secondary(function: SecondaryFunction, acd: bool, dfc: bool) -> Self {
        Self {
            prm: false,
            fcb_acd: acd,
            fcv_dfc: dfc,
            function: function as u8,
        }
    }

    pub fn from_byte(value: u8) -> Self {
        Self {
            prm: value & 0x40 != 0,
            fcb_acd: value & 0x20 != 0,
            fcv_dfc: value & 0x10 != 0,
            function: value & 0x0f,
        }
    }

    pub fn to_byte(self) -> u8 {
        let mut value = self.function & 0x0f;
        if self.prm {
            value |= 0x40;
        }
        if self.fcb_acd {
            value |= 0x20;
        }
        if self.fcv_dfc {
            value |= 0x10;
        }
        value
    }
}

/// One FT1.2 frame
#[derive(Debug, Clone, PartialEq)]
pub enum Ft12Frame {
    /// Single character positive acknowledgement
    SingleCharAck,
    /// Fixed-length frame: control and address only
    Fixed { control: LinkControl, address: u16 },
    /// Variable-length frame carrying link user data (an encoded ASDU)
    Variable {
        control: LinkControl,
        address: u16,
        payload: Vec<u8>,
    },
}

fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}

fn push_address(
    frame: &mut Frame,
    address: u16,
    address_size: u8,
) -> Result<(), CodecError> {
    frame.push(address as u8)?;
    if address_size == 2 {
        frame.push((address >> 8) as u8)?;
    }
    Ok(())
}

impl Ft12Frame {
    pub fn control(&self) -> Option<LinkControl> {
        match self {
            Self::SingleCharAck => None,
            Self::Fixed { control, .. } | Self::Variable { control, .. } => Some(*control),
        }
    }

    pub fn address(&self) -> Option<u16> {
        match self {
            Self::SingleCharAck => None,
            Self::Fixed { address, .. } | Self::Variable { address, .. } => Some(*address),
        }
    }

    /// Encode with the configured link address width
    pub fn encode(&self, address_size: u8) -> Result<Vec<u8>, CodecError> {
        if !matches!(address_size, 1 | 2) {
            return Err(CodecError::InvalidWidth(address_size));
        }
        let mut frame = Frame::with_limit(MAX_FRAME_SIZE);
        match self {
            Self::SingleCharAck => {
                frame.push(SINGLE_CHAR_ACK)?;
            }
            Self::Fixed { control, address } => {
                frame.push(START_FIXED)?;
                frame.push(control.to_byte())?;
                push_address(&mut frame, *address, address_size)?;
                let body = &frame.as_slice()[1..];
                let cs = checksum(body);
                frame.push(cs)?;
                frame.push(END_FRAME)?;
            }
            Self::Variable {
                control,
                address,
                payload,
            } => {
                let length = 1 + address_size as usize + payload.len();
                if length > 255 {
                    return Err(CodecError::Overflow);
                }
                frame.push(START_VARIABLE)?;
                frame.push(length as u8)?;
                frame.push(length as u8)?;
                frame.push(START_VARIABLE)?;
                frame.push(control.to_byte())?;
                push_address(&mut frame, *address, address_size)?;
                frame.extend(payload)?;
                let body = &frame.as_slice()[4..];
                let cs = checksum(body);
                frame.push(cs)?;
                frame.push(END_FRAME)?;
            }
        }
        Ok(frame.as_slice().to_vec())
    }
}

/// Incremental FT1.2 parser.
///
/// Leading bytes that cannot start a frame are discarded silently (line
/// noise); a frame with a bad checksum or framing byte is dropped and
/// reported so the station can log it.
#[derive(Debug)]
pub struct Ft12Parser {
    address_size: u8,
    buf: BytesMut,
}

impl Ft12Parser {
    pub fn new(address_size: u8) -> Self {
        Self {
            address_size,
            buf: BytesMut::with_capacity(512),
        }
    }

    pub fn feed(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Take the next complete frame, if one is buffered
    pub fn next_frame(&mut self) -> Result<Option<Ft12Frame>, ProtocolError> {
        // resynchronize on a plausible start byte
        while !self.buf.is_empty()
            && !matches!(self.buf[0], START_FIXED | START_VARIABLE | SINGLE_CHAR_ACK)
        {
            self.buf.advance(1);
        }
        if self.buf.is_empty() {
            return Ok(None);
        }
        let addr = self.address_size as usize;
        match self.buf[0] {
            SINGLE_CHAR_ACK => {
                self.buf.advance(1);
                Ok(Some(Ft12Frame::SingleCharAck))
            }
            START_FIXED => {
                let total = 4 + addr;
                if self.buf.len() < total {
                    return Ok(None);
                }
                let frame = self.buf[..total].to_vec();
                self.buf.advance(total);
                let body = &frame[1..1 + 1 + addr];
                if frame[total - 1] != END_FRAME || checksum(body) != frame[total - 2] {
                    return Err(ProtocolError::UnexpectedFormat);
                }
                let control = LinkControl::from_byte(frame[1]);
                let address = decode_address(&frame[2..2 + addr]);
                Ok(Some(Ft12Frame::Fixed { control, address }))
            }
            START_VARIABLE => {
                if self.buf.len() < 4 {
                    return Ok(None);
                }
                let length = self.buf[1] as usize;
                if self.buf[1] != self.buf[2] || self.buf[3] != START_VARIABLE || length < 1 + addr
                {
                    self.buf.advance(1);
                    return Err(ProtocolError::UnexpectedFormat);
                }
                let total = 4 + length + 2;
                if self.buf.len() < total {
                    return Ok(None);
                }
                let frame = self.buf[..total].to_vec();
                self.buf.advance(total);
                let body = &frame[4..4 + length];
                if frame[total - 1] != END_FRAME || checksum(body) != frame[total - 2] {
                    return Err(ProtocolError::UnexpectedFormat);
                }
                let control = LinkControl::from_byte(frame[4]);
                let address = decode_address(&frame[5..5 + addr]);
                let payload = frame[5 + addr..4 + length].to_vec();
                Ok(Some(Ft12Frame::Variable {
                    control,
                    address,
                    payload,
                }))
            }
            _ => Ok(None),
        }
    }
}

fn decode_address(bytes: &[u8]) -> u16 {
    if bytes.len() == 2 {
        u16::from_le_bytes([bytes[0], bytes[1]])
    } else {
        u16::from(bytes[0])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_frame_wire_format() {
        let frame = Ft12Frame::Fixed {
            control: LinkControl::primary(PrimaryFunction::RequestLinkStatus, false, false),
            address: 3,
        };
        let bytes = frame.encode(1).unwrap();
        // 0x49 = PRM | function 9
        assert_eq!(bytes, vec![0x10, 0x49, 0x03, 0x4c, 0x16]);
    }

    #[test]
    fn variable_frame_wire_format() {
        let frame = Ft12Frame::Variable {
            control: LinkControl::primary(PrimaryFunction::UserDataConfirmed, true, true),
            address: 1,
            payload: vec![0xaa, 0xbb],
        };
        let bytes = frame.encode(1).unwrap();
        // control 0x73 = PRM | FCB | FCV | function 3, L = 1 + 1 + 2
        let cs = 0x73u8
            .wrapping_add(0x01)
            .wrapping_add(0xaa)
            .wrapping_add(0xbb);
        assert_eq!(
            bytes,
            vec![0x68, 0x04, 0x04, 0x68, 0x73, 0x01, 0xaa, 0xbb, cs, 0x16]
        );
    }

    #[test]
    fn parser_round_trips_frames() {
        for address_size in [1u8, 2] {
            let frames = vec![
                Ft12Frame::SingleCharAck,
                Ft12Frame::Fixed {
                    control: LinkControl::secondary(SecondaryFunction::Ack, true, false),
                    address: 0x1234 & if address_size == 1 { 0xff } else { 0xffff },
                },
                Ft12Frame::Variable {
                    control: LinkControl::primary(PrimaryFunction::UserDataNoReply, false, false),
                    address: 7,
                    payload: vec![1, 2, 3, 4, 5],
                },
            ];
            let mut parser = Ft12Parser::new(address_size);
            for frame in &frames {
                parser.feed(&frame.encode(address_size).unwrap());
            }
            for frame in &frames {
                assert_eq!(parser.next_frame().unwrap().as_ref(), Some(frame));
            }
            assert_eq!(parser.next_frame().unwrap(), None);
        }
    }

    #[test]
    fn parser_skips_line_noise() {
        let mut parser = Ft12Parser::new(1);
        let frame = Ft12Frame::Fixed {
            control: LinkControl::secondary(SecondaryFunction::StatusOfLink, false, false),
            address: 1,
        };
        parser.feed(&[0x00, 0xff, 0x42]);
        parser.feed(&frame.encode(1).unwrap());
        assert_eq!(parser.next_frame().unwrap(), Some(frame));
    }

    #[test]
    fn bad_checksum_is_reported() {
        let mut parser = Ft12Parser::new(1);
        let mut bytes = Ft12Frame::Fixed {
            control: LinkControl::secondary(SecondaryFunction::Ack, false, false),
            address: 1,
        }
        .encode(1)
        .unwrap();
        bytes[3] ^= 0xff; // corrupt the checksum
        parser.feed(&bytes);
        assert_eq!(
            parser.next_frame(),
            Err(ProtocolError::UnexpectedFormat)
        );
        // the parser recovers for subsequent frames
        let good = Ft12Frame::SingleCharAck;
        parser.feed(&good.encode(1).unwrap());
        assert_eq!(parser.next_frame().unwrap(), Some(good));
    }

    #[test]
    fn fragmented_variable_frame() {
        let frame = Ft12Frame::Variable {
            control: LinkControl::secondary(SecondaryFunction::UserData, true, false),
            address: 9,
            payload: vec![0u8; 40],
        };
        let bytes = frame.encode(2).unwrap();
        let mut parser = Ft12Parser::new(2);
        parser.feed(&bytes[..5]);
        assert_eq!(parser.next_frame().unwrap(), None);
        parser.feed(&bytes[5..]);
        assert_eq!(parser.next_frame().unwrap(), Some(frame));
    }

    #[test]
    fn control_byte_bits() {
        let control = LinkControl::primary(PrimaryFunction::UserDataConfirmed, true, true);
        assert_eq!(control.to_byte(), 0x40 | 0x20 | 0x10 | 0x03);
        let decoded = LinkControl::from_byte(0x73);
        assert_eq!(decoded, control);
        // reserved bit 7 is ignored
        assert_eq!(LinkControl::from_byte(0xf3), control);
    }

    #[test]
    fn oversized_payload_is_rejected() {
        let frame = Ft12Frame::Variable {
            control: LinkControl::primary(PrimaryFunction::UserDataConfirmed, false, true),
            address: 1,
            payload: vec![0u8; 255],
        };
        assert_eq!(frame.encode(1), Err(CodecError::Overflow));
    }
}
