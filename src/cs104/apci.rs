//! APCI frame typing and codec
//!
//! The CS104 frame header: start byte, length and a 4 byte control field
//! selecting I, S or U format. The reassembler turns the raw byte stream of
//! the transport back into complete APDUs; the engine performs its own
//! length-prefix reassembly and makes no framing assumptions about TCP.

use bytes::{Buf, BytesMut};

use crate::asdu::Asdu;
use crate::constants::{APCI_SIZE, APCI_START, MAX_APDU_LENGTH};
use crate::error::{CodecError, ProtocolError};
use crate::frame::Frame;

/// U-format control functions (one-hot in the first control byte)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum UFrameFunction {
    StartDtAct = 0x07,
    StartDtCon = 0x0b,
    StopDtAct = 0x13,
    StopDtCon = 0x23,
    TestFrAct = 0x43,
    TestFrCon = 0x83,
}

impl UFrameFunction {
    pub fn from_byte(value: u8) -> Option<Self> {
        Some(match value {
            0x07 => Self::StartDtAct,
            0x0b => Self::StartDtCon,
            0x13 => Self::StopDtAct,
            0x23 => Self::StopDtCon,
            0x43 => Self::TestFrAct,
            0x83 => Self::TestFrCon,
            _ => return None,
        })
    }

    pub fn to_byte(self) -> u8 {
        self as u8
    }
}

/// APCI control field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Apci {
    /// Information transfer format, carries an ASDU
    I { send_seq: u16, recv_seq: u16 },
    /// Supervisory format, acknowledges received I-frames
    S { recv_seq: u16 },
    /// Unnumbered control format
    U(UFrameFunction),
}

/// Decode the control field of a complete APDU
pub fn decode_apci(apdu: &[u8]) -> Result<Apci, ProtocolError> {
    if apdu.len() < APCI_SIZE || apdu[0] != APCI_START {
        return Err(ProtocolError::UnexpectedFormat);
    }
    let c1 = apdu[2];
    if c1 & 0x01 == 0 {
        let send_seq = (u16::from(apdu[3]) << 7) | (u16::from(c1) >> 1);
        let recv_seq = (u16::from(apdu[5]) << 7) | (u16::from(apdu[4]) >> 1);
        Ok(Apci::I { send_seq, recv_seq })
    } else if c1 & 0x03 == 0x01 {
        let recv_seq = (u16::from(apdu[5]) << 7) | (u16::from(apdu[4]) >> 1);
        Ok(Apci::S { recv_seq })
    } else {
        let function = UFrameFunction::from_byte(c1).ok_or(ProtocolError::UnexpectedFormat)?;
        Ok(Apci::U(function))
    }
}

/// Encode an I-frame APDU carrying `asdu`
pub fn encode_i_frame(
    send_seq: u16,
    recv_seq: u16,
    asdu: &Asdu,
) -> Result<Vec<u8>, CodecError> {
    let mut frame = Frame::with_limit(MAX_APDU_LENGTH + 2);
    frame.push(APCI_START)?;
    frame.push(0)?; // length back-patched below
    frame.push(((send_seq << 1) & 0xfe) as u8)?;
    frame.push((send_seq >> 7) as u8)?;
    frame.push(((recv_seq << 1) & 0xfe) as u8)?;
    frame.push((recv_seq >> 7) as u8)?;
    asdu.encode(&mut frame)?;
    frame.set(1, (frame.len() - 2) as u8)?;
    Ok(frame.as_slice().to_vec())
}

/// Encode an S-frame APDU acknowledging up to `recv_seq`
pub fn encode_s_frame(recv_seq: u16) -> Vec<u8> {
    vec![
        APCI_START,
        4,
        0x01,
        0x00,
        ((recv_seq << 1) & 0xfe) as u8,
        (recv_seq >> 7) as u8,
    ]
}

/// Encode a U-frame APDU
pub fn encode_u_frame(function: UFrameFunction) -> Vec<u8> {
    vec![APCI_START, 4, function.to_byte(), 0x00, 0x00, 0x00]
}

/// Length-prefix reassembler for the receive path
#[derive(Debug, Default)]
pub struct ApduAssembler {
    buf: BytesMut,
}

impl ApduAssembler {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(512),
        }
    }

    /// Feed raw bytes from the transport
    pub fn feed(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Take the next complete APDU, if one is buffered.
    ///
    /// A malformed start byte or an impossible length field is a protocol
    /// violation and closes the connection.
    pub fn next_apdu(&mut self) -> Result<Option<Vec<u8>>, ProtocolError> {
        if self.buf.len() < 2 {
            return Ok(None);
        }
        if self.buf[0] != APCI_START {
            return Err(ProtocolError::UnexpectedFormat);
        }
        let length = self.buf[1] as usize;
        if !(4..=MAX_APDU_LENGTH).contains(&length) {
            return Err(ProtocolError::UnexpectedFormat);
        }
        if self.buf.len() < length + 2 {
            return Ok(None);
        }
        let apdu = self.buf[..length + 2].to_vec();
        self.buf.advance(length + 2);
        Ok(Some(apdu))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppLayerParameters;
    use crate::information_object::{InformationElement, InformationObject};
    use crate::types::{CauseOfTransmission, QualityDescriptor};

    fn sample_asdu() -> Asdu {
        let mut asdu = Asdu::message(
            AppLayerParameters::cs104(),
            CauseOfTransmission::Spontaneous,
            1,
        );
        asdu.add_information_object(&InformationObject::new(
            100,
            InformationElement::SinglePoint {
                value: true,
                quality: QualityDescriptor::GOOD,
            },
        ))
        .unwrap();
        asdu
    }

    #[test]
    fn i_frame_sequence_numbers() {
        let bytes = encode_i_frame(5, 3, &sample_asdu()).unwrap();
        assert_eq!(bytes[0], 0x68);
        assert_eq!(bytes[1] as usize, bytes.len() - 2);
        assert_eq!(bytes[2], 5 << 1);
        assert_eq!(bytes[3], 0);
        assert_eq!(bytes[4], 3 << 1);
        assert_eq!(bytes[5], 0);
        assert_eq!(
            decode_apci(&bytes).unwrap(),
            Apci::I {
                send_seq: 5,
                recv_seq: 3
            }
        );
    }

    #[test]
    fn sequence_numbers_use_15_bits() {
        let bytes = encode_i_frame(0x7fff, 0x4000, &sample_asdu()).unwrap();
        assert_eq!(
            decode_apci(&bytes).unwrap(),
            Apci::I {
                send_seq: 0x7fff,
                recv_seq: 0x4000
            }
        );
    }

    #[test]
    fn s_frame_round_trip() {
        let bytes = encode_s_frame(0x1234);
        assert_eq!(bytes.len(), 6);
        assert_eq!(decode_apci(&bytes).unwrap(), Apci::S { recv_seq: 0x1234 });
    }

    #[test]
    fn u_frame_round_trip() {
        for function in [
            UFrameFunction::StartDtAct,
            UFrameFunction::StartDtCon,
            UFrameFunction::StopDtAct,
            UFrameFunction::StopDtCon,
            UFrameFunction::TestFrAct,
            UFrameFunction::TestFrCon,
        ] {
            let bytes = encode_u_frame(function);
            assert_eq!(decode_apci(&bytes).unwrap(), Apci::U(function));
        }
    }

    #[test]
    fn unknown_u_function_is_rejected() {
        let bytes = [0x68, 4, 0xff, 0, 0, 0];
        assert_eq!(decode_apci(&bytes), Err(ProtocolError::UnexpectedFormat));
    }

    #[test]
    fn assembler_handles_fragmentation() {
        let mut assembler = ApduAssembler::new();
        let frame = encode_u_frame(UFrameFunction::TestFrAct);
        assembler.feed(&frame[..3]);
        assert_eq!(assembler.next_apdu().unwrap(), None);
        assembler.feed(&frame[3..]);
        assert_eq!(assembler.next_apdu().unwrap(), Some(frame.clone()));
        assert_eq!(assembler.next_apdu().unwrap(), None);
    }

    #[test]
    fn assembler_handles_coalesced_frames() {
        let mut assembler = ApduAssembler::new();
        let one = encode_s_frame(1);
        let two = encode_u_frame(UFrameFunction::TestFrCon);
        let mut stream = one.clone();
        stream.extend_from_slice(&two);
        assembler.feed(&stream);
        assert_eq!(assembler.next_apdu().unwrap(), Some(one));
        assert_eq!(assembler.next_apdu().unwrap(), Some(two));
        assert_eq!(assembler.next_apdu().unwrap(), None);
    }

    #[test]
    fn assembler_rejects_bad_start() {
        let mut assembler = ApduAssembler::new();
        assembler.feed(&[0x69, 4]);
        assert_eq!(
            assembler.next_apdu(),
            Err(ProtocolError::UnexpectedFormat)
        );
    }

    #[test]
    fn assembler_rejects_bad_length() {
        let mut assembler = ApduAssembler::new();
        assembler.feed(&[0x68, 2]);
        assert_eq!(
            assembler.next_apdu(),
            Err(ProtocolError::UnexpectedFormat)
        );
    }
}
