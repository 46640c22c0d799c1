//! ASDU codec
//!
//! Header encode/decode and the information object vector. An `Asdu` is a
//! value type: parsed ASDUs copy their payload out of the receive buffer into
//! an inline buffer sized for the largest legal ASDU, so they can outlive the
//! buffer and clone byte-for-byte without heap allocation on the hot path.

use crate::config::AppLayerParameters;
use crate::constants::MAX_NUMBER_OF_ELEMENTS;
use crate::error::CodecError;
use crate::frame::Frame;
use crate::information_object::{
    type_id_for, type_info, InformationElement, InformationObject, TimeTag, TimeTagKind,
};
use crate::types::{CauseOfTransmission, TypeId};

/// Inline payload capacity: the largest ASDU (254) minus the smallest header
const MAX_PAYLOAD: usize = 250;

fn encode_ioa(
    address: u32,
    size: usize,
    dst: &mut [u8],
    offset: usize,
) -> Result<usize, CodecError> {
    if offset + size > dst.len() {
        return Err(CodecError::Truncated);
    }
    dst[offset] = address as u8;
    if size >= 2 {
        dst[offset + 1] = (address >> 8) as u8;
    }
    if size == 3 {
        dst[offset + 2] = (address >> 16) as u8;
    }
    Ok(offset + size)
}

fn decode_ioa(src: &[u8], offset: usize, size: usize) -> Result<(u32, usize), CodecError> {
    if offset + size > src.len() {
        return Err(CodecError::Truncated);
    }
    let mut address = u32::from(src[offset]);
    if size >= 2 {
        address |= u32::from(src[offset + 1]) << 8;
    }
    if size == 3 {
        address |= u32::from(src[offset + 2]) << 16;
    }
    Ok((address, offset + size))
}

/// Application service data unit
///
/// Constructed empty with [`Asdu::new`] (the type identifier is fixed by the
/// first added information object) or obtained from [`Asdu::parse`].
#[derive(Clone)]
pub struct Asdu {
    params: AppLayerParameters,
    type_id: Option<TypeId>,
    is_sequence: bool,
    num_elements: u8,
    cot: CauseOfTransmission,
    is_test: bool,
    is_negative: bool,
    originator: u8,
    common_address: u16,
    payload: [u8; MAX_PAYLOAD],
    payload_len: usize,
    next_ioa: u32,
}

impl Asdu {
    /// Create an empty ASDU. The type identifier is unset until the first
    /// call to [`Asdu::add_information_object`].
    pub fn new(
        params: AppLayerParameters,
        is_sequence: bool,
        cot: CauseOfTransmission,
        originator: u8,
        common_address: u16,
        is_test: bool,
        is_negative: bool,
    ) -> Self {
        Self {
            params,
            type_id: None,
            is_sequence,
            num_elements: 0,
            cot,
            is_test,
            is_negative,
            // a one byte COT field carries no originator address
            originator: if params.size_of_cot == 2 { originator } else { 0 },
            common_address,
            payload: [0; MAX_PAYLOAD],
            payload_len: 0,
            next_ioa: 0,
        }
    }

    /// Shorthand for a non-sequence, non-test, non-negative ASDU
    pub fn message(
        params: AppLayerParameters,
        cot: CauseOfTransmission,
        common_address: u16,
    ) -> Self {
        Self::new(
            params,
            false,
            cot,
            params.originator_address,
            common_address,
            false,
            false,
        )
    }

    pub fn type_id(&self) -> Option<TypeId> {
        self.type_id
    }

    pub fn is_sequence(&self) -> bool {
        self.is_sequence
    }

    pub fn number_of_elements(&self) -> usize {
        self.num_elements as usize
    }

    pub fn cot(&self) -> CauseOfTransmission {
        self.cot
    }

    pub fn set_cot(&mut self, cot: CauseOfTransmission) {
        self.cot = cot;
    }

    pub fn is_test(&self) -> bool {
        self.is_test
    }

    pub fn set_test(&mut self, test: bool) {
        self.is_test = test;
    }

    pub fn is_negative(&self) -> bool {
        self.is_negative
    }

    pub fn set_negative(&mut self, negative: bool) {
        self.is_negative = negative;
    }

    pub fn originator(&self) -> u8 {
        self.originator
    }

    pub fn set_originator(&mut self, originator: u8) {
        self.originator = originator;
    }

    pub fn common_address(&self) -> u16 {
        self.common_address
    }

    pub fn parameters(&self) -> &AppLayerParameters {
        &self.params
    }

    /// Size of the fully encoded ASDU
    pub fn encoded_size(&self) -> usize {
        self.params.header_size() + self.payload_len
    }

    /// Append an information object.
    ///
    /// The first call fixes the type identifier; later calls must carry the
    /// same element kind and time tag width (`MixedTypes` otherwise). For
    /// sequence ASDUs the address must be the predecessor plus one
    /// (`NonConsecutiveIoa`). Appending beyond the configured maximum ASDU
    /// size or the 127 element cap fails with `Overflow`; the ASDU is
    /// unchanged on any failure.
    pub fn add_information_object(&mut self, object: &InformationObject) -> Result<(), CodecError> {
        if self.num_elements >= MAX_NUMBER_OF_ELEMENTS {
            return Err(CodecError::Overflow);
        }
        let time_kind = object.time.map(|t| t.kind()).unwrap_or(TimeTagKind::None);
        let type_id = type_id_for(object.element.kind(), time_kind)
            .ok_or(CodecError::InvalidWidth(time_kind.size() as u8))?;
        if let Some(existing) = self.type_id {
            if existing != type_id {
                return Err(CodecError::MixedTypes);
            }
        }
        if self.is_sequence && object.element.kind().fixed_size().is_none() {
            // a variable-length element cannot form a compact sequence
            return Err(CodecError::InvalidWidth(0));
        }
        if object.address > self.params.max_ioa() {
            return Err(CodecError::InvalidWidth(self.params.size_of_ioa));
        }
        if self.is_sequence && self.num_elements > 0 && object.address != self.next_ioa {
            return Err(CodecError::NonConsecutiveIoa);
        }

        let ioa_size = if self.num_elements == 0 || !self.is_sequence {
            self.params.size_of_ioa as usize
        } else {
            0
        };
        let added = ioa_size + object.element.size() + time_kind.size();
        if self.params.header_size() + self.payload_len + added > self.params.max_size_of_asdu
            || self.payload_len + added > MAX_PAYLOAD
        {
            return Err(CodecError::Overflow);
        }

        // the size check above guarantees these writes succeed, so the
        // element count and payload length stay consistent
        let mut offset = self.payload_len;
        if ioa_size > 0 {
            offset = encode_ioa(object.address, ioa_size, &mut self.payload, offset)?;
        }
        offset = object.element.encode(&mut self.payload, offset)?;
        if let Some(time) = object.time {
            offset = time.encode(&mut self.payload, offset)?;
        }
        self.payload_len = offset;
        self.type_id = Some(type_id);
        self.num_elements += 1;
        self.next_ioa = object.address.wrapping_add(1);
        Ok(())
    }

    /// Lazily decode the information object at `index`.
    ///
    /// For sequence ASDUs the address of element `i` is the first address
    /// plus `i`.
    pub fn get_element(&self, index: usize) -> Result<InformationObject, CodecError> {
        let type_id = self.type_id.ok_or(CodecError::Truncated)?;
        if index >= self.num_elements as usize {
            return Err(CodecError::Truncated);
        }
        let info = type_info(type_id).ok_or(CodecError::UnknownType(type_id.to_byte()))?;
        let ioa_size = self.params.size_of_ioa as usize;
        let payload = &self.payload[..self.payload_len];

        if self.is_sequence {
            let (first_address, data_start) = decode_ioa(payload, 0, ioa_size)?;
            let stride = info.element_size().ok_or(CodecError::Truncated)?;
            let offset = data_start + index * stride;
            let (element, next) = InformationElement::decode(info.kind, payload, offset)?;
            let (time, _) = TimeTag::decode(info.time, payload, next)?;
            Ok(InformationObject {
                address: first_address + index as u32,
                element,
                time,
            })
        } else {
            let offset = match info.element_size() {
                Some(stride) => index * (ioa_size + stride),
                // variable-length types carry exactly one object
                None => 0,
            };
            let (address, next) = decode_ioa(payload, offset, ioa_size)?;
            let (element, next) = InformationElement::decode(info.kind, payload, next)?;
            let (time, _) = TimeTag::decode(info.time, payload, next)?;
            Ok(InformationObject {
                address,
                element,
                time,
            })
        }
    }

    /// Iterate over all information objects
    pub fn elements(&self) -> impl Iterator<Item = Result<InformationObject, CodecError>> + '_ {
        (0..self.num_elements as usize).map(move |i| self.get_element(i))
    }

    /// Encode the ASDU into a frame
    pub fn encode(&self, frame: &mut Frame) -> Result<(), CodecError> {
        let type_id = self.type_id.ok_or(CodecError::UnknownType(0))?;
        self.params.validate()?;
        if self.common_address > self.params.max_ca() {
            return Err(CodecError::InvalidWidth(self.params.size_of_ca));
        }
        frame.push(type_id.to_byte())?;
        frame.push((u8::from(self.is_sequence) << 7) | self.num_elements)?;
        let mut cot = self.cot.to_byte();
        if self.is_test {
            cot |= 0x80;
        }
        if self.is_negative {
            cot |= 0x40;
        }
        frame.push(cot)?;
        if self.params.size_of_cot == 2 {
            frame.push(self.originator)?;
        }
        frame.push(self.common_address as u8)?;
        if self.params.size_of_ca == 2 {
            frame.push((self.common_address >> 8) as u8)?;
        }
        frame.extend(&self.payload[..self.payload_len])
    }

    /// Encode the ASDU into a fresh byte vector
    pub fn to_bytes(&self) -> Result<Vec<u8>, CodecError> {
        let mut frame = Frame::with_limit(self.params.max_size_of_asdu);
        self.encode(&mut frame)?;
        Ok(frame.as_slice().to_vec())
    }

    /// Parse an ASDU from encoded bytes.
    ///
    /// Validates the header against the configured field widths and checks
    /// that the declared element count fits the payload given the per-type
    /// element size from the dispatch table.
    pub fn parse(bytes: &[u8], params: &AppLayerParameters) -> Result<Self, CodecError> {
        params.validate()?;
        if bytes.len() < params.header_size() {
            return Err(CodecError::Truncated);
        }
        let raw_type = bytes[0];
        let type_id = TypeId::from_byte(raw_type).ok_or(CodecError::UnknownType(raw_type))?;
        let info = type_info(type_id).ok_or(CodecError::UnknownType(raw_type))?;

        let vsq = bytes[1];
        let is_sequence = vsq & 0x80 != 0;
        let num_elements = vsq & 0x7f;

        let cot_byte = bytes[2];
        let cot = CauseOfTransmission::from_byte(cot_byte);
        let is_test = cot_byte & 0x80 != 0;
        let is_negative = cot_byte & 0x40 != 0;

        let mut pos = 3;
        let originator = if params.size_of_cot == 2 {
            pos += 1;
            bytes[3]
        } else {
            0
        };
        let common_address = if params.size_of_ca == 1 {
            u16::from(bytes[pos])
        } else {
            u16::from_le_bytes([bytes[pos], bytes[pos + 1]])
        };
        pos += params.size_of_ca as usize;

        let payload = &bytes[pos..];
        if payload.len() > MAX_PAYLOAD {
            return Err(CodecError::Overflow);
        }
        let ioa_size = params.size_of_ioa as usize;
        let n = num_elements as usize;
        match info.element_size() {
            Some(stride) => {
                let expected = if is_sequence {
                    if n == 0 {
                        0
                    } else {
                        ioa_size + n * stride
                    }
                } else {
                    n * (ioa_size + stride)
                };
                if payload.len() != expected {
                    return Err(CodecError::Truncated);
                }
            }
            None => {
                // variable-length types carry exactly one object
                if is_sequence || n > 1 {
                    return Err(CodecError::Truncated);
                }
                if n == 1 {
                    if payload.len() < ioa_size + 4 {
                        return Err(CodecError::Truncated);
                    }
                    let declared = payload[ioa_size + 3] as usize;
                    if payload.len() != ioa_size + 4 + declared {
                        return Err(CodecError::Truncated);
                    }
                } else if !payload.is_empty() {
                    return Err(CodecError::Truncated);
                }
            }
        }

        let mut asdu = Self {
            params: *params,
            type_id: Some(type_id),
            is_sequence,
            num_elements,
            cot,
            is_test,
            is_negative,
            originator,
            common_address,
            payload: [0; MAX_PAYLOAD],
            payload_len: payload.len(),
            next_ioa: 0,
        };
        asdu.payload[..payload.len()].copy_from_slice(payload);
        Ok(asdu)
    }
}

impl PartialEq for Asdu {
    fn eq(&self, other: &Self) -> bool {
        self.params == other.params
            && self.type_id == other.type_id
            && self.is_sequence == other.is_sequence
            && self.num_elements == other.num_elements
            && self.cot == other.cot
            && self.is_test == other.is_test
            && self.is_negative == other.is_negative
            && self.originator == other.originator
            && self.common_address == other.common_address
            && self.payload[..self.payload_len] == other.payload[..other.payload_len]
    }
}

impl std::fmt::Debug for Asdu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Asdu")
            .field("type_id", &self.type_id)
            .field("is_sequence", &self.is_sequence)
            .field("num_elements", &self.num_elements)
            .field("cot", &self.cot)
            .field("is_test", &self.is_test)
            .field("is_negative", &self.is_negative)
            .field("originator", &self.originator)
            .field("common_address", &self.common_address)
            .field("payload", &hex::encode(&self.payload[..self.payload_len]))
            .finish()
    }
}
