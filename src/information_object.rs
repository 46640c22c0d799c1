//! Information object codec
//!
//! An information object is an address plus a TypeID-tagged element, with an
//! optional CP24/CP56 time tag. The static dispatch table below is the single
//! source of truth for per-type element sizes and time tag widths; the ASDU
//! codec consults it for both the space check on construction and the length
//! validation on parse.

use serde::{Deserialize, Serialize};

use crate::constants::MAX_FILE_SEGMENT_SIZE;
use crate::elements::{
    decode_f32, decode_i16, decode_u16, decode_u24, decode_u32, encode_f32, encode_i16,
    encode_u16, encode_u24, encode_u32, BinaryCounterReading, DoubleCommand, NormalizedValue,
    SetpointQualifier, SingleCommand, StepCommand, StepPosition,
};
use crate::error::CodecError;
use crate::time::{Cp16Time2a, Cp24Time2a, Cp56Time2a};
use crate::types::{DoublePointValue, QualityDescriptor, TypeId};

/// Width of the time tag a type carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeTagKind {
    None,
    Cp24,
    Cp56,
}

impl TimeTagKind {
    pub fn size(self) -> usize {
        match self {
            Self::None => 0,
            Self::Cp24 => Cp24Time2a::SIZE,
            Self::Cp56 => Cp56Time2a::SIZE,
        }
    }
}

/// Time tag attached to an information object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeTag {
    Cp24(Cp24Time2a),
    Cp56(Cp56Time2a),
}

impl TimeTag {
    pub fn kind(&self) -> TimeTagKind {
        match self {
            Self::Cp24(_) => TimeTagKind::Cp24,
            Self::Cp56(_) => TimeTagKind::Cp56,
        }
    }

    pub fn encode(&self, dst: &mut [u8], offset: usize) -> Result<usize, CodecError> {
        match self {
            Self::Cp24(t) => t.encode(dst, offset),
            Self::Cp56(t) => t.encode(dst, offset),
        }
    }

    pub fn decode(kind: TimeTagKind, src: &[u8], offset: usize) -> Result<(Option<Self>, usize), CodecError> {
        match kind {
            TimeTagKind::None => Ok((None, offset)),
            TimeTagKind::Cp24 => {
                let (t, next) = Cp24Time2a::decode(src, offset)?;
                Ok((Some(Self::Cp24(t)), next))
            }
            TimeTagKind::Cp56 => {
                let (t, next) = Cp56Time2a::decode(src, offset)?;
                Ok((Some(Self::Cp56(t)), next))
            }
        }
    }
}

/// Payload of an F_SG_NA_1 file segment, bounded by the ASDU size
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FileSegment {
    #[serde(with = "serde_bytes_array")]
    data: [u8; MAX_FILE_SEGMENT_SIZE],
    length: u8,
}

mod serde_bytes_array {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        data: &[u8; super::MAX_FILE_SEGMENT_SIZE],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(data)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<[u8; super::MAX_FILE_SEGMENT_SIZE], D::Error> {
        let bytes = Vec::<u8>::deserialize(deserializer)?;
        let mut data = [0u8; super::MAX_FILE_SEGMENT_SIZE];
        let len = bytes.len().min(super::MAX_FILE_SEGMENT_SIZE);
        data[..len].copy_from_slice(&bytes[..len]);
        Ok(data)
    }
}

impl FileSegment {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CodecError> {
        if bytes.len() > MAX_FILE_SEGMENT_SIZE {
            return Err(CodecError::Overflow);
        }
        let mut data = [0u8; MAX_FILE_SEGMENT_SIZE];
        data[..bytes.len()].copy_from_slice(bytes);
        Ok(Self {
            data,
            length: bytes.len() as u8,
        })
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.length as usize]
    }

    pub fn len(&self) -> usize {
        self.length as usize
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }
}

impl PartialEq for FileSegment {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl Eq for FileSegment {}

/// Element kind selected by the type identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementKind {
    SinglePoint,
    DoublePoint,
    StepPosition,
    Bitstring,
    Normalized,
    NormalizedNoQuality,
    Scaled,
    ShortFloat,
    IntegratedTotals,
    ProtectionEvent,
    ProtectionStartEvents,
    ProtectionOutputCircuit,
    PackedSinglePoints,
    SingleCommand,
    DoubleCommand,
    StepCommand,
    SetpointNormalized,
    SetpointScaled,
    SetpointShortFloat,
    BitstringCommand,
    EndOfInitialization,
    Interrogation,
    CounterInterrogation,
    Read,
    ClockSync,
    TestCommand,
    TestCommandWithTime,
    ResetProcess,
    DelayAcquisition,
    ParameterNormalized,
    ParameterScaled,
    ParameterShortFloat,
    ParameterActivation,
    FileReady,
    SectionReady,
    CallFile,
    LastSection,
    AckFile,
    FileSegment,
    Directory,
    QueryLog,
}

impl ElementKind {
    /// Encoded element size after the IOA, excluding any time tag.
    /// `None` for the variable-length file segment.
    pub fn fixed_size(self) -> Option<usize> {
        Some(match self {
            Self::SinglePoint => 1,
            Self::DoublePoint => 1,
            Self::StepPosition => 2,
            Self::Bitstring => 5,
            Self::Normalized => 3,
            Self::NormalizedNoQuality => 2,
            Self::Scaled => 3,
            Self::ShortFloat => 5,
            Self::IntegratedTotals => 5,
            Self::ProtectionEvent => 3,
            Self::ProtectionStartEvents => 4,
            Self::ProtectionOutputCircuit => 4,
            Self::PackedSinglePoints => 5,
            Self::SingleCommand => 1,
            Self::DoubleCommand => 1,
            Self::StepCommand => 1,
            Self::SetpointNormalized => 3,
            Self::SetpointScaled => 3,
            Self::SetpointShortFloat => 5,
            Self::BitstringCommand => 4,
            Self::EndOfInitialization => 1,
            Self::Interrogation => 1,
            Self::CounterInterrogation => 1,
            Self::Read => 0,
            Self::ClockSync => 7,
            Self::TestCommand => 2,
            Self::TestCommandWithTime => 2,
            Self::ResetProcess => 1,
            Self::DelayAcquisition => 2,
            Self::ParameterNormalized => 3,
            Self::ParameterScaled => 3,
            Self::ParameterShortFloat => 5,
            Self::ParameterActivation => 1,
            Self::FileReady => 6,
            Self::SectionReady => 7,
            Self::CallFile => 4,
            Self::LastSection => 5,
            Self::AckFile => 4,
            Self::FileSegment => return None,
            Self::Directory => 6,
            Self::QueryLog => 16,
        })
    }
}

/// Per-type entry of the dispatch table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeInfo {
    pub kind: ElementKind,
    pub time: TimeTagKind,
}

impl TypeInfo {
    /// Fixed per-element size after the IOA including the time tag,
    /// `None` for variable-length types
    pub fn element_size(&self) -> Option<usize> {
        self.kind.fixed_size().map(|s| s + self.time.size())
    }
}

/// Dispatch table: element kind and time tag width per type identifier.
///
/// Returns `None` for catalogued identifiers without a codec (the security
/// extension types); such ASDUs fail to parse with `UnknownType`.
pub fn type_info(id: TypeId) -> Option<TypeInfo> {
    use self::ElementKind as E;
    use self::TimeTagKind as T;
    let (kind, time) = match id {
        TypeId::M_SP_NA_1 => (E::SinglePoint, T::None),
        TypeId::M_SP_TA_1 => (E::SinglePoint, T::Cp24),
        TypeId::M_DP_NA_1 => (E::DoublePoint, T::None),
        TypeId::M_DP_TA_1 => (E::DoublePoint, T::Cp24),
        TypeId::M_ST_NA_1 => (E::StepPosition, T::None),
        TypeId::M_ST_TA_1 => (E::StepPosition, T::Cp24),
        TypeId::M_BO_NA_1 => (E::Bitstring, T::None),
        TypeId::M_BO_TA_1 => (E::Bitstring, T::Cp24),
        TypeId::M_ME_NA_1 => (E::Normalized, T::None),
        TypeId::M_ME_TA_1 => (E::Normalized, T::Cp24),
        TypeId::M_ME_NB_1 => (E::Scaled, T::None),
        TypeId::M_ME_TB_1 => (E::Scaled, T::Cp24),
        TypeId::M_ME_NC_1 => (E::ShortFloat, T::None),
        TypeId::M_ME_TC_1 => (E::ShortFloat, T::Cp24),
        TypeId::M_IT_NA_1 => (E::IntegratedTotals, T::None),
        TypeId::M_IT_TA_1 => (E::IntegratedTotals, T::Cp24),
        TypeId::M_EP_TA_1 => (E::ProtectionEvent, T::Cp24),
        TypeId::M_EP_TB_1 => (E::ProtectionStartEvents, T::Cp24),
        TypeId::M_EP_TC_1 => (E::ProtectionOutputCircuit, T::Cp24),
        TypeId::M_PS_NA_1 => (E::PackedSinglePoints, T::None),
        TypeId::M_ME_ND_1 => (E::NormalizedNoQuality, T::None),
        TypeId::M_SP_TB_1 => (E::SinglePoint, T::Cp56),
        TypeId::M_DP_TB_1 => (E::DoublePoint, T::Cp56),
        TypeId::M_ST_TB_1 => (E::StepPosition, T::Cp56),
        TypeId::M_BO_TB_1 => (E::Bitstring, T::Cp56),
        TypeId::M_ME_TD_1 => (E::Normalized, T::Cp56),
        TypeId::M_ME_TE_1 => (E::Scaled, T::Cp56),
        TypeId::M_ME_TF_1 => (E::ShortFloat, T::Cp56),
        TypeId::M_IT_TB_1 => (E::IntegratedTotals, T::Cp56),
        TypeId::M_EP_TD_1 => (E::ProtectionEvent, T::Cp56),
        TypeId::M_EP_TE_1 => (E::ProtectionStartEvents, T::Cp56),
        TypeId::M_EP_TF_1 => (E::ProtectionOutputCircuit, T::Cp56),
        TypeId::C_SC_NA_1 => (E::SingleCommand, T::None),
        TypeId::C_DC_NA_1 => (E::DoubleCommand, T::None),
        TypeId::C_RC_NA_1 => (E::StepCommand, T::None),
        TypeId::C_SE_NA_1 => (E::SetpointNormalized, T::None),
        TypeId::C_SE_NB_1 => (E::SetpointScaled, T::None),
        TypeId::C_SE_NC_1 => (E::SetpointShortFloat, T::None),
        TypeId::C_BO_NA_1 => (E::BitstringCommand, T::None),
        TypeId::C_SC_TA_1 => (E::SingleCommand, T::Cp56),
        TypeId::C_DC_TA_1 => (E::DoubleCommand, T::Cp56),
        TypeId::C_RC_TA_1 => (E::StepCommand, T::Cp56),
        TypeId::C_SE_TA_1 => (E::SetpointNormalized, T::Cp56),
        TypeId::C_SE_TB_1 => (E::SetpointScaled, T::Cp56),
        TypeId::C_SE_TC_1 => (E::SetpointShortFloat, T::Cp56),
        TypeId::C_BO_TA_1 => (E::BitstringCommand, T::Cp56),
        TypeId::M_EI_NA_1 => (E::EndOfInitialization, T::None),
        TypeId::C_IC_NA_1 => (E::Interrogation, T::None),
        TypeId::C_CI_NA_1 => (E::CounterInterrogation, T::None),
        TypeId::C_RD_NA_1 => (E::Read, T::None),
        TypeId::C_CS_NA_1 => (E::ClockSync, T::None),
        TypeId::C_TS_NA_1 => (E::TestCommand, T::None),
        TypeId::C_RP_NA_1 => (E::ResetProcess, T::None),
        TypeId::C_CD_NA_1 => (E::DelayAcquisition, T::None),
        TypeId::C_TS_TA_1 => (E::TestCommandWithTime, T::Cp56),
        TypeId::P_ME_NA_1 => (E::ParameterNormalized, T::None),
        TypeId::P_ME_NB_1 => (E::ParameterScaled, T::None),
        TypeId::P_ME_NC_1 => (E::ParameterShortFloat, T::None),
        TypeId::P_AC_NA_1 => (E::ParameterActivation, T::None),
        TypeId::F_FR_NA_1 => (E::FileReady, T::None),
        TypeId::F_SR_NA_1 => (E::SectionReady, T::None),
        TypeId::F_SC_NA_1 => (E::CallFile, T::None),
        TypeId::F_LS_NA_1 => (E::LastSection, T::None),
        TypeId::F_AF_NA_1 => (E::AckFile, T::None),
        TypeId::F_SG_NA_1 => (E::FileSegment, T::None),
        TypeId::F_DR_TA_1 => (E::Directory, T::Cp56),
        TypeId::F_SC_NB_1 => (E::QueryLog, T::None),
        _ => return None,
    };
    Some(TypeInfo { kind, time })
}

/// Reverse lookup: the type identifier for an element kind and time width
pub fn type_id_for(kind: ElementKind, time: TimeTagKind) -> Option<TypeId> {
    use self::ElementKind as E;
    use self::TimeTagKind as T;
    Some(match (kind, time) {
        (E::SinglePoint, T::None) => TypeId::M_SP_NA_1,
        (E::SinglePoint, T::Cp24) => TypeId::M_SP_TA_1,
        (E::SinglePoint, T::Cp56) => TypeId::M_SP_TB_1,
        (E::DoublePoint, T::None) => TypeId::M_DP_NA_1,
        (E::DoublePoint, T::Cp24) => TypeId::M_DP_TA_1,
        (E::DoublePoint, T::Cp56) => TypeId::M_DP_TB_1,
        (E::StepPosition, T::None) => TypeId::M_ST_NA_1,
        (E::StepPosition, T::Cp24) => TypeId::M_ST_TA_1,
        (E::StepPosition, T::Cp56) => TypeId::M_ST_TB_1,
        (E::Bitstring, T::None) => TypeId::M_BO_NA_1,
        (E::Bitstring, T::Cp24) => TypeId::M_BO_TA_1,
        (E::Bitstring, T::Cp56) => TypeId::M_BO_TB_1,
        (E::Normalized, T::None) => TypeId::M_ME_NA_1,
        (E::Normalized, T::Cp24) => TypeId::M_ME_TA_1,
        (E::Normalized, T::Cp56) => TypeId::M_ME_TD_1,
        (E::Scaled, T::None) => TypeId::M_ME_NB_1,
        (E::Scaled, T::Cp24) => TypeId::M_ME_TB_1,
        (E::Scaled, T::Cp56) => TypeId::M_ME_TE_1,
        (E::ShortFloat, T::None) => TypeId::M_ME_NC_1,
        (E::ShortFloat, T::Cp24) => TypeId::M_ME_TC_1,
        (E::ShortFloat, T::Cp56) => TypeId::M_ME_TF_1,
        (E::IntegratedTotals, T::None) => TypeId::M_IT_NA_1,
        (E::IntegratedTotals, T::Cp24) => TypeId::M_IT_TA_1,
        (E::IntegratedTotals, T::Cp56) => TypeId::M_IT_TB_1,
        (E::ProtectionEvent, T::Cp24) => TypeId::M_EP_TA_1,
        (E::ProtectionEvent, T::Cp56) => TypeId::M_EP_TD_1,
        (E::ProtectionStartEvents, T::Cp24) => TypeId::M_EP_TB_1,
        (E::ProtectionStartEvents, T::Cp56) => TypeId::M_EP_TE_1,
        (E::ProtectionOutputCircuit, T::Cp24) => TypeId::M_EP_TC_1,
        (E::ProtectionOutputCircuit, T::Cp56) => TypeId::M_EP_TF_1,
        (E::PackedSinglePoints, T::None) => TypeId::M_PS_NA_1,
        (E::NormalizedNoQuality, T::None) => TypeId::M_ME_ND_1,
        (E::SingleCommand, T::None) => TypeId::C_SC_NA_1,
        (E::SingleCommand, T::Cp56) => TypeId::C_SC_TA_1,
        (E::DoubleCommand, T::None) => TypeId::C_DC_NA_1,
        (E::DoubleCommand, T::Cp56) => TypeId::C_DC_TA_1,
        (E::StepCommand, T::None) => TypeId::C_RC_NA_1,
        (E::StepCommand, T::Cp56) => TypeId::C_RC_TA_1,
        (E::SetpointNormalized, T::None) => TypeId::C_SE_NA_1,
        (E::SetpointNormalized, T::Cp56) => TypeId::C_SE_TA_1,
        (E::SetpointScaled, T::None) => TypeId::C_SE_NB_1,
        (E::SetpointScaled, T::Cp56) => TypeId::C_SE_TB_1,
        (E::SetpointShortFloat, T::None) => TypeId::C_SE_NC_1,
        (E::SetpointShortFloat, T::Cp56) => TypeId::C_SE_TC_1,
        (E::BitstringCommand, T::None) => TypeId::C_BO_NA_1,
        (E::BitstringCommand, T::Cp56) => TypeId::C_BO_TA_1,
        (E::EndOfInitialization, T::None) => TypeId::M_EI_NA_1,
        (E::Interrogation, T::None) => TypeId::C_IC_NA_1,
        (E::CounterInterrogation, T::None) => TypeId::C_CI_NA_1,
        (E::Read, T::None) => TypeId::C_RD_NA_1,
        (E::ClockSync, T::None) => TypeId::C_CS_NA_1,
        (E::TestCommand, T::None) => TypeId::C_TS_NA_1,
        (E::TestCommandWithTime, T::Cp56) => TypeId::C_TS_TA_1,
        (E::ResetProcess, T::None) => TypeId::C_RP_NA_1,
        (E::DelayAcquisition, T::None) => TypeId::C_CD_NA_1,
        (E::ParameterNormalized, T::None) => TypeId::P_ME_NA_1,
        (E::ParameterScaled, T::None) => TypeId::P_ME_NB_1,
        (E::ParameterShortFloat, T::None) => TypeId::P_ME_NC_1,
        (E::ParameterActivation, T::None) => TypeId::P_AC_NA_1,
        (E::FileReady, T::None) => TypeId::F_FR_NA_1,
        (E::SectionReady, T::None) => TypeId::F_SR_NA_1,
        (E::CallFile, T::None) => TypeId::F_SC_NA_1,
        (E::LastSection, T::None) => TypeId::F_LS_NA_1,
        (E::AckFile, T::None) => TypeId::F_AF_NA_1,
        (E::FileSegment, T::None) => TypeId::F_SG_NA_1,
        (E::Directory, T::Cp56) => TypeId::F_DR_TA_1,
        (E::QueryLog, T::None) => TypeId::F_SC_NB_1,
        _ => return None,
    })
}

/// Information element: the scalar payload of one information object
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum InformationElement {
    /// Single-point information (SIQ)
    SinglePoint {
        value: bool,
        quality: QualityDescriptor,
    },
    /// Double-point information (DIQ)
    DoublePoint {
        value: DoublePointValue,
        quality: QualityDescriptor,
    },
    /// Step position information (VTI + QDS)
    StepPosition {
        position: StepPosition,
        quality: QualityDescriptor,
    },
    /// Bitstring of 32 bit (BSI + QDS)
    Bitstring {
        value: u32,
        quality: QualityDescriptor,
    },
    /// Measured value, normalized (NVA + QDS)
    Normalized {
        value: NormalizedValue,
        quality: QualityDescriptor,
    },
    /// Measured value, normalized, without quality descriptor
    NormalizedNoQuality { value: NormalizedValue },
    /// Measured value, scaled (SVA + QDS)
    Scaled {
        value: i16,
        quality: QualityDescriptor,
    },
    /// Measured value, short float (R32 + QDS)
    ShortFloat {
        value: f32,
        quality: QualityDescriptor,
    },
    /// Integrated totals (BCR)
    IntegratedTotals { value: BinaryCounterReading },
    /// Protection equipment event (SEP + elapsed CP16)
    ProtectionEvent { event: u8, elapsed: Cp16Time2a },
    /// Packed start events of protection equipment (SPE + QDP + CP16)
    ProtectionStartEvents {
        events: u8,
        quality: u8,
        duration: Cp16Time2a,
    },
    /// Packed output circuit information (OCI + QDP + CP16)
    ProtectionOutputCircuit {
        circuits: u8,
        quality: u8,
        operating_time: Cp16Time2a,
    },
    /// Packed single points with change detection (SCD + QDS)
    PackedSinglePoints {
        status: u16,
        change: u16,
        quality: QualityDescriptor,
    },
    /// Single command (SCO)
    SingleCommand(SingleCommand),
    /// Double command (DCO)
    DoubleCommand(DoubleCommand),
    /// Regulating step command (RCO)
    StepCommand(StepCommand),
    /// Set-point command, normalized (NVA + QOS)
    SetpointNormalized {
        value: NormalizedValue,
        qualifier: SetpointQualifier,
    },
    /// Set-point command, scaled (SVA + QOS)
    SetpointScaled {
        value: i16,
        qualifier: SetpointQualifier,
    },
    /// Set-point command, short float (R32 + QOS)
    SetpointShortFloat {
        value: f32,
        qualifier: SetpointQualifier,
    },
    /// Bitstring of 32 bit command (BSI)
    BitstringCommand { value: u32 },
    /// End of initialization (COI)
    EndOfInitialization { cause: u8 },
    /// Interrogation command (QOI; 20 = station interrogation)
    Interrogation { qualifier: u8 },
    /// Counter interrogation command (QCC)
    CounterInterrogation { qualifier: u8 },
    /// Read command (no payload)
    Read,
    /// Clock synchronization command (CP56)
    ClockSync { time: Cp56Time2a },
    /// Test command with the fixed test bit pattern
    TestCommand,
    /// Test command with test sequence counter and CP56 time tag
    TestCommandWithTime { counter: u16 },
    /// Reset process command (QRP)
    ResetProcess { qualifier: u8 },
    /// Delay acquisition command (CP16)
    DelayAcquisition { delay: Cp16Time2a },
    /// Parameter of measured value, normalized (NVA + QPM)
    ParameterNormalized {
        value: NormalizedValue,
        qualifier: u8,
    },
    /// Parameter of measured value, scaled (SVA + QPM)
    ParameterScaled { value: i16, qualifier: u8 },
    /// Parameter of measured value, short float (R32 + QPM)
    ParameterShortFloat { value: f32, qualifier: u8 },
    /// Parameter activation (QPA)
    ParameterActivation { qualifier: u8 },
    /// File ready (NOF + LOF + FRQ)
    FileReady {
        name: u16,
        length: u32,
        qualifier: u8,
    },
    /// Section ready (NOF + NOS + LOF + SRQ)
    SectionReady {
        name: u16,
        section: u8,
        length: u32,
        qualifier: u8,
    },
    /// Call directory, file or section (NOF + NOS + SCQ)
    CallFile {
        name: u16,
        section: u8,
        qualifier: u8,
    },
    /// Last section or segment (NOF + NOS + LSQ + CHS)
    LastSection {
        name: u16,
        section: u8,
        qualifier: u8,
        checksum: u8,
    },
    /// Ack file or section (NOF + NOS + AFQ)
    AckFile {
        name: u16,
        section: u8,
        qualifier: u8,
    },
    /// File segment (NOF + NOS + LOS + data)
    FileSegment {
        name: u16,
        section: u8,
        segment: FileSegment,
    },
    /// Directory entry (NOF + LOF + SOF), time tagged
    Directory {
        name: u16,
        length: u32,
        status: u8,
    },
    /// Query log (NOF + start CP56 + stop CP56)
    QueryLog {
        name: u16,
        start: Cp56Time2a,
        stop: Cp56Time2a,
    },
}

/// The test command bit pattern (FBP)
const TEST_PATTERN: u16 = 0x55aa;

fn check(dst: &[u8], offset: usize, size: usize) -> Result<(), CodecError> {
    if offset + size > dst.len() {
        return Err(CodecError::Truncated);
    }
    Ok(())
}

impl InformationElement {
    /// The element kind of this value
    pub fn kind(&self) -> ElementKind {
        match self {
            Self::SinglePoint { .. } => ElementKind::SinglePoint,
            Self::DoublePoint { .. } => ElementKind::DoublePoint,
            Self::StepPosition { .. } => ElementKind::StepPosition,
            Self::Bitstring { .. } => ElementKind::Bitstring,
            Self::Normalized { .. } => ElementKind::Normalized,
            Self::NormalizedNoQuality { .. } => ElementKind::NormalizedNoQuality,
            Self::Scaled { .. } => ElementKind::Scaled,
            Self::ShortFloat { .. } => ElementKind::ShortFloat,
            Self::IntegratedTotals { .. } => ElementKind::IntegratedTotals,
            Self::ProtectionEvent { .. } => ElementKind::ProtectionEvent,
            Self::ProtectionStartEvents { .. } => ElementKind::ProtectionStartEvents,
            Self::ProtectionOutputCircuit { .. } => ElementKind::ProtectionOutputCircuit,
            Self::PackedSinglePoints { .. } => ElementKind::PackedSinglePoints,
            Self::SingleCommand(_) => ElementKind::SingleCommand,
            Self::DoubleCommand(_) => ElementKind::DoubleCommand,
            Self::StepCommand(_) => ElementKind::StepCommand,
            Self::SetpointNormalized { .. } => ElementKind::SetpointNormalized,
            Self::SetpointScaled { .. } => ElementKind::SetpointScaled,
            Self::SetpointShortFloat { .. } => ElementKind::SetpointShortFloat,
            Self::BitstringCommand { .. } => ElementKind::BitstringCommand,
            Self::EndOfInitialization { .. } => ElementKind::EndOfInitialization,
            Self::Interrogation { .. } => ElementKind::Interrogation,
            Self::CounterInterrogation { .. } => ElementKind::CounterInterrogation,
            Self::Read => ElementKind::Read,
            Self::ClockSync { .. } => ElementKind::ClockSync,
            Self::TestCommand => ElementKind::TestCommand,
            Self::TestCommandWithTime { .. } => ElementKind::TestCommandWithTime,
            Self::ResetProcess { .. } => ElementKind::ResetProcess,
            Self::DelayAcquisition { .. } => ElementKind::DelayAcquisition,
            Self::ParameterNormalized { .. } => ElementKind::ParameterNormalized,
            Self::ParameterScaled { .. } => ElementKind::ParameterScaled,
            Self::ParameterShortFloat { .. } => ElementKind::ParameterShortFloat,
            Self::ParameterActivation { .. } => ElementKind::ParameterActivation,
            Self::FileReady { .. } => ElementKind::FileReady,
            Self::SectionReady { .. } => ElementKind::SectionReady,
            Self::CallFile { .. } => ElementKind::CallFile,
            Self::LastSection { .. } => ElementKind::LastSection,
            Self::AckFile { .. } => ElementKind::AckFile,
            Self::FileSegment { .. } => ElementKind::FileSegment,
            Self::Directory { .. } => ElementKind::Directory,
            Self::QueryLog { .. } => ElementKind::QueryLog,
        }
    }

    /// Encoded size of this element (excluding IOA and time tag)
    pub fn size(&self) -> usize {
        match self {
            Self::FileSegment { segment, .. } => 4 + segment.len(),
            other => other.kind().fixed_size().unwrap_or(0),
        }
    }

    /// Encode the element into `dst` at `offset`, returning the new offset
    pub fn encode(&self, dst: &mut [u8], offset: usize) -> Result<usize, CodecError> {
        match *self {
            Self::SinglePoint { value, quality } => {
                check(dst, offset, 1)?;
                dst[offset] = (quality.to_byte() & 0xf0) | u8::from(value);
                Ok(offset + 1)
            }
            Self::DoublePoint { value, quality } => {
                check(dst, offset, 1)?;
                dst[offset] = (quality.to_byte() & 0xf0) | value.to_bits();
                Ok(offset + 1)
            }
            Self::StepPosition { position, quality } => {
                check(dst, offset, 2)?;
                dst[offset] = position.to_byte();
                dst[offset + 1] = quality.to_byte();
                Ok(offset + 2)
            }
            Self::Bitstring { value, quality } => {
                let next = encode_u32(value, dst, offset)?;
                check(dst, next, 1)?;
                dst[next] = quality.to_byte();
                Ok(next + 1)
            }
            Self::Normalized { value, quality } => {
                let next = value.encode(dst, offset)?;
                check(dst, next, 1)?;
                dst[next] = quality.to_byte();
                Ok(next + 1)
            }
            Self::NormalizedNoQuality { value } => value.encode(dst, offset),
            Self::Scaled { value, quality } => {
                let next = encode_i16(value, dst, offset)?;
                check(dst, next, 1)?;
                dst[next] = quality.to_byte();
                Ok(next + 1)
            }
            Self::ShortFloat { value, quality } => {
                let next = encode_f32(value, dst, offset)?;
                check(dst, next, 1)?;
                dst[next] = quality.to_byte();
                Ok(next + 1)
            }
            Self::IntegratedTotals { value } => value.encode(dst, offset),
            Self::ProtectionEvent { event, elapsed } => {
                check(dst, offset, 1)?;
                dst[offset] = event;
                elapsed.encode(dst, offset + 1)
            }
            Self::ProtectionStartEvents {
                events,
                quality,
                duration,
            } => {
                check(dst, offset, 2)?;
                dst[offset] = events;
                dst[offset + 1] = quality;
                duration.encode(dst, offset + 2)
            }
            Self::ProtectionOutputCircuit {
                circuits,
                quality,
                operating_time,
            } => {
                check(dst, offset, 2)?;
                dst[offset] = circuits;
                dst[offset + 1] = quality;
                operating_time.encode(dst, offset + 2)
            }
            Self::PackedSinglePoints {
                status,
                change,
                quality,
            } => {
                let next = encode_u16(status, dst, offset)?;
                let next = encode_u16(change, dst, next)?;
                check(dst, next, 1)?;
                dst[next] = quality.to_byte();
                Ok(next + 1)
            }
            Self::SingleCommand(cmd) => {
                check(dst, offset, 1)?;
                dst[offset] = cmd.to_byte();
                Ok(offset + 1)
            }
            Self::DoubleCommand(cmd) => {
                check(dst, offset, 1)?;
                dst[offset] = cmd.to_byte();
                Ok(offset + 1)
            }
            Self::StepCommand(cmd) => {
                check(dst, offset, 1)?;
                dst[offset] = cmd.to_byte();
                Ok(offset + 1)
            }
            Self::SetpointNormalized { value, qualifier } => {
                let next = value.encode(dst, offset)?;
                check(dst, next, 1)?;
                dst[next] = qualifier.to_byte();
                Ok(next + 1)
            }
            Self::SetpointScaled { value, qualifier } => {
                let next = encode_i16(value, dst, offset)?;
                check(dst, next, 1)?;
                dst[next] = qualifier.to_byte();
                Ok(next + 1)
            }
            Self::SetpointShortFloat { value, qualifier } => {
                let next = encode_f32(value, dst, offset)?;
                check(dst, next, 1)?;
                dst[next] = qualifier.to_byte();
                Ok(next + 1)
            }
            Self::BitstringCommand { value } => encode_u32(value, dst, offset),
            Self::EndOfInitialization { cause } => {
                check(dst, offset, 1)?;
                dst[offset] = cause;
                Ok(offset + 1)
            }
            Self::Interrogation { qualifier } => {
                check(dst, offset, 1)?;
                dst[offset] = qualifier;
                Ok(offset + 1)
            }
            Self::CounterInterrogation { qualifier } => {
                check(dst, offset, 1)?;
                dst[offset] = qualifier;
                Ok(offset + 1)
            }
            Self::Read => Ok(offset),
            Self::ClockSync { time } => time.encode(dst, offset),
            Self::TestCommand => encode_u16(TEST_PATTERN, dst, offset),
            Self::TestCommandWithTime { counter } => encode_u16(counter, dst, offset),
            Self::ResetProcess { qualifier } => {
                check(dst, offset, 1)?;
                dst[offset] = qualifier;
                Ok(offset + 1)
            }
            Self::DelayAcquisition { delay } => delay.encode(dst, offset),
            Self::ParameterNormalized { value, qualifier } => {
                let next = value.encode(dst, offset)?;
                check(dst, next, 1)?;
                dst[next] = qualifier;
                Ok(next + 1)
            }
            Self::ParameterScaled { value, qualifier } => {
                let next = encode_i16(value, dst, offset)?;
                check(dst, next, 1)?;
                dst[next] = qualifier;
                Ok(next + 1)
            }
            Self::ParameterShortFloat { value, qualifier } => {
                let next = encode_f32(value, dst, offset)?;
                check(dst, next, 1)?;
                dst[next] = qualifier;
                Ok(next + 1)
            }
            Self::ParameterActivation { qualifier } => {
                check(dst, offset, 1)?;
                dst[offset] = qualifier;
                Ok(offset + 1)
            }
            Self::FileReady {
                name,
                length,
                qualifier,
            } => {
                let next = encode_u16(name, dst, offset)?;
                let next = encode_u24(length, dst, next)?;
                check(dst, next, 1)?;
                dst[next] = qualifier;
                Ok(next + 1)
            }
            Self::SectionReady {
                name,
                section,
                length,
                qualifier,
            } => {
                let next = encode_u16(name, dst, offset)?;
                check(dst, next, 1)?;
                dst[next] = section;
                let next = encode_u24(length, dst, next + 1)?;
                check(dst, next, 1)?;
                dst[next] = qualifier;
                Ok(next + 1)
            }
            Self::CallFile {
                name,
                section,
                qualifier,
            } => {
                let next = encode_u16(name, dst, offset)?;
                check(dst, next, 2)?;
                dst[next] = section;
                dst[next + 1] = qualifier;
                Ok(next + 2)
            }
            Self::LastSection {
                name,
                section,
                qualifier,
                checksum,
            } => {
                let next = encode_u16(name, dst, offset)?;
                check(dst, next, 3)?;
                dst[next] = section;
                dst[next + 1] = qualifier;
                dst[next + 2] = checksum;
                Ok(next + 3)
            }
            Self::AckFile {
                name,
                section,
                qualifier,
            } => {
                let next = encode_u16(name, dst, offset)?;
                check(dst, next, 2)?;
                dst[next] = section;
                dst[next + 1] = qualifier;
                Ok(next + 2)
            }
            Self::FileSegment {
                name,
                section,
                ref segment,
            } => {
                let next = encode_u16(name, dst, offset)?;
                check(dst, next, 2 + segment.len())?;
                dst[next] = section;
                dst[next + 1] = segment.len() as u8;
                dst[next + 2..next + 2 + segment.len()].copy_from_slice(segment.as_slice());
                Ok(next + 2 + segment.len())
            }
            Self::Directory {
                name,
                length,
                status,
            } => {
                let next = encode_u16(name, dst, offset)?;
                let next = encode_u24(length, dst, next)?;
                check(dst, next, 1)?;
                dst[next] = status;
                Ok(next + 1)
            }
            Self::QueryLog { name, start, stop } => {
                let next = encode_u16(name, dst, offset)?;
                let next = start.encode(dst, next)?;
                stop.encode(dst, next)
            }
        }
    }

    /// Decode an element of `kind` from `src` at `offset`
    pub fn decode(kind: ElementKind, src: &[u8], offset: usize) -> Result<(Self, usize), CodecError> {
        match kind {
            ElementKind::SinglePoint => {
                check(src, offset, 1)?;
                let b = src[offset];
                Ok((
                    Self::SinglePoint {
                        value: b & 0x01 != 0,
                        quality: QualityDescriptor::from_byte(b & 0xf0),
                    },
                    offset + 1,
                ))
            }
            ElementKind::DoublePoint => {
                check(src, offset, 1)?;
                let b = src[offset];
                Ok((
                    Self::DoublePoint {
                        value: DoublePointValue::from_bits(b),
                        quality: QualityDescriptor::from_byte(b & 0xf0),
                    },
                    offset + 1,
                ))
            }
            ElementKind::StepPosition => {
                check(src, offset, 2)?;
                Ok((
                    Self::StepPosition {
                        position: StepPosition::from_byte(src[offset]),
                        quality: QualityDescriptor::from_byte(src[offset + 1]),
                    },
                    offset + 2,
                ))
            }
            ElementKind::Bitstring => {
                let (value, next) = decode_u32(src, offset)?;
                check(src, next, 1)?;
                Ok((
                    Self::Bitstring {
                        value,
                        quality: QualityDescriptor::from_byte(src[next]),
                    },
                    next + 1,
                ))
            }
            ElementKind::Normalized => {
                let (value, next) = NormalizedValue::decode(src, offset)?;
                check(src, next, 1)?;
                Ok((
                    Self::Normalized {
                        value,
                        quality: QualityDescriptor::from_byte(src[next]),
                    },
                    next + 1,
                ))
            }
            ElementKind::NormalizedNoQuality => {
                let (value, next) = NormalizedValue::decode(src, offset)?;
                Ok((Self::NormalizedNoQuality { value }, next))
            }
            ElementKind::Scaled => {
                let (value, next) = decode_i16(src, offset)?;
                check(src, next, 1)?;
                Ok((
                    Self::Scaled {
                        value,
                        quality: QualityDescriptor::from_byte(src[next]),
                    },
                    next + 1,
                ))
            }
            ElementKind::ShortFloat => {
                let (value, next) = decode_f32(src, offset)?;
                check(src, next, 1)?;
                Ok((
                    Self::ShortFloat {
                        value,
                        quality: QualityDescriptor::from_byte(src[next]),
                    },
                    next + 1,
                ))
            }
            ElementKind::IntegratedTotals => {
                let (value, next) = BinaryCounterReading::decode(src, offset)?;
                Ok((Self::IntegratedTotals { value }, next))
            }
            ElementKind::ProtectionEvent => {
                check(src, offset, 1)?;
                let event = src[offset];
                let (elapsed, next) = Cp16Time2a::decode(src, offset + 1)?;
                Ok((Self::ProtectionEvent { event, elapsed }, next))
            }
            ElementKind::ProtectionStartEvents => {
                check(src, offset, 2)?;
                let events = src[offset];
                let quality = src[offset + 1];
                let (duration, next) = Cp16Time2a::decode(src, offset + 2)?;
                Ok((
                    Self::ProtectionStartEvents {
                        events,
                        quality,
                        duration,
                    },
                    next,
                ))
            }
            ElementKind::ProtectionOutputCircuit => {
                check(src, offset, 2)?;
                let circuits = src[offset];
                let quality = src[offset + 1];
                let (operating_time, next) = Cp16Time2a::decode(src, offset + 2)?;
                Ok((
                    Self::ProtectionOutputCircuit {
                        circuits,
                        quality,
                        operating_time,
                    },
                    next,
                ))
            }
            ElementKind::PackedSinglePoints => {
                let (status, next) = decode_u16(src, offset)?;
                let (change, next) = decode_u16(src, next)?;
                check(src, next, 1)?;
                Ok((
                    Self::PackedSinglePoints {
                        status,
                        change,
                        quality: QualityDescriptor::from_byte(src[next]),
                    },
                    next + 1,
                ))
            }
            ElementKind::SingleCommand => {
                check(src, offset, 1)?;
                Ok((
                    Self::SingleCommand(SingleCommand::from_byte(src[offset])),
                    offset + 1,
                ))
            }
            ElementKind::DoubleCommand => {
                check(src, offset, 1)?;
                Ok((
                    Self::DoubleCommand(DoubleCommand::from_byte(src[offset])),
                    offset + 1,
                ))
            }
            ElementKind::StepCommand => {
                check(src, offset, 1)?;
                Ok((
                    Self::StepCommand(StepCommand::from_byte(src[offset])),
                    offset + 1,
                ))
            }
            ElementKind::SetpointNormalized => {
                let (value, next) = NormalizedValue::decode(src, offset)?;
                check(src, next, 1)?;
                Ok((
                    Self::SetpointNormalized {
                        value,
                        qualifier: SetpointQualifier::from_byte(src[next]),
                    },
                    next + 1,
                ))
            }
            ElementKind::SetpointScaled => {
                let (value, next) = decode_i16(src, offset)?;
                check(src, next, 1)?;
                Ok((
                    Self::SetpointScaled {
                        value,
                        qualifier: SetpointQualifier::from_byte(src[next]),
                    },
                    next + 1,
                ))
            }
            ElementKind::SetpointShortFloat => {
                let (value, next) = decode_f32(src, offset)?;
                check(src, next, 1)?;
                Ok((
                    Self::SetpointShortFloat {
                        value,
                        qualifier: SetpointQualifier::from_byte(src[next]),
                    },
                    next + 1,
                ))
            }
            ElementKind::BitstringCommand => {
                let (value, next) = decode_u32(src, offset)?;
                Ok((Self::BitstringCommand { value }, next))
            }
            ElementKind::EndOfInitialization => {
                check(src, offset, 1)?;
                Ok((
                    Self::EndOfInitialization {
                        cause: src[offset],
                    },
                    offset + 1,
                ))
            }
            ElementKind::Interrogation => {
                check(src, offset, 1)?;
                Ok((
                    Self::Interrogation {
                        qualifier: src[offset],
                    },
                    offset + 1,
                ))
            }
            ElementKind::CounterInterrogation => {
                check(src, offset, 1)?;
                Ok((
                    Self::CounterInterrogation {
                        qualifier: src[offset],
                    },
                    offset + 1,
                ))
            }
            ElementKind::Read => Ok((Self::Read, offset)),
            ElementKind::ClockSync => {
                let (time, next) = Cp56Time2a::decode(src, offset)?;
                Ok((Self::ClockSync { time }, next))
            }
            ElementKind::TestCommand => {
                let (_, next) = decode_u16(src, offset)?;
                Ok((Self::TestCommand, next))
            }
            ElementKind::TestCommandWithTime => {
                let (counter, next) = decode_u16(src, offset)?;
                Ok((Self::TestCommandWithTime { counter }, next))
            }
            ElementKind::ResetProcess => {
                check(src, offset, 1)?;
                Ok((
                    Self::ResetProcess {
                        qualifier: src[offset],
                    },
                    offset + 1,
                ))
            }
            ElementKind::DelayAcquisition => {
                let (delay, next) = Cp16Time2a::decode(src, offset)?;
                Ok((Self::DelayAcquisition { delay }, next))
            }
            ElementKind::ParameterNormalized => {
                let (value, next) = NormalizedValue::decode(src, offset)?;
                check(src, next, 1)?;
                Ok((
                    Self::ParameterNormalized {
                        value,
                        qualifier: src[next],
                    },
                    next + 1,
                ))
            }
            ElementKind::ParameterScaled => {
                let (value, next) = decode_i16(src, offset)?;
                check(src, next, 1)?;
                Ok((
                    Self::ParameterScaled {
                        value,
                        qualifier: src[next],
                    },
                    next + 1,
                ))
            }
            ElementKind::ParameterShortFloat => {
                let (value, next) = decode_f32(src, offset)?;
                check(src, next, 1)?;
                Ok((
                    Self::ParameterShortFloat {
                        value,
                        qualifier: src[next],
                    },
                    next + 1,
                ))
            }
            ElementKind::ParameterActivation => {
                check(src, offset, 1)?;
                Ok((
                    Self::ParameterActivation {
                        qualifier: src[offset],
                    },
                    offset + 1,
                ))
            }
            ElementKind::FileReady => {
                let (name, next) = decode_u16(src, offset)?;
                let (length, next) = decode_u24(src, next)?;
                check(src, next, 1)?;
                Ok((
                    Self::FileReady {
                        name,
                        length,
                        qualifier: src[next],
                    },
                    next + 1,
                ))
            }
            ElementKind::SectionReady => {
                let (name, next) = decode_u16(src, offset)?;
                check(src, next, 1)?;
                let section = src[next];
                let (length, next) = decode_u24(src, next + 1)?;
                check(src, next, 1)?;
                Ok((
                    Self::SectionReady {
                        name,
                        section,
                        length,
                        qualifier: src[next],
                    },
                    next + 1,
                ))
            }
            ElementKind::CallFile => {
                let (name, next) = decode_u16(src, offset)?;
                check(src, next, 2)?;
                Ok((
                    Self::CallFile {
                        name,
                        section: src[next],
                        qualifier: src[next + 1],
                    },
                    next + 2,
                ))
            }
            ElementKind::LastSection => {
                let (name, next) = decode_u16(src, offset)?;
                check(src, next, 3)?;
                Ok((
                    Self::LastSection {
                        name,
                        section: src[next],
                        qualifier: src[next + 1],
                        checksum: src[next + 2],
                    },
                    next + 3,
                ))
            }
            ElementKind::AckFile => {
                let (name, next) = decode_u16(src, offset)?;
                check(src, next, 2)?;
                Ok((
                    Self::AckFile {
                        name,
                        section: src[next],
                        qualifier: src[next + 1],
                    },
                    next + 2,
                ))
            }
            ElementKind::FileSegment => {
                let (name, next) = decode_u16(src, offset)?;
                check(src, next, 2)?;
                let section = src[next];
                let length = src[next + 1] as usize;
                check(src, next + 2, length)?;
                let segment = FileSegment::from_slice(&src[next + 2..next + 2 + length])?;
                Ok((
                    Self::FileSegment {
                        name,
                        section,
                        segment,
                    },
                    next + 2 + length,
                ))
            }
            ElementKind::Directory => {
                let (name, next) = decode_u16(src, offset)?;
                let (length, next) = decode_u24(src, next)?;
                check(src, next, 1)?;
                Ok((
                    Self::Directory {
                        name,
                        length,
                        status: src[next],
                    },
                    next + 1,
                ))
            }
            ElementKind::QueryLog => {
                let (name, next) = decode_u16(src, offset)?;
                let (start, next) = Cp56Time2a::decode(src, next)?;
                let (stop, next) = Cp56Time2a::decode(src, next)?;
                Ok((Self::QueryLog { name, start, stop }, next))
            }
        }
    }
}

/// One information object: address, element value and optional time tag
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InformationObject {
    /// Information object address (width per application layer parameters)
    pub address: u32,
    /// The element value
    pub element: InformationElement,
    /// Optional CP24/CP56 time tag
    pub time: Option<TimeTag>,
}

impl InformationObject {
    pub fn new(address: u32, element: InformationElement) -> Self {
        Self {
            address,
            element,
            time: None,
        }
    }

    pub fn with_time(address: u32, element: InformationElement, time: TimeTag) -> Self {
        Self {
            address,
            element,
            time: Some(time),
        }
    }

    /// The type identifier implied by element kind and time tag width
    pub fn type_id(&self) -> Option<TypeId> {
        let time = self.time.map(|t| t.kind()).unwrap_or(TimeTagKind::None);
        type_id_for(self.element.kind(), time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_table_round_trip() {
        // every catalogued type with a codec maps back to itself
        for raw in 1..=127u8 {
            let Some(id) = TypeId::from_byte(raw) else {
                continue;
            };
            let Some(info) = type_info(id) else {
                continue;
            };
            assert_eq!(
                type_id_for(info.kind, info.time),
                Some(id),
                "table entry for {:?} is not invertible",
                id
            );
        }
    }

    #[test]
    fn security_types_have_no_codec() {
        assert!(type_info(TypeId::S_CH_NA_1).is_none());
        assert!(type_info(TypeId::S_UC_NA_1).is_none());
        assert!(type_info(TypeId::S_IT_TC_1).is_none());
    }

    #[test]
    fn element_sizes_match_the_standard() {
        let cases = [
            (TypeId::M_SP_NA_1, 1),
            (TypeId::M_SP_TA_1, 4),
            (TypeId::M_SP_TB_1, 8),
            (TypeId::M_ST_NA_1, 2),
            (TypeId::M_BO_NA_1, 5),
            (TypeId::M_ME_NA_1, 3),
            (TypeId::M_ME_NC_1, 5),
            (TypeId::M_ME_TF_1, 12),
            (TypeId::M_IT_NA_1, 5),
            (TypeId::M_EP_TA_1, 6),
            (TypeId::M_EP_TE_1, 11),
            (TypeId::M_PS_NA_1, 5),
            (TypeId::M_ME_ND_1, 2),
            (TypeId::C_SC_NA_1, 1),
            (TypeId::C_SC_TA_1, 8),
            (TypeId::C_SE_NC_1, 5),
            (TypeId::C_SE_TC_1, 12),
            (TypeId::C_BO_TA_1, 11),
            (TypeId::C_IC_NA_1, 1),
            (TypeId::C_CS_NA_1, 7),
            (TypeId::C_TS_NA_1, 2),
            (TypeId::C_TS_TA_1, 9),
            (TypeId::C_RD_NA_1, 0),
            (TypeId::F_FR_NA_1, 6),
            (TypeId::F_DR_TA_1, 13),
            (TypeId::F_SC_NB_1, 16),
        ];
        for (id, expected) in cases {
            let info = type_info(id).unwrap();
            assert_eq!(info.element_size(), Some(expected), "size of {:?}", id);
        }
        assert_eq!(type_info(TypeId::F_SG_NA_1).unwrap().element_size(), None);
    }

    #[test]
    fn single_point_bit_layout() {
        let element = InformationElement::SinglePoint {
            value: true,
            quality: QualityDescriptor {
                invalid: true,
                ..QualityDescriptor::GOOD
            },
        };
        let mut buf = [0u8; 1];
        element.encode(&mut buf, 0).unwrap();
        assert_eq!(buf[0], 0x81);
        let (decoded, _) = InformationElement::decode(ElementKind::SinglePoint, &buf, 0).unwrap();
        assert_eq!(decoded, element);
    }

    #[test]
    fn quality_bits_preserved_verbatim() {
        // an SIQ byte with all quality bits set round-trips unchanged
        let buf = [0xf1u8];
        let (decoded, _) = InformationElement::decode(ElementKind::SinglePoint, &buf, 0).unwrap();
        let mut out = [0u8; 1];
        decoded.encode(&mut out, 0).unwrap();
        assert_eq!(out[0], 0xf1);
    }

    #[test]
    fn every_fixed_kind_round_trips() {
        use super::InformationElement as E;
        let elements: Vec<InformationElement> = vec![
            E::SinglePoint {
                value: false,
                quality: QualityDescriptor::GOOD,
            },
            E::DoublePoint {
                value: DoublePointValue::Off,
                quality: QualityDescriptor::from_byte(0x40),
            },
            E::StepPosition {
                position: StepPosition {
                    value: -12,
                    transient: true,
                },
                quality: QualityDescriptor::GOOD,
            },
            E::Bitstring {
                value: 0xdead_beef,
                quality: QualityDescriptor::GOOD,
            },
            E::Normalized {
                value: NormalizedValue(-1234),
                quality: QualityDescriptor::GOOD,
            },
            E::NormalizedNoQuality {
                value: NormalizedValue(99),
            },
            E::Scaled {
                value: -777,
                quality: QualityDescriptor::from_byte(0x10),
            },
            E::ShortFloat {
                value: 3.14,
                quality: QualityDescriptor::GOOD,
            },
            E::IntegratedTotals {
                value: BinaryCounterReading::new(123456, 7),
            },
            E::ProtectionEvent {
                event: 0x01,
                elapsed: Cp16Time2a(300),
            },
            E::ProtectionStartEvents {
                events: 0x1f,
                quality: 0x08,
                duration: Cp16Time2a(20),
            },
            E::ProtectionOutputCircuit {
                circuits: 0x0f,
                quality: 0x00,
                operating_time: Cp16Time2a(65535),
            },
            E::PackedSinglePoints {
                status: 0xaaaa,
                change: 0x5555,
                quality: QualityDescriptor::GOOD,
            },
            E::SingleCommand(SingleCommand::execute(true)),
            E::DoubleCommand(DoubleCommand::execute(DoublePointValue::On)),
            E::StepCommand(StepCommand::from_byte(0x01)),
            E::SetpointNormalized {
                value: NormalizedValue(1000),
                qualifier: SetpointQualifier::default(),
            },
            E::SetpointScaled {
                value: -2,
                qualifier: SetpointQualifier::from_byte(0x80),
            },
            E::SetpointShortFloat {
                value: -1.5,
                qualifier: SetpointQualifier::default(),
            },
            E::BitstringCommand { value: 42 },
            E::EndOfInitialization { cause: 0 },
            E::Interrogation { qualifier: 20 },
            E::CounterInterrogation { qualifier: 5 },
            E::Read,
            E::ClockSync {
                time: Cp56Time2a::from_millis(1_688_466_645_250),
            },
            E::TestCommand,
            E::TestCommandWithTime { counter: 0x1234 },
            E::ResetProcess { qualifier: 1 },
            E::DelayAcquisition {
                delay: Cp16Time2a(150),
            },
            E::ParameterNormalized {
                value: NormalizedValue(3),
                qualifier: 1,
            },
            E::ParameterScaled {
                value: 3,
                qualifier: 2,
            },
            E::ParameterShortFloat {
                value: 0.25,
                qualifier: 3,
            },
            E::ParameterActivation { qualifier: 1 },
            E::FileReady {
                name: 1,
                length: 1024,
                qualifier: 0,
            },
            E::SectionReady {
                name: 1,
                section: 2,
                length: 512,
                qualifier: 0,
            },
            E::CallFile {
                name: 1,
                section: 0,
                qualifier: 2,
            },
            E::LastSection {
                name: 1,
                section: 3,
                qualifier: 1,
                checksum: 0x42,
            },
            E::AckFile {
                name: 1,
                section: 3,
                qualifier: 1,
            },
            E::FileSegment {
                name: 1,
                section: 3,
                segment: FileSegment::from_slice(&[1, 2, 3, 4, 5]).unwrap(),
            },
            E::Directory {
                name: 9,
                length: 2048,
                status: 0x20,
            },
            E::QueryLog {
                name: 1,
                start: Cp56Time2a::from_millis(0),
                stop: Cp56Time2a::from_millis(86_400_000),
            },
        ];

        for element in elements {
            let mut buf = [0u8; 64];
            let end = element.encode(&mut buf, 0).unwrap();
            assert_eq!(end, element.size(), "size of {:?}", element.kind());
            let (decoded, next) =
                InformationElement::decode(element.kind(), &buf[..end], 0).unwrap();
            assert_eq!(decoded, element);
            assert_eq!(next, end);
        }
    }

    #[test]
    fn truncated_element_is_rejected() {
        let buf = [0u8; 2];
        assert_eq!(
            InformationElement::decode(ElementKind::ShortFloat, &buf, 0),
            Err(CodecError::Truncated)
        );
    }

    #[test]
    fn file_segment_bounds() {
        assert!(FileSegment::from_slice(&[0u8; MAX_FILE_SEGMENT_SIZE]).is_ok());
        assert_eq!(
            FileSegment::from_slice(&[0u8; MAX_FILE_SEGMENT_SIZE + 1]),
            Err(CodecError::Overflow)
        );
    }

    #[test]
    fn object_type_id_derivation() {
        let obj = InformationObject::new(
            100,
            InformationElement::ShortFloat {
                value: 3.14,
                quality: QualityDescriptor::GOOD,
            },
        );
        assert_eq!(obj.type_id(), Some(TypeId::M_ME_NC_1));

        let tagged = InformationObject::with_time(
            100,
            InformationElement::ShortFloat {
                value: 3.14,
                quality: QualityDescriptor::GOOD,
            },
            TimeTag::Cp56(Cp56Time2a::from_millis(0)),
        );
        assert_eq!(tagged.type_id(), Some(TypeId::M_ME_TF_1));

        // a command may not carry a CP24 tag
        let invalid = InformationObject::with_time(
            1,
            InformationElement::SingleCommand(SingleCommand::execute(true)),
            TimeTag::Cp24(Cp24Time2a::new(0, 0, 0)),
        );
        assert_eq!(invalid.type_id(), None);
    }
}
