//! Common protocol data types
//!
//! Type identifiers, causes of transmission, quality descriptors and the
//! small value enums shared by the ASDU codec and both link layers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// IEC 60870-5 message type identifiers
///
/// The catalogue is closed: monitoring types 1..41, control types 45..64,
/// system types 70..107, parameter types 110..113 and file types 120..127.
/// The security extension identifiers (81..95) are catalogued but carry no
/// codec in this crate.
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum TypeId {
    /// Single-point information
    M_SP_NA_1 = 1,
    /// Single-point information with CP24 time tag
    M_SP_TA_1 = 2,
    /// Double-point information
    M_DP_NA_1 = 3,
    /// Double-point information with CP24 time tag
    M_DP_TA_1 = 4,
    /// Step position information
    M_ST_NA_1 = 5,
    /// Step position information with CP24 time tag
    M_ST_TA_1 = 6,
    /// Bitstring of 32 bit
    M_BO_NA_1 = 7,
    /// Bitstring of 32 bit with CP24 time tag
    M_BO_TA_1 = 8,
    /// Measured value, normalized
    M_ME_NA_1 = 9,
    /// Measured value, normalized, with CP24 time tag
    M_ME_TA_1 = 10,
    /// Measured value, scaled
    M_ME_NB_1 = 11,
    /// Measured value, scaled, with CP24 time tag
    M_ME_TB_1 = 12,
    /// Measured value, short float
    M_ME_NC_1 = 13,
    /// Measured value, short float, with CP24 time tag
    M_ME_TC_1 = 14,
    /// Integrated totals
    M_IT_NA_1 = 15,
    /// Integrated totals with CP24 time tag
    M_IT_TA_1 = 16,
    /// Protection equipment event with CP24 time tag
    M_EP_TA_1 = 17,
    /// Packed start events of protection equipment with CP24 time tag
    M_EP_TB_1 = 18,
    /// Packed output circuit information with CP24 time tag
    M_EP_TC_1 = 19,
    /// Packed single-point information with status change detection
    M_PS_NA_1 = 20,
    /// Measured value, normalized, without quality descriptor
    M_ME_ND_1 = 21,
    /// Single-point information with CP56 time tag
    M_SP_TB_1 = 30,
    /// Double-point information with CP56 time tag
    M_DP_TB_1 = 31,
    /// Step position information with CP56 time tag
    M_ST_TB_1 = 32,
    /// Bitstring of 32 bit with CP56 time tag
    M_BO_TB_1 = 33,
    /// Measured value, normalized, with CP56 time tag
    M_ME_TD_1 = 34,
    /// Measured value, scaled, with CP56 time tag
    M_ME_TE_1 = 35,
    /// Measured value, short float, with CP56 time tag
    M_ME_TF_1 = 36,
    /// Integrated totals with CP56 time tag
    M_IT_TB_1 = 37,
    /// Protection equipment event with CP56 time tag
    M_EP_TD_1 = 38,
    /// Packed start events of protection equipment with CP56 time tag
    M_EP_TE_1 = 39,
    /// Packed output circuit information with CP56 time tag
    M_EP_TF_1 = 40,
    /// Integrated totals containing time-tagged security statistics
    S_IT_TC_1 = 41,
    /// Single command
    C_SC_NA_1 = 45,
    /// Double command
    C_DC_NA_1 = 46,
    /// Regulating step command
    C_RC_NA_1 = 47,
    /// Set-point command, normalized
    C_SE_NA_1 = 48,
    /// Set-point command, scaled
    C_SE_NB_1 = 49,
    /// Set-point command, short float
    C_SE_NC_1 = 50,
    /// Bitstring of 32 bit command
    C_BO_NA_1 = 51,
    /// Single command with CP56 time tag
    C_SC_TA_1 = 58,
    /// Double command with CP56 time tag
    C_DC_TA_1 = 59,
    /// Regulating step command with CP56 time tag
    C_RC_TA_1 = 60,
    /// Set-point command, normalized, with CP56 time tag
    C_SE_TA_1 = 61,
    /// Set-point command, scaled, with CP56 time tag
    C_SE_TB_1 = 62,
    /// Set-point command, short float, with CP56 time tag
    C_SE_TC_1 = 63,
    /// Bitstring of 32 bit command with CP56 time tag
    C_BO_TA_1 = 64,
    /// End of initialization
    M_EI_NA_1 = 70,
    /// Authentication challenge
    S_CH_NA_1 = 81,
    /// Authentication reply
    S_RP_NA_1 = 82,
    /// Aggressive mode authentication request
    S_AR_NA_1 = 83,
    /// Session key status request
    S_KR_NA_1 = 84,
    /// Session key status
    S_KS_NA_1 = 85,
    /// Session key change
    S_KC_NA_1 = 86,
    /// Authentication error
    S_ER_NA_1 = 87,
    /// User status change
    S_US_NA_1 = 90,
    /// Update key change request
    S_UQ_NA_1 = 91,
    /// Update key change reply
    S_UR_NA_1 = 92,
    /// Update key change symmetric
    S_UK_NA_1 = 93,
    /// Update key change asymmetric
    S_UA_NA_1 = 94,
    /// Update key change confirmation
    S_UC_NA_1 = 95,
    /// Interrogation command
    C_IC_NA_1 = 100,
    /// Counter interrogation command
    C_CI_NA_1 = 101,
    /// Read command
    C_RD_NA_1 = 102,
    /// Clock synchronization command
    C_CS_NA_1 = 103,
    /// Test command
    C_TS_NA_1 = 104,
    /// Reset process command
    C_RP_NA_1 = 105,
    /// Delay acquisition command
    C_CD_NA_1 = 106,
    /// Test command with CP56 time tag
    C_TS_TA_1 = 107,
    /// Parameter of measured value, normalized
    P_ME_NA_1 = 110,
    /// Parameter of measured value, scaled
    P_ME_NB_1 = 111,
    /// Parameter of measured value, short float
    P_ME_NC_1 = 112,
    /// Parameter activation
    P_AC_NA_1 = 113,
    /// File ready
    F_FR_NA_1 = 120,
    /// Section ready
    F_SR_NA_1 = 121,
    /// Call directory, file, section
    F_SC_NA_1 = 122,
    /// Last section, last segment
    F_LS_NA_1 = 123,
    /// Ack file, ack section
    F_AF_NA_1 = 124,
    /// File segment
    F_SG_NA_1 = 125,
    /// Directory
    F_DR_TA_1 = 126,
    /// Query log
    F_SC_NB_1 = 127,
}

impl TypeId {
    /// Decode a type identifier from its wire value
    pub fn from_byte(value: u8) -> Option<Self> {
        Some(match value {
            1 => Self::M_SP_NA_1,
            2 => Self::M_SP_TA_1,
            3 => Self::M_DP_NA_1,
            4 => Self::M_DP_TA_1,
            5 => Self::M_ST_NA_1,
            6 => Self::M_ST_TA_1,
            7 => Self::M_BO_NA_1,
            8 => Self::M_BO_TA_1,
            9 => Self::M_ME_NA_1,
            10 => Self::M_ME_TA_1,
            11 => Self::M_ME_NB_1,
            12 => Self::M_ME_TB_1,
            13 => Self::M_ME_NC_1,
            14 => Self::M_ME_TC_1,
            15 => Self::M_IT_NA_1,
            16 => Self::M_IT_TA_1,
            17 => Self::M_EP_TA_1,
            18 => Self::M_EP_TB_1,
            19 => Self::M_EP_TC_1,
            20 => Self::M_PS_NA_1,
            21 => Self::M_ME_ND_1,
            30 => Self::M_SP_TB_1,
            31 => Self::M_DP_TB_1,
            32 => Self::M_ST_TB_1,
            33 => Self::M_BO_TB_1,
            34 => Self::M_ME_TD_1,
            35 => Self::M_ME_TE_1,
            36 => Self::M_ME_TF_1,
            37 => Self::M_IT_TB_1,
            38 => Self::M_EP_TD_1,
            39 => Self::M_EP_TE_1,
            40 => Self::M_EP_TF_1,
            41 => Self::S_IT_TC_1,
            45 => Self::C_SC_NA_1,
            46 => Self::C_DC_NA_1,
            47 => Self::C_RC_NA_1,
            48 => Self::C_SE_NA_1,
            49 => Self::C_SE_NB_1,
            50 => Self::C_SE_NC_1,
            51 => Self::C_BO_NA_1,
            58 => Self::C_SC_TA_1,
            59 => Self::C_DC_TA_1,
            60 => Self::C_RC_TA_1,
            61 => Self::C_SE_TA_1,
            62 => Self::C_SE_TB_1,
            63 => Self::C_SE_TC_1,
            64 => Self::C_BO_TA_1,
            70 => Self::M_EI_NA_1,
            81 => Self::S_CH_NA_1,
            82 => Self::S_RP_NA_1,
            83 => Self::S_AR_NA_1,
            84 => Self::S_KR_NA_1,
            85 => Self::S_KS_NA_1,
            86 => Self::S_KC_NA_1,
            87 => Self::S_ER_NA_1,
            90 => Self::S_US_NA_1,
            91 => Self::S_UQ_NA_1,
            92 => Self::S_UR_NA_1,
            93 => Self::S_UK_NA_1,
            94 => Self::S_UA_NA_1,
            95 => Self::S_UC_NA_1,
            100 => Self::C_IC_NA_1,
            101 => Self::C_CI_NA_1,
            102 => Self::C_RD_NA_1,
            103 => Self::C_CS_NA_1,
            104 => Self::C_TS_NA_1,
            105 => Self::C_RP_NA_1,
            106 => Self::C_CD_NA_1,
            107 => Self::C_TS_TA_1,
            110 => Self::P_ME_NA_1,
            111 => Self::P_ME_NB_1,
            112 => Self::P_ME_NC_1,
            113 => Self::P_AC_NA_1,
            120 => Self::F_FR_NA_1,
            121 => Self::F_SR_NA_1,
            122 => Self::F_SC_NA_1,
            123 => Self::F_LS_NA_1,
            124 => Self::F_AF_NA_1,
            125 => Self::F_SG_NA_1,
            126 => Self::F_DR_TA_1,
            127 => Self::F_SC_NB_1,
            _ => return None,
        })
    }

    /// Wire value of the type identifier
    pub fn to_byte(self) -> u8 {
        self as u8
    }

    /// True for types in the monitor direction (process information)
    pub fn is_monitoring(self) -> bool {
        (self as u8) <= 41
    }

    /// True for process command types (control direction)
    pub fn is_command(self) -> bool {
        matches!(self as u8, 45..=64)
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Cause of transmission (COT)
///
/// The 6 bit cause value of the COT field. Test and negative flags are
/// carried separately in the ASDU. Values without a standard meaning are
/// preserved as [`CauseOfTransmission::Unknown`] so a station can answer
/// them with a negative confirmation instead of dropping the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CauseOfTransmission {
    /// Periodic, cyclic
    Periodic,
    /// Background scan
    BackgroundScan,
    /// Spontaneous
    Spontaneous,
    /// Initialized
    Initialized,
    /// Request or requested
    Request,
    /// Activation
    Activation,
    /// Activation confirmation
    ActivationCon,
    /// Deactivation
    Deactivation,
    /// Deactivation confirmation
    DeactivationCon,
    /// Activation termination
    ActivationTermination,
    /// Return information caused by a remote command
    ReturnInfoRemote,
    /// Return information caused by a local command
    ReturnInfoLocal,
    /// File transfer
    FileTransfer,
    /// Authentication
    Authentication,
    /// Maintenance of authentication session key
    MaintenanceOfAuthSessionKey,
    /// Maintenance of user role and update key
    MaintenanceOfUserRoleAndUpdateKey,
    /// Interrogated by station interrogation
    InterrogatedByStation,
    /// Interrogated by group interrogation (1..=16)
    InterrogatedByGroup(u8),
    /// Requested by general counter request
    RequestedByGeneralCounter,
    /// Requested by group counter request (1..=4)
    RequestedByGroupCounter(u8),
    /// Unknown type identification
    UnknownTypeId,
    /// Unknown cause of transmission
    UnknownCot,
    /// Unknown common address of ASDU
    UnknownCa,
    /// Unknown information object address
    UnknownIoa,
    /// Cause value without a standard meaning, preserved verbatim
    Unknown(u8),
}

impl CauseOfTransmission {
    /// Decode the 6 bit cause value
    pub fn from_byte(value: u8) -> Self {
        match value & 0x3f {
            1 => Self::Periodic,
            2 => Self::BackgroundScan,
            3 => Self::Spontaneous,
            4 => Self::Initialized,
            5 => Self::Request,
            6 => Self::Activation,
            7 => Self::ActivationCon,
            8 => Self::Deactivation,
            9 => Self::DeactivationCon,
            10 => Self::ActivationTermination,
            11 => Self::ReturnInfoRemote,
            12 => Self::ReturnInfoLocal,
            13 => Self::FileTransfer,
            14 => Self::Authentication,
            15 => Self::MaintenanceOfAuthSessionKey,
            16 => Self::MaintenanceOfUserRoleAndUpdateKey,
            20 => Self::InterrogatedByStation,
            g @ 21..=36 => Self::InterrogatedByGroup(g - 20),
            37 => Self::RequestedByGeneralCounter,
            g @ 38..=41 => Self::RequestedByGroupCounter(g - 37),
            44 => Self::UnknownTypeId,
            45 => Self::UnknownCot,
            46 => Self::UnknownCa,
            47 => Self::UnknownIoa,
            other => Self::Unknown(other),
        }
    }

    /// Encode as the 6 bit cause value
    pub fn to_byte(self) -> u8 {
        match self {
            Self::Periodic => 1,
            Self::BackgroundScan => 2,
            Self::Spontaneous => 3,
            Self::Initialized => 4,
            Self::Request => 5,
            Self::Activation => 6,
            Self::ActivationCon => 7,
            Self::Deactivation => 8,
            Self::DeactivationCon => 9,
            Self::ActivationTermination => 10,
            Self::ReturnInfoRemote => 11,
            Self::ReturnInfoLocal => 12,
            Self::FileTransfer => 13,
            Self::Authentication => 14,
            Self::MaintenanceOfAuthSessionKey => 15,
            Self::MaintenanceOfUserRoleAndUpdateKey => 16,
            Self::InterrogatedByStation => 20,
            Self::InterrogatedByGroup(g) => 20 + g.min(16),
            Self::RequestedByGeneralCounter => 37,
            Self::RequestedByGroupCounter(g) => 37 + g.min(4),
            Self::UnknownTypeId => 44,
            Self::UnknownCot => 45,
            Self::UnknownCa => 46,
            Self::UnknownIoa => 47,
            Self::Unknown(v) => v & 0x3f,
        }
    }
}

impl fmt::Display for CauseOfTransmission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InterrogatedByGroup(g) => write!(f, "interrogated by group {}", g),
            Self::RequestedByGroupCounter(g) => write!(f, "requested by group {} counter", g),
            Self::Unknown(v) => write!(f, "unknown cause {}", v),
            other => write!(f, "{:?}", other),
        }
    }
}

/// Quality descriptor flags (QDS)
///
/// Bit 0 is the overflow flag for measurands; for SIQ/DIQ it carries the
/// point value instead and is never set here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QualityDescriptor {
    /// Value exceeds the measuring range
    pub overflow: bool,
    /// Value is blocked for transmission by a local lock
    pub blocked: bool,
    /// Value was provided by the operator or an automatic source
    pub substituted: bool,
    /// Value is outdated
    pub not_topical: bool,
    /// Value is invalid
    pub invalid: bool,
}

impl QualityDescriptor {
    pub const GOOD: Self = Self {
        overflow: false,
        blocked: false,
        substituted: false,
        not_topical: false,
        invalid: false,
    };

    /// Decode from a quality byte; bits are preserved verbatim
    pub fn from_byte(value: u8) -> Self {
        Self {
            overflow: value & 0x01 != 0,
            blocked: value & 0x10 != 0,
            substituted: value & 0x20 != 0,
            not_topical: value & 0x40 != 0,
            invalid: value & 0x80 != 0,
        }
    }

    /// Encode as a quality byte
    pub fn to_byte(self) -> u8 {
        let mut value = 0u8;
        if self.overflow {
            value |= 0x01;
        }
        if self.blocked {
            value |= 0x10;
        }
        if self.substituted {
            value |= 0x20;
        }
        if self.not_topical {
            value |= 0x40;
        }
        if self.invalid {
            value |= 0x80;
        }
        value
    }

    /// True when no quality flag is raised
    pub fn is_good(self) -> bool {
        self == Self::GOOD
    }
}

/// Double-point information value (DPI)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum DoublePointValue {
    /// Indeterminate or intermediate state
    Intermediate = 0,
    /// Determined state OFF
    Off = 1,
    /// Determined state ON
    On = 2,
    /// Indeterminate state
    Indeterminate = 3,
}

impl DoublePointValue {
    pub fn from_bits(value: u8) -> Self {
        match value & 0x03 {
            0 => Self::Intermediate,
            1 => Self::Off,
            2 => Self::On,
            _ => Self::Indeterminate,
        }
    }

    pub fn to_bits(self) -> u8 {
        self as u8
    }
}

/// Regulating step command state (RCS)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum StepCommandValue {
    /// Not permitted
    Invalid0 = 0,
    /// Next step lower
    Lower = 1,
    /// Next step higher
    Higher = 2,
    /// Not permitted
    Invalid3 = 3,
}

impl StepCommandValue {
    pub fn from_bits(value: u8) -> Self {
        match value & 0x03 {
            0 => Self::Invalid0,
            1 => Self::Lower,
            2 => Self::Higher,
            _ => Self::Invalid3,
        }
    }

    pub fn to_bits(self) -> u8 {
        self as u8
    }
}

/// State of a CS101 link as observed by the link layer state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkLayerState {
    /// No communication
    Idle,
    /// The link failed and is not usable
    Error,
    /// The link is busy (peer signalled data flow control)
    Busy,
    /// The link is available for user data
    Available,
}

impl fmt::Display for LinkLayerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_id_round_trip() {
        for value in 0..=255u8 {
            if let Some(id) = TypeId::from_byte(value) {
                assert_eq!(id.to_byte(), value);
            }
        }
        assert_eq!(TypeId::from_byte(42), None);
        assert_eq!(TypeId::from_byte(128), None);
        assert_eq!(TypeId::from_byte(0), None);
    }

    #[test]
    fn cot_round_trip() {
        for value in 0..=63u8 {
            let cot = CauseOfTransmission::from_byte(value);
            assert_eq!(cot.to_byte(), value, "cause {}", value);
        }
        assert_eq!(
            CauseOfTransmission::from_byte(21),
            CauseOfTransmission::InterrogatedByGroup(1)
        );
        assert_eq!(
            CauseOfTransmission::from_byte(38),
            CauseOfTransmission::RequestedByGroupCounter(1)
        );
        assert_eq!(
            CauseOfTransmission::from_byte(0),
            CauseOfTransmission::Unknown(0)
        );
    }

    #[test]
    fn quality_bits() {
        let q = QualityDescriptor::from_byte(0xf1);
        assert!(q.overflow && q.blocked && q.substituted && q.not_topical && q.invalid);
        assert_eq!(q.to_byte(), 0xf1);
        assert!(QualityDescriptor::from_byte(0).is_good());
        // bits 1..3 are not represented and read back as zero
        assert_eq!(QualityDescriptor::from_byte(0x0e).to_byte(), 0x00);
    }

    #[test]
    fn double_point_bits() {
        assert_eq!(DoublePointValue::from_bits(1), DoublePointValue::Off);
        assert_eq!(DoublePointValue::from_bits(2), DoublePointValue::On);
        assert_eq!(DoublePointValue::On.to_bits(), 2);
    }
}
