//! Protocol constants shared by CS101 and CS104

/// Default TCP port for IEC 60870-5-104
pub const IEC_104_DEFAULT_PORT: u16 = 2404;

/// Default TLS port for IEC 60870-5-104
pub const IEC_104_DEFAULT_TLS_PORT: u16 = 19998;

/// Maximum ASDU size that fits a CS104 APDU (255 - 6 byte APCI)
pub const MAX_ASDU_SIZE_CS104: usize = 249;

/// Maximum ASDU size that fits a CS101 variable-length frame
pub const MAX_ASDU_SIZE_CS101: usize = 254;

/// Maximum APDU length field value (control field + ASDU)
pub const MAX_APDU_LENGTH: usize = 253;

/// APCI start byte and full APCI size
pub const APCI_START: u8 = 0x68;
pub const APCI_SIZE: usize = 6;

/// Largest frame either link layer can produce (FT1.2 variable frame:
/// 4 byte header + control + 2 byte address + 254 byte ASDU + checksum + stop)
pub const MAX_FRAME_SIZE: usize = 262;

/// Sequence numbers are 15 bit and wrap modulo 2^15
pub const SEQUENCE_MODULO: u16 = 0x8000;

/// VSQ element count is 7 bit
pub const MAX_NUMBER_OF_ELEMENTS: u8 = 127;

/// Largest file segment payload of an F_SG_NA_1 object
pub const MAX_FILE_SEGMENT_SIZE: usize = 240;
