//! Protocol configuration blocks
//!
//! Application layer parameters shared by CS101 and CS104, the CS104 APCI
//! parameters (k/w windows and the four protocol timers) and the CS101 link
//! layer parameters. All blocks are plain values; a connection copies them at
//! construction time and treats them as immutable afterwards.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{MAX_ASDU_SIZE_CS101, MAX_ASDU_SIZE_CS104};
use crate::error::CodecError;

/// Parameters of the CS101/CS104 application layer
///
/// The triple (COT size, CA size, IOA size) must be configured identically on
/// both ends of a link for the channel to be interpretable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppLayerParameters {
    /// Size of the cause of transmission field (1 or 2; 2 includes the
    /// originator address)
    pub size_of_cot: u8,
    /// Size of the common address field (1 or 2)
    pub size_of_ca: u8,
    /// Size of the information object address field (1, 2 or 3)
    pub size_of_ioa: u8,
    /// Originator address placed in outgoing ASDUs when `size_of_cot` is 2
    pub originator_address: u8,
    /// Hard cap on the fully encoded ASDU
    pub max_size_of_asdu: usize,
}

impl Default for AppLayerParameters {
    fn default() -> Self {
        Self::cs104()
    }
}

impl AppLayerParameters {
    /// Defaults for a CS104 link (ASDU capped at 249 bytes)
    pub fn cs104() -> Self {
        Self {
            size_of_cot: 2,
            size_of_ca: 2,
            size_of_ioa: 3,
            originator_address: 0,
            max_size_of_asdu: MAX_ASDU_SIZE_CS104,
        }
    }

    /// Defaults for a CS101 link (ASDU capped at 254 bytes)
    pub fn cs101() -> Self {
        Self {
            max_size_of_asdu: MAX_ASDU_SIZE_CS101,
            ..Self::cs104()
        }
    }

    pub fn with_size_of_cot(mut self, size: u8) -> Self {
        self.size_of_cot = size;
        self
    }

    pub fn with_size_of_ca(mut self, size: u8) -> Self {
        self.size_of_ca = size;
        self
    }

    pub fn with_size_of_ioa(mut self, size: u8) -> Self {
        self.size_of_ioa = size;
        self
    }

    pub fn with_originator_address(mut self, oa: u8) -> Self {
        self.originator_address = oa;
        self
    }

    pub fn with_max_size_of_asdu(mut self, max: usize) -> Self {
        self.max_size_of_asdu = max;
        self
    }

    /// Check the field widths against the permitted values
    pub fn validate(&self) -> Result<(), CodecError> {
        if !matches!(self.size_of_cot, 1 | 2) {
            return Err(CodecError::InvalidWidth(self.size_of_cot));
        }
        if !matches!(self.size_of_ca, 1 | 2) {
            return Err(CodecError::InvalidWidth(self.size_of_ca));
        }
        if !matches!(self.size_of_ioa, 1..=3) {
            return Err(CodecError::InvalidWidth(self.size_of_ioa));
        }
        Ok(())
    }

    /// Size of the encoded ASDU header (type id + VSQ + COT + CA)
    pub fn header_size(&self) -> usize {
        2 + self.size_of_cot as usize + self.size_of_ca as usize
    }

    /// Largest information object address that fits the configured width
    pub fn max_ioa(&self) -> u32 {
        match self.size_of_ioa {
            1 => 0xff,
            2 => 0xffff,
            _ => 0x00ff_ffff,
        }
    }

    /// Largest common address that fits the configured width
    pub fn max_ca(&self) -> u16 {
        if self.size_of_ca == 1 {
            0xff
        } else {
            0xffff
        }
    }
}

/// CS104 APCI parameters: window sizes and protocol timers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApciParameters {
    /// Maximum number of unacknowledged I-frames in flight
    pub k: u16,
    /// Latest acknowledge after receiving w I-frames
    pub w: u16,
    /// Connection establishment timeout
    pub t0: Duration,
    /// Acknowledge timeout for sent I-frames and U-frames
    pub t1: Duration,
    /// Supervisory acknowledge delay after the last received I-frame
    pub t2: Duration,
    /// Idle test frame period
    pub t3: Duration,
}

impl Default for ApciParameters {
    fn default() -> Self {
        Self {
            k: 12,
            w: 8,
            t0: Duration::from_secs(30),
            t1: Duration::from_secs(15),
            t2: Duration::from_secs(10),
            t3: Duration::from_secs(20),
        }
    }
}

impl ApciParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_k(mut self, k: u16) -> Self {
        self.k = k;
        self
    }

    pub fn with_w(mut self, w: u16) -> Self {
        self.w = w;
        self
    }

    pub fn with_t0(mut self, t0: Duration) -> Self {
        self.t0 = t0;
        self
    }

    pub fn with_t1(mut self, t1: Duration) -> Self {
        self.t1 = t1;
        self
    }

    pub fn with_t2(mut self, t2: Duration) -> Self {
        self.t2 = t2;
        self
    }

    pub fn with_t3(mut self, t3: Duration) -> Self {
        self.t3 = t3;
        self
    }

    /// Check the window sizes and the t2 < t1 requirement
    pub fn validate(&self) -> Result<(), CodecError> {
        if self.k == 0 || self.k > 32767 || self.w == 0 || self.w > self.k {
            return Err(CodecError::InvalidWidth(0));
        }
        if self.t2 >= self.t1 {
            return Err(CodecError::InvalidWidth(0));
        }
        Ok(())
    }

    /// Suggested tick period for the cooperative scheduling model
    pub fn tick_period(&self) -> Duration {
        self.t1.min(self.t2).min(self.t3) / 2
    }
}

/// CS101 link layer parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkLayerParameters {
    /// Size of the link address field (1 or 2)
    pub address_size: u8,
    /// Timeout waiting for the secondary to answer a confirmed request
    pub response_timeout: Duration,
    /// Retransmissions per request before the slave is declared failed
    pub retries: u8,
    /// Answer confirmed frames with the single character 0xE5 where possible
    pub single_char_ack: bool,
}

impl Default for LinkLayerParameters {
    fn default() -> Self {
        Self {
            address_size: 1,
            response_timeout: Duration::from_millis(1000),
            retries: 3,
            single_char_ack: false,
        }
    }
}

impl LinkLayerParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_address_size(mut self, size: u8) -> Self {
        self.address_size = size;
        self
    }

    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    pub fn with_retries(mut self, retries: u8) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_single_char_ack(mut self, enabled: bool) -> Self {
        self.single_char_ack = enabled;
        self
    }

    /// Broadcast address for the configured address width (all ones)
    pub fn broadcast_address(&self) -> u16 {
        if self.address_size == 1 {
            0xff
        } else {
            0xffff
        }
    }

    pub fn validate(&self) -> Result<(), CodecError> {
        if !matches!(self.address_size, 1 | 2) {
            return Err(CodecError::InvalidWidth(self.address_size));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_layer_defaults() {
        let params = AppLayerParameters::default();
        assert_eq!(params.size_of_cot, 2);
        assert_eq!(params.size_of_ca, 2);
        assert_eq!(params.size_of_ioa, 3);
        assert_eq!(params.max_size_of_asdu, 249);
        assert_eq!(params.header_size(), 6);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn app_layer_widths() {
        assert!(AppLayerParameters::default()
            .with_size_of_ioa(4)
            .validate()
            .is_err());
        assert!(AppLayerParameters::default()
            .with_size_of_cot(0)
            .validate()
            .is_err());
        let narrow = AppLayerParameters::cs101()
            .with_size_of_cot(1)
            .with_size_of_ca(1)
            .with_size_of_ioa(2);
        assert_eq!(narrow.header_size(), 4);
        assert_eq!(narrow.max_ioa(), 0xffff);
        assert_eq!(narrow.max_ca(), 0xff);
    }

    #[test]
    fn apci_defaults_are_consistent() {
        let params = ApciParameters::default();
        assert_eq!(params.k, 12);
        assert_eq!(params.w, 8);
        assert!(params.validate().is_ok());
        assert_eq!(params.tick_period(), Duration::from_secs(5));
    }

    #[test]
    fn apci_rejects_t2_not_less_than_t1() {
        let params = ApciParameters::default().with_t2(Duration::from_secs(15));
        assert!(params.validate().is_err());
    }

    #[test]
    fn link_layer_broadcast() {
        assert_eq!(LinkLayerParameters::default().broadcast_address(), 0xff);
        assert_eq!(
            LinkLayerParameters::default()
                .with_address_size(2)
                .broadcast_address(),
            0xffff
        );
    }
}
