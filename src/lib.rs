//! # voltage-iec60870
//!
//! A Rust implementation of the IEC 60870-5 telecontrol protocols for SCADA
//! communications: the CS101 (serial) and CS104 (TCP/IP) companion standards
//! used to exchange measurements, status and control commands between control
//! centers and field devices.
//!
//! ## Features
//!
//! - Bit-exact ASDU codec covering the standard type catalogue
//! - CS104 sliding-window engine with the k/w windows and t0..t3 timers
//! - CS101 unbalanced link layer with FT1.2 framing and FCB/FCV handling
//! - Application dispatch with automatic activation confirmations
//! - Asynchronous API using Tokio; events delivered through channels
//! - Transport-agnostic core behind the [`transport::LinkTransport`] trait
//!
//! ## Example
//!
//! ```rust,no_run
//! use voltage_iec60870::asdu::Asdu;
//! use voltage_iec60870::config::{ApciParameters, AppLayerParameters};
//! use voltage_iec60870::cs104::{ConnectionState, Cs104Connection, Cs104Event, StationRole};
//! use voltage_iec60870::information_object::{InformationElement, InformationObject};
//! use voltage_iec60870::transport::TcpTransport;
//! use voltage_iec60870::types::{CauseOfTransmission, QualityDescriptor};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let app_params = AppLayerParameters::cs104();
//!     let apci_params = ApciParameters::default();
//!
//!     let transport =
//!         TcpTransport::connect("192.168.1.100", voltage_iec60870::IEC_104_DEFAULT_PORT,
//!             apci_params.t0).await?;
//!     let (mut connection, mut events) =
//!         Cs104Connection::new(transport, app_params, apci_params, StationRole::Controlling);
//!
//!     connection.start_data_transfer().await?;
//!
//!     // send a general interrogation once the link is started
//!     let mut interrogation =
//!         Asdu::message(app_params, CauseOfTransmission::Activation, 1);
//!     interrogation.add_information_object(&InformationObject::new(
//!         0,
//!         InformationElement::Interrogation { qualifier: 20 },
//!     ))?;
//!
//!     loop {
//!         connection.tick().await?;
//!         while let Ok(event) = events.try_recv() {
//!             match event {
//!                 Cs104Event::StateChanged(ConnectionState::Started) => {
//!                     connection.send_asdu(interrogation.clone()).await?;
//!                 }
//!                 Cs104Event::StateChanged(state) => println!("link: {:?}", state),
//!                 Cs104Event::Asdu(asdu) => println!("received: {:?}", asdu),
//!                 Cs104Event::Closed => return Ok(()),
//!             }
//!         }
//!     }
//! }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};

pub mod asdu;
pub mod config;
pub mod constants;
pub mod cs101;
pub mod cs104;
pub mod dispatch;
pub mod elements;
pub mod error;
pub mod frame;
pub mod information_object;
pub mod time;
pub mod transport;
pub mod types;

// Re-export the types most applications touch
pub use crate::asdu::Asdu;
pub use crate::config::{ApciParameters, AppLayerParameters, LinkLayerParameters};
pub use crate::constants::{IEC_104_DEFAULT_PORT, IEC_104_DEFAULT_TLS_PORT};
pub use crate::error::{CodecError, Error, ProtocolError, Result, StateError};
pub use crate::information_object::{InformationElement, InformationObject, TimeTag};
pub use crate::types::{CauseOfTransmission, LinkLayerState, QualityDescriptor, TypeId};

/// Library version exposed at runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionInfo {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

/// Version of this crate as compiled
pub fn version() -> VersionInfo {
    VersionInfo {
        major: env!("CARGO_PKG_VERSION_MAJOR").parse().unwrap_or(0),
        minor: env!("CARGO_PKG_VERSION_MINOR").parse().unwrap_or(0),
        patch: env!("CARGO_PKG_VERSION_PATCH").parse().unwrap_or(0),
    }
}

static DEFAULT_RAW_LOGGING: AtomicBool = AtomicBool::new(false);

/// Process-wide default for raw frame logging. New connections copy this
/// flag; [`cs104::Cs104Connection::set_raw_logging`] overrides it per
/// connection.
pub fn set_default_raw_logging(enabled: bool) {
    DEFAULT_RAW_LOGGING.store(enabled, Ordering::Relaxed);
}

pub(crate) fn default_raw_logging() -> bool {
    DEFAULT_RAW_LOGGING.load(Ordering::Relaxed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_matches_manifest() {
        let version = version();
        assert_eq!(version.major, 0);
        assert_eq!(version.minor, 1);
    }

    #[test]
    fn raw_logging_default_toggles() {
        assert!(!default_raw_logging());
        set_default_raw_logging(true);
        assert!(default_raw_logging());
        set_default_raw_logging(false);
    }
}
