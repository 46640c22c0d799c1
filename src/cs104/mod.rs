//! IEC 60870-5-104 (CS104) protocol engine
//!
//! TCP/IP transmission of IEC 60870-5 ASDUs:
//!
//! ```text
//! cs104
//!     ├── Cs104Connection (window accounting, timers, state machine)
//!     ├── SequenceWindow (15 bit modular send/receive counters)
//!     ├── ApduAssembler (length-prefix reassembly)
//!     └── APCI codec (I/S/U frame typing)
//! ```
//!
//! The connection is transport-agnostic: anything implementing
//! [`crate::transport::LinkTransport`] will do, with
//! [`crate::transport::TcpTransport`] as the usual choice.

mod apci;
mod connection;
mod window;

pub use apci::{
    decode_apci, encode_i_frame, encode_s_frame, encode_u_frame, Apci, ApduAssembler,
    UFrameFunction,
};
pub use connection::{
    ConnectionState, Cs104Connection, Cs104Event, Cs104Handle, StationRole,
};
pub use window::{seq_distance, seq_next, SequenceWindow};
