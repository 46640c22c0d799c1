//! IEC 60870-5-101 (CS101) unbalanced link layer
//!
//! Serial transmission of IEC 60870-5 ASDUs over FT1.2 frames:
//!
//! ```text
//! cs101
//!     ├── UnbalancedMaster (primary: polling cycle, per-slave state machines)
//!     ├── UnbalancedSlave (secondary: FCB duplicate suppression, class queues)
//!     ├── Ft12Parser (frame reassembly and checksum validation)
//!     └── FT1.2 codec (fixed/variable frames, control byte)
//! ```
//!
//! Both stations are transport-agnostic; on a real line the `serial` feature
//! provides [`crate::transport::SerialTransport`].

mod ft12;
mod master;
mod slave;

pub use ft12::{
    Ft12Frame, Ft12Parser, LinkControl, PrimaryFunction, SecondaryFunction, END_FRAME,
    SINGLE_CHAR_ACK, START_FIXED, START_VARIABLE,
};
pub use master::{Cs101Event, Cs101Handle, UnbalancedMaster};
pub use slave::UnbalancedSlave;
