//! CS101 unbalanced secondary station (slave)
//!
//! Answers exactly one primary. Duplicate suppression follows the FCB/FCV
//! rules: a FCV=1 frame whose FCB did not toggle is a retransmission, and
//! the previous reply is repeated without processing the frame again. Class
//! 1 holds events and command confirmations, class 2 holds cyclic data; the
//! ACD bit of every reply signals pending class 1 data.

use std::collections::VecDeque;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::ft12::{
    Ft12Frame, Ft12Parser, LinkControl, PrimaryFunction, SecondaryFunction,
};
use super::master::Cs101Event;
use crate::asdu::Asdu;
use crate::config::{AppLayerParameters, LinkLayerParameters};
use crate::error::{Error, Result};
use crate::transport::{Direction, LinkTransport, RawMessage};

/// Unbalanced CS101 secondary station
pub struct UnbalancedSlave<T: LinkTransport> {
    transport: T,
    link_params: LinkLayerParameters,
    app_params: AppLayerParameters,
    address: u16,
    parser: Ft12Parser,
    /// FCB value the next FCV=1 frame must carry; None before a link reset
    expected_fcb: Option<bool>,
    last_reply: Option<Vec<u8>>,
    class1: VecDeque<Asdu>,
    class2: VecDeque<Asdu>,
    events: mpsc::UnboundedSender<Cs101Event>,
    raw_sink: Option<mpsc::UnboundedSender<RawMessage>>,
    raw_logging: bool,
}

impl<T: LinkTransport> UnbalancedSlave<T> {
    pub fn new(
        transport: T,
        address: u16,
        link_params: LinkLayerParameters,
        app_params: AppLayerParameters,
    ) -> (Self, mpsc::UnboundedReceiver<Cs101Event>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let slave = Self {
            transport,
            link_params,
            app_params,
            address,
            parser: Ft12Parser::new(link_params.address_size),
            expected_fcb: None,
            last_reply: None,
            class1: VecDeque::new(),
            class2: VecDeque::new(),
            events,
            raw_sink: None,
            raw_logging: crate::default_raw_logging(),
        };
        (slave, receiver)
    }

    pub fn address(&self) -> u16 {
        self.address
    }

    pub fn parameters(&self) -> &AppLayerParameters {
        &self.app_params
    }

    /// Queue class 1 data (events, command confirmations)
    pub fn enqueue_class1(&mut self, asdu: Asdu) {
        self.class1.push_back(asdu);
    }

    /// Queue class 2 data (cyclic measurands)
    pub fn enqueue_class2(&mut self, asdu: Asdu) {
        self.class2.push_back(asdu);
    }

    pub fn set_raw_message_sink(&mut self, sink: mpsc::UnboundedSender<RawMessage>) {
        self.raw_sink = Some(sink);
    }

    pub fn set_raw_logging(&mut self, enabled: bool) {
        self.raw_logging = enabled;
    }

    /// Drain received frames and answer them
    pub async fn tick(&mut self) -> Result<()> {
        let mut buf = [0u8; 512];
        loop {
            match self.transport.recv(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    self.log_raw(Direction::Received, &buf[..n]);
                    self.parser.feed(&buf[..n]);
                }
                Err(e) => {
                    warn!("transport failed: {}", e);
                    self.transport.close().await;
                    return Err(Error::Transport(e));
                }
            }
        }
        loop {
            match self.parser.next_frame() {
                Ok(Some(frame)) => self.handle_frame(frame).await?,
                Ok(None) => break,
                Err(e) => warn!("dropping corrupted FT1.2 frame: {}", e),
            }
        }
        Ok(())
    }

    async fn handle_frame(&mut self, frame: Ft12Frame) -> Result<()> {
        let (control, address) = match (&frame, frame.control(), frame.address()) {
            (_, Some(control), Some(address)) => (control, address),
            // single character frames carry nothing a secondary can use
            _ => return Ok(()),
        };
        if !control.prm {
            return Ok(());
        }
        let broadcast = address == self.link_params.broadcast_address();
        if address != self.address && !broadcast {
            return Ok(());
        }

        // FCB duplicate suppression applies to FCV=1 frames only
        if control.fcv_dfc && !broadcast {
            if let Some(expected) = self.expected_fcb {
                if control.fcb_acd != expected {
                    debug!("FCB did not toggle, repeating last reply");
                    if let Some(reply) = self.last_reply.clone() {
                        self.transmit(&reply).await?;
                    }
                    return Ok(());
                }
            }
            self.expected_fcb = Some(!control.fcb_acd);
        }

        let Some(function) = PrimaryFunction::from_bits(control.function) else {
            if !broadcast {
                self.send_fixed(SecondaryFunction::LinkNotImplemented).await?;
            }
            return Ok(());
        };

        match function {
            PrimaryFunction::ResetRemoteLink => {
                // the first FCV frame after a reset carries FCB = 1
                self.expected_fcb = Some(true);
                self.last_reply = None;
                if !broadcast {
                    self.send_ack().await?;
                }
            }
            PrimaryFunction::ResetUserProcess => {
                self.class1.clear();
                self.class2.clear();
                if !broadcast {
                    self.send_ack().await?;
                }
            }
            PrimaryFunction::TestFunction => {
                if !broadcast {
                    self.send_ack().await?;
                }
            }
            PrimaryFunction::RequestLinkStatus => {
                if !broadcast {
                    self.send_fixed(SecondaryFunction::StatusOfLink).await?;
                }
            }
            PrimaryFunction::UserDataConfirmed => {
                if let Ft12Frame::Variable { payload, .. } = &frame {
                    self.deliver_asdu(payload);
                }
                if !broadcast {
                    self.send_ack().await?;
                }
            }
            PrimaryFunction::UserDataNoReply => {
                if let Ft12Frame::Variable { payload, .. } = &frame {
                    self.deliver_asdu(payload);
                }
            }
            PrimaryFunction::RequestUserData1 => {
                if !broadcast {
                    let asdu = self.class1.pop_front();
                    self.send_user_data(asdu).await?;
                }
            }
            PrimaryFunction::RequestUserData2 => {
                if !broadcast {
                    let asdu = self.class2.pop_front();
                    self.send_user_data(asdu).await?;
                }
            }
        }
        Ok(())
    }

    fn deliver_asdu(&mut self, payload: &[u8]) {
        match Asdu::parse(payload, &self.app_params) {
            Ok(asdu) => {
                let _ = self.events.send(Cs101Event::Asdu {
                    address: self.address,
                    asdu,
                });
            }
            Err(e) => warn!("dropping undecodable ASDU: {}", e),
        }
    }

    fn access_demand(&self) -> bool {
        !self.class1.is_empty()
    }

    async fn send_ack(&mut self) -> Result<()> {
        // the single character form cannot carry the ACD bit
        if self.link_params.single_char_ack && !self.access_demand() {
            let bytes = vec![super::ft12::SINGLE_CHAR_ACK];
            self.last_reply = Some(bytes.clone());
            return self.transmit(&bytes).await;
        }
        self.send_fixed(SecondaryFunction::Ack).await
    }

    async fn send_fixed(&mut self, function: SecondaryFunction) -> Result<()> {
        let frame = Ft12Frame::Fixed {
            control: LinkControl::secondary(function, self.access_demand(), false),
            address: self.address,
        };
        let bytes = frame.encode(self.link_params.address_size)?;
        self.last_reply = Some(bytes.clone());
        self.transmit(&bytes).await
    }

    async fn send_user_data(&mut self, asdu: Option<Asdu>) -> Result<()> {
        match asdu {
            Some(asdu) => {
                let frame = Ft12Frame::Variable {
                    control: LinkControl::secondary(
                        SecondaryFunction::UserData,
                        self.access_demand(),
                        false,
                    ),
                    address: self.address,
                    payload: asdu.to_bytes()?,
                };
                let bytes = frame.encode(self.link_params.address_size)?;
                self.last_reply = Some(bytes.clone());
                self.transmit(&bytes).await
            }
            None => self.send_fixed(SecondaryFunction::NackNoData).await,
        }
    }

    async fn transmit(&mut self, bytes: &[u8]) -> Result<()> {
        self.log_raw(Direction::Sent, bytes);
        if let Err(e) = self.transport.send(bytes).await {
            warn!("transport send failed: {}", e);
            self.transport.close().await;
            return Err(Error::Transport(e));
        }
        Ok(())
    }

    fn log_raw(&self, direction: Direction, bytes: &[u8]) {
        if self.raw_logging {
            let tag = match direction {
                Direction::Sent => "TX",
                Direction::Received => "RX",
            };
            debug!("{} {}", tag, hex::encode(bytes));
        }
        if let Some(sink) = &self.raw_sink {
            let _ = sink.send(RawMessage {
                direction,
                bytes: bytes.to_vec(),
            });
        }
    }
}
