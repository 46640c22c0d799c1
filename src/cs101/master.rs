//! CS101 unbalanced primary station (master)
//!
//! One primary polls many secondaries over a half-duplex line, so at most
//! one request is outstanding on the whole link. Each configured slave runs
//! through link setup (REQUEST_LINK_STATUS, RESET_REMOTE_LINK) and then a
//! data exchange loop alternating class 2 polls with class 1 requests when
//! the secondary signals access demand. Duplicate suppression uses the
//! FCB/FCV toggle; a timed out request is retransmitted with the same FCB.

use std::collections::VecDeque;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::ft12::{
    Ft12Frame, Ft12Parser, LinkControl, PrimaryFunction, SecondaryFunction,
};
use crate::asdu::Asdu;
use crate::config::{AppLayerParameters, LinkLayerParameters};
use crate::error::{Error, Result, StateError};
use crate::transport::{Direction, LinkTransport, RawMessage};
use crate::types::LinkLayerState;

/// Events delivered by a CS101 station
#[derive(Debug, Clone)]
pub enum Cs101Event {
    /// A decoded ASDU from the link with the given address
    Asdu { address: u16, asdu: Asdu },
    /// A per-slave link state machine transition
    LinkStateChanged {
        address: u16,
        state: LinkLayerState,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlavePhase {
    RequestStatus,
    ResetLink,
    Exchange,
}

struct SlaveState {
    address: u16,
    phase: SlavePhase,
    link_state: LinkLayerState,
    /// FCB value used in the last FCV=1 frame to this slave
    fcb: bool,
    /// Class 1 (event) data requested next, set by the ACD bit
    access_demand: bool,
    outgoing: VecDeque<Asdu>,
}

struct PendingRequest {
    slave: usize,
    frame: Vec<u8>,
    function: PrimaryFunction,
    sent_at: Instant,
    retries: u8,
}

/// Unbalanced CS101 primary station
pub struct UnbalancedMaster<T: LinkTransport> {
    transport: T,
    link_params: LinkLayerParameters,
    app_params: AppLayerParameters,
    parser: Ft12Parser,
    slaves: Vec<SlaveState>,
    pending: Option<PendingRequest>,
    next_poll: usize,
    events: mpsc::UnboundedSender<Cs101Event>,
    raw_sink: Option<mpsc::UnboundedSender<RawMessage>>,
    raw_logging: bool,
}

impl<T: LinkTransport> UnbalancedMaster<T> {
    pub fn new(
        transport: T,
        link_params: LinkLayerParameters,
        app_params: AppLayerParameters,
    ) -> (Self, mpsc::UnboundedReceiver<Cs101Event>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let master = Self {
            transport,
            link_params,
            app_params,
            parser: Ft12Parser::new(link_params.address_size),
            slaves: Vec::new(),
            pending: None,
            next_poll: 0,
            events,
            raw_sink: None,
            raw_logging: crate::default_raw_logging(),
        };
        (master, receiver)
    }

    /// Register a secondary station for polling
    pub fn add_slave(&mut self, address: u16) -> Result<()> {
        if address == self.link_params.broadcast_address() {
            return Err(Error::State(StateError::InvalidTransition));
        }
        if self.slaves.iter().any(|s| s.address == address) {
            return Err(Error::State(StateError::AlreadyStarted));
        }
        self.slaves.push(SlaveState {
            address,
            phase: SlavePhase::RequestStatus,
            link_state: LinkLayerState::Idle,
            fcb: false,
            access_demand: false,
            outgoing: VecDeque::new(),
        });
        Ok(())
    }

    /// Link state of a configured slave
    pub fn link_state(&self, address: u16) -> Option<LinkLayerState> {
        self.slaves
            .iter()
            .find(|s| s.address == address)
            .map(|s| s.link_state)
    }

    /// Queue an ASDU for confirmed delivery to a slave. Sending to the
    /// broadcast address transmits immediately with SEND/NO REPLY; broadcast
    /// frames are never acknowledged.
    pub async fn send_asdu(&mut self, address: u16, asdu: Asdu) -> Result<()> {
        if address == self.link_params.broadcast_address() {
            let payload = asdu.to_bytes()?;
            let frame = Ft12Frame::Variable {
                control: LinkControl::primary(PrimaryFunction::UserDataNoReply, false, false),
                address,
                payload,
            };
            let bytes = frame.encode(self.link_params.address_size)?;
            return self.transmit(&bytes).await;
        }
        let slave = self
            .slaves
            .iter_mut()
            .find(|s| s.address == address)
            .ok_or(Error::State(StateError::NotStarted))?;
        slave.outgoing.push_back(asdu);
        Ok(())
    }

    pub fn set_raw_message_sink(&mut self, sink: mpsc::UnboundedSender<RawMessage>) {
        self.raw_sink = Some(sink);
    }

    pub fn set_raw_logging(&mut self, enabled: bool) {
        self.raw_logging = enabled;
    }

    /// Drive the polling cycle: drain received frames, expire the pending
    /// request and issue the next poll when the line is free.
    pub async fn tick(&mut self) -> Result<()> {
        self.pump_receive().await?;
        self.check_timeout().await?;
        if self.pending.is_none() {
            self.issue_next_request().await?;
        }
        Ok(())
    }

    async fn pump_receive(&mut self) -> Result<()> {
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
                Err(e) => {
                    // a corrupted frame is dropped; the retry timer recovers
                    warn!("dropping corrupted FT1.2 frame: {}", e);
                }
            }
        }
        Ok(())
    }

    async fn handle_frame(&mut self, frame: Ft12Frame) -> Result<()> {
        let Some(pending) = self.pending.take() else {
            debug!("unsolicited frame ignored: {:?}", frame);
            return Ok(());
        };

        // a reply must come from the slave that was addressed
        if let Some(address) = frame.address() {
            if address != self.slaves[pending.slave].address {
                debug!("reply from unexpected address {} ignored", address);
                self.pending = Some(pending);
                return Ok(());
            }
        }
        if let Some(control) = frame.control() {
            if control.prm {
                // primary-to-primary frames do not occur on a sane line
                self.pending = Some(pending);
                return Ok(());
            }
        }

        let slave_index = pending.slave;
        self.process_reply(slave_index, pending, frame).await
    }

    async fn process_reply(
        &mut self,
        index: usize,
        pending: PendingRequest,
        frame: Ft12Frame,
    ) -> Result<()> {
        let address = self.slaves[index].address;

        // ACD and DFC arrive with every secondary frame
        if let Some(control) = frame.control() {
            if control.fcb_acd {
                self.slaves[index].access_demand = true;
            }
            let busy = control.fcv_dfc;
            let current = self.slaves[index].link_state;
            if busy && current == LinkLayerState::Available {
                self.set_link_state(index, LinkLayerState::Busy);
            } else if !busy && current == LinkLayerState::Busy {
                self.set_link_state(index, LinkLayerState::Available);
            }
        }

        let function = frame
            .control()
            .map(|c| SecondaryFunction::from_bits(c.function));

        match pending.function {
            PrimaryFunction::RequestLinkStatus => match function {
                Some(Some(SecondaryFunction::StatusOfLink)) => {
                    debug!("slave {}: link status received", address);
                    self.slaves[index].phase = SlavePhase::ResetLink;
                }
                _ => self.unexpected_reply(index, pending, frame),
            },
            PrimaryFunction::ResetRemoteLink => match frame {
                Ft12Frame::SingleCharAck => self.link_reset_done(index),
                _ if function == Some(Some(SecondaryFunction::Ack)) => {
                    self.link_reset_done(index)
                }
                _ => self.unexpected_reply(index, pending, frame),
            },
            PrimaryFunction::UserDataConfirmed => match frame {
                Ft12Frame::SingleCharAck => {
                    self.slaves[index].outgoing.pop_front();
                }
                _ if function == Some(Some(SecondaryFunction::Ack)) => {
                    self.slaves[index].outgoing.pop_front();
                }
                _ if function == Some(Some(SecondaryFunction::Nack)) => {
                    warn!("slave {}: user data rejected", address);
                }
                _ => self.unexpected_reply(index, pending, frame),
            },
            PrimaryFunction::RequestUserData1 | PrimaryFunction::RequestUserData2 => {
                match frame {
                    Ft12Frame::Variable { payload, .. }
                        if function == Some(Some(SecondaryFunction::UserData)) =>
                    {
                        match Asdu::parse(&payload, &self.app_params) {
                            Ok(asdu) => {
                                let _ = self.events.send(Cs101Event::Asdu { address, asdu });
                            }
                            Err(e) => warn!("slave {}: dropping undecodable ASDU: {}", address, e),
                        }
                    }
                    Ft12Frame::SingleCharAck => {
                        // treated as "no data available"
                    }
                    _ if function == Some(Some(SecondaryFunction::NackNoData)) => {}
                    _ if function == Some(Some(SecondaryFunction::LinkNotFunctioning))
                        || function == Some(Some(SecondaryFunction::LinkNotImplemented)) =>
                    {
                        self.slave_failed(index);
                    }
                    _ => self.unexpected_reply(index, pending, frame),
                }
            }
            PrimaryFunction::ResetUserProcess | PrimaryFunction::TestFunction => {
                // confirmed services: any positive acknowledge completes them
            }
            PrimaryFunction::UserDataNoReply => {}
        }
        Ok(())
    }

    fn link_reset_done(&mut self, index: usize) {
        // after reset the next FCV frame carries FCB = 1
        self.slaves[index].fcb = false;
        self.slaves[index].phase = SlavePhase::Exchange;
        self.set_link_state(index, LinkLayerState::Available);
    }

    fn unexpected_reply(&mut self, index: usize, pending: PendingRequest, frame: Ft12Frame) {
        warn!(
            "slave {}: unexpected reply to {:?}: {:?}",
            self.slaves[index].address, pending.function, frame
        );
        self.slave_failed(index);
    }

    fn slave_failed(&mut self, index: usize) {
        self.slaves[index].phase = SlavePhase::RequestStatus;
        self.set_link_state(index, LinkLayerState::Error);
    }

    async fn check_timeout(&mut self) -> Result<()> {
        let Some(mut pending) = self.pending.take() else {
            return Ok(());
        };
        if Instant::now().duration_since(pending.sent_at) < self.link_params.response_timeout {
            self.pending = Some(pending);
            return Ok(());
        }
        if pending.retries < self.link_params.retries {
            pending.retries += 1;
            pending.sent_at = Instant::now();
            let bytes = pending.frame.clone();
            let address = self.slaves[pending.slave].address;
            debug!(
                "slave {}: retry {} of {:?}",
                address, pending.retries, pending.function
            );
            // retransmission keeps the same FCB
            self.pending = Some(pending);
            self.transmit(&bytes).await?;
        } else {
            let address = self.slaves[pending.slave].address;
            warn!(
                "slave {}: no response to {:?} after {} retries",
                address, pending.function, pending.retries
            );
            self.slave_failed(pending.slave);
        }
        Ok(())
    }

    async fn issue_next_request(&mut self) -> Result<()> {
        if self.slaves.is_empty() {
            return Ok(());
        }
        let index = self.next_poll % self.slaves.len();
        self.next_poll = (self.next_poll + 1) % self.slaves.len();

        let (function, fcv, payload) = match self.slaves[index].phase {
            SlavePhase::RequestStatus => (PrimaryFunction::RequestLinkStatus, false, None),
            SlavePhase::ResetLink => (PrimaryFunction::ResetRemoteLink, false, None),
            SlavePhase::Exchange => {
                if self.slaves[index].link_state == LinkLayerState::Busy {
                    // data flow control: only status requests while busy
                    (PrimaryFunction::RequestLinkStatus, false, None)
                } else if let Some(asdu) = self.slaves[index].outgoing.front() {
                    (
                        PrimaryFunction::UserDataConfirmed,
                        true,
                        Some(asdu.to_bytes()?),
                    )
                } else if self.slaves[index].access_demand {
                    self.slaves[index].access_demand = false;
                    (PrimaryFunction::RequestUserData1, true, None)
                } else {
                    (PrimaryFunction::RequestUserData2, true, None)
                }
            }
        };

        let fcb = if fcv {
            let next = !self.slaves[index].fcb;
            self.slaves[index].fcb = next;
            next
        } else {
            false
        };

        let address = self.slaves[index].address;
        let control = LinkControl::primary(function, fcb, fcv);
        let frame = match payload {
            Some(payload) => Ft12Frame::Variable {
                control,
                address,
                payload,
            },
            None => Ft12Frame::Fixed { control, address },
        };
        let bytes = frame.encode(self.link_params.address_size)?;
        self.transmit(&bytes).await?;
        self.pending = Some(PendingRequest {
            slave: index,
            frame: bytes,
            function,
            sent_at: Instant::now(),
            retries: 0,
        });
        Ok(())
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

    fn set_link_state(&mut self, index: usize, state: LinkLayerState) {
        if self.slaves[index].link_state != state {
            info!(
                "slave {}: link state {:?} -> {:?}",
                self.slaves[index].address, self.slaves[index].link_state, state
            );
            self.slaves[index].link_state = state;
            let _ = self.events.send(Cs101Event::LinkStateChanged {
                address: self.slaves[index].address,
                state,
            });
        }
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

enum Cs101Command {
    SendAsdu(u16, Asdu),
    Close,
}

/// Handle to a master running on a background task
pub struct Cs101Handle {
    commands: mpsc::UnboundedSender<Cs101Command>,
    task: tokio::task::JoinHandle<()>,
}

impl<T: LinkTransport + 'static> UnbalancedMaster<T> {
    /// Move the master onto a background task that runs the polling cycle.
    /// The tick period should be well below the link response timeout so
    /// retries fire on time.
    pub fn spawn(mut self) -> Cs101Handle {
        let (commands, mut receiver) = mpsc::unbounded_channel();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(std::time::Duration::from_millis(10));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    command = receiver.recv() => match command {
                        Some(Cs101Command::SendAsdu(address, asdu)) => {
                            if let Err(e) = self.send_asdu(address, asdu).await {
                                warn!("send failed: {}", e);
                            }
                        }
                        Some(Cs101Command::Close) | None => {
                            self.transport.close().await;
                            break;
                        }
                    },
                    _ = ticker.tick() => {
                        if let Err(e) = self.tick().await {
                            warn!("polling task stopped: {}", e);
                            break;
                        }
                    }
                }
            }
        });
        Cs101Handle { commands, task }
    }
}

impl Cs101Handle {
    pub fn send_asdu(&self, address: u16, asdu: Asdu) -> Result<()> {
        self.commands
            .send(Cs101Command::SendAsdu(address, asdu))
            .map_err(|_| Error::State(StateError::NotStarted))
    }

    /// Stop polling and wait for the task to finish
    pub async fn close(self) {
        let _ = self.commands.send(Cs101Command::Close);
        let _ = self.task.await;
    }
}
