//! CS104 connection engine
//!
//! One `Cs104Connection` owns the per-connection state: the sliding window,
//! the four protocol timers, the FIFO send queue above the k window and the
//! retained send buffer used for retransmission after a reconnect.
//!
//! The engine is driven by [`Cs104Connection::tick`], which drains the
//! receive side, runs timer expirations and flushes the send queue. The host
//! must call it at least once per half of the smallest timer; alternatively
//! [`Cs104Connection::spawn`] moves the connection onto a background task.
//! Decoded ASDUs and state changes are delivered through the event channel
//! returned by the constructor, in I-frame arrival order.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::apci::{self, Apci, ApduAssembler, UFrameFunction};
use super::window::SequenceWindow;
use crate::asdu::Asdu;
use crate::config::{ApciParameters, AppLayerParameters};
use crate::constants::APCI_SIZE;
use crate::error::{Error, ProtocolError, Result, StateError};
use crate::transport::{Direction, LinkTransport, RawMessage};

/// Link state of a CS104 connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No transport attached
    Idle,
    /// Transport establishment in progress
    Connecting,
    /// STOPDT received while own I-frames are still unacknowledged
    UnconfirmedStopped,
    /// Data transfer is running
    Started,
    /// Connected, data transfer not started
    Stopped,
    /// STOPDT act sent, waiting for the confirmation
    Closing,
}

/// Which side of the connection this station plays
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StationRole {
    /// Master: initiates STARTDT/STOPDT
    Controlling,
    /// Outstation: confirms STARTDT/STOPDT
    Controlled,
}

/// Events delivered through the connection event channel
#[derive(Debug, Clone)]
pub enum Cs104Event {
    /// A decoded ASDU, in I-frame arrival order
    Asdu(Asdu),
    /// The connection state changed
    StateChanged(ConnectionState),
    /// The transport was closed (protocol failure, peer close or `close`)
    Closed,
}

struct RetainedFrame {
    seq: u16,
    bytes: Vec<u8>,
    sent_at: Instant,
}

/// A CS104 connection over a host supplied transport
pub struct Cs104Connection<T: LinkTransport> {
    transport: T,
    role: StationRole,
    app_params: AppLayerParameters,
    apci_params: ApciParameters,
    state: ConnectionState,
    window: SequenceWindow,
    assembler: ApduAssembler,
    send_queue: VecDeque<Asdu>,
    retained: VecDeque<RetainedFrame>,
    last_rx: Instant,
    unacked_rx_since: Option<Instant>,
    pending_uframe: Option<(UFrameFunction, Instant)>,
    stopdt_con_pending: bool,
    events: mpsc::UnboundedSender<Cs104Event>,
    raw_sink: Option<mpsc::UnboundedSender<RawMessage>>,
    raw_logging: bool,
}

impl<T: LinkTransport> Cs104Connection<T> {
    /// Wrap a connected transport. Returns the connection and its event
    /// receiver; the connection starts in the STOPPED state.
    pub fn new(
        transport: T,
        app_params: AppLayerParameters,
        apci_params: ApciParameters,
        role: StationRole,
    ) -> (Self, mpsc::UnboundedReceiver<Cs104Event>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let connection = Self {
            transport,
            role,
            app_params,
            apci_params,
            state: ConnectionState::Stopped,
            window: SequenceWindow::new(apci_params.k, apci_params.w),
            assembler: ApduAssembler::new(),
            send_queue: VecDeque::new(),
            retained: VecDeque::new(),
            last_rx: Instant::now(),
            unacked_rx_since: None,
            pending_uframe: None,
            stopdt_con_pending: false,
            events,
            raw_sink: None,
            raw_logging: crate::default_raw_logging(),
        };
        (connection, receiver)
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn role(&self) -> StationRole {
        self.role
    }

    /// Number of unacknowledged I-frames in flight
    pub fn outstanding(&self) -> u16 {
        self.window.outstanding()
    }

    /// Number of ASDUs queued above the k window
    pub fn queued(&self) -> usize {
        self.send_queue.len()
    }

    pub fn parameters(&self) -> &AppLayerParameters {
        &self.app_params
    }

    /// Attach a raw message sink receiving every frame after encoding and
    /// before parsing. The sink must not assume it may mutate the bytes.
    pub fn set_raw_message_sink(&mut self, sink: mpsc::UnboundedSender<RawMessage>) {
        self.raw_sink = Some(sink);
    }

    /// Per-connection override of the process-wide raw logging default
    pub fn set_raw_logging(&mut self, enabled: bool) {
        self.raw_logging = enabled;
    }

    /// Drive the connection: drain the receive side, run timer expirations
    /// and flush the send queue.
    pub async fn tick(&mut self) -> Result<()> {
        if self.state == ConnectionState::Idle || self.state == ConnectionState::Connecting {
            return Ok(());
        }
        self.pump_receive().await?;
        self.check_timers().await?;
        self.flush_send_queue().await?;
        Ok(())
    }

    /// Submit an ASDU. Sends immediately while fewer than k I-frames are
    /// outstanding, otherwise queues FIFO; the queue drains as
    /// acknowledgements arrive.
    pub async fn send_asdu(&mut self, asdu: Asdu) -> Result<()> {
        if self.state != ConnectionState::Started {
            return Err(Error::State(StateError::NotStarted));
        }
        if self.window.can_send() {
            self.transmit_i_frame(&asdu).await
        } else {
            debug!("send window full ({} outstanding), queueing", self.window.outstanding());
            self.send_queue.push_back(asdu);
            Ok(())
        }
    }

    /// Send STARTDT act (controlling station only). The STARTED state is
    /// reported through the event channel when the confirmation arrives.
    pub async fn start_data_transfer(&mut self) -> Result<()> {
        if self.role != StationRole::Controlling {
            return Err(Error::State(StateError::InvalidTransition));
        }
        match self.state {
            ConnectionState::Started => Err(Error::State(StateError::AlreadyStarted)),
            ConnectionState::Stopped => self.send_u_act(UFrameFunction::StartDtAct).await,
            _ => Err(Error::State(StateError::InvalidTransition)),
        }
    }

    /// Send STOPDT act (controlling station only) and wait for the peer to
    /// confirm within t1. Already received I-frames are still acknowledged
    /// while the stop is pending; the send queue is flushed on confirmation.
    pub async fn stop_data_transfer(&mut self) -> Result<()> {
        if self.role != StationRole::Controlling {
            return Err(Error::State(StateError::InvalidTransition));
        }
        if self.state != ConnectionState::Started {
            return Err(Error::State(StateError::NotStarted));
        }
        self.set_state(ConnectionState::Closing);
        self.send_u_act(UFrameFunction::StopDtAct).await
    }

    /// Drop the transport immediately and discard the send queue. Retained
    /// unacknowledged I-frames survive for [`Cs104Connection::resume`].
    pub async fn close(&mut self) {
        self.transport.close().await;
        self.send_queue.clear();
        self.pending_uframe = None;
        self.stopdt_con_pending = false;
        self.state = ConnectionState::Idle;
        let _ = self.events.send(Cs104Event::Closed);
    }

    /// Attach a fresh transport after a connection loss. Retained I-frames
    /// with N(S) at or below `peer_ack` are discarded, the remainder is
    /// retransmitted in original order.
    pub async fn resume(&mut self, transport: T, peer_ack: u16) -> Result<()> {
        if self.state != ConnectionState::Idle {
            return Err(Error::State(StateError::AlreadyStarted));
        }
        self.transport = transport;
        self.assembler = ApduAssembler::new();
        self.apply_ack(peer_ack).map_err(Error::Protocol)?;
        self.last_rx = Instant::now();
        self.unacked_rx_since = None;
        self.set_state(ConnectionState::Stopped);

        let frames: Vec<Vec<u8>> = self.retained.iter().map(|f| f.bytes.clone()).collect();
        for bytes in frames {
            self.transmit(&bytes).await?;
        }
        let now = Instant::now();
        for frame in self.retained.iter_mut() {
            frame.sent_at = now;
        }
        Ok(())
    }

    async fn pump_receive(&mut self) -> Result<()> {
        let mut buf = [0u8; 512];
        loop {
            match self.transport.recv(&mut buf).await {
                Ok(0) => break,
                Ok(n) => self.assembler.feed(&buf[..n]),
                Err(e) => {
                    warn!("transport failed: {}", e);
                    self.transport.close().await;
                    self.send_queue.clear();
                    self.state = ConnectionState::Idle;
                    let _ = self.events.send(Cs104Event::Closed);
                    return Err(Error::Transport(e));
                }
            }
        }
        loop {
            let apdu = match self.assembler.next_apdu() {
                Ok(Some(apdu)) => apdu,
                Ok(None) => break,
                Err(e) => return Err(self.fail(e).await),
            };
            self.handle_apdu(apdu).await?;
        }
        Ok(())
    }

    async fn handle_apdu(&mut self, apdu: Vec<u8>) -> Result<()> {
        self.log_raw(Direction::Received, &apdu);
        self.last_rx = Instant::now();
        let apci = match apci::decode_apci(&apdu) {
            Ok(apci) => apci,
            Err(e) => return Err(self.fail(e).await),
        };
        match apci {
            Apci::I { send_seq, recv_seq } => {
                if self.state == ConnectionState::Stopped {
                    // I-frames are illegal while data transfer is stopped
                    return Err(self.fail(ProtocolError::UnexpectedFormat).await);
                }
                if let Err(e) = self.apply_ack(recv_seq) {
                    return Err(self.fail(e).await);
                }
                if let Err(e) = self.window.accept_peer_send_seq(send_seq) {
                    return Err(self.fail(e).await);
                }
                if self.unacked_rx_since.is_none() {
                    self.unacked_rx_since = Some(Instant::now());
                }
                if apdu.len() > APCI_SIZE {
                    // codec failures drop the ASDU, never the connection
                    match Asdu::parse(&apdu[APCI_SIZE..], &self.app_params) {
                        Ok(asdu) => {
                            let _ = self.events.send(Cs104Event::Asdu(asdu));
                        }
                        Err(e) => warn!("dropping undecodable ASDU: {}", e),
                    }
                }
                if self.window.s_frame_due() {
                    self.send_s_frame().await?;
                }
                self.confirm_stop_if_drained().await?;
            }
            Apci::S { recv_seq } => {
                if let Err(e) = self.apply_ack(recv_seq) {
                    return Err(self.fail(e).await);
                }
                self.confirm_stop_if_drained().await?;
            }
            Apci::U(function) => self.handle_u_frame(function).await?,
        }
        Ok(())
    }

    async fn handle_u_frame(&mut self, function: UFrameFunction) -> Result<()> {
        match function {
            UFrameFunction::StartDtAct => {
                if self.role != StationRole::Controlled {
                    return Err(self.fail(ProtocolError::UnexpectedFormat).await);
                }
                self.send_u_frame(UFrameFunction::StartDtCon).await?;
                self.set_state(ConnectionState::Started);
            }
            UFrameFunction::StartDtCon => {
                if matches!(self.pending_uframe, Some((UFrameFunction::StartDtAct, _))) {
                    self.pending_uframe = None;
                    self.set_state(ConnectionState::Started);
                } else {
                    warn!("unsolicited STARTDT con ignored");
                }
            }
            UFrameFunction::StopDtAct => {
                if self.window.unacked_rx() > 0 {
                    // acknowledge received I-frames before confirming
                    self.send_s_frame().await?;
                }
                if self.window.outstanding() > 0 {
                    self.stopdt_con_pending = true;
                    self.set_state(ConnectionState::UnconfirmedStopped);
                } else {
                    self.send_u_frame(UFrameFunction::StopDtCon).await?;
                    self.set_state(ConnectionState::Stopped);
                }
            }
            UFrameFunction::StopDtCon => {
                if matches!(self.pending_uframe, Some((UFrameFunction::StopDtAct, _))) {
                    self.pending_uframe = None;
                    self.send_queue.clear();
                    self.set_state(ConnectionState::Stopped);
                } else {
                    warn!("unsolicited STOPDT con ignored");
                }
            }
            UFrameFunction::TestFrAct => {
                self.send_u_frame(UFrameFunction::TestFrCon).await?;
            }
            UFrameFunction::TestFrCon => {
                if matches!(self.pending_uframe, Some((UFrameFunction::TestFrAct, _))) {
                    self.pending_uframe = None;
                }
            }
        }
        Ok(())
    }

    async fn check_timers(&mut self) -> Result<()> {
        let now = Instant::now();
        let params = self.apci_params;

        if let Some((function, sent_at)) = self.pending_uframe {
            if now.duration_since(sent_at) >= params.t1 {
                warn!("t1 expired waiting for {:?} confirmation", function);
                return Err(self.fail(ProtocolError::TimerExpired("t1")).await);
            }
        }
        if let Some(front) = self.retained.front() {
            if now.duration_since(front.sent_at) >= params.t1 {
                warn!("t1 expired on unacknowledged I-frame {}", front.seq);
                return Err(self.fail(ProtocolError::TimerExpired("t1")).await);
            }
        }
        if let Some(since) = self.unacked_rx_since {
            if self.window.unacked_rx() > 0 && now.duration_since(since) >= params.t2 {
                self.send_s_frame().await?;
            }
        }
        if self.pending_uframe.is_none() && now.duration_since(self.last_rx) >= params.t3 {
            debug!("t3 idle period elapsed, sending TESTFR act");
            self.send_u_act(UFrameFunction::TestFrAct).await?;
        }
        Ok(())
    }

    async fn flush_send_queue(&mut self) -> Result<()> {
        while self.state == ConnectionState::Started && self.window.can_send() {
            let Some(asdu) = self.send_queue.pop_front() else {
                break;
            };
            self.transmit_i_frame(&asdu).await?;
        }
        Ok(())
    }

    async fn transmit_i_frame(&mut self, asdu: &Asdu) -> Result<()> {
        let seq = self.window.send_seq();
        let bytes =
            apci::encode_i_frame(seq, self.window.recv_seq(), asdu).map_err(Error::Codec)?;
        self.transmit(&bytes).await?;
        self.window.next_send_seq();
        self.window.mark_rx_acknowledged();
        self.unacked_rx_since = None;
        self.retained.push_back(RetainedFrame {
            seq,
            bytes,
            sent_at: Instant::now(),
        });
        Ok(())
    }

    async fn send_s_frame(&mut self) -> Result<()> {
        let bytes = apci::encode_s_frame(self.window.recv_seq());
        self.transmit(&bytes).await?;
        self.window.mark_rx_acknowledged();
        self.unacked_rx_since = None;
        Ok(())
    }

    async fn send_u_frame(&mut self, function: UFrameFunction) -> Result<()> {
        let bytes = apci::encode_u_frame(function);
        self.transmit(&bytes).await
    }

    async fn send_u_act(&mut self, function: UFrameFunction) -> Result<()> {
        self.send_u_frame(function).await?;
        self.pending_uframe = Some((function, Instant::now()));
        Ok(())
    }

    async fn transmit(&mut self, bytes: &[u8]) -> Result<()> {
        self.log_raw(Direction::Sent, bytes);
        if let Err(e) = self.transport.send(bytes).await {
            warn!("transport send failed: {}", e);
            self.transport.close().await;
            self.send_queue.clear();
            self.state = ConnectionState::Idle;
            let _ = self.events.send(Cs104Event::Closed);
            return Err(Error::Transport(e));
        }
        Ok(())
    }

    /// Release retained frames acknowledged by `nr`
    fn apply_ack(&mut self, nr: u16) -> std::result::Result<(), ProtocolError> {
        self.window.apply_ack(nr)?;
        while let Some(front) = self.retained.front() {
            if front.seq == nr {
                break;
            }
            self.retained.pop_front();
        }
        debug_assert!(self.retained.len() == self.window.outstanding() as usize);
        Ok(())
    }

    async fn confirm_stop_if_drained(&mut self) -> Result<()> {
        if self.stopdt_con_pending && self.window.outstanding() == 0 {
            self.stopdt_con_pending = false;
            if self.window.unacked_rx() > 0 {
                self.send_s_frame().await?;
            }
            self.send_u_frame(UFrameFunction::StopDtCon).await?;
            self.set_state(ConnectionState::Stopped);
        }
        Ok(())
    }

    async fn fail(&mut self, err: ProtocolError) -> Error {
        error!("closing connection: {}", err);
        self.transport.close().await;
        self.send_queue.clear();
        self.pending_uframe = None;
        self.stopdt_con_pending = false;
        self.state = ConnectionState::Idle;
        let _ = self.events.send(Cs104Event::Closed);
        Error::Protocol(err)
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.state != state {
            info!("connection state {:?} -> {:?}", self.state, state);
            self.state = state;
            let _ = self.events.send(Cs104Event::StateChanged(state));
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

/// Commands accepted by a spawned connection task
enum Cs104Command {
    SendAsdu(Asdu),
    Start,
    Stop,
    Close,
}

/// Handle to a connection running on a background task
pub struct Cs104Handle {
    commands: mpsc::UnboundedSender<Cs104Command>,
    task: tokio::task::JoinHandle<()>,
}

impl<T: LinkTransport + 'static> Cs104Connection<T> {
    /// Move the connection onto a background task that ticks it in a loop.
    /// Events keep flowing through the channel returned by `new`; user code
    /// on the receiving side runs outside the connection task and needs no
    /// extra synchronization.
    pub fn spawn(mut self) -> Cs104Handle {
        let (commands, mut receiver) = mpsc::unbounded_channel();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(10));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    command = receiver.recv() => match command {
                        Some(Cs104Command::SendAsdu(asdu)) => {
                            if let Err(e) = self.send_asdu(asdu).await {
                                warn!("send failed: {}", e);
                            }
                        }
                        Some(Cs104Command::Start) => {
                            if let Err(e) = self.start_data_transfer().await {
                                warn!("start failed: {}", e);
                            }
                        }
                        Some(Cs104Command::Stop) => {
                            if let Err(e) = self.stop_data_transfer().await {
                                warn!("stop failed: {}", e);
                            }
                        }
                        Some(Cs104Command::Close) | None => {
                            self.close().await;
                            break;
                        }
                    },
                    _ = ticker.tick() => {
                        if let Err(e) = self.tick().await {
                            warn!("connection task stopped: {}", e);
                            break;
                        }
                    }
                }
            }
        });
        Cs104Handle { commands, task }
    }
}

impl Cs104Handle {
    pub fn send_asdu(&self, asdu: Asdu) -> Result<()> {
        self.commands
            .send(Cs104Command::SendAsdu(asdu))
            .map_err(|_| Error::State(StateError::NotStarted))
    }

    pub fn start_data_transfer(&self) -> Result<()> {
        self.commands
            .send(Cs104Command::Start)
            .map_err(|_| Error::State(StateError::NotStarted))
    }

    pub fn stop_data_transfer(&self) -> Result<()> {
        self.commands
            .send(Cs104Command::Stop)
            .map_err(|_| Error::State(StateError::NotStarted))
    }

    /// Close the connection and wait for the task to finish
    pub async fn close(self) {
        let _ = self.commands.send(Cs104Command::Close);
        let _ = self.task.await;
    }
}
