//! CS101 unbalanced link layer integration tests
//!
//! Master and slave run against the two ends of a duplex pipe; a raw sink on
//! the master captures the encoded frames so the FCB toggle and function
//! codes are checked on the wire.

use std::time::Duration;

use pretty_assertions::assert_eq;
use tokio::io::DuplexStream;
use tokio::sync::mpsc;
use tokio::time::advance;

use voltage_iec60870::asdu::Asdu;
use voltage_iec60870::config::{AppLayerParameters, LinkLayerParameters};
use voltage_iec60870::cs101::{
    Cs101Event, Ft12Frame, Ft12Parser, LinkControl, PrimaryFunction, UnbalancedMaster,
    UnbalancedSlave,
};
use voltage_iec60870::information_object::{InformationElement, InformationObject};
use voltage_iec60870::transport::{Direction, RawMessage, StreamTransport};
use voltage_iec60870::types::{CauseOfTransmission, LinkLayerState, QualityDescriptor, TypeId};

type Master = UnbalancedMaster<StreamTransport<DuplexStream>>;
type Slave = UnbalancedSlave<StreamTransport<DuplexStream>>;

const SLAVE_ADDRESS: u16 = 3;

fn app_params() -> AppLayerParameters {
    AppLayerParameters::cs101()
}

fn link_params() -> LinkLayerParameters {
    LinkLayerParameters::default()
}

fn measurement(ioa: u32, value: f32) -> Asdu {
    let mut asdu = Asdu::message(app_params(), CauseOfTransmission::Periodic, 1);
    asdu.add_information_object(&InformationObject::new(
        ioa,
        InformationElement::ShortFloat {
            value,
            quality: QualityDescriptor::GOOD,
        },
    ))
    .unwrap();
    asdu
}

fn command(ioa: u32) -> Asdu {
    let mut asdu = Asdu::message(app_params(), CauseOfTransmission::Activation, 1);
    asdu.add_information_object(&InformationObject::new(
        ioa,
        InformationElement::SingleCommand(
            voltage_iec60870::elements::SingleCommand::execute(true),
        ),
    ))
    .unwrap();
    asdu
}

fn pair() -> (
    Master,
    mpsc::UnboundedReceiver<Cs101Event>,
    Slave,
    mpsc::UnboundedReceiver<Cs101Event>,
) {
    let (near, far) = tokio::io::duplex(16 * 1024);
    let (mut master, master_events) = UnbalancedMaster::new(
        StreamTransport::new(near),
        link_params(),
        app_params(),
    );
    master.add_slave(SLAVE_ADDRESS).unwrap();
    let (slave, slave_events) = UnbalancedSlave::new(
        StreamTransport::new(far),
        SLAVE_ADDRESS,
        link_params(),
        app_params(),
    );
    (master, master_events, slave, slave_events)
}

async fn run(master: &mut Master, slave: &mut Slave, rounds: usize) {
    for _ in 0..rounds {
        master.tick().await.unwrap();
        slave.tick().await.unwrap();
        master.tick().await.unwrap();
    }
}

fn drain(events: &mut mpsc::UnboundedReceiver<Cs101Event>) -> Vec<Cs101Event> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

#[tokio::test(start_paused = true)]
async fn polling_cycle_brings_link_up() {
    let (mut master, mut master_events, mut slave, _slave_events) = pair();

    // status request, link reset, first class 2 poll
    run(&mut master, &mut slave, 3).await;

    assert_eq!(
        master.link_state(SLAVE_ADDRESS),
        Some(LinkLayerState::Available)
    );
    let states: Vec<LinkLayerState> = drain(&mut master_events)
        .into_iter()
        .filter_map(|e| match e {
            Cs101Event::LinkStateChanged { address, state } => {
                assert_eq!(address, SLAVE_ADDRESS);
                Some(state)
            }
            _ => None,
        })
        .collect();
    assert_eq!(states, vec![LinkLayerState::Available]);
}

#[tokio::test(start_paused = true)]
async fn class2_data_reaches_the_master() {
    let (mut master, mut master_events, mut slave, _slave_events) = pair();
    slave.enqueue_class2(measurement(500, 42.5));

    run(&mut master, &mut slave, 4).await;

    let asdus: Vec<Asdu> = drain(&mut master_events)
        .into_iter()
        .filter_map(|e| match e {
            Cs101Event::Asdu { address, asdu } => {
                assert_eq!(address, SLAVE_ADDRESS);
                Some(asdu)
            }
            _ => None,
        })
        .collect();
    assert_eq!(asdus.len(), 1);
    assert_eq!(asdus[0].type_id(), Some(TypeId::M_ME_NC_1));
    let object = asdus[0].get_element(0).unwrap();
    assert_eq!(object.address, 500);
}

#[tokio::test(start_paused = true)]
async fn access_demand_triggers_class1_request() {
    let (mut master, mut master_events, mut slave, _slave_events) = pair();
    // class 1 data pending raises ACD in every reply
    slave.enqueue_class1(measurement(900, 1.0));

    run(&mut master, &mut slave, 5).await;

    let asdus: Vec<Asdu> = drain(&mut master_events)
        .into_iter()
        .filter_map(|e| match e {
            Cs101Event::Asdu { asdu, .. } => Some(asdu),
            _ => None,
        })
        .collect();
    assert_eq!(asdus.len(), 1);
    assert_eq!(asdus[0].get_element(0).unwrap().address, 900);
}

#[tokio::test(start_paused = true)]
async fn confirmed_user_data_toggles_fcb() {
    let (mut master, _master_events, mut slave, mut slave_events) = pair();
    let (raw_tx, mut raw_rx) = mpsc::unbounded_channel::<RawMessage>();
    master.set_raw_message_sink(raw_tx);

    master.send_asdu(SLAVE_ADDRESS, command(2000)).await.unwrap();
    master.send_asdu(SLAVE_ADDRESS, command(2001)).await.unwrap();

    run(&mut master, &mut slave, 6).await;

    // both commands arrived exactly once
    let delivered: Vec<u32> = drain(&mut slave_events)
        .into_iter()
        .filter_map(|e| match e {
            Cs101Event::Asdu { asdu, .. } => Some(asdu.get_element(0).unwrap().address),
            _ => None,
        })
        .collect();
    assert_eq!(delivered, vec![2000, 2001]);

    // the two USER_DATA_CONFIRMED frames carried FCB = 1 then FCB = 0
    let mut parser = Ft12Parser::new(link_params().address_size);
    while let Ok(message) = raw_rx.try_recv() {
        if message.direction == Direction::Sent {
            parser.feed(&message.bytes);
        }
    }
    let mut fcb_values = Vec::new();
    while let Ok(Some(frame)) = parser.next_frame() {
        if let Some(control) = frame.control() {
            if control.prm
                && control.fcv_dfc
                && PrimaryFunction::from_bits(control.function)
                    == Some(PrimaryFunction::UserDataConfirmed)
            {
                fcb_values.push(control.fcb_acd);
            }
        }
    }
    assert_eq!(fcb_values, vec![true, false]);
}

#[tokio::test(start_paused = true)]
async fn duplicate_fcb_repeats_reply_without_processing() {
    let (near, far) = tokio::io::duplex(16 * 1024);
    let (mut slave, mut slave_events) = UnbalancedSlave::new(
        StreamTransport::new(far),
        SLAVE_ADDRESS,
        link_params(),
        app_params(),
    );
    let mut primary = near;

    // reset the link so the slave expects FCB = 1 next
    let reset = Ft12Frame::Fixed {
        control: LinkControl::primary(PrimaryFunction::ResetRemoteLink, false, false),
        address: SLAVE_ADDRESS,
    }
    .encode(1)
    .unwrap();
    write_all(&mut primary, &reset).await;
    slave.tick().await.unwrap();
    read_reply(&mut primary).await;

    let frame = Ft12Frame::Variable {
        control: LinkControl::primary(PrimaryFunction::UserDataConfirmed, true, true),
        address: SLAVE_ADDRESS,
        payload: command(2000).to_bytes().unwrap(),
    }
    .encode(1)
    .unwrap();

    write_all(&mut primary, &frame).await;
    slave.tick().await.unwrap();
    let first_reply = read_reply(&mut primary).await;
    assert_eq!(drain(&mut slave_events).len(), 1);

    // the same frame again (FCB did not toggle) repeats the reply only
    write_all(&mut primary, &frame).await;
    slave.tick().await.unwrap();
    let second_reply = read_reply(&mut primary).await;
    assert_eq!(first_reply, second_reply);
    assert!(drain(&mut slave_events).is_empty());

    // a toggled FCB is processed again
    let next = Ft12Frame::Variable {
        control: LinkControl::primary(PrimaryFunction::UserDataConfirmed, false, true),
        address: SLAVE_ADDRESS,
        payload: command(2001).to_bytes().unwrap(),
    }
    .encode(1)
    .unwrap();
    write_all(&mut primary, &next).await;
    slave.tick().await.unwrap();
    read_reply(&mut primary).await;
    assert_eq!(drain(&mut slave_events).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn unanswered_requests_fail_the_slave() {
    let (near, _far_kept_open) = tokio::io::duplex(16 * 1024);
    let (mut master, mut master_events) = UnbalancedMaster::new(
        StreamTransport::new(near),
        link_params(),
        app_params(),
    );
    master.add_slave(SLAVE_ADDRESS).unwrap();

    // first request goes out
    master.tick().await.unwrap();
    // every timeout triggers one retry until the retry count is exhausted
    for _ in 0..4 {
        advance(Duration::from_millis(1100)).await;
        master.tick().await.unwrap();
    }

    assert_eq!(master.link_state(SLAVE_ADDRESS), Some(LinkLayerState::Error));
    let states: Vec<LinkLayerState> = drain(&mut master_events)
        .into_iter()
        .filter_map(|e| match e {
            Cs101Event::LinkStateChanged { state, .. } => Some(state),
            _ => None,
        })
        .collect();
    assert_eq!(states, vec![LinkLayerState::Error]);
}

#[tokio::test(start_paused = true)]
async fn broadcast_is_sent_without_acknowledgement() {
    let (mut master, _master_events, mut slave, mut slave_events) = pair();
    // bring the link up first
    run(&mut master, &mut slave, 3).await;

    let broadcast = link_params().broadcast_address();
    master
        .send_asdu(broadcast, measurement(10, 0.0))
        .await
        .unwrap();
    slave.tick().await.unwrap();

    let delivered = drain(&mut slave_events);
    assert_eq!(delivered.len(), 1);
    // the slave does not reply to broadcast frames; the master keeps polling
    run(&mut master, &mut slave, 2).await;
    assert_eq!(
        master.link_state(SLAVE_ADDRESS),
        Some(LinkLayerState::Available)
    );
}

async fn write_all(stream: &mut DuplexStream, bytes: &[u8]) {
    use tokio::io::AsyncWriteExt;
    stream.write_all(bytes).await.unwrap();
}

async fn read_reply(stream: &mut DuplexStream) -> Vec<u8> {
    use tokio::io::AsyncReadExt;
    let mut buf = [0u8; 512];
    let n = tokio::time::timeout(Duration::from_millis(100), stream.read(&mut buf))
        .await
        .expect("no reply within timeout")
        .unwrap();
    buf[..n].to_vec()
}
