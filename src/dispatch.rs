//! Application layer dispatch
//!
//! Routes decoded ASDUs to a user supplied [`StationHandler`] and generates
//! the protocol confirmations: activation confirmation and termination for
//! interrogations and commands, negative confirmations for unknown causes,
//! unsupported types and foreign common addresses. The dispatcher is
//! transport-agnostic; its replies are queued by the CS101 slave as class 1
//! data or sent directly over a CS104 connection.

use async_trait::async_trait;
use tracing::debug;

use crate::asdu::Asdu;
use crate::config::AppLayerParameters;
use crate::error::Result;
use crate::information_object::{InformationElement, InformationObject};
use crate::time::Cp56Time2a;
use crate::types::{CauseOfTransmission, TypeId};

/// Outcome of a process command reported by the handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    Accepted,
    Rejected,
}

/// User hooks for the station side of the application layer.
///
/// All methods have conservative defaults so a handler only implements what
/// the station supports; everything else is answered negatively by the
/// dispatcher.
#[async_trait]
pub trait StationHandler: Send {
    /// Data ASDUs answering a station or group interrogation. The dispatcher
    /// brackets them with the activation confirmation and termination and
    /// stamps the matching cause of transmission.
    async fn interrogation(&mut self, common_address: u16, qualifier: u8) -> Vec<Asdu> {
        let _ = (common_address, qualifier);
        Vec::new()
    }

    /// Counter readings answering a counter interrogation
    async fn counter_interrogation(&mut self, common_address: u16, qualifier: u8) -> Vec<Asdu> {
        let _ = (common_address, qualifier);
        Vec::new()
    }

    /// The object answering a read command, or None for an unknown address
    async fn read(&mut self, common_address: u16, address: u32) -> Option<InformationObject> {
        let _ = (common_address, address);
        None
    }

    /// Accept or refuse a clock synchronization
    async fn clock_sync(&mut self, common_address: u16, time: &Cp56Time2a) -> bool {
        let _ = (common_address, time);
        true
    }

    /// Accept or refuse a process reset
    async fn reset_process(&mut self, common_address: u16, qualifier: u8) -> bool {
        let _ = (common_address, qualifier);
        false
    }

    /// Execute (or select) a process command
    async fn command(&mut self, common_address: u16, object: &InformationObject) -> CommandOutcome {
        let _ = (common_address, object);
        CommandOutcome::Rejected
    }
}

/// Routes received ASDUs to a handler and produces the reply ASDUs
pub struct StationDispatcher<H: StationHandler> {
    params: AppLayerParameters,
    station_address: Option<u16>,
    handler: H,
}

impl<H: StationHandler> StationDispatcher<H> {
    pub fn new(params: AppLayerParameters, handler: H) -> Self {
        Self {
            params,
            station_address: None,
            handler,
        }
    }

    /// Answer only ASDUs addressed to `address` (or the broadcast address);
    /// others get a negative confirmation with cause "unknown common address"
    pub fn with_station_address(mut self, address: u16) -> Self {
        self.station_address = Some(address);
        self
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    fn broadcast_ca(&self) -> u16 {
        self.params.max_ca()
    }

    /// Route one received ASDU. Returns the replies in send order; monitor
    /// direction ASDUs produce no reply.
    pub async fn dispatch(&mut self, asdu: &Asdu) -> Result<Vec<Asdu>> {
        let Some(type_id) = asdu.type_id() else {
            return Ok(Vec::new());
        };
        if type_id.is_monitoring() {
            return Ok(Vec::new());
        }

        let ca = asdu.common_address();
        if let Some(own) = self.station_address {
            if ca != own && ca != self.broadcast_ca() {
                debug!("foreign common address {}", ca);
                return Ok(vec![confirmation(
                    asdu,
                    CauseOfTransmission::UnknownCa,
                    true,
                )]);
            }
        }
        if matches!(asdu.cot(), CauseOfTransmission::Unknown(_)) {
            return Ok(vec![confirmation(
                asdu,
                CauseOfTransmission::UnknownCot,
                true,
            )]);
        }

        match type_id {
            TypeId::C_IC_NA_1 => self.handle_interrogation(asdu).await,
            TypeId::C_CI_NA_1 => self.handle_counter_interrogation(asdu).await,
            TypeId::C_RD_NA_1 => self.handle_read(asdu).await,
            TypeId::C_CS_NA_1 => self.handle_clock_sync(asdu).await,
            TypeId::C_RP_NA_1 => self.handle_reset_process(asdu).await,
            TypeId::C_TS_NA_1 | TypeId::C_TS_TA_1 => {
                Ok(vec![self.activation_reply(asdu, false)])
            }
            id if id.is_command() => self.handle_command(asdu).await,
            _ => {
                debug!("no handler for {:?}", type_id);
                Ok(vec![confirmation(
                    asdu,
                    CauseOfTransmission::UnknownTypeId,
                    true,
                )])
            }
        }
    }

    async fn handle_interrogation(&mut self, asdu: &Asdu) -> Result<Vec<Asdu>> {
        match asdu.cot() {
            CauseOfTransmission::Activation => {}
            CauseOfTransmission::Deactivation => {
                return Ok(vec![confirmation(
                    asdu,
                    CauseOfTransmission::DeactivationCon,
                    false,
                )]);
            }
            _ => {
                return Ok(vec![confirmation(
                    asdu,
                    CauseOfTransmission::UnknownCot,
                    true,
                )]);
            }
        }
        let object = asdu.get_element(0)?;
        let InformationElement::Interrogation { qualifier } = object.element else {
            return Ok(vec![confirmation(
                asdu,
                CauseOfTransmission::UnknownCot,
                true,
            )]);
        };
        let Some(data_cot) = interrogation_cause(qualifier) else {
            return Ok(vec![self.activation_reply(asdu, true)]);
        };

        let mut replies = vec![self.activation_reply(asdu, false)];
        for mut data in self
            .handler
            .interrogation(asdu.common_address(), qualifier)
            .await
        {
            data.set_cot(data_cot);
            replies.push(data);
        }
        replies.push(confirmation(
            asdu,
            CauseOfTransmission::ActivationTermination,
            false,
        ));
        Ok(replies)
    }

    async fn handle_counter_interrogation(&mut self, asdu: &Asdu) -> Result<Vec<Asdu>> {
        if asdu.cot() != CauseOfTransmission::Activation {
            return Ok(vec![confirmation(
                asdu,
                CauseOfTransmission::UnknownCot,
                true,
            )]);
        }
        let object = asdu.get_element(0)?;
        let InformationElement::CounterInterrogation { qualifier } = object.element else {
            return Ok(vec![self.activation_reply(asdu, true)]);
        };
        let Some(data_cot) = counter_request_cause(qualifier) else {
            return Ok(vec![self.activation_reply(asdu, true)]);
        };

        let mut replies = vec![self.activation_reply(asdu, false)];
        for mut data in self
            .handler
            .counter_interrogation(asdu.common_address(), qualifier)
            .await
        {
            data.set_cot(data_cot);
            replies.push(data);
        }
        replies.push(confirmation(
            asdu,
            CauseOfTransmission::ActivationTermination,
            false,
        ));
        Ok(replies)
    }

    async fn handle_read(&mut self, asdu: &Asdu) -> Result<Vec<Asdu>> {
        let object = asdu.get_element(0)?;
        match self
            .handler
            .read(asdu.common_address(), object.address)
            .await
        {
            Some(found) => {
                let mut reply = Asdu::new(
                    self.params,
                    false,
                    CauseOfTransmission::Request,
                    self.params.originator_address,
                    asdu.common_address(),
                    asdu.is_test(),
                    false,
                );
                reply.add_information_object(&found)?;
                Ok(vec![reply])
            }
            None => Ok(vec![confirmation(
                asdu,
                CauseOfTransmission::UnknownIoa,
                true,
            )]),
        }
    }

    async fn handle_clock_sync(&mut self, asdu: &Asdu) -> Result<Vec<Asdu>> {
        if asdu.cot() != CauseOfTransmission::Activation {
            return Ok(vec![confirmation(
                asdu,
                CauseOfTransmission::UnknownCot,
                true,
            )]);
        }
        let object = asdu.get_element(0)?;
        let InformationElement::ClockSync { time } = object.element else {
            return Ok(vec![self.activation_reply(asdu, true)]);
        };
        let accepted = self.handler.clock_sync(asdu.common_address(), &time).await;
        Ok(vec![self.activation_reply(asdu, !accepted)])
    }

    async fn handle_reset_process(&mut self, asdu: &Asdu) -> Result<Vec<Asdu>> {
        let object = asdu.get_element(0)?;
        let InformationElement::ResetProcess { qualifier } = object.element else {
            return Ok(vec![self.activation_reply(asdu, true)]);
        };
        let accepted = self
            .handler
            .reset_process(asdu.common_address(), qualifier)
            .await;
        Ok(vec![self.activation_reply(asdu, !accepted)])
    }

    async fn handle_command(&mut self, asdu: &Asdu) -> Result<Vec<Asdu>> {
        match asdu.cot() {
            CauseOfTransmission::Activation => {}
            CauseOfTransmission::Deactivation => {
                return Ok(vec![confirmation(
                    asdu,
                    CauseOfTransmission::DeactivationCon,
                    false,
                )]);
            }
            _ => {
                return Ok(vec![confirmation(
                    asdu,
                    CauseOfTransmission::UnknownCot,
                    true,
                )]);
            }
        }
        let object = asdu.get_element(0)?;
        let outcome = self.handler.command(asdu.common_address(), &object).await;
        let negative = outcome == CommandOutcome::Rejected;
        let mut replies = vec![self.activation_reply(asdu, negative)];
        if !negative && !is_select(&object.element) {
            replies.push(confirmation(
                asdu,
                CauseOfTransmission::ActivationTermination,
                false,
            ));
        }
        Ok(replies)
    }

    fn activation_reply(&self, asdu: &Asdu, negative: bool) -> Asdu {
        confirmation(asdu, CauseOfTransmission::ActivationCon, negative)
    }
}

/// Mirror a request with a new cause of transmission and negative flag
fn confirmation(asdu: &Asdu, cot: CauseOfTransmission, negative: bool) -> Asdu {
    let mut reply = asdu.clone();
    reply.set_cot(cot);
    reply.set_negative(negative);
    reply
}

/// Interrogated-by cause for a QOI value (20 = station, 21..=36 = group)
fn interrogation_cause(qualifier: u8) -> Option<CauseOfTransmission> {
    match qualifier {
        20 => Some(CauseOfTransmission::InterrogatedByStation),
        21..=36 => Some(CauseOfTransmission::InterrogatedByGroup(qualifier - 20)),
        _ => None,
    }
}

/// Requested-by cause for a QCC request value (5 = general, 1..=4 = group)
fn counter_request_cause(qualifier: u8) -> Option<CauseOfTransmission> {
    match qualifier & 0x3f {
        5 => Some(CauseOfTransmission::RequestedByGeneralCounter),
        g @ 1..=4 => Some(CauseOfTransmission::RequestedByGroupCounter(g)),
        _ => None,
    }
}

fn is_select(element: &InformationElement) -> bool {
    match element {
        InformationElement::SingleCommand(cmd) => cmd.select,
        InformationElement::DoubleCommand(cmd) => cmd.select,
        InformationElement::StepCommand(cmd) => cmd.select,
        InformationElement::SetpointNormalized { qualifier, .. }
        | InformationElement::SetpointScaled { qualifier, .. }
        | InformationElement::SetpointShortFloat { qualifier, .. } => qualifier.select,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::SingleCommand;
    use crate::information_object::InformationObject;
    use crate::types::QualityDescriptor;

    struct TestHandler {
        commands: Vec<u32>,
    }

    #[async_trait]
    impl StationHandler for TestHandler {
        async fn interrogation(&mut self, common_address: u16, _qualifier: u8) -> Vec<Asdu> {
            let params = AppLayerParameters::cs104();
            let mut points = Asdu::message(params, CauseOfTransmission::Spontaneous, common_address);
            for i in 0..3u32 {
                points
                    .add_information_object(&InformationObject::new(
                        100 + i,
                        InformationElement::SinglePoint {
                            value: true,
                            quality: QualityDescriptor::GOOD,
                        },
                    ))
                    .unwrap();
            }
            vec![points]
        }

        async fn command(
            &mut self,
            _common_address: u16,
            object: &InformationObject,
        ) -> CommandOutcome {
            if object.address < 5000 {
                self.commands.push(object.address);
                CommandOutcome::Accepted
            } else {
                CommandOutcome::Rejected
            }
        }
    }

    fn dispatcher() -> StationDispatcher<TestHandler> {
        StationDispatcher::new(
            AppLayerParameters::cs104(),
            TestHandler {
                commands: Vec::new(),
            },
        )
        .with_station_address(1)
    }

    fn interrogation_request(qualifier: u8) -> Asdu {
        let mut asdu = Asdu::new(
            AppLayerParameters::cs104(),
            false,
            CauseOfTransmission::Activation,
            0,
            1,
            false,
            false,
        );
        asdu.add_information_object(&InformationObject::new(
            0,
            InformationElement::Interrogation { qualifier },
        ))
        .unwrap();
        asdu
    }

    #[tokio::test]
    async fn station_interrogation_sequence() {
        let mut dispatcher = dispatcher();
        let replies = dispatcher.dispatch(&interrogation_request(20)).await.unwrap();

        assert_eq!(replies.len(), 3);
        assert_eq!(replies[0].type_id(), Some(TypeId::C_IC_NA_1));
        assert_eq!(replies[0].cot(), CauseOfTransmission::ActivationCon);
        assert!(!replies[0].is_negative());
        assert_eq!(replies[1].type_id(), Some(TypeId::M_SP_NA_1));
        assert_eq!(
            replies[1].cot(),
            CauseOfTransmission::InterrogatedByStation
        );
        assert_eq!(replies[1].number_of_elements(), 3);
        assert_eq!(replies[2].type_id(), Some(TypeId::C_IC_NA_1));
        assert_eq!(
            replies[2].cot(),
            CauseOfTransmission::ActivationTermination
        );
    }

    #[tokio::test]
    async fn group_interrogation_cause() {
        let mut dispatcher = dispatcher();
        let replies = dispatcher.dispatch(&interrogation_request(22)).await.unwrap();
        assert_eq!(
            replies[1].cot(),
            CauseOfTransmission::InterrogatedByGroup(2)
        );
    }

    #[tokio::test]
    async fn command_execute_confirms_and_terminates() {
        let mut dispatcher = dispatcher();
        let mut request = Asdu::new(
            AppLayerParameters::cs104(),
            false,
            CauseOfTransmission::Activation,
            0,
            1,
            false,
            false,
        );
        request
            .add_information_object(&InformationObject::new(
                2000,
                InformationElement::SingleCommand(SingleCommand::execute(true)),
            ))
            .unwrap();

        let replies = dispatcher.dispatch(&request).await.unwrap();
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0].cot(), CauseOfTransmission::ActivationCon);
        assert!(!replies[0].is_negative());
        assert_eq!(
            replies[1].cot(),
            CauseOfTransmission::ActivationTermination
        );
        assert_eq!(dispatcher.handler_mut().commands, vec![2000]);
    }

    #[tokio::test]
    async fn command_select_gets_no_termination() {
        let mut dispatcher = dispatcher();
        let mut request = Asdu::new(
            AppLayerParameters::cs104(),
            false,
            CauseOfTransmission::Activation,
            0,
            1,
            false,
            false,
        );
        let select = SingleCommand {
            state: true,
            qualifier: 0,
            select: true,
        };
        request
            .add_information_object(&InformationObject::new(
                2000,
                InformationElement::SingleCommand(select),
            ))
            .unwrap();

        let replies = dispatcher.dispatch(&request).await.unwrap();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].cot(), CauseOfTransmission::ActivationCon);
    }

    #[tokio::test]
    async fn rejected_command_is_negative() {
        let mut dispatcher = dispatcher();
        let mut request = Asdu::new(
            AppLayerParameters::cs104(),
            false,
            CauseOfTransmission::Activation,
            0,
            1,
            false,
            false,
        );
        request
            .add_information_object(&InformationObject::new(
                9000,
                InformationElement::SingleCommand(SingleCommand::execute(false)),
            ))
            .unwrap();

        let replies = dispatcher.dispatch(&request).await.unwrap();
        assert_eq!(replies.len(), 1);
        assert!(replies[0].is_negative());
    }

    #[tokio::test]
    async fn foreign_common_address_is_answered_negatively() {
        let mut dispatcher = dispatcher();
        let mut request = interrogation_request(20);
        request = {
            // rebuild with a different common address
            let mut other = Asdu::new(
                AppLayerParameters::cs104(),
                false,
                CauseOfTransmission::Activation,
                0,
                7,
                false,
                false,
            );
            other
                .add_information_object(&request.get_element(0).unwrap())
                .unwrap();
            other
        };
        let replies = dispatcher.dispatch(&request).await.unwrap();
        assert_eq!(replies.len(), 1);
        assert!(replies[0].is_negative());
        assert_eq!(replies[0].cot(), CauseOfTransmission::UnknownCa);
    }

    #[tokio::test]
    async fn monitor_asdus_produce_no_reply() {
        let mut dispatcher = dispatcher();
        let mut asdu = Asdu::message(
            AppLayerParameters::cs104(),
            CauseOfTransmission::Spontaneous,
            1,
        );
        asdu.add_information_object(&InformationObject::new(
            1,
            InformationElement::SinglePoint {
                value: true,
                quality: QualityDescriptor::GOOD,
            },
        ))
        .unwrap();
        assert!(dispatcher.dispatch(&asdu).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn clock_sync_is_confirmed() {
        let mut dispatcher = dispatcher();
        let mut request = Asdu::new(
            AppLayerParameters::cs104(),
            false,
            CauseOfTransmission::Activation,
            0,
            1,
            false,
            false,
        );
        request
            .add_information_object(&InformationObject::new(
                0,
                InformationElement::ClockSync {
                    time: Cp56Time2a::from_millis(1_688_466_645_250),
                },
            ))
            .unwrap();
        let replies = dispatcher.dispatch(&request).await.unwrap();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].cot(), CauseOfTransmission::ActivationCon);
        assert!(!replies[0].is_negative());
    }
}
