//! Purchase saga orchestrator.

use std::sync::Arc;

use async_trait::async_trait;
use messaging::{MessageHandler, Publisher};

use crate::error::{Result, SagaError};
use crate::messages::{Command, CommandType, Purchase, Reply, ReplyType};
use crate::outcome::SagaOutcome;

/// The orchestrator's decision for one reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// Command to publish next; `UnknownCommand` means publish nothing.
    pub next: CommandType,
    pub outcome: SagaOutcome,
}

impl Transition {
    const fn to(next: CommandType, outcome: SagaOutcome) -> Self {
        Self { next, outcome }
    }

    /// Looks up the fixed transition for a reply type.
    pub const fn for_reply(reply: ReplyType) -> Self {
        match reply {
            ReplyType::CapacityReserved => Self::to(CommandType::IssueTokens, SagaOutcome::InProgress),
            ReplyType::TokensIssued => {
                Self::to(CommandType::CompletePurchase, SagaOutcome::InProgress)
            }
            ReplyType::CapacityNotReserved | ReplyType::CapacityReleased => Self::to(
                CommandType::AbortPurchase,
                SagaOutcome::Aborting {
                    capacity_leaked: false,
                },
            ),
            ReplyType::TokensNotIssued => {
                Self::to(CommandType::ReleaseCapacity, SagaOutcome::InProgress)
            }
            ReplyType::CapacityReleaseFailed => Self::to(
                CommandType::AbortPurchase,
                SagaOutcome::Aborting {
                    capacity_leaked: true,
                },
            ),
            ReplyType::PurchaseCompleted => {
                Self::to(CommandType::UnknownCommand, SagaOutcome::Completed)
            }
            ReplyType::PurchaseAborted => Self::to(CommandType::UnknownCommand, SagaOutcome::Aborted),
            ReplyType::UnknownReply => {
                Self::to(CommandType::UnknownCommand, SagaOutcome::Unrecognized)
            }
        }
    }

    /// Returns true if this transition publishes a command.
    pub fn publishes(&self) -> bool {
        self.next != CommandType::UnknownCommand
    }
}

/// Returns the command that follows `reply`, or `UnknownCommand` for none.
pub fn next_command(reply: ReplyType) -> CommandType {
    Transition::for_reply(reply).next
}

/// Drives purchase sagas by reacting to participant replies.
///
/// Holds no per-saga state: each reply carries the purchase, and the next
/// command is a pure function of the reply type. Different purchases run
/// fully independently, so one orchestrator can serve any number of
/// concurrent consumers.
pub struct PurchaseOrchestrator {
    commands: Arc<dyn Publisher<Command>>,
}

impl PurchaseOrchestrator {
    /// Creates an orchestrator that publishes commands through `commands`.
    pub fn new(commands: Arc<dyn Publisher<Command>>) -> Self {
        Self { commands }
    }

    /// Starts a saga by asking for capacity for every item of `purchase`.
    #[tracing::instrument(skip(self, purchase), fields(purchase_id = %purchase.purchase_id, items = purchase.items.len()))]
    pub async fn start(&self, purchase: Purchase) -> Result<()> {
        if purchase.items.is_empty() {
            return Err(SagaError::EmptyPurchase(purchase.purchase_id.to_string()));
        }

        let command = Command::new(CommandType::ReserveCapacity, purchase);
        self.commands.publish(&command).await?;

        metrics::counter!("saga_started_total").increment(1);
        tracing::info!("saga started");
        Ok(())
    }

    /// Applies the transition table to `reply` and publishes the next command.
    ///
    /// The reply's purchase is forwarded as-is, keeping `purchase_id` as the
    /// correlation key for the whole saga.
    #[tracing::instrument(skip(self, reply), fields(purchase_id = %reply.purchase.purchase_id, reply = %reply.kind))]
    pub async fn handle_reply(&self, reply: Reply) -> Result<Transition> {
        let transition = Transition::for_reply(reply.kind);
        self.record(&reply, transition);

        if !transition.publishes() {
            return Ok(transition);
        }

        let command = Command::new(transition.next, reply.purchase);
        tracing::info!(command = %command.kind, "sending next command");
        self.commands.publish(&command).await?;

        metrics::counter!(
            "saga_transitions_total",
            "reply" => reply.kind.as_str(),
            "command" => transition.next.as_str()
        )
        .increment(1);
        Ok(transition)
    }

    fn record(&self, reply: &Reply, transition: Transition) {
        match transition.outcome {
            SagaOutcome::Completed => {
                metrics::counter!("saga_completed_total").increment(1);
                tracing::info!("saga completed");
            }
            SagaOutcome::Aborted => {
                metrics::counter!("saga_aborted_total").increment(1);
                tracing::info!("saga aborted");
            }
            SagaOutcome::Aborting {
                capacity_leaked: true,
            } => {
                // No retry or reconciliation exists for a failed release.
                metrics::counter!("saga_capacity_leaks_total").increment(1);
                tracing::error!(
                    failed_tour_ids = ?reply.failed_tour_ids,
                    message = reply.message.as_deref().unwrap_or_default(),
                    "capacity release failed, seats stay reserved"
                );
            }
            SagaOutcome::Aborting { .. } => {
                tracing::warn!(
                    message = reply.message.as_deref().unwrap_or_default(),
                    "saga aborting"
                );
            }
            SagaOutcome::Unrecognized => {
                tracing::debug!("ignoring reply outside the saga");
            }
            SagaOutcome::InProgress => {}
        }
    }
}

#[async_trait]
impl MessageHandler for PurchaseOrchestrator {
    type Message = Reply;

    async fn handle(&self, reply: Reply) {
        let purchase_id = reply.purchase.purchase_id.clone();
        if let Err(error) = self.handle_reply(reply).await {
            tracing::error!(%purchase_id, %error, "failed to publish next saga command");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{CartId, PurchaseId, TourId, TouristId};
    use messaging::RecordingPublisher;

    use crate::messages::PurchaseItem;

    fn purchase() -> Purchase {
        Purchase::new(
            PurchaseId::new("p-1"),
            CartId::new(1),
            TouristId::new(9),
            vec![PurchaseItem::new(TourId::new(3), 2)],
        )
    }

    fn setup() -> (PurchaseOrchestrator, RecordingPublisher<Command>) {
        let commands = RecordingPublisher::new();
        let orchestrator = PurchaseOrchestrator::new(Arc::new(commands.clone()));
        (orchestrator, commands)
    }

    #[test]
    fn test_transition_table() {
        let table = [
            (ReplyType::CapacityReserved, CommandType::IssueTokens),
            (ReplyType::CapacityNotReserved, CommandType::AbortPurchase),
            (ReplyType::TokensIssued, CommandType::CompletePurchase),
            (ReplyType::TokensNotIssued, CommandType::ReleaseCapacity),
            (ReplyType::CapacityReleased, CommandType::AbortPurchase),
            (ReplyType::CapacityReleaseFailed, CommandType::AbortPurchase),
            (ReplyType::PurchaseCompleted, CommandType::UnknownCommand),
            (ReplyType::PurchaseAborted, CommandType::UnknownCommand),
            (ReplyType::UnknownReply, CommandType::UnknownCommand),
        ];

        for (reply, expected) in table {
            assert_eq!(next_command(reply), expected, "reply {reply}");
        }
    }

    #[test]
    fn test_transition_outcomes() {
        assert_eq!(
            Transition::for_reply(ReplyType::PurchaseCompleted).outcome,
            SagaOutcome::Completed
        );
        assert_eq!(
            Transition::for_reply(ReplyType::PurchaseAborted).outcome,
            SagaOutcome::Aborted
        );
        assert_eq!(
            Transition::for_reply(ReplyType::CapacityReleaseFailed).outcome,
            SagaOutcome::Aborting {
                capacity_leaked: true
            }
        );
        assert_eq!(
            Transition::for_reply(ReplyType::CapacityNotReserved).outcome,
            SagaOutcome::Aborting {
                capacity_leaked: false
            }
        );
        assert_eq!(
            Transition::for_reply(ReplyType::UnknownReply).outcome,
            SagaOutcome::Unrecognized
        );
    }

    #[tokio::test]
    async fn test_start_publishes_reserve_capacity() {
        let (orchestrator, commands) = setup();

        orchestrator.start(purchase()).await.unwrap();

        let sent = commands.published();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].kind, CommandType::ReserveCapacity);
        assert_eq!(sent[0].purchase, purchase());
    }

    #[tokio::test]
    async fn test_start_rejects_empty_purchase() {
        let (orchestrator, commands) = setup();
        let mut empty = purchase();
        empty.items.clear();

        let result = orchestrator.start(empty).await;

        assert!(matches!(result, Err(SagaError::EmptyPurchase(_))));
        assert_eq!(commands.count(), 0);
    }

    #[tokio::test]
    async fn test_reply_forwards_purchase_unchanged() {
        let (orchestrator, commands) = setup();
        let reply = Reply::new(ReplyType::CapacityReserved, purchase());

        let transition = orchestrator.handle_reply(reply).await.unwrap();

        assert_eq!(transition.next, CommandType::IssueTokens);
        let sent = commands.last().unwrap();
        assert_eq!(sent.kind, CommandType::IssueTokens);
        assert_eq!(sent.purchase.purchase_id, PurchaseId::new("p-1"));
        assert_eq!(sent.purchase, purchase());
    }

    #[tokio::test]
    async fn test_each_reply_publishes_exactly_its_command() {
        let publishing = [
            ReplyType::CapacityReserved,
            ReplyType::CapacityNotReserved,
            ReplyType::TokensIssued,
            ReplyType::TokensNotIssued,
            ReplyType::CapacityReleased,
            ReplyType::CapacityReleaseFailed,
        ];

        for reply in publishing {
            let (orchestrator, commands) = setup();
            orchestrator
                .handle_reply(Reply::new(reply, purchase()))
                .await
                .unwrap();

            let sent = commands.published();
            assert_eq!(sent.len(), 1, "reply {reply}");
            assert_eq!(sent[0].kind, next_command(reply));
        }
    }

    #[tokio::test]
    async fn test_terminal_replies_publish_nothing() {
        for reply in [
            ReplyType::PurchaseCompleted,
            ReplyType::PurchaseAborted,
            ReplyType::UnknownReply,
        ] {
            let (orchestrator, commands) = setup();
            let transition = orchestrator
                .handle_reply(Reply::new(reply, purchase()))
                .await
                .unwrap();

            assert!(transition.outcome.is_terminal());
            assert_eq!(commands.count(), 0, "reply {reply}");
        }
    }

    #[tokio::test]
    async fn test_publish_failure_is_reported() {
        let (orchestrator, commands) = setup();
        commands.set_fail_on_publish(true);

        let result = orchestrator
            .handle_reply(Reply::new(ReplyType::TokensIssued, purchase()))
            .await;

        assert!(matches!(result, Err(SagaError::Bus(_))));
    }

    #[tokio::test]
    async fn test_message_handler_swallows_publish_failure() {
        let (orchestrator, commands) = setup();
        commands.set_fail_on_publish(true);

        orchestrator
            .handle(Reply::new(ReplyType::CapacityReserved, purchase()))
            .await;

        assert_eq!(commands.count(), 0);
    }
}
