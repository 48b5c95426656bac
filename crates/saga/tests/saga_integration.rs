//! Integration tests for the purchase saga running over the in-memory broker.
//!
//! The participants here are scripted: they answer the commands they own with
//! a fixed reply and record what they saw.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use common::{CartId, PurchaseId, TourId, TouristId};
use messaging::{InMemoryBroker, MessageHandler, Publisher, SagaSubjects, Subscriber};
use saga::{Command, CommandType, Purchase, PurchaseItem, PurchaseOrchestrator, Reply, ReplyType};

/// Answers a fixed subset of commands with scripted replies.
struct ScriptedParticipant {
    replies: Arc<dyn Publisher<Reply>>,
    script: fn(CommandType) -> Option<ReplyType>,
    seen: Arc<Mutex<Vec<CommandType>>>,
}

#[async_trait]
impl MessageHandler for ScriptedParticipant {
    type Message = Command;

    async fn handle(&self, command: Command) {
        let Some(reply) = (self.script)(command.kind) else {
            return;
        };
        self.seen.lock().unwrap().push(command.kind);
        self.replies
            .publish(&Reply::new(reply, command.purchase))
            .await
            .unwrap();
    }
}

/// Records every reply that reaches the reply subject.
#[derive(Default)]
struct ReplyLog {
    replies: Mutex<Vec<ReplyType>>,
}

#[async_trait]
impl MessageHandler for ReplyLog {
    type Message = Reply;

    async fn handle(&self, reply: Reply) {
        self.replies.lock().unwrap().push(reply.kind);
    }
}

struct TestHarness {
    broker: InMemoryBroker,
    orchestrator: Arc<PurchaseOrchestrator>,
    capacity_seen: Arc<Mutex<Vec<CommandType>>>,
    purchase_seen: Arc<Mutex<Vec<CommandType>>>,
    log: Arc<ReplyLog>,
}

impl TestHarness {
    async fn new(
        capacity: fn(CommandType) -> Option<ReplyType>,
        purchase: fn(CommandType) -> Option<ReplyType>,
    ) -> Self {
        let broker = InMemoryBroker::new();
        let subjects = SagaSubjects::default();
        let replies: Arc<dyn Publisher<Reply>> =
            Arc::new(broker.publisher::<Reply>(&subjects.replies));
        let commands = Arc::new(broker.publisher::<Command>(&subjects.commands));

        let orchestrator = Arc::new(PurchaseOrchestrator::new(commands));
        broker
            .subscriber(&subjects.replies, &subjects.orchestrator_group)
            .subscribe(orchestrator.clone())
            .await
            .unwrap();

        let log = Arc::new(ReplyLog::default());
        broker
            .subscriber(&subjects.replies, "test_log")
            .subscribe(log.clone())
            .await
            .unwrap();

        let capacity_seen = Arc::new(Mutex::new(Vec::new()));
        broker
            .subscriber(&subjects.commands, &subjects.capacity_group)
            .subscribe(Arc::new(ScriptedParticipant {
                replies: replies.clone(),
                script: capacity,
                seen: capacity_seen.clone(),
            }))
            .await
            .unwrap();

        let purchase_seen = Arc::new(Mutex::new(Vec::new()));
        broker
            .subscriber(&subjects.commands, &subjects.purchase_group)
            .subscribe(Arc::new(ScriptedParticipant {
                replies,
                script: purchase,
                seen: purchase_seen.clone(),
            }))
            .await
            .unwrap();

        Self {
            broker,
            orchestrator,
            capacity_seen,
            purchase_seen,
            log,
        }
    }

    async fn run(&self, purchase: Purchase) {
        self.orchestrator.start(purchase).await.unwrap();
        self.broker.wait_idle().await;
    }

    fn replies(&self) -> Vec<ReplyType> {
        self.log.replies.lock().unwrap().clone()
    }

    fn capacity_seen(&self) -> Vec<CommandType> {
        self.capacity_seen.lock().unwrap().clone()
    }

    fn purchase_seen(&self) -> Vec<CommandType> {
        self.purchase_seen.lock().unwrap().clone()
    }
}

fn purchase() -> Purchase {
    Purchase::new(
        PurchaseId::generate(),
        CartId::new(1),
        TouristId::new(42),
        vec![
            PurchaseItem::new(TourId::new(1), 2),
            PurchaseItem::new(TourId::new(2), 1),
        ],
    )
}

fn capacity_ok(command: CommandType) -> Option<ReplyType> {
    match command {
        CommandType::ReserveCapacity => Some(ReplyType::CapacityReserved),
        CommandType::ReleaseCapacity => Some(ReplyType::CapacityReleased),
        _ => None,
    }
}

fn capacity_full(command: CommandType) -> Option<ReplyType> {
    match command {
        CommandType::ReserveCapacity => Some(ReplyType::CapacityNotReserved),
        CommandType::ReleaseCapacity => Some(ReplyType::CapacityReleased),
        _ => None,
    }
}

fn capacity_release_broken(command: CommandType) -> Option<ReplyType> {
    match command {
        CommandType::ReserveCapacity => Some(ReplyType::CapacityReserved),
        CommandType::ReleaseCapacity => Some(ReplyType::CapacityReleaseFailed),
        _ => None,
    }
}

fn purchase_ok(command: CommandType) -> Option<ReplyType> {
    match command {
        CommandType::IssueTokens => Some(ReplyType::TokensIssued),
        CommandType::CompletePurchase => Some(ReplyType::PurchaseCompleted),
        CommandType::AbortPurchase => Some(ReplyType::PurchaseAborted),
        _ => None,
    }
}

fn purchase_token_failure(command: CommandType) -> Option<ReplyType> {
    match command {
        CommandType::IssueTokens => Some(ReplyType::TokensNotIssued),
        CommandType::CompletePurchase => Some(ReplyType::PurchaseCompleted),
        CommandType::AbortPurchase => Some(ReplyType::PurchaseAborted),
        _ => None,
    }
}

#[tokio::test]
async fn test_happy_path_completes_purchase() {
    let harness = TestHarness::new(capacity_ok, purchase_ok).await;

    harness.run(purchase()).await;

    assert_eq!(
        harness.replies(),
        vec![
            ReplyType::CapacityReserved,
            ReplyType::TokensIssued,
            ReplyType::PurchaseCompleted,
        ]
    );
    assert_eq!(harness.capacity_seen(), vec![CommandType::ReserveCapacity]);
    assert_eq!(
        harness.purchase_seen(),
        vec![CommandType::IssueTokens, CommandType::CompletePurchase]
    );
}

#[tokio::test]
async fn test_capacity_failure_aborts_without_tokens() {
    let harness = TestHarness::new(capacity_full, purchase_ok).await;

    harness.run(purchase()).await;

    assert_eq!(
        harness.replies(),
        vec![ReplyType::CapacityNotReserved, ReplyType::PurchaseAborted]
    );
    assert_eq!(harness.purchase_seen(), vec![CommandType::AbortPurchase]);
}

#[tokio::test]
async fn test_token_failure_releases_capacity_then_aborts() {
    let harness = TestHarness::new(capacity_ok, purchase_token_failure).await;

    harness.run(purchase()).await;

    assert_eq!(
        harness.replies(),
        vec![
            ReplyType::CapacityReserved,
            ReplyType::TokensNotIssued,
            ReplyType::CapacityReleased,
            ReplyType::PurchaseAborted,
        ]
    );
    assert_eq!(
        harness.capacity_seen(),
        vec![CommandType::ReserveCapacity, CommandType::ReleaseCapacity]
    );
    assert!(!harness.purchase_seen().contains(&CommandType::CompletePurchase));
}

#[tokio::test]
async fn test_failed_release_still_aborts() {
    let harness = TestHarness::new(capacity_release_broken, purchase_token_failure).await;

    harness.run(purchase()).await;

    assert_eq!(
        harness.replies(),
        vec![
            ReplyType::CapacityReserved,
            ReplyType::TokensNotIssued,
            ReplyType::CapacityReleaseFailed,
            ReplyType::PurchaseAborted,
        ]
    );
}

#[tokio::test]
async fn test_concurrent_sagas_run_independently() {
    let harness = TestHarness::new(capacity_ok, purchase_ok).await;

    let purchases: Vec<Purchase> = (0..10).map(|_| purchase()).collect();
    for purchase in purchases {
        harness.orchestrator.start(purchase).await.unwrap();
    }
    harness.broker.wait_idle().await;

    let replies = harness.replies();
    let completed = replies
        .iter()
        .filter(|r| **r == ReplyType::PurchaseCompleted)
        .count();
    assert_eq!(completed, 10);
    assert_eq!(replies.len(), 30);
}
