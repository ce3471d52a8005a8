// tests/service_tests.rs

use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use mockall::mock;
use tokio::sync::mpsc;
use modguard_common::models::{ActionOutcome, ChatMessageEvent, ModerationAction, PolicyKind};
use modguard_common::traits::ModerationExecutor;
use modguard_core::executors::{ChannelExecutor, OutboundMessage};
use modguard_core::moderation::{FilterPipeline, FilterSettings, SpamConfig};
use modguard_core::utils::time::ManualClock;
use modguard_core::{Error, ModerationService};

mock! {
    Executor {}
    #[async_trait]
    impl ModerationExecutor for Executor {
        async fn timeout_user(&self, action: &ModerationAction) -> Result<(), Error>;
        async fn send_reply(&self, channel: &str, text: &str) -> Result<(), Error>;
    }
}

fn service_with(executor: MockExecutor, settings: FilterSettings) -> ModerationService {
    ModerationService::new(
        Arc::new(FilterPipeline::new(settings)),
        Arc::new(executor),
        Arc::new(ManualClock::new(1_000)),
    )
}

async fn settle_all(service: &ModerationService, event: ChatMessageEvent) -> Vec<ActionOutcome> {
    let mut outcomes = Vec::new();
    for handle in service.handle_event(event) {
        outcomes.push(handle.await.expect("dispatch task panicked"));
    }
    outcomes
}

#[tokio::test]
async fn test_link_violation_times_out_then_replies() {
    let mut executor = MockExecutor::new();
    executor
        .expect_timeout_user()
        .withf(|a| a.target_user == "alice" && a.policy == PolicyKind::Link && a.timeout_seconds == 1)
        .times(1)
        .returning(|_| Ok(()));
    executor
        .expect_send_reply()
        .withf(|channel, text| channel == "#stream" && text.starts_with("@Alice"))
        .times(1)
        .returning(|_, _| Ok(()));

    let service = service_with(executor, FilterSettings::default());
    let event = ChatMessageEvent::new("Alice", "free stuff at evil.org", 5_000).in_channel("#stream");
    assert_eq!(settle_all(&service, event).await, vec![ActionOutcome::Applied]);
}

#[tokio::test]
async fn test_failed_timeout_still_settles_cooling() {
    let mut executor = MockExecutor::new();
    executor
        .expect_timeout_user()
        .times(1)
        .returning(|_| Err(Error::Platform("rejected by chat".into())));
    executor.expect_send_reply().never();

    let service = service_with(executor, FilterSettings::default());
    let mut handles = Vec::new();
    for i in 0..6 {
        handles.extend(service.handle_event(ChatMessageEvent::new("bob", "spam", 1_000 + i * 100)));
    }
    assert_eq!(handles.len(), 1);
    let outcome = handles.remove(0).await.unwrap();
    assert!(!outcome.is_applied());

    let detector = service.pipeline().spam_detector();
    assert!(!detector.is_cooling("bob"));
    assert_eq!(detector.queued("bob"), 0);
}

/// Accepts the timeout call and never answers.
struct HangingExecutor;

#[async_trait]
impl ModerationExecutor for HangingExecutor {
    async fn timeout_user(&self, _action: &ModerationAction) -> Result<(), Error> {
        std::future::pending::<()>().await;
        Ok(())
    }

    async fn send_reply(&self, _channel: &str, _text: &str) -> Result<(), Error> {
        Ok(())
    }
}

#[tokio::test]
async fn test_hung_executor_hits_deadline_and_releases_cooling() {
    let service = ModerationService::new(
        Arc::new(FilterPipeline::new(FilterSettings::default())),
        Arc::new(HangingExecutor),
        Arc::new(ManualClock::new(1_000)),
    )
    .with_dispatch_deadline(Duration::from_millis(50));

    let mut handles = Vec::new();
    for i in 0..6 {
        handles.extend(service.handle_event(ChatMessageEvent::new("bob", "spam", 1_000 + i * 100)));
    }
    assert_eq!(handles.len(), 1);
    let outcome = tokio::time::timeout(Duration::from_secs(3), handles.remove(0))
        .await
        .expect("dispatch never gave up on the executor")
        .unwrap();
    match outcome {
        ActionOutcome::Failed(reason) => assert!(reason.contains("Timeout"), "got {}", reason),
        other => panic!("expected a failed dispatch, got {:?}", other),
    }

    let detector = service.pipeline().spam_detector();
    assert!(!detector.is_cooling("bob"));
    assert_eq!(detector.queued("bob"), 0);

    // the next flood is judged afresh
    let mut again = Vec::new();
    for i in 0..6 {
        again.extend(service.handle_event(ChatMessageEvent::new("bob", "spam", 3_601_000 + i * 100)));
    }
    assert_eq!(again.len(), 1);
    for handle in again {
        let outcome = tokio::time::timeout(Duration::from_secs(3), handle).await.unwrap().unwrap();
        assert!(!outcome.is_applied());
    }
}

#[tokio::test]
async fn test_messages_during_cooling_do_not_dispatch_again() {
    let mut executor = MockExecutor::new();
    executor.expect_timeout_user().times(1).returning(|_| Ok(()));
    executor.expect_send_reply().times(1).returning(|_, _| Ok(()));

    let service = service_with(executor, FilterSettings::default());
    let mut handles = Vec::new();
    for i in 0..12 {
        handles.extend(service.handle_event(ChatMessageEvent::new("carol", "flood", 1_000 + i * 50)));
    }
    assert_eq!(handles.len(), 1);
    for handle in handles {
        handle.await.unwrap();
    }
}

#[tokio::test]
async fn test_missing_timestamp_uses_clock() {
    let mut executor = MockExecutor::new();
    executor.expect_timeout_user().never();
    executor
        .expect_send_reply()
        .withf(|channel, text| channel == "#stream" && text == "@dave is exempt from the chat filters for 60 seconds.")
        .times(1)
        .returning(|_, _| Ok(()));

    let service = service_with(executor, FilterSettings::default());
    let permit = ChatMessageEvent::new("mod", "!permit dave", 0).in_channel("#stream").privileged();
    settle_all(&service, permit).await;

    // clock reads 1_000, so the grant runs to 61_000
    assert_eq!(service.pipeline().exemptions().expires_at("dave"), Some(61_000));
    let link = ChatMessageEvent::new("dave", "see evil.org", 0).in_channel("#stream");
    assert!(settle_all(&service, link).await.is_empty());
}

#[tokio::test]
async fn test_linkfilter_off_disables_link_checks() {
    let mut executor = MockExecutor::new();
    executor.expect_timeout_user().never();
    executor.expect_send_reply().times(1).returning(|_, _| Ok(()));

    let service = service_with(executor, FilterSettings::default());
    let toggle = ChatMessageEvent::new("mod", "!linkfilter.off", 2_000).privileged();
    settle_all(&service, toggle).await;
    assert!(!service.pipeline().is_policy_enabled(PolicyKind::Link));

    let link = ChatMessageEvent::new("erin", "https://evil.org/x", 3_000);
    assert!(settle_all(&service, link).await.is_empty());
}

#[tokio::test]
async fn test_empty_reply_text_is_not_sent() {
    let mut executor = MockExecutor::new();
    executor.expect_timeout_user().times(1).returning(|_| Ok(()));
    executor.expect_send_reply().never();

    let settings = FilterSettings::from_json_str(r#"{ "link": { "message": "" } }"#).unwrap();
    let service = service_with(executor, settings);
    let outcomes = settle_all(&service, ChatMessageEvent::new("frank", "evil.org", 1_000)).await;
    assert_eq!(outcomes, vec![ActionOutcome::Applied]);
}

#[tokio::test]
async fn test_start_drains_channel_into_executor() {
    let settings = FilterSettings {
        spam: Some(SpamConfig { min_messages: 2, ..SpamConfig::default() }),
        ..FilterSettings::default()
    };
    let (executor, mut out_rx) = ChannelExecutor::channel(16);
    let service = Arc::new(ModerationService::new(
        Arc::new(FilterPipeline::new(settings)),
        Arc::new(executor),
        Arc::new(ManualClock::new(0)),
    ));

    let (tx, rx) = mpsc::channel(16);
    let worker = tokio::spawn(service.clone().start(rx));
    for i in 0..3 {
        tx.send(ChatMessageEvent::new("gina", "hey", 10 + i).in_channel("#stream")).await.unwrap();
    }
    drop(tx);
    worker.await.unwrap();

    let first = tokio::time::timeout(Duration::from_secs(1), out_rx.recv())
        .await
        .expect("timed out")
        .expect("channel open");
    match first {
        OutboundMessage::Timeout { action, .. } => {
            assert_eq!(action.target_user, "gina");
            assert_eq!(action.policy, PolicyKind::Spam);
            assert_eq!(action.timeout_seconds, 30);
        }
        other => panic!("expected timeout first, got {:?}", other),
    }
}
