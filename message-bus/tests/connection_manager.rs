//! Connection manager lifecycle against the in-memory broker

use async_trait::async_trait;
use message_bus::{
    CancelAction, ChannelAction, ChannelActionExecutor, ConnectionManager, ConnectionSettings,
    ConnectionState, CredentialPrompt, Credentials, FlowScope, InMemoryBroker, PromptOutcome,
    QueueDeclaration, StopMode,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug)]
struct StubPrompt {
    outcome: PromptOutcome,
    supported: bool,
    calls: AtomicUsize,
}

impl StubPrompt {
    fn new(outcome: PromptOutcome) -> Arc<Self> {
        Arc::new(Self {
            outcome,
            supported: true,
            calls: AtomicUsize::new(0),
        })
    }

    fn unsupported() -> Arc<Self> {
        Arc::new(Self {
            outcome: PromptOutcome::Canceled,
            supported: false,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialPrompt for StubPrompt {
    fn is_supported(&self) -> bool {
        self.supported
    }

    async fn prompt(&self, _user: &str) -> PromptOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcome.clone()
    }
}

/// Prompt the user never answers
#[derive(Debug)]
struct HangingPrompt;

#[async_trait]
impl CredentialPrompt for HangingPrompt {
    fn is_supported(&self) -> bool {
        true
    }

    async fn prompt(&self, _user: &str) -> PromptOutcome {
        std::future::pending().await
    }
}

fn prompting_settings() -> ConnectionSettings {
    ConnectionSettings {
        user: Some("adams".to_string()),
        prompt_for_password: true,
        ..ConnectionSettings::default()
    }
}

#[tokio::test]
async fn test_connection_reused_until_wrap_up() {
    let broker = InMemoryBroker::new();
    let manager = Arc::new(ConnectionManager::new(
        ConnectionSettings::default(),
        Arc::new(broker.clone()),
        FlowScope::new(),
    ));

    let mut first = ChannelActionExecutor::new(manager.clone(), ChannelAction::Noop);
    let mut second = ChannelActionExecutor::new(manager.clone(), ChannelAction::Noop);

    first.execute().await.unwrap();
    let seen_by_first = manager.connection().await.unwrap();
    second.execute().await.unwrap();
    let seen_by_second = manager.connection().await.unwrap();

    assert!(Arc::ptr_eq(&seen_by_first, &seen_by_second));
    assert_eq!(broker.connections_opened(), 1);
    assert_eq!(broker.channels_opened(), 2);
    assert_eq!(manager.state().await, ConnectionState::Open);

    first.wrap_up().await;
    second.wrap_up().await;
    manager.wrap_up().await;
    assert_eq!(manager.state().await, ConnectionState::Closed);
    assert!(!seen_by_first.is_open());

    manager.execute().await.unwrap();
    let fresh = manager.connection().await.unwrap();

    assert!(!Arc::ptr_eq(&seen_by_first, &fresh));
    assert_eq!(broker.connections_opened(), 2);
}

#[tokio::test]
async fn test_auto_created_deleted_in_order() {
    let broker = InMemoryBroker::new();
    let manager = Arc::new(ConnectionManager::new(
        ConnectionSettings::default(),
        Arc::new(broker.clone()),
        FlowScope::new(),
    ));

    for name in ["first", "second", "third"] {
        let mut executor = ChannelActionExecutor::new(
            manager.clone(),
            ChannelAction::DeclareQueue(QueueDeclaration {
                name: name.to_string(),
                remove_at_wrap_up: true,
                ..Default::default()
            }),
        );
        executor.execute().await.unwrap();
        executor.execute().await.unwrap();
        executor.wrap_up().await;
    }

    assert_eq!(manager.auto_created().await, vec!["first", "second", "third"]);

    manager.wrap_up().await;

    assert_eq!(broker.deleted_queues(), vec!["first", "second", "third"]);
    assert!(broker.queue_names().is_empty());
    assert_eq!(broker.open_connections(), 0);
}

#[tokio::test]
async fn test_canceled_prompt_stops_flow() {
    let broker = InMemoryBroker::new();
    let flow = FlowScope::new();
    let prompt = StubPrompt::new(PromptOutcome::Canceled);

    let settings = ConnectionSettings {
        on_prompt_cancel: CancelAction::StopFlow {
            mode: StopMode::Global,
            message: "User canceled login".to_string(),
        },
        ..prompting_settings()
    };
    let manager = ConnectionManager::new(settings, Arc::new(broker.clone()), flow.nested())
        .with_interactive_prompt(prompt.clone());

    let err = manager.execute().await.unwrap_err();

    assert_eq!(err, "User canceled login");
    assert!(flow.is_globally_stopped());
    assert_eq!(flow.stop_message().as_deref(), Some("User canceled login"));
    assert_eq!(broker.connections_opened(), 0);
    assert_eq!(prompt.calls(), 1);
}

#[tokio::test]
async fn test_canceled_prompt_local_stop() {
    let flow = FlowScope::new();
    let inner = flow.nested();

    let settings = ConnectionSettings {
        on_prompt_cancel: CancelAction::StopFlow {
            mode: StopMode::Local,
            message: "canceled".to_string(),
        },
        ..prompting_settings()
    };
    let manager = ConnectionManager::new(settings, Arc::new(InMemoryBroker::new()), inner.clone())
        .with_interactive_prompt(StubPrompt::new(PromptOutcome::Canceled));

    assert!(manager.execute().await.is_err());
    assert!(inner.is_stopped());
    assert!(!flow.is_stopped());
}

#[tokio::test]
async fn test_canceled_prompt_ignored() {
    let broker = InMemoryBroker::new();
    let flow = FlowScope::new();

    let settings = ConnectionSettings {
        on_prompt_cancel: CancelAction::Ignore,
        ..prompting_settings()
    };
    let manager = ConnectionManager::new(settings, Arc::new(broker.clone()), flow.clone())
        .with_interactive_prompt(StubPrompt::new(PromptOutcome::Canceled));

    manager.execute().await.unwrap();

    assert!(!flow.is_stopped());
    assert_eq!(broker.connections_opened(), 1);
}

#[tokio::test]
async fn test_prompted_credentials_used_once() {
    let credentials = Credentials::new("adams", "secret");
    let broker = InMemoryBroker::new().with_login(credentials.clone());
    let prompt = StubPrompt::new(PromptOutcome::Provided(credentials));

    let manager = ConnectionManager::new(
        prompting_settings(),
        Arc::new(broker.clone()),
        FlowScope::new(),
    )
    .with_interactive_prompt(prompt.clone());

    manager.execute().await.unwrap();
    manager.execute().await.unwrap();

    assert_eq!(prompt.calls(), 1);
    assert_eq!(broker.connections_opened(), 1);
}

#[tokio::test]
async fn test_headless_uses_console_prompt() {
    let credentials = Credentials::new("adams", "secret");
    let broker = InMemoryBroker::new().with_login(credentials.clone());
    let interactive = StubPrompt::new(PromptOutcome::Canceled);
    let console = StubPrompt::new(PromptOutcome::Provided(credentials));

    let settings = ConnectionSettings {
        headless: true,
        ..prompting_settings()
    };
    let manager = ConnectionManager::new(settings, Arc::new(broker), FlowScope::new())
        .with_interactive_prompt(interactive.clone())
        .with_console_prompt(console.clone());

    manager.execute().await.unwrap();

    assert_eq!(interactive.calls(), 0);
    assert_eq!(console.calls(), 1);
}

#[tokio::test]
async fn test_no_prompt_available() {
    let broker = InMemoryBroker::new().with_login(Credentials::new("adams", "secret"));
    let manager = ConnectionManager::new(prompting_settings(), Arc::new(broker), FlowScope::new())
        .with_console_prompt(StubPrompt::unsupported());

    let err = manager.execute().await.unwrap_err();

    assert!(err.contains("Failed to connect"));
    assert!(err.contains("ACCESS_REFUSED"));
    assert_eq!(manager.state().await, ConnectionState::Uninitialized);
}

#[tokio::test]
async fn test_stop_execution_idempotent() {
    let broker = InMemoryBroker::new();
    let manager = ConnectionManager::new(
        ConnectionSettings::default(),
        Arc::new(broker.clone()),
        FlowScope::new(),
    );

    manager.stop_execution().await;
    manager.stop_execution().await;
    assert_eq!(manager.state().await, ConnectionState::Uninitialized);
    assert!(manager.execute().await.is_err());

    manager.wrap_up().await;
    manager.execute().await.unwrap();
    assert_eq!(broker.open_connections(), 1);

    manager.stop_execution().await;
    manager.stop_execution().await;
    assert_eq!(broker.open_connections(), 0);
    assert_eq!(manager.state().await, ConnectionState::Closed);
}

#[tokio::test]
async fn test_stop_execution_interrupts_pending_prompt() {
    let broker = InMemoryBroker::new();
    let manager = Arc::new(
        ConnectionManager::new(prompting_settings(), Arc::new(broker.clone()), FlowScope::new())
            .with_interactive_prompt(Arc::new(HangingPrompt)),
    );

    let pending = tokio::spawn({
        let manager = manager.clone();
        async move { manager.execute().await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    tokio::time::timeout(Duration::from_secs(2), manager.stop_execution())
        .await
        .expect("stop_execution should not wait for the prompt");

    let result = tokio::time::timeout(Duration::from_secs(2), pending)
        .await
        .expect("execute should return once stopped")
        .unwrap();

    assert_eq!(result.unwrap_err(), "Execution stopped");
    assert_eq!(broker.connections_opened(), 0);
    assert_eq!(manager.state().await, ConnectionState::Uninitialized);
}

#[tokio::test]
async fn test_stop_execution_deletes_auto_created_queues() {
    let broker = InMemoryBroker::new();
    let manager = Arc::new(ConnectionManager::new(
        ConnectionSettings::default(),
        Arc::new(broker.clone()),
        FlowScope::new(),
    ));

    let mut executor = ChannelActionExecutor::new(
        manager.clone(),
        ChannelAction::DeclareQueue(QueueDeclaration {
            name: "tmp".to_string(),
            remove_at_wrap_up: true,
            ..Default::default()
        }),
    );
    executor.execute().await.unwrap();
    assert_eq!(broker.queue_names(), vec!["tmp"]);

    executor.stop_execution().await;
    manager.stop_execution().await;
    executor.wrap_up().await;
    manager.wrap_up().await;

    assert!(broker.queue_names().is_empty());
    assert_eq!(broker.deleted_queues(), vec!["tmp"]);
    assert!(manager.auto_created().await.is_empty());
    assert_eq!(broker.open_connections(), 0);
}
