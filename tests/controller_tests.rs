// ABOUTME: End-to-end tests for the control facade and driver plumbing.
// ABOUTME: Covers endpoint lifecycle, rollback, and graceful shutdown.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::time::{sleep, Duration};

use vigil::backend::mock::MockBackend;
use vigil::{
    ActionQueue, BotConfig, Driver, Endpoint, Error, EventLoop, LoopState, PluginRegistry,
    ShutdownHook, StateStore, WriteOp,
};

fn test_config() -> BotConfig {
    BotConfig {
        sending_delay_ms: 100,
        poll_interval_ms: 100,
        ..Default::default()
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn build(backend: &MockBackend, config: &BotConfig) -> Arc<Driver> {
    init_tracing();
    let queue = ActionQueue::spawn(Arc::new(backend.clone()), config);
    Arc::new(Driver::new(Arc::new(backend.clone()), queue, config))
}

#[tokio::test(start_paused = true)]
async fn test_methods_require_connect_first() {
    let backend = MockBackend::new();
    let driver = build(&backend, &test_config());

    assert!(matches!(
        driver.send_text("alice", "hi", &[]).await,
        Err(Error::NotConnected)
    ));
    assert!(matches!(driver.read_new().await, Err(Error::NotConnected)));

    driver.connect().await.unwrap();
    driver.send_text("alice", "hi", &[]).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_connect_failure_is_fatal_not_retried() {
    let backend = MockBackend::new();
    backend.set_connect_error(Some("client window not found"));
    let driver = build(&backend, &test_config());

    assert!(matches!(driver.connect().await, Err(Error::Connection(_))));
    assert!(!driver.is_connected());
}

#[tokio::test(start_paused = true)]
async fn test_failed_send_does_not_delay_or_break_the_next() {
    let backend = MockBackend::new();
    backend.fail_sends_containing("doomed");
    let driver = build(&backend, &test_config());
    driver.connect().await.unwrap();

    // enqueue both before awaiting either, through the same queue
    let first = driver
        .queue()
        .submit(WriteOp::SendText {
            to: "alice".into(),
            text: "doomed message".into(),
            mentions: vec![],
        })
        .unwrap();
    let second = driver
        .queue()
        .submit(WriteOp::SendText {
            to: "alice".into(),
            text: "healthy message".into(),
            mentions: vec![],
        })
        .unwrap();

    assert!(matches!(first.wait().await, Err(Error::ActionFailed(_))));
    second.wait().await.unwrap();

    let performed = backend.performed();
    assert_eq!(performed.len(), 2);
    assert!(!performed[0].ok);
    assert!(performed[1].ok);
    let gap = performed[1].started - performed[0].started;
    assert!(gap >= Duration::from_millis(100), "gap was {gap:?}");
}

#[tokio::test(start_paused = true)]
async fn test_send_text_validates_input() {
    let backend = MockBackend::new();
    let driver = build(&backend, &test_config());
    driver.connect().await.unwrap();

    assert!(matches!(
        driver.send_text("", "hi", &[]).await,
        Err(Error::Invalid(_))
    ));
    assert!(matches!(
        driver.send_text("alice", "", &[]).await,
        Err(Error::Invalid(_))
    ));
    assert!(backend.performed().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_quote_validates_and_serializes() {
    let backend = MockBackend::new();
    let driver = build(&backend, &test_config());
    driver.connect().await.unwrap();

    assert!(matches!(
        driver.quote("alice", "", "sure").await,
        Err(Error::Invalid(_))
    ));
    assert!(matches!(
        driver.quote("alice", "msg-1", "").await,
        Err(Error::Invalid(_))
    ));
    assert!(backend.performed().is_empty());

    driver.quote("alice", "msg-1", "re: see above").await.unwrap();
    let ops = backend.performed_ops();
    assert!(matches!(
        &ops[0],
        WriteOp::Quote { to, message_id, text }
            if to == "alice" && message_id == "msg-1" && text == "re: see above"
    ));
}

#[tokio::test(start_paused = true)]
async fn test_send_file_rejects_missing_path() {
    let backend = MockBackend::new();
    let driver = build(&backend, &test_config());
    driver.connect().await.unwrap();

    let result = driver.send_file("alice", "/no/such/file.png").await;
    assert!(matches!(result, Err(Error::Invalid(_))));
    assert!(backend.performed().is_empty());

    let file = tempfile::NamedTempFile::new().unwrap();
    driver.send_file("alice", file.path()).await.unwrap();
    assert_eq!(backend.performed().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_add_endpoint_syncs_watch_list() {
    let backend = MockBackend::new();
    let config = test_config();
    let driver = build(&backend, &config);
    driver.connect().await.unwrap();
    let store = StateStore::new();
    let event_loop = EventLoop::new(driver, store.clone(), PluginRegistry::new(), &config);
    let controller = event_loop.controller();

    controller
        .add_endpoint(Endpoint::friend("alice").unwrap())
        .await
        .unwrap();

    assert!(store.contains("alice").await);
    let ops = backend.performed_ops();
    assert!(matches!(&ops[0], WriteOp::WatchEndpoint { name, .. } if name == "alice"));
}

#[tokio::test(start_paused = true)]
async fn test_add_endpoint_rolls_back_on_sync_failure() {
    let backend = MockBackend::new();
    let config = test_config();
    let driver = build(&backend, &config);
    // connect deliberately skipped, so the sync fails
    let store = StateStore::new();
    let event_loop = EventLoop::new(driver, store.clone(), PluginRegistry::new(), &config);
    let controller = event_loop.controller();

    let result = controller
        .add_endpoint(Endpoint::friend("alice").unwrap())
        .await;
    assert!(matches!(result, Err(Error::NotConnected)));
    assert!(!store.contains("alice").await);
}

#[tokio::test(start_paused = true)]
async fn test_add_endpoint_restores_previous_on_failure() {
    let backend = MockBackend::new();
    let config = test_config();
    let driver = build(&backend, &config);
    driver.connect().await.unwrap();
    let store = StateStore::new();
    let event_loop = EventLoop::new(
        Arc::clone(&driver),
        store.clone(),
        PluginRegistry::new(),
        &config,
    );
    let controller = event_loop.controller();

    controller
        .add_endpoint(Endpoint::friend("alice").unwrap())
        .await
        .unwrap();

    // closing the queue makes the next sync fail after the store update
    driver.shutdown().await;
    let result = controller
        .add_endpoint(Endpoint::admin("alice", 1).unwrap())
        .await;
    assert!(matches!(result, Err(Error::QueueClosed)));

    // the original registration is back in place
    let endpoint = store.get("alice").await.unwrap();
    assert!(endpoint.admin_level().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_remove_endpoint_unregisters_and_unwatches() {
    let backend = MockBackend::new();
    let config = test_config();
    let driver = build(&backend, &config);
    driver.connect().await.unwrap();
    let store = StateStore::new();
    store.setup(vec![Endpoint::friend("alice").unwrap()]).await.unwrap();
    let event_loop = EventLoop::new(driver, store.clone(), PluginRegistry::new(), &config);
    let controller = event_loop.controller();

    let removed = controller.remove_endpoint("alice").await.unwrap();
    assert_eq!(removed.name(), "alice");
    assert!(!store.contains("alice").await);
    let ops = backend.performed_ops();
    assert!(matches!(&ops[0], WriteOp::UnwatchEndpoint { name } if name == "alice"));

    assert!(matches!(
        controller.remove_endpoint("alice").await,
        Err(Error::UnknownEndpoint(_))
    ));
}

struct Farewell;

#[async_trait]
impl ShutdownHook for Farewell {
    async fn execute(&self, _endpoint: &Endpoint) -> anyhow::Result<Option<String>> {
        Ok(Some("goodbye".to_string()))
    }
}

#[tokio::test(start_paused = true)]
async fn test_graceful_stop_runs_hooks_and_drains() {
    let backend = MockBackend::new();
    let config = test_config();
    let driver = build(&backend, &config);
    driver.connect().await.unwrap();
    let store = StateStore::new();
    store.setup(vec![Endpoint::friend("alice").unwrap()]).await.unwrap();
    let registry = PluginRegistry::new();
    registry
        .register_shutdown_hook("farewell", Arc::new(Farewell))
        .unwrap();
    let event_loop = EventLoop::new(
        Arc::clone(&driver),
        store,
        registry,
        &config,
    );
    let controller = event_loop.controller();

    let run = {
        let event_loop = event_loop.clone();
        tokio::spawn(async move { event_loop.run().await })
    };
    sleep(Duration::from_millis(200)).await;

    controller.stop_loop();
    run.await.unwrap().unwrap();
    assert_eq!(controller.loop_state(), LoopState::Stopped);

    // the farewell went out before the queue closed
    let ops = backend.performed_ops();
    assert!(ops.iter().any(|op| matches!(
        op,
        WriteOp::SendText { to, text, .. } if to == "alice" && text == "goodbye"
    )));
    assert!(matches!(
        driver.send_text("alice", "late", &[]).await,
        Err(Error::QueueClosed)
    ));
}

#[tokio::test(start_paused = true)]
async fn test_loop_transitions_reject_invalid_states() {
    let backend = MockBackend::new();
    let config = test_config();
    let driver = build(&backend, &config);
    driver.connect().await.unwrap();
    let event_loop = EventLoop::new(driver, StateStore::new(), PluginRegistry::new(), &config);
    let controller = event_loop.controller();

    // not started yet
    assert!(matches!(controller.pause_loop(), Err(Error::Invalid(_))));
    assert!(matches!(controller.resume_loop(), Err(Error::Invalid(_))));

    let run = {
        let event_loop = event_loop.clone();
        tokio::spawn(async move { event_loop.run().await })
    };
    sleep(Duration::from_millis(150)).await;
    assert_eq!(controller.loop_state(), LoopState::Running);

    // pause and resume are idempotent while live
    controller.pause_loop().unwrap();
    controller.pause_loop().unwrap();
    assert_eq!(controller.loop_state(), LoopState::Paused);
    controller.resume_loop().unwrap();
    controller.resume_loop().unwrap();

    controller.stop_loop();
    run.await.unwrap().unwrap();

    // stop is terminal and idempotent
    controller.stop_loop();
    assert!(matches!(controller.pause_loop(), Err(Error::Stopped)));
    assert!(matches!(controller.resume_loop(), Err(Error::Stopped)));
}

#[tokio::test(start_paused = true)]
async fn test_plugin_toggles_through_controller() {
    let backend = MockBackend::new();
    let config = test_config();
    let driver = build(&backend, &config);
    let registry = PluginRegistry::new();
    registry
        .register_shutdown_hook("farewell", Arc::new(Farewell))
        .unwrap();
    let event_loop = EventLoop::new(driver, StateStore::new(), registry.clone(), &config);
    let controller = event_loop.controller();

    assert_eq!(controller.plugin_names(), ["farewell"]);
    controller.disable_plugin("farewell").unwrap();
    assert!(!registry.is_enabled("farewell").unwrap());
    controller.enable_plugin("farewell").unwrap();
    assert!(matches!(
        controller.disable_plugin("ghost"),
        Err(Error::UnknownPlugin(_))
    ));
}
