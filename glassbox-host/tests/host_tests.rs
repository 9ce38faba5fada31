use glassbox_host::{Outcome, PreviewConfig, PreviewHost};
use std::time::Duration;
use tokio::sync::watch;

fn fast_config() -> PreviewConfig {
    PreviewConfig {
        settle_delay_ms: 20,
        empty_recheck_delay_ms: 40,
        load_timeout_ms: 2_000,
        execution_budget_ms: 1_000,
        ..PreviewConfig::default()
    }
}

async fn settled_outcome(outcomes: &mut watch::Receiver<Outcome>) -> Outcome {
    let wait = async {
        loop {
            {
                let current = outcomes.borrow_and_update().clone();
                if current.is_settled() {
                    return current;
                }
            }
            if outcomes.changed().await.is_err() {
                return outcomes.borrow().clone();
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(10), wait)
        .await
        .expect("outcome never settled")
}

#[tokio::test(flavor = "multi_thread")]
async fn test_valid_component_settles_success() {
    let host = PreviewHost::new(fast_config());
    let mut outcomes = host.subscribe();
    host.submit("function Card()\n    return h(\"View\", {}, h(\"Text\", { text = \"hello\" }))\nend");
    assert_eq!(settled_outcome(&mut outcomes).await, Outcome::Success);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_thrown_error_surfaces_in_outcome() {
    let host = PreviewHost::new(fast_config());
    let mut outcomes = host.subscribe();
    host.submit("function Card()\n    error(\"boom\")\nend");
    match settled_outcome(&mut outcomes).await {
        Outcome::Error(message) => assert!(message.contains("boom"), "got: {}", message),
        other => panic!("expected an error outcome, got {:?}", other),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_missing_identifier_is_diagnosed() {
    let host = PreviewHost::new(fast_config());
    let mut outcomes = host.subscribe();
    // No capitalized binding anywhere, so the default identifier cannot
    // resolve inside the document.
    host.submit("local widget = 5");
    match settled_outcome(&mut outcomes).await {
        Outcome::Error(message) => {
            assert!(message.contains("is not defined"), "got: {}", message)
        }
        other => panic!("expected an error outcome, got {:?}", other),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_empty_render_fails_after_recheck() {
    let host = PreviewHost::new(fast_config());
    let mut outcomes = host.subscribe();
    host.submit("function Blank()\n    return nil\nend");
    match settled_outcome(&mut outcomes).await {
        Outcome::Error(message) => {
            assert!(message.contains("appears empty"), "got: {}", message)
        }
        other => panic!("expected an error outcome, got {:?}", other),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_stuck_component_times_out_and_never_transitions() {
    let config = PreviewConfig {
        load_timeout_ms: 80,
        execution_budget_ms: 400,
        ..fast_config()
    };
    let host = PreviewHost::new(config);
    let mut outcomes = host.subscribe();
    host.submit("function Spin()\n    while true do end\nend");
    let outcome = settled_outcome(&mut outcomes).await;
    match &outcome {
        Outcome::Error(message) => assert!(message.contains("timed out"), "got: {}", message),
        other => panic!("expected a timeout outcome, got {:?}", other),
    }
    // The cancelled episode must not produce a second transition.
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(host.outcome(), outcome);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_budget_expiry_settles_as_timeout() {
    // The in-VM execution budget is tighter than the load timeout (the
    // default config's shape); a hot loop must settle as timed out, not as
    // a load failure.
    let config = PreviewConfig {
        execution_budget_ms: 150,
        load_timeout_ms: 5_000,
        ..fast_config()
    };
    let host = PreviewHost::new(config);
    let mut outcomes = host.subscribe();
    host.submit("function Spin()\n    while true do end\nend");
    match settled_outcome(&mut outcomes).await {
        Outcome::Error(message) => {
            assert!(message.contains("timed out"), "got: {}", message);
            assert!(
                !message.contains("failed to load preview"),
                "got: {}",
                message
            );
        }
        other => panic!("expected a timeout outcome, got {:?}", other),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_identical_resubmit_is_a_no_op() {
    let source = "function Card()\n    return h(\"Text\", { text = \"same\" })\nend";
    let host = PreviewHost::new(fast_config());
    let mut outcomes = host.subscribe();
    host.submit(source);
    assert_eq!(settled_outcome(&mut outcomes).await, Outcome::Success);
    host.submit(source);
    assert_eq!(host.episodes(), 1);
    assert_eq!(host.outcome(), Outcome::Success);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_superseded_episode_never_settles() {
    let host = PreviewHost::new(fast_config());
    let mut outcomes = host.subscribe();
    // First episode spins and would time out; the replacement arrives while
    // it is still loading.
    host.submit("function Spin()\n    while true do end\nend");
    host.submit("function Card()\n    return h(\"Text\", { text = \"fresh\" })\nend");
    assert_eq!(host.episodes(), 2);
    assert_eq!(settled_outcome(&mut outcomes).await, Outcome::Success);
    // Give the superseded episode time to tear down; its outcome must not
    // leak through.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(host.outcome(), Outcome::Success);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_resubmit_after_detach_starts_fresh_episode() {
    let source = "function Card()\n    return h(\"Text\", { text = \"again\" })\nend";
    let host = PreviewHost::new(fast_config());
    let mut outcomes = host.subscribe();
    host.submit(source);
    assert_eq!(settled_outcome(&mut outcomes).await, Outcome::Success);
    assert_eq!(host.episodes(), 1);

    host.detach();
    // Explicit re-submission of the identical input must not be treated as
    // the idempotent no-op once the request was detached.
    host.submit(source);
    assert_eq!(host.episodes(), 2);
    assert_eq!(settled_outcome(&mut outcomes).await, Outcome::Success);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_concurrent_submits_leave_a_settled_outcome() {
    // Rapid-fire superseding submits from separate tasks: once the newest
    // episode settles, no stale `Loading` publish may trail in behind it.
    let host = std::sync::Arc::new(PreviewHost::new(fast_config()));
    let mut outcomes = host.subscribe();
    let mut handles = Vec::new();
    for i in 0..8 {
        let host = host.clone();
        handles.push(tokio::spawn(async move {
            host.submit(&format!(
                "function Card()\n    return h(\"Text\", {{ text = \"v{}\" }})\nend",
                i
            ));
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }
    let outcome = settled_outcome(&mut outcomes).await;
    assert!(outcome.is_settled());
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(host.outcome().is_settled(), "got: {:?}", host.outcome());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_starved_vm_reports_load_failure() {
    let config = PreviewConfig {
        lua_memory_limit_bytes: 16 * 1024,
        ..fast_config()
    };
    let host = PreviewHost::new(config);
    let mut outcomes = host.subscribe();
    host.submit("function Card()\n    return h(\"Text\", { text = \"hi\" })\nend");
    match settled_outcome(&mut outcomes).await {
        Outcome::Error(message) => {
            assert!(
                message.contains("failed to load preview"),
                "got: {}",
                message
            )
        }
        other => panic!("expected a load failure, got {:?}", other),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_effect_driven_render_counts_as_success() {
    let source = concat!(
        "function Ticker()\n",
        "    local label, setLabel = useState(\"\")\n",
        "    useEffect(function()\n",
        "        setLabel(\"ready\")\n",
        "    end)\n",
        "    return h(\"Text\", { text = label })\n",
        "end"
    );
    let host = PreviewHost::new(fast_config());
    let mut outcomes = host.subscribe();
    host.submit(source);
    assert_eq!(settled_outcome(&mut outcomes).await, Outcome::Success);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_json_enveloped_input_renders() {
    // Generation services wrap the source in a JSON envelope; the pipeline
    // unwraps it before execution.
    let payload = r#"{"jsx":"function Badge()\n    return h(\"Text\", { text = \"wrapped\" })\nend","component_name":"Badge"}"#;
    let host = PreviewHost::new(fast_config());
    let mut outcomes = host.subscribe();
    host.submit(payload);
    assert_eq!(settled_outcome(&mut outcomes).await, Outcome::Success);
}
