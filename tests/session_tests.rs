//! Session loop driven by the mock transport.

use thinkstream::config::MockSettings;
use thinkstream::*;

fn mock_config(settings: MockSettings) -> Config {
    Config {
        transport: TransportKind::Mock,
        mock: settings,
        ..Default::default()
    }
}

fn instant() -> MockSettings {
    MockSettings {
        delay_ms: 0,
        jitter_ms: 0,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_config_selects_mock_transport() {
    let transport = Transport::from_config(&mock_config(instant())).expect("transport");
    assert_eq!(transport.kind(), TransportKind::Mock);
}

#[tokio::test]
async fn test_two_prompts_in_sequence() {
    let transport = Transport::from_config(&mock_config(MockSettings {
        reply: "echo {prompt}".to_string(),
        ..instant()
    }))
    .expect("transport");
    let mut session = Session::new(PageSurface::default(), transport);

    session.submit("one").expect("submit");
    assert_eq!(session.wait_idle().await, ExchangeStatus::Complete);
    session.submit("two").expect("submit");
    assert_eq!(session.wait_idle().await, ExchangeStatus::Complete);

    let page = session.renderer().surface();
    assert_eq!(
        page.transcript(),
        vec![
            "system: You are Kimi.",
            "user: one",
            "assistant: echo one",
            "user: two",
            "assistant: echo two",
        ]
    );
    // Each message drawn exactly once across both completions.
    assert_eq!(page.renders, 5);
    assert_eq!(page.response, "echo two");
}

#[tokio::test]
async fn test_error_then_retry() {
    let transport = Transport::from_config(&mock_config(MockSettings {
        fail_with: Some(String::new()),
        ..instant()
    }))
    .expect("transport");
    let mut session = Session::new(PageSurface::default(), transport);

    session.submit("hi").expect("submit");
    assert_eq!(session.wait_idle().await, ExchangeStatus::Errored);
    assert_eq!(session.renderer().surface().error.as_deref(), Some("Stream error"));

    session.submit("again").expect("submit");
    assert!(session.renderer().surface().error.is_none());
    assert_eq!(session.wait_idle().await, ExchangeStatus::Errored);
}

#[tokio::test]
async fn test_run_on_terminal_surface() {
    colored::control::set_override(false);
    let transport = Transport::from_config(&mock_config(instant())).expect("transport");
    let mut session = Session::new(TerminalSurface::new(Vec::new(), true), transport);
    session
        .run(&b"hello\n"[..])
        .await
        .expect("run");

    let out = String::from_utf8(session.renderer().surface().get_ref().clone()).expect("utf8");
    assert!(out.contains("----- Begin thinking -----"));
    assert!(out.contains("These are some inner thoughts that will stream in..."));
    assert!(out.contains("This is the visible response text."));
    assert!(out.contains("user: hello"));
    assert!(out.contains("[Show thinking: /thinking 2]"));
}

#[tokio::test]
async fn test_history_command_redraws() {
    let transport = Transport::from_config(&mock_config(instant())).expect("transport");
    let mut session = Session::new(PageSurface::default(), transport);
    session.submit("hi").expect("submit");
    session.wait_idle().await;
    let before = session.renderer().surface().renders;
    assert!(session.handle_line("/history"));
    assert_eq!(session.renderer().surface().renders, before * 2);
    assert!(!session.handle_line("/quit"));
}
