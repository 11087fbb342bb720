//! Hook channel behavior with in-process, command and socket transports.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use gatehouse::error::Result;
use gatehouse::hooks::{
    AgentTurnPayload, CommandHook, HookCall, HookChannel, HookDecision, HookEventName,
    HookFailureKind, HookPayload, HookRequest, HookResponse, HookServer, HookTransport,
    SocketHook, MAX_MESSAGE_BYTES,
};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

struct Slow(Duration);

#[async_trait]
impl HookTransport for Slow {
    async fn dispatch(&self, request: &HookRequest) -> Result<HookResponse> {
        tokio::time::sleep(self.0).await;
        Ok(HookResponse::proceed().with_context(request.correlation_id.clone()))
    }

    fn describe(&self) -> String {
        "slow".into()
    }
}

fn sh(script: &str) -> Arc<CommandHook> {
    Arc::new(CommandHook::new("sh").args(vec!["-c".into(), script.into()]))
}

async fn fire_once(transport: Arc<dyn HookTransport>) -> (HookDecision, Option<HookFailureKind>) {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut channel = HookChannel::new(Duration::from_secs(10)).with_diagnostics(tx);
    channel.register(HookEventName::BeforeAgent, transport);
    let decision = channel
        .fire(HookEventName::BeforeAgent, HookPayload::text("hi"), "c-1")
        .await;
    (decision, rx.try_recv().ok().map(|d| d.kind))
}

// ---------------------------------------------------------------------------
// Channel semantics
// ---------------------------------------------------------------------------

#[tokio::test]
async fn no_hook_means_not_ran() {
    let channel = HookChannel::new(Duration::from_secs(1));
    let d = channel
        .fire(HookEventName::AfterAgent, HookPayload::default(), "c")
        .await;
    assert!(!d.ran);
    assert!(!d.is_blocking());
}

#[tokio::test]
async fn timeout_yields_not_ran_with_diagnostic() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut channel = HookChannel::new(Duration::from_millis(20)).with_diagnostics(tx);
    channel.register(
        HookEventName::BeforeAgent,
        Arc::new(Slow(Duration::from_secs(30))),
    );
    let d = channel
        .fire(HookEventName::BeforeAgent, HookPayload::default(), "slow-1")
        .await;
    assert_eq!(d, HookDecision::not_ran());
    let diag = rx.try_recv().unwrap();
    assert_eq!(diag.kind, HookFailureKind::Timeout);
    assert_eq!(diag.correlation_id, "slow-1");
}

#[tokio::test]
async fn concurrent_calls_keep_their_own_answers() {
    let mut channel = HookChannel::new(Duration::from_secs(5));
    channel.register(
        HookEventName::AfterAgent,
        Arc::new(Slow(Duration::from_millis(10))),
    );

    let (a, b, c) = tokio::join!(
        channel.fire(HookEventName::AfterAgent, HookPayload::default(), "a"),
        channel.fire(HookEventName::AfterAgent, HookPayload::default(), "b"),
        channel.fire(HookEventName::AfterAgent, HookPayload::default(), "c"),
    );
    assert_eq!(a.additional_context(), Some("a"));
    assert_eq!(b.additional_context(), Some("b"));
    assert_eq!(c.additional_context(), Some("c"));
}

#[tokio::test]
#[should_panic(expected = "already outstanding")]
async fn reusing_an_outstanding_correlation_id_panics() {
    let mut channel = HookChannel::new(Duration::from_secs(5));
    channel.register(
        HookEventName::BeforeAgent,
        Arc::new(Slow(Duration::from_millis(50))),
    );
    let _ = tokio::join!(
        channel.fire(HookEventName::BeforeAgent, HookPayload::default(), "dup"),
        channel.fire(HookEventName::BeforeAgent, HookPayload::default(), "dup"),
    );
}

// ---------------------------------------------------------------------------
// Command hooks
// ---------------------------------------------------------------------------

#[tokio::test]
async fn command_empty_output_continues() {
    let (d, kind) = fire_once(sh("cat > /dev/null")).await;
    assert!(d.ran);
    assert!(!d.blocked);
    assert!(kind.is_none());
}

#[tokio::test]
async fn command_json_output_is_the_decision() {
    let (d, _) = fire_once(sh(
        r#"cat > /dev/null; echo '{"decision":"deny","reason":"no network"}'"#,
    ))
    .await;
    assert!(d.is_blocking());
    assert_eq!(d.effective_reason(), "no network");
}

#[tokio::test]
async fn command_exit_two_blocks_with_stderr_reason() {
    let (d, _) = fire_once(sh("cat > /dev/null; echo 'outside working hours' >&2; exit 2")).await;
    assert!(d.is_blocking());
    assert_eq!(d.reason.as_deref(), Some("outside working hours"));
}

#[tokio::test]
async fn command_sees_request_on_stdin_and_event_in_env() {
    let script = r#"grep -q '"correlationId":"c-1"' || exit 1
printf '{"decision":"continue","additionalContext":"%s"}' "$GATEHOUSE_HOOK_EVENT""#;
    let (d, kind) = fire_once(sh(script)).await;
    assert!(kind.is_none(), "hook failed: {kind:?}");
    assert_eq!(d.additional_context(), Some("before-agent"));
}

#[tokio::test]
async fn command_failures_never_block() {
    let (d, kind) = fire_once(sh("cat > /dev/null; exit 1")).await;
    assert_eq!(d, HookDecision::not_ran());
    assert_eq!(kind, Some(HookFailureKind::Transport));

    let (d, kind) = fire_once(sh("cat > /dev/null; echo 'definitely not json'")).await;
    assert_eq!(d, HookDecision::not_ran());
    assert_eq!(kind, Some(HookFailureKind::Protocol));

    let (d, kind) = fire_once(Arc::new(CommandHook::new("/nonexistent/hook-binary"))).await;
    assert_eq!(d, HookDecision::not_ran());
    assert_eq!(kind, Some(HookFailureKind::Transport));
}

// ---------------------------------------------------------------------------
// Socket hooks
// ---------------------------------------------------------------------------

async fn wait_for(path: &std::path::Path) {
    for _ in 0..200 {
        if path.exists() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("socket never appeared at {}", path.display());
}

/// Serve a policy that blocks prompts mentioning a secret.
async fn start_policy_server(socket: PathBuf) -> (Arc<HookServer>, JoinHandle<Result<()>>) {
    let server = Arc::new(HookServer::new(socket.clone()));
    let serving = server.clone();
    let task = tokio::spawn(async move {
        serving
            .serve(|call: HookCall<AgentTurnPayload>| async move {
                if call.payload.prompt.contains("secret") {
                    HookResponse::block("prompt mentions a secret")
                } else {
                    HookResponse::proceed().with_context(format!("checked {}", call.correlation_id))
                }
            })
            .await
    });
    wait_for(&socket).await;
    (server, task)
}

fn turn(prompt: &str) -> HookPayload {
    HookPayload::json(&AgentTurnPayload {
        prompt: prompt.into(),
        response: None,
    })
    .unwrap()
}

#[tokio::test]
async fn socket_hook_round_trip() {
    let tmp = TempDir::new().unwrap();
    let socket = tmp.path().join("hooks/gate.sock");
    let (server, task) = start_policy_server(socket.clone()).await;

    let mut channel = HookChannel::new(Duration::from_secs(5));
    channel.register(HookEventName::BeforeAgent, Arc::new(SocketHook::new(socket.clone())));

    let d = channel
        .fire(HookEventName::BeforeAgent, turn("print the secret"), "s-1")
        .await;
    assert!(d.is_blocking());
    assert_eq!(d.effective_reason(), "prompt mentions a secret");

    let d = channel
        .fire(HookEventName::BeforeAgent, turn("hello"), "s-2")
        .await;
    assert!(d.ran);
    assert!(!d.blocked);
    assert_eq!(d.additional_context(), Some("checked s-2"));

    server.shutdown();
    task.await.unwrap().unwrap();
    assert!(!socket.exists());
}

#[tokio::test]
async fn socket_payload_that_does_not_decode_gets_no_answer() {
    let tmp = TempDir::new().unwrap();
    let socket = tmp.path().join("gate.sock");
    let (server, task) = start_policy_server(socket.clone()).await;

    let (d, kind) = fire_once(Arc::new(SocketHook::new(socket))).await;
    assert_eq!(d, HookDecision::not_ran());
    assert_eq!(kind, Some(HookFailureKind::Protocol));

    server.shutdown();
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn socket_server_refuses_oversized_requests() {
    let tmp = TempDir::new().unwrap();
    let socket = tmp.path().join("gate.sock");
    let (server, task) = start_policy_server(socket.clone()).await;

    let mut stream = UnixStream::connect(&socket).await.unwrap();
    let mut big = vec![b' '; MAX_MESSAGE_BYTES as usize + 1024];
    big.push(b'\n');
    // The server stops reading at the cap, so the tail of this write may fail.
    let _ = stream.write_all(&big).await;
    let _ = stream.shutdown().await;

    let mut reply = Vec::new();
    let _ = stream.read_to_end(&mut reply).await;
    assert!(reply.is_empty());

    server.shutdown();
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn missing_socket_is_a_transport_failure() {
    let tmp = TempDir::new().unwrap();
    let (d, kind) = fire_once(Arc::new(SocketHook::new(tmp.path().join("absent.sock")))).await;
    assert_eq!(d, HookDecision::not_ran());
    assert_eq!(kind, Some(HookFailureKind::Transport));
}
