//! Daemon contract tests
//!
//! These run the real `ddnsd` binary against a local mock provider.
//!
//! Verified:
//! - Missing or malformed credentials exit with code 1 before any request
//! - Invalid configuration exits with code 1
//! - A fatal startup failure exits with code 2
//! - SIGINT, SIGTERM and SIGQUIT exit with code 0, SIGHUP with code 3
//! - A signal during startup exits with code 0
//! - A signal kills a running restart command
//! - The debug endpoint reports engine statistics

#![cfg(unix)]

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const HOSTNAME: &str = "home.example.net";

fn daemon(update_url: &str, credentials_path: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_ddnsd"));
    cmd.env("DDNS_HOSTNAME", HOSTNAME)
        .env("DDNS_UPDATE_URL", update_url)
        .env("DDNS_CREDENTIALS_PATH", credentials_path)
        .env("DDNS_RELOAD_COMMAND", "true")
        .env("DDNS_RESTART_COMMAND", "true")
        .env("DDNS_LOG_LEVEL", "debug")
        .env_remove("DDNS_DEBUG_ADDR")
        .env_remove("DDNS_STARTUP_FAILURE")
        .env_remove("DDNS_CA_BUNDLE")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true);
    cmd
}

async fn write_credentials(content: &str) -> (TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dnscreds");
    tokio::fs::write(&path, content).await.unwrap();
    (dir, path)
}

async fn exit_code(mut child: Child) -> i32 {
    let status = tokio::time::timeout(Duration::from_secs(20), child.wait())
        .await
        .expect("daemon exits in time")
        .unwrap();
    status.code().expect("daemon exits with a code")
}

async fn good_provider() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/nic/update"))
        .respond_with(ResponseTemplate::new(200).set_body_string("good 203.0.113.7"))
        .mount(&server)
        .await;
    server
}

async fn wait_for_request(server: &MockServer) {
    for _ in 0..200 {
        if server
            .received_requests()
            .await
            .is_some_and(|requests| !requests.is_empty())
        {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("daemon never contacted the provider");
}

fn send_signal(child: &Child, name: &str) {
    let pid = child.id().expect("daemon is running");
    let status = std::process::Command::new("kill")
        .args(["-s", name, &pid.to_string()])
        .status()
        .unwrap();
    assert!(status.success());
}

async fn free_loopback_port() -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

#[tokio::test]
async fn missing_credentials_exit_before_any_request() {
    let server = good_provider().await;
    let dir = tempfile::tempdir().unwrap();

    let child = daemon(
        &format!("{}/nic/update", server.uri()),
        &dir.path().join("missing"),
    )
    .spawn()
    .unwrap();

    assert_eq!(exit_code(child).await, 1);
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn malformed_credentials_exit_before_any_request() {
    let server = good_provider().await;
    let (_dir, creds) = write_credentials(r#"{"Username": "alice"}"#).await;

    let child = daemon(&format!("{}/nic/update", server.uri()), &creds)
        .spawn()
        .unwrap();

    assert_eq!(exit_code(child).await, 1);
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn invalid_configuration_exits_with_config_error() {
    let server = good_provider().await;
    let (_dir, creds) = write_credentials(r#"{"Username": "alice", "Password": "s3cret"}"#).await;

    let child = daemon(&format!("{}/nic/update", server.uri()), &creds)
        .env("DDNS_UPDATE_INTERVAL_SECS", "1")
        .spawn()
        .unwrap();

    assert_eq!(exit_code(child).await, 1);
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn fatal_startup_failure_exits_with_runtime_error() {
    let (_dir, creds) = write_credentials(r#"{"Username": "alice", "Password": "s3cret"}"#).await;
    let port = free_loopback_port().await;

    let child = daemon(&format!("http://127.0.0.1:{}/nic/update", port), &creds)
        .env("DDNS_STARTUP_FAILURE", "exit")
        .env("DDNS_HTTP_TIMEOUT_SECS", "2")
        .spawn()
        .unwrap();

    assert_eq!(exit_code(child).await, 2);
}

#[tokio::test]
async fn sigterm_exits_cleanly_and_debug_endpoint_reports_stats() {
    let server = good_provider().await;
    let (_dir, creds) = write_credentials(r#"{"Username": "alice", "Password": "s3cret"}"#).await;
    let debug_port = free_loopback_port().await;

    let child = daemon(&format!("{}/nic/update", server.uri()), &creds)
        .env("DDNS_DEBUG_ADDR", format!("127.0.0.1:{}", debug_port))
        .spawn()
        .unwrap();

    wait_for_request(&server).await;

    let vars_url = format!("http://127.0.0.1:{}/debug/vars", debug_port);
    let mut successes = 0;
    for _ in 0..100 {
        if let Ok(response) = reqwest::get(&vars_url).await
            && let Ok(body) = response.text().await
            && let Ok(vars) = serde_json::from_str::<serde_json::Value>(&body)
        {
            successes = vars["update_successes"].as_u64().unwrap_or(0);
            if successes >= 1 {
                assert_eq!(vars["last_response"], "good 203.0.113.7");
                assert_eq!(vars["restart_attempts"], 0);
                break;
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert_eq!(successes, 1);

    send_signal(&child, "TERM");
    assert_eq!(exit_code(child).await, 0);
}

#[tokio::test]
async fn sighup_exits_with_unexpected_signal_code() {
    let server = good_provider().await;
    let (_dir, creds) = write_credentials(r#"{"Username": "alice", "Password": "s3cret"}"#).await;

    let child = daemon(&format!("{}/nic/update", server.uri()), &creds)
        .spawn()
        .unwrap();

    wait_for_request(&server).await;

    send_signal(&child, "HUP");
    assert_eq!(exit_code(child).await, 3);
}

#[tokio::test]
async fn interrupt_and_quit_exit_cleanly() {
    for name in ["INT", "QUIT"] {
        let server = good_provider().await;
        let (_dir, creds) =
            write_credentials(r#"{"Username": "alice", "Password": "s3cret"}"#).await;

        let child = daemon(&format!("{}/nic/update", server.uri()), &creds)
            .spawn()
            .unwrap();

        wait_for_request(&server).await;

        send_signal(&child, name);
        assert_eq!(exit_code(child).await, 0, "SIG{} should exit cleanly", name);
    }
}

#[tokio::test]
async fn signal_while_loading_credentials_exits_cleanly() {
    let server = good_provider().await;
    let dir = tempfile::tempdir().unwrap();

    // Reading a FIFO with no writer blocks, holding the daemon in startup
    let fifo = dir.path().join("dnscreds");
    let status = std::process::Command::new("mkfifo")
        .arg(&fifo)
        .status()
        .unwrap();
    assert!(status.success());

    let mut child = daemon(&format!("{}/nic/update", server.uri()), &fifo)
        .env("DDNS_LOG_LEVEL", "info")
        .stdout(Stdio::piped())
        .spawn()
        .unwrap();

    let mut lines = BufReader::new(child.stdout.take().unwrap()).lines();
    let loading = tokio::time::timeout(Duration::from_secs(10), async {
        while let Some(line) = lines.next_line().await.unwrap() {
            if line.contains("Loading credentials from") {
                return true;
            }
        }
        false
    })
    .await
    .expect("daemon reaches the credentials load");
    assert!(loading);

    send_signal(&child, "TERM");
    assert_eq!(exit_code(child).await, 0);
    assert!(server.received_requests().await.unwrap().is_empty());
}

/// Scheduler state letter from `/proc/<pid>/stat`, `None` once reaped
#[cfg(target_os = "linux")]
fn process_state(pid: u32) -> Option<char> {
    let stat = std::fs::read_to_string(format!("/proc/{}/stat", pid)).ok()?;
    let (_, rest) = stat.rsplit_once(')')?;
    rest.trim_start().chars().next()
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn signal_kills_running_restart_command() {
    let (dir, creds) = write_credentials(r#"{"Username": "alice", "Password": "s3cret"}"#).await;
    let port = free_loopback_port().await;

    let pid_file = dir.path().join("restart.pid");
    let script = dir.path().join("restart.sh");
    tokio::fs::write(
        &script,
        format!("echo $$ > {}\nexec sleep 100\n", pid_file.display()),
    )
    .await
    .unwrap();

    let child = daemon(&format!("http://127.0.0.1:{}/nic/update", port), &creds)
        .env("DDNS_UPDATE_INTERVAL_SECS", "10")
        .env("DDNS_HTTP_TIMEOUT_SECS", "2")
        .env("DDNS_RESTART_COMMAND", format!("sh {}", script.display()))
        .spawn()
        .unwrap();

    // First tick fails to connect and starts the restart script
    let mut restart_pid = None;
    for _ in 0..300 {
        if let Ok(content) = tokio::fs::read_to_string(&pid_file).await
            && let Ok(pid) = content.trim().parse::<u32>()
        {
            restart_pid = Some(pid);
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    let restart_pid = restart_pid.expect("restart command started");
    assert!(process_state(restart_pid).is_some());

    send_signal(&child, "TERM");
    assert_eq!(exit_code(child).await, 0);

    // Killed: either reaped already or left as a zombie, never still sleeping
    let mut state = process_state(restart_pid);
    for _ in 0..50 {
        if matches!(state, None | Some('Z')) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
        state = process_state(restart_pid);
    }
    assert!(
        matches!(state, None | Some('Z')),
        "restart command still alive in state {:?}",
        state
    );
}
