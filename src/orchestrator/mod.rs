//! Build and serve lifecycle.
//!
//! One trigger means: run the build synchronously, then either respawn the
//! server process or put the failure output behind the diagnostic endpoint.
//! Everything is serialized under a single lock, so concurrent triggers
//! queue instead of overlapping and at most one server is ever alive.

mod error_server;

use std::io::Write;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::{debug, log};
use error_server::ErrorServer;

// ============================================================================
// State
// ============================================================================

/// Lifecycle phase after the most recent trigger.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Building,
    ServingOk,
    ServingError,
}

/// Everything that outlives a single trigger, behind the one lock.
pub(crate) struct State {
    phase: Phase,
    /// Combined stdout+stderr of the most recent failing build.
    pub(crate) last_build_output: Vec<u8>,
    server: Option<Child>,
    error_server: Option<ErrorServer>,
}

// ============================================================================
// Orchestrator
// ============================================================================

pub struct Orchestrator {
    build_cmd: String,
    server_cmd: Option<String>,
    error_addr: Option<String>,
    state: Arc<Mutex<State>>,
}

impl Orchestrator {
    pub fn new(build_cmd: String, server_cmd: Option<String>, error_addr: Option<String>) -> Self {
        Self {
            build_cmd,
            server_cmd,
            error_addr,
            state: Arc::new(Mutex::new(State {
                phase: Phase::Idle,
                last_build_output: Vec::new(),
                server: None,
                error_server: None,
            })),
        }
    }

    /// Run the build and advance the serve state accordingly.
    ///
    /// Synchronous: the caller waits for the build. Serialized: a trigger
    /// arriving mid-build queues on the lock and runs afterwards.
    pub fn trigger(&self) {
        let mut state = self.state.lock();
        state.phase = Phase::Building;

        log!("build"; "running {}", self.build_cmd);
        let next = match run_build(&self.build_cmd) {
            Ok(out) if out.success => {
                debug!("build"; "build succeeded");
                self.start_server(&mut state)
            }
            Ok(out) => {
                report_banner("build error", &out.combined);
                state.last_build_output = out.combined;
                self.start_error_server(&mut state)
            }
            Err(e) => {
                // A shell that cannot even launch counts as a failing build
                let msg = format!("failed to run build command: {e}\n");
                report_banner("build error", msg.as_bytes());
                state.last_build_output = msg.into_bytes();
                self.start_error_server(&mut state)
            }
        };
        state.phase = next;
    }

    fn start_server(&self, state: &mut State) -> Phase {
        teardown(state);
        let Some(cmd) = &self.server_cmd else {
            return Phase::Idle;
        };

        log!("serve"; "starting {}", cmd);
        match shell_command(cmd).spawn() {
            Ok(child) => {
                debug!("serve"; "server started (pid {})", child.id());
                state.server = Some(child);
                Phase::ServingOk
            }
            Err(e) => {
                report_banner("server error", format!("failed to start server: {e}\n").as_bytes());
                Phase::Idle
            }
        }
    }

    fn start_error_server(&self, state: &mut State) -> Phase {
        let Some(addr) = &self.error_addr else {
            // Nowhere to publish diagnostics: keep whatever is running, so
            // a previously started server stays on the last good build
            return if state.server.is_some() {
                Phase::ServingOk
            } else {
                Phase::Idle
            };
        };

        kill_server(state);

        // An already-bound listener reads the fresh output through the
        // shared state; restarting it would race the accept thread for the
        // listening socket.
        if state.error_server.is_some() {
            return Phase::ServingError;
        }

        match ErrorServer::start(addr, Arc::clone(&self.state)) {
            Ok(server) => {
                state.error_server = Some(server);
                Phase::ServingError
            }
            Err(e) => {
                report_banner("server error", format!("{e:#}\n").as_bytes());
                Phase::Idle
            }
        }
    }

    /// Stop whatever is running. Waits out an in-flight build first.
    pub fn shutdown(&self) {
        let mut state = self.state.lock();
        teardown(&mut state);
        state.phase = Phase::Idle;
    }

    #[allow(dead_code)]
    pub fn phase(&self) -> Phase {
        self.state.lock().phase
    }
}

/// Stop the server child and the diagnostic server, whichever are active.
/// No-op when nothing is.
fn teardown(state: &mut State) {
    kill_server(state);
    if let Some(server) = state.error_server.take() {
        server.stop();
    }
}

fn kill_server(state: &mut State) {
    if let Some(mut child) = state.server.take() {
        debug!("serve"; "stopping server (pid {})", child.id());
        let _ = child.kill();
        let _ = child.wait();
    }
}

// ============================================================================
// Process plumbing
// ============================================================================

struct BuildOutput {
    success: bool,
    combined: Vec<u8>,
}

/// Run the build through the system shell, capturing stdout then stderr.
fn run_build(cmd: &str) -> std::io::Result<BuildOutput> {
    let output = shell_command(cmd)
        .stdin(Stdio::null())
        .output()?;

    let mut combined = output.stdout;
    combined.extend_from_slice(&output.stderr);
    Ok(BuildOutput {
        success: output.status.success(),
        combined,
    })
}

#[cfg(unix)]
fn shell_command(cmd: &str) -> Command {
    let mut command = Command::new("/bin/sh");
    command.arg("-c").arg(cmd);
    command
}

#[cfg(windows)]
fn shell_command(cmd: &str) -> Command {
    let mut command = Command::new("cmd");
    command.arg("/C").arg(cmd);
    command
}

/// Print captured output to stderr between the classic banner lines.
fn report_banner(label: &str, output: &[u8]) {
    let mut err = std::io::stderr().lock();
    let _ = writeln!(err, "-------- {label}: --------");
    let _ = err.write_all(output);
    if !output.ends_with(b"\n") {
        let _ = writeln!(err);
    }
    let _ = writeln!(err, "------------------------------");
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[cfg(unix)]
mod tests {
    use super::*;

    use std::io::Read;
    use std::net::TcpStream;

    #[test]
    fn test_successful_build_without_server_is_idle() {
        let orchestrator = Orchestrator::new("true".to_string(), None, None);
        orchestrator.trigger();
        assert_eq!(orchestrator.phase(), Phase::Idle);
        assert!(orchestrator.state.lock().last_build_output.is_empty());
        orchestrator.shutdown();
    }

    #[test]
    fn test_failing_build_stores_combined_output() {
        let orchestrator = Orchestrator::new(
            "echo compiling; echo 'syntax error line 3' >&2; exit 1".to_string(),
            None,
            None,
        );
        orchestrator.trigger();

        let state = orchestrator.state.lock();
        assert_eq!(state.phase, Phase::Idle);
        // stdout first, then stderr
        assert_eq!(state.last_build_output, b"compiling\nsyntax error line 3\n");
        drop(state);
        orchestrator.shutdown();
    }

    #[test]
    fn test_unknown_command_is_a_failing_build() {
        let orchestrator =
            Orchestrator::new("definitely-not-a-command-xyz".to_string(), None, None);
        orchestrator.trigger();

        let state = orchestrator.state.lock();
        assert_eq!(state.phase, Phase::Idle);
        assert!(!state.last_build_output.is_empty());
    }

    #[test]
    fn test_error_server_serves_stored_output() {
        let orchestrator = Orchestrator::new(
            "echo 'syntax error line 3' >&2; exit 1".to_string(),
            None,
            Some("127.0.0.1:0".to_string()),
        );
        orchestrator.trigger();

        let addr = {
            let state = orchestrator.state.lock();
            assert_eq!(state.phase, Phase::ServingError);
            state.error_server.as_ref().unwrap().addr()
        };

        let mut stream = TcpStream::connect(addr).unwrap();
        stream.write_all(b"GET /any/path HTTP/1.0\r\n\r\n").unwrap();
        let mut raw = Vec::new();
        stream.read_to_end(&mut raw).unwrap();
        let text = String::from_utf8_lossy(&raw);

        assert!(text.contains("Content-Type: text/plain\r\n"));
        assert!(text.contains("syntax error line 3"));
        orchestrator.shutdown();
    }

    #[test]
    fn test_error_server_survives_repeated_failures() {
        let tmp = tempfile::tempdir().unwrap();
        let msg = tmp.path().join("msg");
        std::fs::write(&msg, "first failure\n").unwrap();

        let orchestrator = Orchestrator::new(
            format!("cat {}; exit 1", msg.display()),
            None,
            Some("127.0.0.1:0".to_string()),
        );

        orchestrator.trigger();
        let addr = orchestrator
            .state
            .lock()
            .error_server
            .as_ref()
            .unwrap()
            .addr();

        // Re-failures must not rebind the listener: the accept thread still
        // holds the socket, so a restart would lose the endpoint
        std::fs::write(&msg, "second failure\n").unwrap();
        for _ in 0..5 {
            orchestrator.trigger();
        }

        let state = orchestrator.state.lock();
        assert_eq!(state.phase, Phase::ServingError);
        assert_eq!(state.error_server.as_ref().unwrap().addr(), addr);
        drop(state);

        // The surviving listener serves the latest output, not the first
        let mut stream = TcpStream::connect(addr).unwrap();
        stream.write_all(b"GET / HTTP/1.0\r\n\r\n").unwrap();
        let mut raw = Vec::new();
        stream.read_to_end(&mut raw).unwrap();
        assert!(String::from_utf8_lossy(&raw).contains("second failure"));

        orchestrator.shutdown();
    }

    #[test]
    fn test_failing_build_without_error_addr_keeps_server() {
        let tmp = tempfile::tempdir().unwrap();
        let gate = tmp.path().join("ok");
        std::fs::write(&gate, "").unwrap();

        let orchestrator = Orchestrator::new(
            format!("test -f {}", gate.display()),
            Some("sleep 30".to_string()),
            None,
        );

        orchestrator.trigger();
        assert_eq!(orchestrator.phase(), Phase::ServingOk);
        let pid = orchestrator.state.lock().server.as_ref().unwrap().id();

        // A broken build with nowhere to publish diagnostics keeps the last
        // good server running
        std::fs::remove_file(&gate).unwrap();
        orchestrator.trigger();

        let state = orchestrator.state.lock();
        assert_eq!(state.phase, Phase::ServingOk);
        assert_eq!(state.server.as_ref().unwrap().id(), pid);
        drop(state);
        orchestrator.shutdown();
    }

    #[test]
    fn test_success_after_failure_tears_down_error_server() {
        let tmp = tempfile::tempdir().unwrap();
        let gate = tmp.path().join("ok");

        let orchestrator = Orchestrator::new(
            format!("test -f {}", gate.display()),
            None,
            Some("127.0.0.1:0".to_string()),
        );

        orchestrator.trigger();
        assert_eq!(orchestrator.phase(), Phase::ServingError);

        std::fs::write(&gate, "").unwrap();
        orchestrator.trigger();

        let state = orchestrator.state.lock();
        assert_eq!(state.phase, Phase::Idle);
        assert!(state.error_server.is_none());
        drop(state);
        orchestrator.shutdown();
    }

    #[test]
    fn test_new_server_replaces_old_one() {
        let orchestrator = Orchestrator::new(
            "true".to_string(),
            Some("sleep 30".to_string()),
            None,
        );

        orchestrator.trigger();
        assert_eq!(orchestrator.phase(), Phase::ServingOk);
        let first_pid = orchestrator.state.lock().server.as_ref().unwrap().id();

        orchestrator.trigger();
        assert_eq!(orchestrator.phase(), Phase::ServingOk);
        let second_pid = orchestrator.state.lock().server.as_ref().unwrap().id();

        assert_ne!(first_pid, second_pid);
        // The first child was killed and reaped before the second started
        #[cfg(target_os = "linux")]
        assert!(!std::path::Path::new(&format!("/proc/{first_pid}")).exists());

        orchestrator.shutdown();
        assert!(orchestrator.state.lock().server.is_none());
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let orchestrator = Orchestrator::new(
            "true".to_string(),
            Some("sleep 30".to_string()),
            None,
        );
        orchestrator.trigger();
        orchestrator.shutdown();
        orchestrator.shutdown();
        assert_eq!(orchestrator.phase(), Phase::Idle);
    }

    #[test]
    fn test_combined_output_order() {
        let out = run_build("echo out; echo err >&2; exit 1").unwrap();
        assert!(!out.success);
        assert_eq!(out.combined, b"out\nerr\n");
    }
}
