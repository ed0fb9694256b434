//! Diagnostic HTTP server for failing builds.
//!
//! While a build is broken, every request on the configured address gets the
//! captured build output as plain text, regardless of method or path.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use crossbeam::channel::{Sender, bounded};
use parking_lot::Mutex;
use tiny_http::{Header, Response, Server};

use super::State;
use crate::log;

pub(super) struct ErrorServer {
    server: Arc<Server>,
    addr: SocketAddr,
    shutdown_tx: Sender<()>,
}

impl ErrorServer {
    /// Bind `addr` and start answering requests with the stored build
    /// output. The accept loop runs on its own thread.
    pub(super) fn start(addr: &str, state: Arc<Mutex<State>>) -> Result<Self> {
        let server = Server::http(addr)
            .map_err(|e| anyhow::anyhow!("failed to bind error server on {}: {}", addr, e))?;
        let server = Arc::new(server);
        let bound = server
            .server_addr()
            .to_ip()
            .context("error server bound to a non-IP address")?;

        let (shutdown_tx, shutdown_rx) = bounded(1);
        let accept = Arc::clone(&server);
        std::thread::spawn(move || {
            for request in accept.incoming_requests() {
                if shutdown_rx.try_recv().is_ok() {
                    break;
                }
                // Read under the orchestrator lock, release before writing
                // to the socket
                let body = state.lock().last_build_output.clone();
                let response = Response::from_data(body).with_header(
                    Header::from_bytes(&b"Content-Type"[..], &b"text/plain"[..]).unwrap(),
                );
                let _ = request.respond(response);
            }
        });

        log!("serve"; "build output on http://{}", bound);
        Ok(Self {
            server,
            addr: bound,
            shutdown_tx,
        })
    }

    #[cfg(test)]
    pub(super) fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Signal the accept thread and wake it out of `incoming_requests`.
    ///
    /// The thread is deliberately not joined: `stop` runs under the
    /// orchestrator lock, which the accept thread may itself be waiting on
    /// to read the build output.
    pub(super) fn stop(self) {
        let _ = self.shutdown_tx.send(());
        self.server.unblock();
    }
}
