//! tabstore RPC server. Line-delimited JSON over stdin/stdout for the host shell.
//!
//! Protocol: one JSON object per line.
//! Request:  {"id":1, "method":"tab.add", "params":{"window":1,"tab_id":7}}
//! Response: {"id":1, "result":{...}} or {"id":1, "error":"..."}
//! Unsolicited lines carry either an "event" (notifications) or a "command"
//! (restore primitives and tabs the engine opens).

use std::io::{self, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use tabstore::clock::{Clock, SystemClock};
use tabstore::engine::LoadState;
use tabstore::logging::init_logging;
use tabstore::managers::save_scheduler::WriteTicket;
use tabstore::rpc_handler::{handle_method, Bridge};
use tabstore::services::session_files::{FileStorage, SessionFiles, SessionStorage};
use tabstore::services::settings_engine::{SettingsEngine, SettingsEngineTrait};
use tabstore::types::errors::{StorageError, WriteError};

/// Simple rate limiter: max requests per second.
struct RateLimiter {
    window_start: Instant,
    request_count: u32,
    max_per_second: u32,
}

impl RateLimiter {
    fn new(max_per_second: u32) -> Self {
        Self { window_start: Instant::now(), request_count: 0, max_per_second }
    }

    /// Returns true if the request is allowed, false if rate-limited.
    fn check(&mut self) -> bool {
        if self.window_start.elapsed().as_secs() >= 1 {
            self.window_start = Instant::now();
            self.request_count = 0;
        }
        self.request_count += 1;
        self.request_count <= self.max_per_second
    }
}

type WriteDone = (WriteTicket, Result<(), StorageError>);

fn emit(line: &Value) -> io::Result<()> {
    let mut out = io::stdout().lock();
    writeln!(out, "{}", line)?;
    out.flush()
}

fn emit_all(bridge: &Bridge) -> io::Result<()> {
    for line in bridge.drain_outbox() {
        emit(&line)?;
    }
    Ok(())
}

fn handle_line(bridge: &mut Bridge, rate_limiter: &mut RateLimiter, line: &str) -> Value {
    let req: Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(e) => return json!({"id": null, "error": format!("parse error: {}", e)}),
    };
    let id = req.get("id").cloned().unwrap_or(Value::Null);

    if !rate_limiter.check() {
        return json!({"id": id, "error": "rate limit exceeded"});
    }

    let method = req.get("method").and_then(|v| v.as_str()).unwrap_or("");
    let params = req.get("params").cloned().unwrap_or(json!({}));
    match handle_method(bridge, method, &params) {
        Ok(val) => json!({"id": id, "result": val}),
        Err(err) => {
            warn!(method, error = %err, "request failed");
            json!({"id": id, "error": err})
        }
    }
}

/// Runs queued session writes on the blocking pool.
fn dispatch_write(
    bridge: &mut Bridge,
    storage: &Arc<dyn SessionStorage>,
    done: &mpsc::UnboundedSender<WriteDone>,
) {
    let Some(job) = bridge.engine.take_write_job() else {
        return;
    };
    let storage = storage.clone();
    let done = done.clone();
    tokio::task::spawn_blocking(move || {
        let result = storage.write_atomic(&job);
        let _ = done.send((job.ticket, result));
    });
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let mut settings = SettingsEngine::new(None);
    let loaded = settings.load();
    let debug = settings.get_settings().logging.debug;
    if let Err(e) = init_logging(debug) {
        eprintln!("tabstore: {}", e);
    }
    if let Err(e) = loaded {
        warn!(error = %e, "using default settings");
    }

    let storage: Arc<dyn SessionStorage> =
        Arc::new(FileStorage::new(SessionFiles::default_location()));
    let clock = SystemClock;
    let mut bridge = Bridge::new(settings, storage.clone(), Box::new(clock));
    let (done_tx, mut done_rx) = mpsc::unbounded_channel::<WriteDone>();

    if emit(&json!({"event": "ready", "version": env!("CARGO_PKG_VERSION")})).is_err() {
        return;
    }
    info!("host bridge ready");

    let mut rate_limiter = RateLimiter::new(200);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let deadline = bridge.engine.next_deadline();
        let wait = deadline
            .map(|d| Duration::from_millis(d.saturating_sub(clock.now_ms())))
            .unwrap_or_default();

        tokio::select! {
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(l)) => l,
                    Ok(None) => break,
                    Err(e) => {
                        error!(error = %e, "stdin read failed");
                        break;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }
                let response = handle_line(&mut bridge, &mut rate_limiter, &line);
                // Events raised while handling go out before the response.
                if emit_all(&bridge).and_then(|()| emit(&response)).is_err() {
                    break;
                }
            }
            Some((ticket, result)) = done_rx.recv() => {
                bridge.engine.complete_write(ticket, result.map_err(WriteError::from));
            }
            _ = tokio::time::sleep(wait), if deadline.is_some() => {
                bridge.engine.on_timer();
            }
        }

        dispatch_write(&mut bridge, &storage, &done_tx);
        if emit_all(&bridge).is_err() {
            break;
        }
    }

    // The host went away without a quit request.
    if bridge.engine.load_state() != LoadState::QuittingFlushed {
        info!("stdin closed, flushing session");
        bridge.engine.quit();
    }
    let _ = emit_all(&bridge);
}
