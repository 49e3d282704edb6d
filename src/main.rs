mod auth;
mod backup;
mod clock;
mod config;
mod dashboard;
mod db;
mod ipc;
mod model;
mod offline;
mod repo;
mod reports;
mod seed;
mod session;
mod store;

use clap::Parser;
use serde_json::json;
use std::io::{self, BufRead, Write};
use tracing::{debug, error, info};

fn main() {
    let config = config::Config::parse();
    config::init_logging(config.verbose);

    let mut state = ipc::AppState {
        workspace: None,
        repo: None,
        prefix: config.prefix.clone(),
    };
    if let Some(ws) = config.workspace.clone() {
        if let Err(e) = ipc::open_workspace(&mut state, ws.clone()) {
            error!(workspace = %ws.display(), error = %format!("{e:#}"), "failed to open workspace");
        }
    }
    info!(version = env!("CARGO_PKG_VERSION"), prefix = %state.prefix, "zamesd ready");

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // No id to echo back.
                let resp = json!({
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() },
                });
                let _ = writeln!(stdout, "{resp}");
                let _ = stdout.flush();
                continue;
            }
        };

        debug!(id = %req.id, method = %req.method, "request");
        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
    info!("stdin closed; exiting");
}
