use crate::clock::SystemClock;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{require_str, store_failure};
use crate::ipc::types::{AppState, Request};
use crate::repo::Repository;
use serde_json::json;
use std::path::PathBuf;
use tracing::info;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    let keys = match state.repo.as_ref().map(|r| r.store().keys()) {
        Some(Ok(keys)) => keys,
        Some(Err(e)) => return store_failure(&req.id, e),
        None => Vec::new(),
    };
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string()),
            "prefix": state.prefix,
            "keys": keys,
        }),
    )
}

pub fn open_workspace(state: &mut AppState, path: PathBuf) -> anyhow::Result<()> {
    let repo = Repository::open(&path, &state.prefix, Box::new(SystemClock))?;
    info!(workspace = %path.display(), "workspace selected");
    state.workspace = Some(path);
    state.repo = Some(repo);
    Ok(())
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let path = match require_str(req, "path") {
        Ok(p) => PathBuf::from(p),
        Err(resp) => return resp,
    };

    match open_workspace(state, path.clone()) {
        Ok(()) => ok(&req.id, json!({ "workspacePath": path.to_string_lossy() })),
        Err(e) => err(&req.id, "db_open_failed", format!("{e:#}"), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        _ => None,
    }
}
