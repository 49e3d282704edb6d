use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{require_repo, store_failure};
use crate::ipc::types::{AppState, Request};
use crate::offline::{self, JsonlOutbox, DEFAULT_COLLECTION};
use serde_json::json;
use std::path::PathBuf;

const OUTBOX_DIR: &str = "outbox";
const OUTBOX_FILE: &str = "offline_sync.jsonl";

fn handle_enqueue(state: &mut AppState, req: &Request) -> serde_json::Value {
    let repo = match require_repo(state, req) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    let Some(payload) = req.params.get("payload") else {
        return err(&req.id, "bad_params", "missing payload", None);
    };
    let collection = match req.params.get("collection").and_then(|v| v.as_str()) {
        Some(c) if !c.trim().is_empty() => c.trim(),
        _ => DEFAULT_COLLECTION,
    };
    match offline::enqueue(repo.store(), collection, payload.clone(), repo.now()) {
        Ok(item) => ok(&req.id, json!({ "item": item })),
        Err(e) => store_failure(&req.id, e),
    }
}

fn handle_pending(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(repo) = state.repo.as_ref() else {
        return ok(&req.id, json!({ "items": [] }));
    };
    match offline::pending(repo.store()) {
        Ok(items) => ok(&req.id, json!({ "items": items })),
        Err(e) => store_failure(&req.id, e),
    }
}

fn handle_drain(state: &mut AppState, req: &Request) -> serde_json::Value {
    let repo = match require_repo(state, req) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    let outbox_path = match req.params.get("outboxPath").and_then(|v| v.as_str()) {
        Some(p) if !p.trim().is_empty() => PathBuf::from(p.trim()),
        _ => match state.workspace.as_ref() {
            Some(ws) => ws.join(OUTBOX_DIR).join(OUTBOX_FILE),
            None => return err(&req.id, "no_workspace", "select a workspace first", None),
        },
    };
    let mut sink = JsonlOutbox::new(outbox_path);
    match offline::drain(repo.store(), &mut sink, repo.now()) {
        Ok(summary) if summary.error.is_some() && summary.synced == 0 => err(
            &req.id,
            "sync_failed",
            summary.error.clone().unwrap_or_default(),
            Some(json!({ "remaining": summary.remaining })),
        ),
        Ok(summary) => ok(
            &req.id,
            json!({
                "synced": summary.synced,
                "remaining": summary.remaining,
                "error": summary.error,
                "outboxPath": sink.path().to_string_lossy(),
            }),
        ),
        Err(e) => store_failure(&req.id, e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "sync.enqueue" => Some(handle_enqueue(state, req)),
        "sync.pending" => Some(handle_pending(state, req)),
        "sync.drain" => Some(handle_drain(state, req)),
        _ => None,
    }
}
