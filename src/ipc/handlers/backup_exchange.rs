use crate::backup;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{require_repo, store_failure};
use crate::ipc::types::{AppState, Request};
use crate::model::DATA_VERSION;
use crate::repo::Repository;
use serde_json::json;
use std::path::PathBuf;

fn path_param(req: &Request, key: &str) -> Result<PathBuf, serde_json::Value> {
    match req.params.get(key).and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => Ok(PathBuf::from(v.trim())),
        _ => Err(err(&req.id, "bad_params", format!("missing {key}"), None)),
    }
}

fn export_value(repo: &Repository, req: &Request) -> Result<serde_json::Value, serde_json::Value> {
    let doc = repo.export_data().map_err(|e| store_failure(&req.id, e))?;
    serde_json::to_value(doc).map_err(|e| err(&req.id, "store_failed", e.to_string(), None))
}

/// Runs the import and maps a version mismatch to `import_rejected`.
fn import_value(
    repo: &Repository,
    req: &Request,
    payload: &serde_json::Value,
) -> Result<(), serde_json::Value> {
    match repo.import_data(payload) {
        Ok(true) => Ok(()),
        Ok(false) => Err(err(
            &req.id,
            "import_rejected",
            "export version does not match this data version",
            Some(json!({
                "expected": DATA_VERSION,
                "found": payload.get("version").cloned().unwrap_or(serde_json::Value::Null),
            })),
        )),
        Err(e) => Err(store_failure(&req.id, e)),
    }
}

fn handle_data_export(state: &mut AppState, req: &Request) -> serde_json::Value {
    let repo = match require_repo(state, req) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    match export_value(repo, req) {
        Ok(doc) => ok(&req.id, json!({ "export": doc })),
        Err(resp) => resp,
    }
}

fn handle_data_import(state: &mut AppState, req: &Request) -> serde_json::Value {
    let repo = match require_repo(state, req) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    let Some(payload) = req.params.get("payload") else {
        return err(&req.id, "bad_params", "missing payload", None);
    };
    match import_value(repo, req, payload) {
        Ok(()) => ok(&req.id, json!({ "imported": true })),
        Err(resp) => resp,
    }
}

fn handle_data_reset(state: &mut AppState, req: &Request) -> serde_json::Value {
    let repo = match require_repo(state, req) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    match repo.reset_data() {
        Ok(()) => ok(&req.id, json!({ "reset": true })),
        Err(e) => store_failure(&req.id, e),
    }
}

fn handle_export_bundle(state: &mut AppState, req: &Request) -> serde_json::Value {
    let repo = match require_repo(state, req) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    let out = match path_param(req, "outPath") {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    let doc = match export_value(repo, req) {
        Ok(doc) => doc,
        Err(resp) => return resp,
    };
    match backup::export_bundle(&doc, &out) {
        Ok(summary) => ok(
            &req.id,
            json!({
                "path": out.to_string_lossy(),
                "bundleFormat": summary.bundle_format,
                "entryCount": summary.entry_count,
                "sha256": summary.sha256,
            }),
        ),
        Err(e) => err(
            &req.id,
            "bundle_failed",
            format!("{e:#}"),
            Some(json!({ "path": out.to_string_lossy() })),
        ),
    }
}

fn handle_import_bundle(state: &mut AppState, req: &Request) -> serde_json::Value {
    let repo = match require_repo(state, req) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    let src = match path_param(req, "inPath") {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    if !src.is_file() {
        return err(
            &req.id,
            "not_found",
            "bundle file not found",
            Some(json!({ "path": src.to_string_lossy() })),
        );
    }
    let bundle = match backup::read_bundle(&src) {
        Ok(b) => b,
        Err(e) => {
            return err(
                &req.id,
                "bundle_failed",
                format!("{e:#}"),
                Some(json!({ "path": src.to_string_lossy() })),
            )
        }
    };
    match import_value(repo, req, &bundle.export) {
        Ok(()) => ok(
            &req.id,
            json!({
                "imported": true,
                "bundleFormatDetected": bundle.bundle_format_detected,
            }),
        ),
        Err(resp) => resp,
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "data.export" => Some(handle_data_export(state, req)),
        "data.import" => Some(handle_data_import(state, req)),
        "data.reset" => Some(handle_data_reset(state, req)),
        "backup.exportBundle" => Some(handle_export_bundle(state, req)),
        "backup.importBundle" => Some(handle_import_bundle(state, req)),
        _ => None,
    }
}
