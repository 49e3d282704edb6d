use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{require_repo, require_session, require_str};
use crate::ipc::types::{AppState, Request};
use crate::reports::{self, ReportRequest};
use serde_json::json;
use std::path::PathBuf;

const REPORTS_DIR: &str = "reports";

fn handle_generate(state: &mut AppState, req: &Request) -> serde_json::Value {
    let repo = match require_repo(state, req) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    let (report_type, period, format) = match (
        require_str(req, "type"),
        require_str(req, "period"),
        require_str(req, "format"),
    ) {
        (Ok(t), Ok(p), Ok(f)) => (t, p, f),
        (Err(resp), _, _) | (_, Err(resp), _) | (_, _, Err(resp)) => return resp,
    };
    let request = match ReportRequest::parse(report_type, period, format) {
        Ok(r) => r,
        Err(e) => return err(&req.id, "bad_params", e.to_string(), None),
    };
    let session = match require_session(repo, req) {
        Ok(s) => s,
        Err(resp) => return resp,
    };

    let out_dir = match req.params.get("outDir").and_then(|v| v.as_str()) {
        Some(d) if !d.trim().is_empty() => PathBuf::from(d.trim()),
        _ => match state.workspace.as_ref() {
            Some(ws) => ws.join(REPORTS_DIR),
            None => return err(&req.id, "no_workspace", "select a workspace first", None),
        },
    };

    match reports::generate(repo, &request, &session.user, &out_dir) {
        Ok(report) => ok(&req.id, json!(report)),
        Err(e) => err(
            &req.id,
            "report_failed",
            format!("{e:#}"),
            Some(json!({ "outDir": out_dir.to_string_lossy() })),
        ),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "reports.generate" => Some(handle_generate(state, req)),
        _ => None,
    }
}
