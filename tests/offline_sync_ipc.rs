use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar(workspace: &Path) -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_zamesd");
    let mut child = Command::new(exe)
        .env_remove("ZAMES_WORKSPACE")
        .env_remove("ZAMES_PREFIX")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn zamesd");
    let mut stdin = child.stdin.take().expect("child stdin");
    let mut reader = BufReader::new(child.stdout.take().expect("child stdout"));
    let selected = request(
        &mut stdin,
        &mut reader,
        "select",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    assert_eq!(selected["ok"], true);
    (child, stdin, reader)
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({ "id": id, "method": method, "params": params });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");
    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn pending_count(stdin: &mut ChildStdin, reader: &mut BufReader<ChildStdout>, id: &str) -> usize {
    let resp = request(stdin, reader, id, "sync.pending", json!({}));
    resp["result"]["items"].as_array().map(|a| a.len()).expect("items")
}

#[test]
fn queued_writes_drain_in_order_into_the_outbox() {
    let workspace = temp_dir("zames-sync");
    let (mut child, mut stdin, mut reader) = spawn_sidecar(&workspace);

    let empty = request(&mut stdin, &mut reader, "1", "sync.drain", json!({}));
    assert_eq!(empty["result"]["synced"], 0);
    assert_eq!(empty["result"]["remaining"], 0);

    let first = request(
        &mut stdin,
        &mut reader,
        "2",
        "sync.enqueue",
        json!({ "payload": { "n": 1 } }),
    );
    assert_eq!(first["result"]["item"]["collection"], "offline_sync");
    let _ = request(
        &mut stdin,
        &mut reader,
        "3",
        "sync.enqueue",
        json!({ "collection": "assessments", "payload": { "n": 2 } }),
    );
    assert_eq!(pending_count(&mut stdin, &mut reader, "4"), 2);

    let drained = request(&mut stdin, &mut reader, "5", "sync.drain", json!({}));
    assert_eq!(drained["result"]["synced"], 2, "{drained}");
    assert_eq!(drained["result"]["remaining"], 0);
    assert_eq!(pending_count(&mut stdin, &mut reader, "6"), 0);

    let outbox = workspace.join("outbox").join("offline_sync.jsonl");
    let text = std::fs::read_to_string(&outbox).expect("read outbox");
    let lines: Vec<serde_json::Value> = text
        .lines()
        .map(|l| serde_json::from_str(l).expect("outbox line json"))
        .collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["payload"]["n"], 1);
    assert_eq!(lines[1]["collection"], "assessments");
    assert!(lines[1]["syncedAt"].is_string());

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn failed_drain_keeps_the_queue() {
    let workspace = temp_dir("zames-sync-fail");
    let (mut child, mut stdin, mut reader) = spawn_sidecar(&workspace);

    let _ = request(
        &mut stdin,
        &mut reader,
        "1",
        "sync.enqueue",
        json!({ "payload": { "n": 1 } }),
    );

    // A directory cannot be opened for appending.
    let blocked = workspace.join("blocked");
    std::fs::create_dir_all(&blocked).expect("create blocking dir");
    let failed = request(
        &mut stdin,
        &mut reader,
        "2",
        "sync.drain",
        json!({ "outboxPath": blocked.to_string_lossy() }),
    );
    assert_eq!(failed["ok"], false);
    assert_eq!(failed["error"]["code"], "sync_failed");
    assert_eq!(failed["error"]["details"]["remaining"], 1);
    assert_eq!(pending_count(&mut stdin, &mut reader, "3"), 1);

    let missing = request(&mut stdin, &mut reader, "4", "sync.enqueue", json!({}));
    assert_eq!(missing["error"]["code"], "bad_params");

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
