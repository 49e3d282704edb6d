#[path = "../src/backup.rs"]
mod backup;

use serde_json::json;
use std::fs::File;
use std::io::{Read, Write};
use std::path::PathBuf;
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

fn sample_export() -> serde_json::Value {
    json!({
        "data": { "users": {}, "assessments": [{ "id": "A001" }] },
        "session": null,
        "exportDate": "2024-02-01T09:00:00Z",
        "version": "1.0.0"
    })
}

#[test]
fn zip_export_and_read_roundtrip() {
    let out_dir = temp_dir("zames-backup-out");
    let bundle_path = out_dir.join("nested").join("zames.backup.zip");

    let export = sample_export();
    let summary = backup::export_bundle(&export, &bundle_path).expect("export bundle");
    assert_eq!(summary.bundle_format, backup::BUNDLE_FORMAT_V1);
    assert_eq!(summary.entry_count, 2);
    assert_eq!(summary.sha256.len(), 64);

    let f = File::open(&bundle_path).expect("open bundle");
    let mut archive = zip::ZipArchive::new(f).expect("open zip archive");
    let mut manifest = String::new();
    archive
        .by_name("manifest.json")
        .expect("manifest entry")
        .read_to_string(&mut manifest)
        .expect("read manifest");
    let manifest: serde_json::Value = serde_json::from_str(&manifest).expect("manifest json");
    assert_eq!(manifest["format"], backup::BUNDLE_FORMAT_V1);
    assert_eq!(manifest["version"], "1.0.0");
    assert_eq!(manifest["sha256"], summary.sha256.as_str());
    archive
        .by_name("data/export.json")
        .expect("export entry in bundle");

    let imported = backup::read_bundle(&bundle_path).expect("read bundle");
    assert_eq!(imported.bundle_format_detected, backup::BUNDLE_FORMAT_V1);
    assert_eq!(imported.export, export);

    let _ = std::fs::remove_dir_all(out_dir);
}

#[test]
fn bare_json_export_is_accepted() {
    let dir = temp_dir("zames-backup-json");
    let path = dir.join("zames-backup-2024-02-01.json");
    std::fs::write(&path, serde_json::to_string_pretty(&sample_export()).unwrap())
        .expect("write json export");

    let imported = backup::read_bundle(&path).expect("read json export");
    assert_eq!(imported.bundle_format_detected, "export-json");
    assert_eq!(imported.export["version"], "1.0.0");

    let garbage = dir.join("garbage.json");
    std::fs::write(&garbage, b"{ not json").expect("write garbage");
    assert!(backup::read_bundle(&garbage).is_err());

    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn tampered_payload_fails_checksum() {
    let dir = temp_dir("zames-backup-tamper");
    let path = dir.join("tampered.zip");

    let f = File::create(&path).expect("create zip");
    let mut zip = zip::ZipWriter::new(f);
    let opts = zip::write::FileOptions::default();
    zip.start_file("manifest.json", opts).unwrap();
    zip.write_all(
        json!({ "format": backup::BUNDLE_FORMAT_V1, "sha256": "0".repeat(64) })
            .to_string()
            .as_bytes(),
    )
    .unwrap();
    zip.start_file("data/export.json", opts).unwrap();
    zip.write_all(sample_export().to_string().as_bytes()).unwrap();
    zip.finish().unwrap();

    let e = backup::read_bundle(&path).expect_err("checksum mismatch");
    assert!(e.to_string().contains("checksum mismatch"));

    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn unknown_bundle_format_is_rejected() {
    let dir = temp_dir("zames-backup-format");
    let path = dir.join("other.zip");

    let f = File::create(&path).expect("create zip");
    let mut zip = zip::ZipWriter::new(f);
    let opts = zip::write::FileOptions::default();
    zip.start_file("manifest.json", opts).unwrap();
    zip.write_all(br#"{"format":"markbook-workspace-v2"}"#).unwrap();
    zip.finish().unwrap();

    let e = backup::read_bundle(&path).expect_err("format rejected");
    assert!(e.to_string().contains("unsupported bundle format"));

    let _ = std::fs::remove_dir_all(dir);
}
