use assert_cmd::cargo::cargo_bin_cmd;
use std::fs;
use vcr::codec;
use vcr::fingerprint::url_hash;
use vcr::types::Response;

fn seed_get_fixture(dir: &std::path::Path, url: &str, body: &str) -> std::path::PathBuf {
    let response = Response::new(200)
        .header("Content-Type", "text/plain")
        .with_body(body);
    let path = dir.join(format!("get_{}_0.vcr", url_hash(url)));
    fs::write(&path, codec::encode(&response).expect("encode")).expect("write fixture");
    path
}

#[test]
fn help_lists_commands_and_flags() {
    let mut cmd = cargo_bin_cmd!("vcr");
    cmd.arg("--help");
    let out = cmd.assert().success();
    let stdout = String::from_utf8(out.get_output().stdout.clone()).expect("utf8");

    assert!(stdout.contains("--mode"));
    assert!(stdout.contains("--dir"));
    assert!(stdout.contains("post-form"));
    assert!(stdout.contains("fingerprint"));
}

#[test]
fn replay_get_prints_recorded_response() {
    let temp = tempfile::tempdir().expect("tempdir");
    seed_get_fixture(temp.path(), "http://example.com/a", "from fixture");

    let mut cmd = cargo_bin_cmd!("vcr");
    cmd.env_remove("VCR_MODE")
        .env_remove("VCR_DIR")
        .arg("--dir")
        .arg(temp.path())
        .arg("--mode")
        .arg("replay")
        .arg("get")
        .arg("http://example.com/a");
    let out = cmd.assert().success();
    let stdout = String::from_utf8(out.get_output().stdout.clone()).expect("utf8");
    assert!(stdout.starts_with("HTTP/1.1 200 OK"));
    assert!(stdout.contains("from fixture"));
}

#[test]
fn replay_get_without_fixture_exits_nonzero() {
    let temp = tempfile::tempdir().expect("tempdir");
    let mut cmd = cargo_bin_cmd!("vcr");
    cmd.env_remove("VCR_MODE")
        .arg("--dir")
        .arg(temp.path())
        .arg("get")
        .arg("http://example.com/missing");
    let out = cmd.assert().failure();
    let stderr = String::from_utf8(out.get_output().stderr.clone()).expect("utf8");
    assert!(stderr.contains("fixture not found"));
}

#[test]
fn show_decodes_valid_fixture_and_rejects_corrupt_one() {
    let temp = tempfile::tempdir().expect("tempdir");
    let good = seed_get_fixture(temp.path(), "http://example.com/show", "shown body");
    let bad = temp.path().join("get_ff_1.vcr");
    fs::write(&bad, b"HTTP/1.1 200 OK\r\nContent-Length: 99\r\n\r\nshort").expect("write");

    let mut cmd = cargo_bin_cmd!("vcr");
    cmd.arg("show").arg(&good);
    let out = cmd.assert().success();
    let stdout = String::from_utf8(out.get_output().stdout.clone()).expect("utf8");
    assert!(stdout.contains("shown body"));

    let mut cmd = cargo_bin_cmd!("vcr");
    cmd.arg("show").arg(&bad);
    let out = cmd.assert().failure();
    let stderr = String::from_utf8(out.get_output().stderr.clone()).expect("utf8");
    assert!(stderr.contains("malformed fixture"));
}

#[test]
fn fingerprint_get_prints_hash_and_file_name() {
    let mut cmd = cargo_bin_cmd!("vcr");
    cmd.arg("fingerprint").arg("get").arg("http://example.com/a");
    let out = cmd.assert().success();
    let stdout = String::from_utf8(out.get_output().stdout.clone()).expect("utf8");
    let hash = url_hash("http://example.com/a");
    assert_eq!(stdout, format!("{hash}\nget_{hash}_0.vcr\n"));
}

#[test]
fn invalid_env_mode_is_rejected() {
    let temp = tempfile::tempdir().expect("tempdir");
    let mut cmd = cargo_bin_cmd!("vcr");
    cmd.env("VCR_MODE", "rewind")
        .arg("--dir")
        .arg(temp.path())
        .arg("get")
        .arg("http://example.com/a");
    let out = cmd.assert().failure();
    let stderr = String::from_utf8(out.get_output().stderr.clone()).expect("utf8");
    assert!(stderr.contains("invalid mode: rewind"));
}

#[test]
fn missing_config_path_exits_nonzero() {
    let mut cmd = cargo_bin_cmd!("vcr");
    cmd.arg("--config")
        .arg("/definitely/not/here/vcr.toml")
        .arg("list");
    cmd.assert().failure();
}
