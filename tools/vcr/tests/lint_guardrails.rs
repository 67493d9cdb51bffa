use std::fs;
use std::path::{Path, PathBuf};

fn manifest_dir() -> &'static Path {
    Path::new(env!("CARGO_MANIFEST_DIR"))
}

#[test]
fn package_manifest_warns_on_unwrap_and_expect() {
    let manifest = match fs::read_to_string(manifest_dir().join("Cargo.toml")) {
        Ok(contents) => contents,
        Err(err) => panic!("package manifest must be readable: {err}"),
    };
    assert!(
        manifest.contains("[lints.clippy]")
            && manifest.contains("unwrap_used = \"warn\"")
            && manifest.contains("expect_used = \"warn\""),
        "expected package lints to configure unwrap_used and expect_used as warn"
    );
}

#[test]
fn workspace_manifest_denies_unwrap() {
    let workspace_dir = match manifest_dir().parent().and_then(Path::parent) {
        Some(dir) => dir,
        None => panic!("workspace root should be two levels above package manifest dir"),
    };
    let manifest = fs::read_to_string(workspace_dir.join("Cargo.toml"))
        .unwrap_or_else(|e| panic!("workspace manifest must be readable: {e}"));
    let parsed: toml::Value = toml::from_str(&manifest)
        .unwrap_or_else(|e| panic!("workspace manifest must be valid toml: {e}"));
    let level = parsed
        .get("workspace")
        .and_then(|w| w.get("lints"))
        .and_then(|l| l.get("clippy"))
        .and_then(|c| c.get("unwrap_used"))
        .and_then(toml::Value::as_str);
    assert_eq!(level, Some("deny"));
}

#[test]
fn library_sources_do_not_unwrap_outside_tests() {
    let src_root = manifest_dir().join("src");
    let mut files = Vec::new();
    collect_rust_files(&src_root, &mut files);
    files.sort();
    assert!(!files.is_empty());

    let mut offenders = Vec::new();
    for file in files {
        let contents = fs::read_to_string(&file)
            .unwrap_or_else(|e| panic!("read {}: {e}", file.display()));
        let production = contents
            .split("#[cfg(test)]")
            .next()
            .unwrap_or_default();
        for (idx, line) in production.lines().enumerate() {
            if line.contains(".unwrap()") {
                offenders.push(format!("{}:{}", file.display(), idx + 1));
            }
        }
    }
    assert!(offenders.is_empty(), "unwrap() in non-test code: {offenders:?}");
}

fn collect_rust_files(dir: &Path, out: &mut Vec<PathBuf>) {
    let entries = fs::read_dir(dir).unwrap_or_else(|e| panic!("read {}: {e}", dir.display()));
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_rust_files(&path, out);
        } else if path.extension().and_then(|ext| ext.to_str()) == Some("rs") {
            out.push(path);
        }
    }
}
