//! The mode-dispatched recorder.
//!
//! Every call is fingerprinted and mapped to a fixture path first, then
//! served according to the current [`Mode`]:
//! - `Replay` decodes the fixture and never touches the network;
//! - `Record` performs the live call and persists the response;
//! - `Live` performs the live call and never touches storage.
//!
//! The session counter advances once per call on every exit path, so
//! repeated identical calls land in distinct fixtures.

use crate::codec;
use crate::config::VcrConfig;
use crate::errors::VcrError;
use crate::fingerprint::Operation;
use crate::logging::{JsonlLogger, LogEvent};
use crate::runtime::{FileSystem, HttpTransport, Terminal, VcrRuntime};
use crate::storage::resolve;
use crate::types::{FormData, Mode, OperationKind, Request, Response};
use serde_json::json;
use std::cell::Cell;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Record/replay HTTP client. A single instance serves one call at a time;
/// the counter lives in a `Cell`, so the type is not `Sync`.
pub struct Vcr {
    dir: PathBuf,
    mode: Mode,
    seq: Cell<u64>,
    debug: bool,
    transport: Arc<dyn HttpTransport>,
    file_system: Arc<dyn FileSystem>,
    terminal: Arc<dyn Terminal>,
    event_log: Option<JsonlLogger>,
}

/// Advances the session counter when dropped.
struct SeqAdvance<'a> {
    seq: &'a Cell<u64>,
}

impl Drop for SeqAdvance<'_> {
    fn drop(&mut self) {
        self.seq.set(self.seq.get().saturating_add(1));
    }
}

impl Vcr {
    /// A replay-mode recorder over `dir` with production collaborators.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, VcrError> {
        let runtime = VcrRuntime::production(&Default::default())?;
        Ok(Self::with_runtime(dir, &runtime))
    }

    pub fn with_runtime(dir: impl Into<PathBuf>, runtime: &VcrRuntime) -> Self {
        Self {
            dir: dir.into(),
            mode: Mode::Replay,
            seq: Cell::new(0),
            debug: false,
            transport: Arc::clone(&runtime.transport),
            file_system: Arc::clone(&runtime.file_system),
            terminal: Arc::clone(&runtime.terminal),
            event_log: None,
        }
    }

    pub fn from_config(cfg: &VcrConfig, runtime: &VcrRuntime) -> Self {
        let mut vcr = Self::with_runtime(&cfg.storage.dir, runtime);
        vcr.set_mode(cfg.recorder.mode);
        vcr.debug = cfg.recorder.debug;
        if let Some(path) = &cfg.logging.path {
            let mut logger = JsonlLogger::new(path);
            logger.max_payload_bytes = cfg.logging.max_payload_bytes;
            logger.budget_bytes = cfg.logging.budget_bytes;
            vcr.event_log = Some(logger);
        }
        vcr
    }

    #[must_use]
    pub fn with_event_log(mut self, logger: JsonlLogger) -> Self {
        self.event_log = Some(logger);
        self
    }

    /// Switches to replay and restarts the session counter.
    pub fn play(&mut self) -> &mut Self {
        self.mode = Mode::Replay;
        self.seq.set(0);
        self
    }

    pub fn record(&mut self) -> &mut Self {
        self.mode = Mode::Record;
        self
    }

    pub fn live(&mut self) -> &mut Self {
        self.mode = Mode::Live;
        self
    }

    pub fn set_mode(&mut self, mode: Mode) -> &mut Self {
        match mode {
            Mode::Replay => self.play(),
            Mode::Record => self.record(),
            Mode::Live => self.live(),
        }
    }

    /// Points the recorder at another fixture directory and restarts the
    /// session counter.
    pub fn set_dir(&mut self, dir: impl Into<PathBuf>) {
        self.dir = dir.into();
        self.seq.set(0);
    }

    pub fn set_debug(&mut self, debug: bool) {
        self.debug = debug;
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn seq(&self) -> u64 {
        self.seq.get()
    }

    pub fn debug(&self) -> bool {
        self.debug
    }

    /// Sends an arbitrary request.
    pub fn execute(&self, request: &Request) -> Result<Response, VcrError> {
        self.dispatch(Operation::Do(request))
    }

    pub fn get(&self, url: &str) -> Result<Response, VcrError> {
        self.dispatch(Operation::Get(url))
    }

    pub fn post_form(&self, url: &str, form: &FormData) -> Result<Response, VcrError> {
        self.dispatch(Operation::PostForm(url, form))
    }

    fn dispatch(&self, operation: Operation<'_>) -> Result<Response, VcrError> {
        let seq = self.seq.get();
        let _advance = SeqAdvance { seq: &self.seq };

        let path = match operation.content_hash() {
            Ok(hash) => resolve(&self.dir, operation.kind(), &hash, seq),
            Err(err) => {
                self.log_call(operation.kind(), seq, None, Err(&err));
                return Err(err);
            }
        };

        let result = match self.mode {
            Mode::Replay => self.replay_fixture(&path),
            Mode::Record => self.record_call(&operation, &path),
            Mode::Live => self.live_call(&operation),
        };
        self.log_call(operation.kind(), seq, Some(&path), result.as_ref().map(|_| ()));
        result
    }

    fn replay_fixture(&self, path: &Path) -> Result<Response, VcrError> {
        let data = self
            .file_system
            .read(path)?
            .ok_or_else(|| VcrError::FixtureNotFound(path.to_path_buf()))?;
        codec::decode(&data)
    }

    fn record_call(&self, operation: &Operation<'_>, path: &Path) -> Result<Response, VcrError> {
        // A failed live call is returned as-is and nothing is written.
        let response = self.live_call(operation)?;
        let encoded = codec::encode(&response)?;
        if self.debug {
            self.warn_overwrite(path, &encoded);
        }
        self.file_system.write(path, &encoded)?;
        Ok(response)
    }

    fn live_call(&self, operation: &Operation<'_>) -> Result<Response, VcrError> {
        match operation {
            Operation::Do(request) => self.transport.execute(request),
            Operation::Get(url) => self.transport.get(url),
            Operation::PostForm(url, form) => self.transport.post_form(url, form),
        }
    }

    fn warn_overwrite(&self, path: &Path, encoded: &[u8]) {
        if !self.file_system.exists(path) {
            return;
        }
        let _ = self.terminal.write_diagnostic(&format!(
            "warning: file {} exists and will be overwritten",
            path.display()
        ));
        match self.file_system.read(path) {
            Ok(Some(existing)) => {
                let _ = self.terminal.write_diagnostic(&format!(
                    "existing content:\n{}",
                    String::from_utf8_lossy(&existing)
                ));
            }
            Ok(None) => {}
            Err(err) => {
                let _ = self.terminal.write_diagnostic(&format!(
                    "warning: could not read existing fixture {}: {err}",
                    path.display()
                ));
            }
        }
        let _ = self.terminal.write_diagnostic(&format!(
            "new content:\n{}",
            String::from_utf8_lossy(encoded)
        ));
        self.emit(
            "warn",
            "fixture_overwrite",
            json!({ "path": path.display().to_string() }),
        );
    }

    fn log_call(
        &self,
        kind: OperationKind,
        seq: u64,
        path: Option<&Path>,
        outcome: Result<(), &VcrError>,
    ) {
        let (level, error) = match outcome {
            Ok(()) => ("info", None),
            Err(err) => ("error", Some(err.to_string())),
        };
        self.emit(
            level,
            "vcr_call",
            json!({
                "kind": kind.as_str(),
                "mode": self.mode.as_str(),
                "seq": seq,
                "path": path.map(|p| p.display().to_string()),
                "outcome": if error.is_some() { "error" } else { "ok" },
                "error": error,
            }),
        );
    }

    fn emit(&self, level: &str, event_type: &str, payload: serde_json::Value) {
        if let Some(logger) = &self.event_log {
            let _ = logger.append(&LogEvent {
                level,
                event_type,
                payload,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Vcr;
    use crate::codec;
    use crate::errors::VcrError;
    use crate::fingerprint::{request_hash, url_hash};
    use crate::runtime::{FakeFileSystem, FakeTerminal, FakeTransport, FileSystem, VcrRuntime};
    use crate::storage::resolve;
    use crate::types::{FormData, Mode, OperationKind, Request, Response};
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    struct Harness {
        fs: FakeFileSystem,
        transport: FakeTransport,
        terminal: FakeTerminal,
        vcr: Vcr,
    }

    fn harness() -> Harness {
        let fs = FakeFileSystem::default();
        let transport = FakeTransport::default();
        let terminal = FakeTerminal::default();
        let runtime = VcrRuntime {
            file_system: Arc::new(fs.clone()),
            transport: Arc::new(transport.clone()),
            terminal: Arc::new(terminal.clone()),
        };
        let vcr = Vcr::with_runtime("/fx", &runtime);
        Harness {
            fs,
            transport,
            terminal,
            vcr,
        }
    }

    fn get_path(url: &str, seq: u64) -> PathBuf {
        resolve(Path::new("/fx"), OperationKind::Get, &url_hash(url), seq)
    }

    #[test]
    fn new_recorder_starts_in_replay_at_seq_zero() {
        let h = harness();
        assert_eq!(h.vcr.mode(), Mode::Replay);
        assert_eq!(h.vcr.seq(), 0);
        assert_eq!(h.vcr.dir(), Path::new("/fx"));
    }

    #[test]
    fn replay_without_fixture_is_not_found_and_still_advances() {
        let h = harness();
        let err = h.vcr.get("http://example.com/a").expect_err("missing");
        assert!(matches!(
            err,
            VcrError::FixtureNotFound(p) if p == get_path("http://example.com/a", 0)
        ));
        assert_eq!(h.vcr.seq(), 1);
        assert_eq!(h.transport.call_count(), 0);
    }

    #[test]
    fn replay_of_corrupt_fixture_is_malformed() {
        let h = harness();
        h.fs.write(&get_path("http://example.com/a", 0), b"garbage")
            .expect("seed");
        assert!(matches!(
            h.vcr.get("http://example.com/a"),
            Err(VcrError::MalformedFixture(_))
        ));
    }

    #[test]
    fn replay_surfaces_storage_errors() {
        let h = harness();
        h.fs.set_fail_next(VcrError::Storage("permission denied".to_string()));
        assert!(matches!(
            h.vcr.get("http://example.com/a"),
            Err(VcrError::Storage(_))
        ));
        assert_eq!(h.vcr.seq(), 1);
    }

    #[test]
    fn record_persists_and_returns_live_response() {
        let mut h = harness();
        let live = Response::new(200).header("X-A", "1").with_body("body");
        h.transport.push_response(Ok(live.clone()));
        h.vcr.record();

        let resp = h.vcr.get("http://example.com/a").expect("record");
        assert_eq!(resp, live);
        let stored = h
            .fs
            .contents(&get_path("http://example.com/a", 0))
            .expect("fixture written");
        assert_eq!(codec::decode(&stored).expect("decode"), live);
    }

    #[test]
    fn record_transport_failure_writes_nothing() {
        let mut h = harness();
        h.transport
            .push_response(Err(VcrError::Transport("connection refused".to_string())));
        h.vcr.record();
        let err = h.vcr.get("http://example.com/a").expect_err("fails");
        assert!(matches!(err, VcrError::Transport(msg) if msg == "connection refused"));
        assert!(h.fs.paths().is_empty());
        assert_eq!(h.vcr.seq(), 1);
    }

    #[test]
    fn record_write_failure_surfaces_storage_error() {
        let mut h = harness();
        h.transport.push_response(Ok(Response::new(200)));
        h.fs.set_fail_next(VcrError::Storage("disk full".to_string()));
        h.vcr.record();
        assert!(matches!(
            h.vcr.get("http://example.com/a"),
            Err(VcrError::Storage(_))
        ));
    }

    #[test]
    fn live_never_touches_storage() {
        let mut h = harness();
        h.transport.push_response(Ok(Response::new(200)));
        h.transport
            .push_response(Err(VcrError::Transport("boom".to_string())));
        h.vcr.live();
        assert!(h.vcr.get("http://example.com/a").is_ok());
        assert!(h.vcr.post_form("http://example.com/f", &FormData::new()).is_err());
        assert!(h.fs.paths().is_empty());
        assert_eq!(h.vcr.seq(), 2);
    }

    #[test]
    fn counter_is_shared_across_kinds_and_reset_by_play_and_set_dir() {
        let mut h = harness();
        h.vcr.live();
        for _ in 0..3 {
            h.transport.push_response(Ok(Response::new(204)));
        }
        h.vcr.get("http://example.com/a").expect("get");
        h.vcr
            .post_form("http://example.com/f", &FormData::new().with("a", "1"))
            .expect("post");
        h.vcr
            .execute(&Request::get("http://example.com/x"))
            .expect("do");
        assert_eq!(h.vcr.seq(), 3);

        h.vcr.record();
        assert_eq!(h.vcr.seq(), 3);
        h.vcr.set_dir("/other");
        assert_eq!(h.vcr.seq(), 0);
        assert_eq!(h.vcr.dir(), Path::new("/other"));

        let _ = h.vcr.get("http://example.com/a");
        h.vcr.play();
        assert_eq!(h.vcr.seq(), 0);
        assert_eq!(h.vcr.mode(), Mode::Replay);
    }

    #[test]
    fn fingerprint_failure_still_advances_counter() {
        let h = harness();
        let err = h
            .vcr
            .execute(&Request::get("no scheme here"))
            .expect_err("bad url");
        assert!(matches!(err, VcrError::Encoding(_)));
        assert_eq!(h.vcr.seq(), 1);
    }

    #[test]
    fn execute_uses_request_dump_for_fixture_name() {
        let mut h = harness();
        let request = Request::post("http://example.com/api")
            .header("Content-Type", "application/json")
            .body("{\"id\":1}");
        h.transport.push_response(Ok(Response::new(201)));
        h.vcr.record();
        h.vcr.execute(&request).expect("record");

        let hash = request_hash(&request).expect("hash");
        let expected = resolve(Path::new("/fx"), OperationKind::Do, &hash, 0);
        assert_eq!(h.fs.paths(), vec![expected]);
        assert_eq!(h.transport.requests()[0].body, b"{\"id\":1}");
    }

    #[test]
    fn debug_overwrite_reports_both_contents_and_still_writes() {
        let mut h = harness();
        let path = get_path("http://example.com/a", 0);
        h.fs.write(&path, b"HTTP/1.1 200 OK\r\n\r\nold").expect("seed");
        h.transport
            .push_response(Ok(Response::new(200).with_body("new")));
        h.vcr.record().set_debug(true);

        h.vcr.get("http://example.com/a").expect("record");

        let diagnostics = h.terminal.diagnostics();
        assert_eq!(diagnostics.len(), 3);
        assert!(diagnostics[0].contains("exists and will be overwritten"));
        assert!(diagnostics[1].starts_with("existing content:") && diagnostics[1].ends_with("old"));
        assert!(diagnostics[2].starts_with("new content:") && diagnostics[2].ends_with("new"));
        let stored = h.fs.contents(&path).expect("fixture");
        assert_eq!(codec::decode(&stored).expect("decode").body, b"new");
    }

    #[test]
    fn overwrite_without_debug_is_silent() {
        let mut h = harness();
        let path = get_path("http://example.com/a", 0);
        h.fs.write(&path, b"HTTP/1.1 200 OK\r\n\r\nold").expect("seed");
        h.transport.push_response(Ok(Response::new(200)));
        h.vcr.record();
        h.vcr.get("http://example.com/a").expect("record");
        assert!(h.terminal.diagnostics().is_empty());
    }

    #[test]
    fn event_log_records_each_call() {
        let dir = tempfile::tempdir().expect("tempdir");
        let log_path = dir.path().join("vcr.jsonl");
        let h = harness();
        let vcr = h
            .vcr
            .with_event_log(crate::logging::JsonlLogger::new(&log_path));
        let _ = vcr.get("http://example.com/a");

        let text = std::fs::read_to_string(&log_path).expect("log");
        let event: serde_json::Value = serde_json::from_str(text.trim()).expect("json");
        assert_eq!(event["event_type"], "vcr_call");
        assert_eq!(event["payload"]["kind"], "get");
        assert_eq!(event["payload"]["mode"], "replay");
        assert_eq!(event["payload"]["outcome"], "error");
        assert_eq!(event["payload"]["seq"], 0);
    }
}
