pub mod http;

use crate::config::TransportConfig;
use crate::errors::VcrError;
use crate::types::{FormData, Request, Response, FORM_CONTENT_TYPE};
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub use http::ReqwestTransport;

/// Executes real HTTP calls. `get` and `post_form` default to building a
/// request and going through `execute`.
pub trait HttpTransport: Send + Sync {
    fn execute(&self, request: &Request) -> Result<Response, VcrError>;

    fn get(&self, url: &str) -> Result<Response, VcrError> {
        self.execute(&Request::get(url))
    }

    fn post_form(&self, url: &str, form: &FormData) -> Result<Response, VcrError> {
        self.execute(
            &Request::post(url)
                .header("Content-Type", FORM_CONTENT_TYPE)
                .body(form.encode()),
        )
    }
}

pub trait FileSystem: Send + Sync {
    /// Whole file contents, or `None` when the file does not exist.
    fn read(&self, path: &Path) -> Result<Option<Vec<u8>>, VcrError>;
    fn write(&self, path: &Path, contents: &[u8]) -> Result<(), VcrError>;
    fn exists(&self, path: &Path) -> bool;
    /// Regular files directly inside `dir`.
    fn list(&self, dir: &Path) -> Result<Vec<PathBuf>, VcrError>;
}

pub trait Terminal: Send + Sync {
    fn write_line(&self, line: &str) -> Result<(), VcrError>;
    fn write_diagnostic(&self, line: &str) -> Result<(), VcrError>;
}

pub struct ProductionFileSystem;

impl FileSystem for ProductionFileSystem {
    fn read(&self, path: &Path) -> Result<Option<Vec<u8>>, VcrError> {
        match std::fs::read(path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(VcrError::Storage(format!("read {}: {e}", path.display()))),
        }
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<(), VcrError> {
        std::fs::write(path, contents)
            .map_err(|e| VcrError::Storage(format!("write {}: {e}", path.display())))
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn list(&self, dir: &Path) -> Result<Vec<PathBuf>, VcrError> {
        let entries = std::fs::read_dir(dir)
            .map_err(|e| VcrError::Storage(format!("list {}: {e}", dir.display())))?;
        Ok(entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .collect())
    }
}

pub struct ProductionTerminal;

impl Terminal for ProductionTerminal {
    fn write_line(&self, line: &str) -> Result<(), VcrError> {
        use std::io::Write;
        let mut out = std::io::stdout();
        writeln!(out, "{line}").map_err(|e| VcrError::Storage(e.to_string()))
    }

    fn write_diagnostic(&self, line: &str) -> Result<(), VcrError> {
        use std::io::Write;
        let mut err = std::io::stderr();
        writeln!(err, "{line}").map_err(|e| VcrError::Storage(e.to_string()))
    }
}

/// The collaborators a recorder talks to.
#[derive(Clone)]
pub struct VcrRuntime {
    pub file_system: Arc<dyn FileSystem>,
    pub transport: Arc<dyn HttpTransport>,
    pub terminal: Arc<dyn Terminal>,
}

impl VcrRuntime {
    pub fn production(transport: &TransportConfig) -> Result<Self, VcrError> {
        Ok(Self {
            file_system: Arc::new(ProductionFileSystem),
            transport: Arc::new(ReqwestTransport::from_config(transport)?),
            terminal: Arc::new(ProductionTerminal),
        })
    }
}

#[derive(Default, Clone)]
pub struct FakeTransport {
    responses: Arc<Mutex<VecDeque<Result<Response, VcrError>>>>,
    requests: Arc<Mutex<Vec<Request>>>,
}

impl FakeTransport {
    pub fn push_response(&self, result: Result<Response, VcrError>) {
        self.responses
            .lock()
            .expect("responses lock")
            .push_back(result);
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().expect("requests lock").clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().expect("requests lock").len()
    }
}

impl HttpTransport for FakeTransport {
    fn execute(&self, request: &Request) -> Result<Response, VcrError> {
        self.requests
            .lock()
            .expect("requests lock")
            .push(request.clone());
        self.responses
            .lock()
            .expect("responses lock")
            .pop_front()
            .unwrap_or_else(|| Err(VcrError::Transport("no fake response queued".to_string())))
    }
}

#[derive(Default, Clone)]
pub struct FakeFileSystem {
    files: Arc<Mutex<HashMap<PathBuf, Vec<u8>>>>,
    fail_next: Arc<Mutex<Option<VcrError>>>,
}

impl FakeFileSystem {
    pub fn with_file(path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) -> Self {
        let fs = Self::default();
        fs.files
            .lock()
            .expect("files lock")
            .insert(path.into(), contents.into());
        fs
    }

    pub fn set_fail_next(&self, error: VcrError) {
        *self.fail_next.lock().expect("fail lock") = Some(error);
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        let mut paths = self
            .files
            .lock()
            .expect("files lock")
            .keys()
            .cloned()
            .collect::<Vec<_>>();
        paths.sort();
        paths
    }

    pub fn contents(&self, path: &Path) -> Option<Vec<u8>> {
        self.files.lock().expect("files lock").get(path).cloned()
    }

    fn maybe_fail(&self) -> Result<(), VcrError> {
        if let Some(err) = self.fail_next.lock().expect("fail lock").take() {
            return Err(err);
        }
        Ok(())
    }
}

impl FileSystem for FakeFileSystem {
    fn read(&self, path: &Path) -> Result<Option<Vec<u8>>, VcrError> {
        self.maybe_fail()?;
        Ok(self.contents(path))
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<(), VcrError> {
        self.maybe_fail()?;
        self.files
            .lock()
            .expect("files lock")
            .insert(path.to_path_buf(), contents.to_vec());
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.lock().expect("files lock").contains_key(path)
    }

    fn list(&self, dir: &Path) -> Result<Vec<PathBuf>, VcrError> {
        self.maybe_fail()?;
        Ok(self
            .paths()
            .into_iter()
            .filter(|path| path.parent() == Some(dir))
            .collect())
    }
}

#[derive(Default, Clone)]
pub struct FakeTerminal {
    lines: Arc<Mutex<Vec<String>>>,
    diagnostics: Arc<Mutex<Vec<String>>>,
}

impl FakeTerminal {
    pub fn written_lines(&self) -> Vec<String> {
        self.lines.lock().expect("lines lock").clone()
    }

    pub fn diagnostics(&self) -> Vec<String> {
        self.diagnostics.lock().expect("diagnostics lock").clone()
    }
}

impl Terminal for FakeTerminal {
    fn write_line(&self, line: &str) -> Result<(), VcrError> {
        self.lines
            .lock()
            .expect("lines lock")
            .push(line.to_string());
        Ok(())
    }

    fn write_diagnostic(&self, line: &str) -> Result<(), VcrError> {
        self.diagnostics
            .lock()
            .expect("diagnostics lock")
            .push(line.to_string());
        Ok(())
    }
}
