use crate::errors::VcrError;
use crate::runtime::FileSystem;
use crate::types::OperationKind;
use std::path::{Path, PathBuf};

pub const FIXTURE_EXTENSION: &str = "vcr";

/// Identity of one fixture file: `{kind}_{hash}_{seq}.vcr`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FixtureId {
    pub kind: OperationKind,
    pub hash: String,
    pub seq: u64,
}

impl FixtureId {
    pub fn new(kind: OperationKind, hash: impl Into<String>, seq: u64) -> Self {
        Self {
            kind,
            hash: hash.into(),
            seq,
        }
    }

    pub fn file_name(&self) -> String {
        fixture_file_name(self.kind, &self.hash, self.seq)
    }

    /// Inverse of [`FixtureId::file_name`]; `None` for anything that is not
    /// a fixture name.
    pub fn parse_file_name(name: &str) -> Option<Self> {
        let stem = name.strip_suffix(FIXTURE_EXTENSION)?.strip_suffix('.')?;
        let (head, seq) = stem.rsplit_once('_')?;
        let (kind, hash) = head.split_once('_')?;
        if hash.is_empty() || !hash.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
            return None;
        }
        if seq.is_empty() || !seq.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        Some(Self {
            kind: OperationKind::parse(kind)?,
            hash: hash.to_string(),
            seq: seq.parse().ok()?,
        })
    }
}

pub fn resolve(dir: &Path, kind: OperationKind, hash: &str, seq: u64) -> PathBuf {
    dir.join(fixture_file_name(kind, hash, seq))
}

fn fixture_file_name(kind: OperationKind, hash: &str, seq: u64) -> String {
    format!("{}_{hash}_{seq}.{FIXTURE_EXTENSION}", kind.as_str())
}

/// Fixtures found directly in `dir`, ordered by sequence number. Files that
/// do not follow the naming scheme are ignored.
pub fn list_fixtures(
    fs: &dyn FileSystem,
    dir: &Path,
) -> Result<Vec<(PathBuf, FixtureId)>, VcrError> {
    let mut fixtures = fs
        .list(dir)?
        .into_iter()
        .filter_map(|path| {
            let id = path
                .file_name()
                .and_then(|name| name.to_str())
                .and_then(FixtureId::parse_file_name)?;
            Some((path, id))
        })
        .collect::<Vec<_>>();
    fixtures.sort_by(|(_, a), (_, b)| {
        (a.seq, a.kind, &a.hash).cmp(&(b.seq, b.kind, &b.hash))
    });
    Ok(fixtures)
}
