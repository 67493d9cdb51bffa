use crate::errors::VcrError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Operating mode of a recorder. Switching modes only happens through
/// explicit calls on [`crate::recorder::Vcr`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Replay,
    Record,
    Live,
}

impl Mode {
    pub fn parse(value: &str) -> Result<Self, VcrError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "replay" | "play" => Ok(Self::Replay),
            "record" => Ok(Self::Record),
            "live" => Ok(Self::Live),
            _ => Err(VcrError::InvalidMode(value.to_string())),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Replay => "replay",
            Self::Record => "record",
            Self::Live => "live",
        }
    }
}

impl FromStr for Mode {
    type Err = VcrError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

/// The three call shapes a recorder can fingerprint. The string form is the
/// file name prefix of a fixture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OperationKind {
    Do,
    Get,
    PostForm,
}

impl OperationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Do => "do",
            Self::Get => "get",
            Self::PostForm => "postform",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "do" => Some(Self::Do),
            "get" => Some(Self::Get),
            "postform" => Some(Self::PostForm),
            _ => None,
        }
    }
}

/// A fully materialized outgoing request. The body is owned bytes so it can
/// be hashed and still be sent by the transport afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Request {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new("GET", url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new("POST", url)
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// First value of a header, matched case-insensitively.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// A response as seen by callers and as persisted in a fixture. Headers keep
/// their original order and repetition; values are raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub version: String,
    pub status: u16,
    pub reason: String,
    pub headers: Vec<(String, Vec<u8>)>,
    pub body: Vec<u8>,
}

impl Response {
    pub fn new(status: u16) -> Self {
        let reason = reqwest::StatusCode::from_u16(status)
            .ok()
            .and_then(|code| code.canonical_reason())
            .unwrap_or_default()
            .to_string();
        Self {
            version: "HTTP/1.1".to_string(),
            status,
            reason,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn header_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a [u8]> + 'a {
        self.headers
            .iter()
            .filter(move |(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_slice())
    }

    pub fn first_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .and_then(|(_, value)| std::str::from_utf8(value).ok())
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Form fields for a urlencoded POST. Encoding is independent of insertion
/// order: pairs are sorted by key, then by value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormData {
    pairs: Vec<(String, String)>,
}

impl FormData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.pairs.push((key.into(), value.into()));
    }

    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.append(key, value);
        self
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn encode(&self) -> String {
        let mut sorted = self.pairs.clone();
        sorted.sort();
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(sorted.iter())
            .finish()
    }

    /// Parses a `key=value` command line field. A missing `=` yields an
    /// empty value.
    pub fn parse_field(raw: &str) -> Result<(String, String), VcrError> {
        let (key, value) = raw.split_once('=').unwrap_or((raw, ""));
        if key.is_empty() {
            return Err(VcrError::Cli(format!("form field `{raw}` has an empty key")));
        }
        Ok((key.to_string(), value.to_string()))
    }
}

impl<K, V> FromIterator<(K, V)> for FormData
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut form = Self::new();
        for (key, value) in iter {
            form.append(key, value);
        }
        form
    }
}
