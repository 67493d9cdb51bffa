//! Content hashes that name fixtures.
//!
//! Each operation kind hashes its own canonical bytes with SHA-256:
//! - `do`: the HTTP/1.1 wire dump of the full request, body included;
//! - `get`: the raw URL string, with no normalization at all;
//! - `postform`: the URL followed by the sorted urlencoded form.

use crate::errors::VcrError;
use crate::types::{FormData, OperationKind, Request};
use sha2::{Digest, Sha256};
use url::Url;

/// One recorder call, borrowed for fingerprinting and dispatch.
#[derive(Debug, Clone, Copy)]
pub enum Operation<'a> {
    Do(&'a Request),
    Get(&'a str),
    PostForm(&'a str, &'a FormData),
}

impl Operation<'_> {
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::Do(_) => OperationKind::Do,
            Self::Get(_) => OperationKind::Get,
            Self::PostForm(..) => OperationKind::PostForm,
        }
    }

    pub fn content_hash(&self) -> Result<String, VcrError> {
        match self {
            Self::Do(request) => request_hash(request),
            Self::Get(url) => Ok(url_hash(url)),
            Self::PostForm(url, form) => Ok(post_form_hash(url, form)),
        }
    }
}

pub fn request_hash(request: &Request) -> Result<String, VcrError> {
    let dump = dump_request(request)?;
    Ok(hex_bytes(&Sha256::digest(&dump)))
}

pub fn url_hash(url: &str) -> String {
    hex_bytes(&Sha256::digest(url.as_bytes()))
}

pub fn post_form_hash(url: &str, form: &FormData) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    hasher.update(form.encode().as_bytes());
    hex_bytes(&hasher.finalize())
}

/// Serializes an outgoing request the way it goes on the wire. The request
/// is only borrowed, so its body stays available for the live call.
pub fn dump_request(request: &Request) -> Result<Vec<u8>, VcrError> {
    let method = request.method.as_str();
    if method.is_empty() || method.contains(char::is_whitespace) {
        return Err(VcrError::Encoding(format!("invalid request method `{method}`")));
    }
    let url = Url::parse(&request.url)
        .map_err(|e| VcrError::Encoding(format!("invalid request url `{}`: {e}", request.url)))?;
    let host = url
        .host_str()
        .ok_or_else(|| VcrError::Encoding(format!("request url `{}` has no host", request.url)))?;
    let authority = match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };
    let target = match url.query() {
        Some(query) => format!("{}?{query}", url.path()),
        None => url.path().to_string(),
    };

    let mut out = Vec::with_capacity(request.body.len() + 256);
    out.extend_from_slice(format!("{method} {target} HTTP/1.1\r\n").as_bytes());
    if request.header_value("host").is_none() {
        out.extend_from_slice(format!("Host: {authority}\r\n").as_bytes());
    }
    for (name, value) in &request.headers {
        if name.is_empty() || name.contains([':', '\r', '\n']) || value.contains(['\r', '\n']) {
            return Err(VcrError::Encoding(format!("invalid request header `{name}`")));
        }
        out.extend_from_slice(format!("{name}: {value}\r\n").as_bytes());
    }
    if !request.body.is_empty() && request.header_value("content-length").is_none() {
        out.extend_from_slice(format!("Content-Length: {}\r\n", request.body.len()).as_bytes());
    }
    out.extend_from_slice(b"\r\n");
    out.extend_from_slice(&request.body);
    Ok(out)
}

fn hex_bytes(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
