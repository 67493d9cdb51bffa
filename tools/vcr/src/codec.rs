//! Fixture codec: the on-disk form of a recorded response.
//!
//! A fixture is the HTTP/1.1 wire form of the response: status line, headers
//! in their original order, a blank line, then the body. Body framing follows
//! the recorded headers so any HTTP response reader can parse the file:
//! chunked responses are written as a single chunk, responses with a
//! `Content-Length` carry exactly that many bytes, and anything else runs to
//! end of file.
//!
//! 1xx, 204 and 304 responses never have a body; their headers are written
//! verbatim. An empty body under a nonzero `Content-Length` (the answer to a
//! HEAD request) is stored as a header-only dump and keeps its length.

use crate::errors::VcrError;
use crate::types::Response;

pub fn encode(response: &Response) -> Result<Vec<u8>, VcrError> {
    check_status_line(response)?;
    let bodiless = status_forbids_body(response.status);
    if bodiless && !response.body.is_empty() {
        return Err(VcrError::Encoding(format!(
            "status {} cannot carry a body",
            response.status
        )));
    }
    let chunked = !bodiless && is_chunked(&response.headers);
    let body_len = response.body.len();

    let mut out = Vec::with_capacity(body_len + 64 * (response.headers.len() + 1));
    if response.reason.is_empty() {
        out.extend_from_slice(format!("{} {}\r\n", response.version, response.status).as_bytes());
    } else {
        out.extend_from_slice(
            format!(
                "{} {} {}\r\n",
                response.version, response.status, response.reason
            )
            .as_bytes(),
        );
    }

    for (name, value) in &response.headers {
        check_header(name, value)?;
        out.extend_from_slice(name.as_bytes());
        out.extend_from_slice(b": ");
        let declared_len = if bodiless
            || chunked
            || body_len == 0
            || !name.eq_ignore_ascii_case("content-length")
        {
            None
        } else {
            Some(parse_content_length(value))
        };
        match declared_len {
            // Body bytes are authoritative; a stale length would make the
            // fixture unreadable.
            Some(parsed) if parsed != Some(body_len) => {
                out.extend_from_slice(body_len.to_string().as_bytes());
            }
            _ => out.extend_from_slice(value),
        }
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(b"\r\n");

    if bodiless {
        return Ok(out);
    }
    if chunked {
        if body_len > 0 {
            out.extend_from_slice(format!("{body_len:x}\r\n").as_bytes());
            out.extend_from_slice(&response.body);
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(b"0\r\n\r\n");
    } else {
        out.extend_from_slice(&response.body);
    }
    Ok(out)
}

pub fn decode(data: &[u8]) -> Result<Response, VcrError> {
    if data.is_empty() {
        return Err(malformed("fixture is empty"));
    }
    let mut reader = LineReader::new(data);

    let status_line = reader
        .next_line()
        .ok_or_else(|| malformed("truncated status line"))?;
    let (version, status, reason) = parse_status_line(status_line)?;

    let mut headers = Vec::new();
    loop {
        let line = reader
            .next_line()
            .ok_or_else(|| malformed("truncated header block"))?;
        if line.is_empty() {
            break;
        }
        headers.push(parse_header_line(line)?);
    }

    let body = if status_forbids_body(status) {
        Vec::new()
    } else if is_chunked(&headers) {
        read_chunked(&mut reader)?
    } else if let Some(value) = first_value(&headers, "content-length") {
        let expected = parse_content_length(value)
            .ok_or_else(|| malformed("content-length is not a number"))?;
        let rest = reader.rest();
        if rest.is_empty() {
            // Header-only dump.
            Vec::new()
        } else if rest.len() < expected {
            return Err(malformed(&format!(
                "body truncated: expected {expected} bytes, found {}",
                rest.len()
            )));
        } else {
            rest[..expected].to_vec()
        }
    } else {
        reader.rest().to_vec()
    };

    Ok(Response {
        version,
        status,
        reason,
        headers,
        body,
    })
}

fn malformed(message: &str) -> VcrError {
    VcrError::MalformedFixture(message.to_string())
}

fn check_status_line(response: &Response) -> Result<(), VcrError> {
    if !response.version.starts_with("HTTP/") || response.version.contains(char::is_whitespace) {
        return Err(VcrError::Encoding(format!(
            "invalid http version `{}`",
            response.version
        )));
    }
    if !(100..=999).contains(&response.status) {
        return Err(VcrError::Encoding(format!(
            "invalid status code {}",
            response.status
        )));
    }
    if response.reason.contains(['\r', '\n']) {
        return Err(VcrError::Encoding("reason phrase contains a line break".to_string()));
    }
    Ok(())
}

fn check_header(name: &str, value: &[u8]) -> Result<(), VcrError> {
    if name.is_empty() || name.bytes().any(|b| b == b':' || b.is_ascii_whitespace()) {
        return Err(VcrError::Encoding(format!("invalid header name `{name}`")));
    }
    if value.iter().any(|b| *b == b'\r' || *b == b'\n') {
        return Err(VcrError::Encoding(format!(
            "header `{name}` value contains a line break"
        )));
    }
    if trim_ows(value).len() != value.len() {
        return Err(VcrError::Encoding(format!(
            "header `{name}` value has surrounding whitespace"
        )));
    }
    Ok(())
}

fn status_forbids_body(status: u16) -> bool {
    (100..200).contains(&status) || status == 204 || status == 304
}

fn parse_status_line(line: &[u8]) -> Result<(String, u16, String), VcrError> {
    let line = std::str::from_utf8(line).map_err(|_| malformed("status line is not utf-8"))?;
    let (version, rest) = line
        .split_once(' ')
        .ok_or_else(|| malformed(&format!("invalid status line `{line}`")))?;
    if !version.starts_with("HTTP/") {
        return Err(malformed(&format!("invalid status line `{line}`")));
    }
    let (code, reason) = rest.split_once(' ').unwrap_or((rest, ""));
    if code.len() != 3 || !code.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed(&format!("invalid status code `{code}`")));
    }
    let status = code
        .parse::<u16>()
        .map_err(|_| malformed(&format!("invalid status code `{code}`")))?;
    if status < 100 {
        return Err(malformed(&format!("invalid status code `{code}`")));
    }
    Ok((version.to_string(), status, reason.to_string()))
}

fn parse_header_line(line: &[u8]) -> Result<(String, Vec<u8>), VcrError> {
    let colon = line
        .iter()
        .position(|b| *b == b':')
        .ok_or_else(|| malformed("header line without `:`"))?;
    let name = std::str::from_utf8(&line[..colon])
        .map_err(|_| malformed("header name is not utf-8"))?;
    if name.is_empty() || name.bytes().any(|b| b.is_ascii_whitespace()) {
        return Err(malformed(&format!("invalid header name `{name}`")));
    }
    let value = trim_ows(&line[colon + 1..]);
    Ok((name.to_string(), value.to_vec()))
}

fn trim_ows(mut value: &[u8]) -> &[u8] {
    while let [b' ' | b'\t', rest @ ..] = value {
        value = rest;
    }
    while let [rest @ .., b' ' | b'\t'] = value {
        value = rest;
    }
    value
}

fn read_chunked(reader: &mut LineReader<'_>) -> Result<Vec<u8>, VcrError> {
    let mut body = Vec::new();
    loop {
        let size_line = reader
            .next_line()
            .ok_or_else(|| malformed("truncated chunk header"))?;
        let size_line =
            std::str::from_utf8(size_line).map_err(|_| malformed("chunk header is not utf-8"))?;
        let size_text = size_line.split(';').next().unwrap_or_default().trim();
        let size = usize::from_str_radix(size_text, 16)
            .map_err(|_| malformed(&format!("invalid chunk size `{size_text}`")))?;
        if size == 0 {
            // Trailers are accepted and dropped.
            loop {
                let trailer = reader
                    .next_line()
                    .ok_or_else(|| malformed("truncated chunked trailer"))?;
                if trailer.is_empty() {
                    return Ok(body);
                }
            }
        }
        let chunk = reader
            .take(size)
            .ok_or_else(|| malformed("truncated chunk body"))?;
        body.extend_from_slice(chunk);
        match reader.next_line() {
            Some([]) => {}
            _ => return Err(malformed("chunk is not terminated by CRLF")),
        }
    }
}

fn is_chunked(headers: &[(String, Vec<u8>)]) -> bool {
    headers
        .iter()
        .filter(|(name, _)| name.eq_ignore_ascii_case("transfer-encoding"))
        .any(|(_, value)| {
            std::str::from_utf8(value)
                .ok()
                .and_then(|v| v.rsplit(',').next())
                .is_some_and(|last| last.trim().eq_ignore_ascii_case("chunked"))
        })
}

fn first_value<'a>(headers: &'a [(String, Vec<u8>)], name: &str) -> Option<&'a [u8]> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_slice())
}

fn parse_content_length(value: &[u8]) -> Option<usize> {
    std::str::from_utf8(value).ok()?.trim().parse().ok()
}

struct LineReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> LineReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Next line without its terminator; `None` when no `\n` remains.
    fn next_line(&mut self) -> Option<&'a [u8]> {
        let remaining = &self.data[self.pos..];
        let newline = remaining.iter().position(|b| *b == b'\n')?;
        self.pos += newline + 1;
        let line = &remaining[..newline];
        Some(line.strip_suffix(b"\r").unwrap_or(line))
    }

    fn take(&mut self, len: usize) -> Option<&'a [u8]> {
        let remaining = &self.data[self.pos..];
        if remaining.len() < len {
            return None;
        }
        self.pos += len;
        Some(&remaining[..len])
    }

    fn rest(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }
}
