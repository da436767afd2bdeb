//! Parse a raw response header block into a status line and header map.

use std::collections::HashMap;

use crate::error::TaskError;

/// Parsed `HTTP/1.1 200 OK` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub version: String,
    pub code: u16,
    pub reason: String,
}

impl StatusLine {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.code)
    }

    /// Informational heads that precede the final response on the same
    /// request. `101` is final: the connection stops speaking HTTP.
    pub fn is_interim(&self) -> bool {
        (100..200).contains(&self.code) && self.code != 101
    }

    /// Statuses that never carry a body regardless of headers.
    pub fn is_bodyless(&self) -> bool {
        (100..200).contains(&self.code) || self.code == 204 || self.code == 304
    }
}

/// Header name → value. Names compare ASCII case-insensitively; the last
/// occurrence of a repeated header wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseHeaders {
    map: HashMap<String, String>,
}

impl ResponseHeaders {
    pub fn insert(&mut self, name: &str, value: &str) {
        self.map
            .insert(name.to_ascii_lowercase(), value.to_string());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.map.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// `Content-Length` as a byte count. `Ok(None)` when absent.
    pub fn content_length(&self) -> Result<Option<usize>, TaskError> {
        match self.get("content-length") {
            None => Ok(None),
            Some(v) => v.trim().parse::<usize>().map(Some).map_err(|_| {
                TaskError::MalformedHeaders(format!("bad Content-Length: {v:?}"))
            }),
        }
    }

    /// True when the server announced it will close after this response.
    pub fn connection_close(&self) -> bool {
        self.get("connection")
            .map(|v| v.split(',').any(|t| t.trim().eq_ignore_ascii_case("close")))
            .unwrap_or(false)
    }
}

/// Status line plus headers of one response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    pub status: StatusLine,
    pub headers: ResponseHeaders,
}

/// Parse the bytes before the blank-line delimiter (delimiter may be included).
pub(crate) fn parse_head(block: &[u8]) -> Result<ResponseHead, TaskError> {
    let text = std::str::from_utf8(block)
        .map_err(|_| TaskError::MalformedHeaders("header block is not UTF-8".into()))?;
    let mut lines = text.split("\r\n");

    let status_line = lines.next().unwrap_or("");
    let status = parse_status_line(status_line)?;

    let mut headers = ResponseHeaders::default();
    for line in lines {
        if line.is_empty() {
            continue;
        }
        if let Some((name, value)) = line.split_once(':') {
            headers.insert(name.trim(), value.trim());
        }
    }

    Ok(ResponseHead { status, headers })
}

fn parse_status_line(line: &str) -> Result<StatusLine, TaskError> {
    let mut parts = line.splitn(3, ' ');
    let version = parts.next().unwrap_or("");
    if !version.starts_with("HTTP/") {
        return Err(TaskError::MalformedHeaders(format!(
            "bad status line: {line:?}"
        )));
    }
    let code = parts
        .next()
        .and_then(|c| c.parse::<u16>().ok())
        .ok_or_else(|| TaskError::MalformedHeaders(format!("bad status code: {line:?}")))?;
    let reason = parts.next().unwrap_or("").to_string();
    Ok(StatusLine {
        version: version.to_string(),
        code,
        reason,
    })
}
