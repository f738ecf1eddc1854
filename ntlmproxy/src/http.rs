//! HTTP/1.1 preamble I/O: reads a request or response preamble up to the
//! blank line, derives body framing, and relays bodies preserving framing
//! exactly (chunk sizes, trailers, and `Until-Close` blocks byte-for-byte).

use std::io::{BufRead, BufReader, Read, Write};

use ntlmproxy_core::error::ProxyError;
use ntlmproxy_core::ProxyResult;

use crate::model::{BodyFraming, HttpVersion, RequestRecord, ResponseRecord};
use crate::util::headers::HeaderMap;

const RELAY_BLOCK: usize = 16 * 1024;

/// Statuses HTTP/1.1 defines as never carrying a body.
fn is_bodyless_status(status: u16) -> bool {
    (100..200).contains(&status) || status == 204 || status == 304
}

/// Reads lines up to and including the blank CRLF-CRLF terminator,
/// folding continuation lines (leading whitespace) into the previous
/// header value.
fn read_preamble_lines<R: BufRead>(reader: &mut R) -> ProxyResult<Vec<String>> {
    let mut lines = Vec::new();
    loop {
        let mut raw = String::new();
        let n = reader
            .read_line(&mut raw)
            .map_err(ProxyError::client_io)?;
        if n == 0 {
            return Err(ProxyError::protocol("connection closed before end of headers"));
        }
        let trimmed = raw.trim_end_matches(['\r', '\n']).to_string();
        if trimmed.is_empty() {
            break;
        }
        if (trimmed.starts_with(' ') || trimmed.starts_with('\t')) && !lines.is_empty() {
            let last = lines.last_mut().unwrap();
            let folded: &mut String = last;
            folded.push(' ');
            folded.push_str(trimmed.trim_start());
        } else {
            lines.push(trimmed);
        }
    }
    Ok(lines)
}

fn parse_headers(lines: &[String]) -> ProxyResult<HeaderMap> {
    let mut headers = HeaderMap::new();
    for line in lines {
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| ProxyError::protocol(format!("malformed header line: {line:?}")))?;
        headers.push(name.trim(), value.trim());
    }
    Ok(headers)
}

fn parse_version(token: &str) -> ProxyResult<HttpVersion> {
    match token {
        "HTTP/1.1" => Ok(HttpVersion::Http11),
        "HTTP/1.0" => Ok(HttpVersion::Http10),
        other => Err(ProxyError::protocol(format!("unsupported HTTP version: {other}"))),
    }
}

fn request_framing(headers: &HeaderMap) -> ProxyResult<BodyFraming> {
    if let Some(te) = headers.get("Transfer-Encoding") {
        if te.eq_ignore_ascii_case("chunked") {
            return Ok(BodyFraming::Chunked);
        }
    }
    if let Some(len) = headers.get("Content-Length") {
        let n: u64 = len
            .trim()
            .parse()
            .map_err(|_| ProxyError::protocol(format!("bad Content-Length: {len:?}")))?;
        return Ok(BodyFraming::Length(n));
    }
    Ok(BodyFraming::None)
}

/// Parses the request line and header block from `reader`. The URI is
/// parsed for host/port only for `CONNECT` and absolute-form proxy
/// requests; origin-form requests leave host/port empty for the caller
/// to fill in from the `Host` header.
pub fn read_request<R: BufRead>(reader: &mut R) -> ProxyResult<RequestRecord> {
    let mut lines = read_preamble_lines(reader)?;
    if lines.is_empty() {
        return Err(ProxyError::protocol("empty request preamble"));
    }
    let request_line = lines.remove(0);
    let mut parts = request_line.splitn(3, ' ');
    let method = parts
        .next()
        .ok_or_else(|| ProxyError::protocol("missing method"))?
        .to_string();
    let uri = parts
        .next()
        .ok_or_else(|| ProxyError::protocol("missing URI"))?
        .to_string();
    let version = parse_version(
        parts.next().ok_or_else(|| ProxyError::protocol("missing version"))?,
    )?;

    let headers = parse_headers(&lines)?;
    let (host, port) = split_host_port(&uri, &headers, &method)?;
    let framing = if method.eq_ignore_ascii_case("CONNECT") {
        BodyFraming::None
    } else {
        request_framing(&headers)?
    };

    Ok(RequestRecord { method, uri, version, headers, host, port, framing })
}

fn split_host_port(uri: &str, headers: &HeaderMap, method: &str) -> ProxyResult<(String, u16)> {
    let default_port = if uri.starts_with("https://") { 443 } else { 80 };
    let authority = if method.eq_ignore_ascii_case("CONNECT") {
        uri.to_string()
    } else if let Some(rest) = uri.strip_prefix("http://").or_else(|| uri.strip_prefix("https://")) {
        rest.split_once('/').map(|(a, _)| a).unwrap_or(rest).to_string()
    } else {
        headers
            .get("Host")
            .ok_or_else(|| ProxyError::protocol("origin-form request without Host header"))?
            .to_string()
    };
    match authority.rsplit_once(':') {
        Some((host, port_str)) if port_str.chars().all(|c| c.is_ascii_digit()) && !port_str.is_empty() => {
            let port: u16 = port_str
                .parse()
                .map_err(|_| ProxyError::protocol(format!("bad port in authority: {authority:?}")))?;
            Ok((host.to_string(), port))
        }
        _ => Ok((authority, default_port)),
    }
}

/// Parses a response preamble. `for_head` suppresses body framing since
/// HEAD responses never carry a body regardless of headers.
pub fn read_response<R: BufRead>(reader: &mut R, for_head: bool) -> ProxyResult<ResponseRecord> {
    let mut lines = read_preamble_lines(reader)?;
    if lines.is_empty() {
        return Err(ProxyError::protocol("empty response preamble"));
    }
    let status_line = lines.remove(0);
    let mut parts = status_line.splitn(3, ' ');
    let version = parse_version(
        parts.next().ok_or_else(|| ProxyError::protocol("missing version"))?,
    )?;
    let status: u16 = parts
        .next()
        .ok_or_else(|| ProxyError::protocol("missing status code"))?
        .parse()
        .map_err(|_| ProxyError::protocol("non-numeric status code"))?;
    let reason = parts.next().unwrap_or("").to_string();

    let headers = parse_headers(&lines)?;
    let framing = if for_head || is_bodyless_status(status) {
        BodyFraming::None
    } else {
        request_framing(&headers)?.or_until_close()
    };

    Ok(ResponseRecord { version, status, reason, headers, framing })
}

trait DefaultToUntilClose {
    fn or_until_close(self) -> BodyFraming;
}

impl DefaultToUntilClose for BodyFraming {
    fn or_until_close(self) -> BodyFraming {
        match self {
            BodyFraming::None => BodyFraming::UntilClose,
            other => other,
        }
    }
}

pub fn write_request_line<W: Write>(out: &mut W, method: &str, uri: &str, version: &HttpVersion) -> ProxyResult<()> {
    write!(out, "{method} {uri} {}\r\n", version.as_str()).map_err(ProxyError::upstream_io)
}

pub fn write_status_line<W: Write>(out: &mut W, version: &HttpVersion, status: u16, reason: &str) -> ProxyResult<()> {
    write!(out, "{} {status} {reason}\r\n", version.as_str()).map_err(ProxyError::upstream_io)
}

pub fn write_headers<W: Write>(out: &mut W, headers: &HeaderMap) -> ProxyResult<()> {
    let mut bytes = Vec::new();
    headers.write_to(&mut bytes);
    out.write_all(&bytes).map_err(ProxyError::upstream_io)?;
    out.write_all(b"\r\n").map_err(ProxyError::upstream_io)
}

/// Relays a body of the given framing from `src` to `dst`, preserving
/// chunk boundaries byte-for-byte for `Chunked` and copying exactly `n`
/// bytes for `Length(n)`. `UntilClose` copies fixed-size blocks until EOF.
pub fn relay_body<R: Read, W: Write>(src: &mut R, dst: &mut W, framing: BodyFraming) -> ProxyResult<()> {
    match framing {
        BodyFraming::None => Ok(()),
        BodyFraming::Length(n) => relay_exact(src, dst, n),
        BodyFraming::UntilClose => relay_until_eof(src, dst),
        BodyFraming::Chunked => relay_chunked(src, dst),
    }
}

fn relay_exact<R: Read, W: Write>(src: &mut R, dst: &mut W, mut remaining: u64) -> ProxyResult<()> {
    let mut buf = [0u8; RELAY_BLOCK];
    while remaining > 0 {
        let want = remaining.min(buf.len() as u64) as usize;
        let n = src.read(&mut buf[..want]).map_err(ProxyError::upstream_io)?;
        if n == 0 {
            return Err(ProxyError::protocol("upstream closed before body completed"));
        }
        dst.write_all(&buf[..n]).map_err(ProxyError::client_io)?;
        remaining -= n as u64;
    }
    Ok(())
}

fn relay_until_eof<R: Read, W: Write>(src: &mut R, dst: &mut W) -> ProxyResult<()> {
    let mut buf = [0u8; RELAY_BLOCK];
    loop {
        let n = src.read(&mut buf).map_err(ProxyError::upstream_io)?;
        if n == 0 {
            return Ok(());
        }
        dst.write_all(&buf[..n]).map_err(ProxyError::client_io)?;
    }
}

/// Relays one chunk at a time: size line, chunk data + CRLF, repeated
/// until the zero-size chunk and its trailing CRLF (and any trailers).
fn relay_chunked<R: Read, W: Write>(src: &mut R, dst: &mut W) -> ProxyResult<()> {
    let mut reader = ChunkLineReader { inner: src };
    loop {
        let size_line = reader.read_line()?;
        dst.write_all(size_line.as_bytes()).map_err(ProxyError::client_io)?;
        dst.write_all(b"\r\n").map_err(ProxyError::client_io)?;

        let size_token = size_line.split(';').next().unwrap_or("").trim();
        let size = u64::from_str_radix(size_token, 16)
            .map_err(|_| ProxyError::protocol(format!("bad chunk size: {size_token:?}")))?;

        if size == 0 {
            loop {
                let trailer = reader.read_line()?;
                dst.write_all(trailer.as_bytes()).map_err(ProxyError::client_io)?;
                dst.write_all(b"\r\n").map_err(ProxyError::client_io)?;
                if trailer.is_empty() {
                    break;
                }
            }
            return Ok(());
        }

        relay_exact(&mut *reader.inner, dst, size)?;
        let crlf = reader.read_line()?;
        if !crlf.is_empty() {
            return Err(ProxyError::protocol("chunk data not followed by CRLF"));
        }
        dst.write_all(b"\r\n").map_err(ProxyError::client_io)?;
    }
}

/// Reads one line at a time from a plain `Read`, without the internal
/// buffering `BufRead` would otherwise apply — chunk relay needs to read
/// exactly the chunk-data byte count afterward without losing bytes to a
/// read-ahead buffer.
struct ChunkLineReader<'a, R: Read> {
    inner: &'a mut R,
}

impl<'a, R: Read> ChunkLineReader<'a, R> {
    fn read_line(&mut self) -> ProxyResult<String> {
        let mut line = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            let n = self.inner.read(&mut byte).map_err(ProxyError::upstream_io)?;
            if n == 0 {
                return Err(ProxyError::protocol("connection closed mid-chunk"));
            }
            if byte[0] == b'\n' {
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                break;
            }
            line.push(byte[0]);
        }
        String::from_utf8(line).map_err(|_| ProxyError::protocol("non-UTF-8 chunk line"))
    }
}

pub fn buffered<R: Read>(reader: R) -> BufReader<R> {
    BufReader::new(reader)
}
