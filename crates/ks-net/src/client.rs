//! Blocking HTTP/1.1 client: one connection per request, redirects followed.

use crate::FetchedDocument;
use crate::dns::DnsResolver;
use crate::dns::SystemDnsResolver;
use crate::http::Header;
use crate::http::HttpMethod;
use crate::http::HttpRequest;
use crate::http::HttpResponse;
use crate::http::HttpStatusCode;
use crate::http::HttpVersion;
use crate::tls::TlsPolicy;
use crate::tls_backend::RustlsTlsAdapter;
use crate::tls_backend::TlsBackendAdapter;
use crate::transport::BoxedIoStream;
use crate::transport::TcpTransport;
use crate::transport::Transport;
use crate::transport::connect_first_available;
use crate::url::RemoteUrl;
use brotli::Decompressor;
use flate2::read::DeflateDecoder;
use flate2::read::GzDecoder;
use flate2::read::ZlibDecoder;
use ks_core::NetError;
use ks_core::NetResult;
use std::io::Cursor;
use std::io::Read;
use std::io::Write;
use std::time::Duration;
use tracing::debug;
use tracing::warn;

const MAX_RESPONSE_HEAD_BYTES: usize = 128 * 1024;
const MAX_BODY_BYTES: usize = 32 * 1024 * 1024;
const MAX_CHUNK_LINE_BYTES: usize = 8 * 1024;
const USER_AGENT: &str = concat!("kmlstyle/", env!("CARGO_PKG_VERSION"));
const ACCEPT_KML: &str =
    "application/vnd.google-earth.kml+xml, application/xml;q=0.9, text/xml;q=0.8, */*;q=0.5";

pub const DEFAULT_MAX_REDIRECTS: usize = 5;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP/1.1 client with pluggable resolver, transport, and TLS backend.
pub struct Http11Client<R = SystemDnsResolver, T = TcpTransport, A = RustlsTlsAdapter>
where
    R: DnsResolver,
    T: Transport,
    A: TlsBackendAdapter,
{
    dns: R,
    transport: T,
    tls_adapter: A,
    tls_policy: TlsPolicy,
    timeout: Duration,
    max_redirects: usize,
}

impl Http11Client {
    pub fn new(tls_policy: TlsPolicy) -> NetResult<Self> {
        Self::with_parts(SystemDnsResolver, TcpTransport, RustlsTlsAdapter, tls_policy)
    }
}

impl<R, T, A> Http11Client<R, T, A>
where
    R: DnsResolver,
    T: Transport,
    A: TlsBackendAdapter,
{
    pub fn with_parts(
        dns: R,
        transport: T,
        tls_adapter: A,
        tls_policy: TlsPolicy,
    ) -> NetResult<Self> {
        tls_policy.validate()?;
        Ok(Self {
            dns,
            transport,
            tls_adapter,
            tls_policy,
            timeout: DEFAULT_TIMEOUT,
            max_redirects: DEFAULT_MAX_REDIRECTS,
        })
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    pub fn set_max_redirects(&mut self, max_redirects: usize) {
        self.max_redirects = max_redirects;
    }

    /// GETs `raw_url`, following redirects, and requires a 2xx final status.
    pub fn fetch(&mut self, raw_url: &str) -> NetResult<FetchedDocument> {
        let mut url = RemoteUrl::parse(raw_url)?;
        let mut redirects = 0_usize;

        loop {
            let request = HttpRequest::new(HttpMethod::Get, url.clone())?
                .with_header("User-Agent", USER_AGENT)?
                .with_header("Accept", ACCEPT_KML)?
                .with_header("Accept-Encoding", "gzip, deflate, br")?;
            let response = self.execute(&request)?;
            let status = response.status;

            if status.is_redirect() {
                let Some(location) = response.header("Location") else {
                    return Err(NetError::new(
                        "net.http.redirect_location_missing",
                        format!(
                            "{} redirect from `{}` has no Location",
                            status.as_u16(),
                            url.as_str()
                        ),
                    ));
                };

                if redirects >= self.max_redirects {
                    return Err(NetError::new(
                        "net.http.too_many_redirects",
                        format!(
                            "too many redirects (>{}) while fetching `{raw_url}`",
                            self.max_redirects
                        ),
                    ));
                }

                let next = url.join(location)?;
                warn!(
                    from = url.as_str(),
                    to = next.as_str(),
                    status = status.as_u16(),
                    "following redirect"
                );
                url = next;
                redirects = redirects.saturating_add(1);
                continue;
            }

            if !status.is_success() {
                return Err(NetError::new(
                    "net.http.status_unsuccessful",
                    format!("`{}` answered with status {}", url.as_str(), status.as_u16()),
                ));
            }

            debug!(
                url = url.as_str(),
                bytes = response.body.len(),
                redirects,
                "fetched document"
            );
            return Ok(FetchedDocument {
                final_url: url.as_str().to_owned(),
                status,
                content_type: response.header("Content-Type").map(str::to_owned),
                body: response.body,
                redirects,
            });
        }
    }

    /// Sends one request on a fresh connection and reads the full response.
    pub fn execute(&mut self, request: &HttpRequest) -> NetResult<HttpResponse> {
        let handshake = self.tls_policy.handshake_config_for(&request.url)?;
        let addresses = self.dns.resolve(request.url.host(), request.url.port())?;
        let tcp = connect_first_available(&self.transport, &addresses, self.timeout)?;

        let mut stream: BoxedIoStream = match &handshake {
            Some(handshake) => self.tls_adapter.connect_tls(tcp, handshake, &self.tls_policy)?,
            None => Box::new(tcp),
        };

        write_request(&mut stream, request)?;
        read_response(&mut stream, request.method)
    }
}

fn write_request(stream: &mut dyn Write, request: &HttpRequest) -> NetResult<()> {
    stream.write_all(&request.encode()).map_err(|error| {
        NetError::new(
            "net.http.write_failed",
            format!("failed to write HTTP request bytes: {error}"),
        )
    })?;
    stream.flush().map_err(|error| {
        NetError::new(
            "net.http.flush_failed",
            format!("failed to flush HTTP request bytes: {error}"),
        )
    })
}

fn read_response(stream: &mut dyn Read, method: HttpMethod) -> NetResult<HttpResponse> {
    let mut buffer = Vec::new();
    let mut chunk = [0_u8; 4096];

    let header_end = loop {
        if let Some(end) = find_header_end(&buffer) {
            break end;
        }

        let read = stream.read(&mut chunk).map_err(|error| {
            NetError::new(
                "net.http.read_head_failed",
                format!("failed while reading HTTP response head: {error}"),
            )
        })?;
        if read == 0 {
            return Err(NetError::new(
                "net.http.unexpected_eof",
                "connection closed before the response head completed",
            ));
        }

        buffer.extend_from_slice(&chunk[..read]);
        if buffer.len() > MAX_RESPONSE_HEAD_BYTES {
            return Err(NetError::new(
                "net.http.head_too_large",
                format!("HTTP response head exceeds {MAX_RESPONSE_HEAD_BYTES} bytes"),
            ));
        }
    };

    let head_text = std::str::from_utf8(&buffer[..header_end]).map_err(|error| {
        NetError::new(
            "net.http.head_invalid_utf8",
            format!("HTTP response head is not valid UTF-8 text: {error}"),
        )
    })?;

    let mut lines = head_text.split("\r\n");
    let status_line = lines.next().unwrap_or_default();
    let (version, status) = parse_status_line(status_line)?;

    let mut headers = Vec::new();
    for line in lines.filter(|line| !line.is_empty()) {
        let (name, value) = line.split_once(':').ok_or_else(|| {
            NetError::new(
                "net.http.header_invalid",
                format!("invalid HTTP header line `{line}`"),
            )
        })?;
        headers.push(Header::new(name.trim(), value.trim())?);
    }

    let prefetched = buffer[header_end..].to_vec();
    if method == HttpMethod::Head || status.disallows_body() {
        return Ok(HttpResponse {
            version,
            status,
            headers,
            body: Vec::new(),
        });
    }

    let body = if header_contains(&headers, "transfer-encoding", "chunked") {
        read_chunked_body(stream, prefetched)?
    } else if has_header(&headers, "transfer-encoding") {
        return Err(NetError::new(
            "net.http.transfer_encoding_unsupported",
            "only chunked transfer encoding is supported",
        ));
    } else if let Some(length) = parse_content_length(&headers)? {
        read_sized_body(stream, prefetched, length)?
    } else {
        read_until_close(stream, prefetched)?
    };

    let body = decode_content_encoding(&headers, body)?;
    Ok(HttpResponse {
        version,
        status,
        headers,
        body,
    })
}

fn read_sized_body(stream: &mut dyn Read, mut body: Vec<u8>, length: usize) -> NetResult<Vec<u8>> {
    if length > MAX_BODY_BYTES {
        return Err(body_too_large());
    }

    if body.len() >= length {
        body.truncate(length);
        return Ok(body);
    }

    let mut rest = vec![0_u8; length - body.len()];
    stream.read_exact(&mut rest).map_err(|error| {
        NetError::new(
            "net.http.read_body_failed",
            format!("failed to read HTTP body bytes: {error}"),
        )
    })?;
    body.extend_from_slice(&rest);
    Ok(body)
}

fn read_until_close(stream: &mut dyn Read, mut body: Vec<u8>) -> NetResult<Vec<u8>> {
    if body.len() > MAX_BODY_BYTES {
        return Err(body_too_large());
    }

    read_capped(stream, &mut body).map_err(|error| {
        NetError::new(
            "net.http.read_body_failed",
            format!("failed while draining response body until close: {error}"),
        )
    })?;
    check_body_len(body)
}

/// Reads to EOF, stopping one byte past [`MAX_BODY_BYTES`] so oversize bodies
/// are detected without buffering them whole.
fn read_capped(reader: impl Read, out: &mut Vec<u8>) -> std::io::Result<usize> {
    let limit = (MAX_BODY_BYTES + 1).saturating_sub(out.len()) as u64;
    reader.take(limit).read_to_end(out)
}

fn check_body_len(body: Vec<u8>) -> NetResult<Vec<u8>> {
    if body.len() > MAX_BODY_BYTES {
        return Err(body_too_large());
    }
    Ok(body)
}

fn body_too_large() -> NetError {
    NetError::new(
        "net.http.body_too_large",
        format!("HTTP response body exceeds {MAX_BODY_BYTES} bytes"),
    )
}

/// Reader that serves bytes already pulled in with the head before the stream.
struct PrefixedStreamReader<'a> {
    prefetched: Vec<u8>,
    offset: usize,
    stream: &'a mut dyn Read,
}

impl<'a> PrefixedStreamReader<'a> {
    fn new(stream: &'a mut dyn Read, prefetched: Vec<u8>) -> Self {
        Self {
            prefetched,
            offset: 0,
            stream,
        }
    }

    fn read_exact_into(&mut self, out: &mut [u8]) -> NetResult<()> {
        let available = self.prefetched.len().saturating_sub(self.offset);
        let prefix_take = available.min(out.len());

        if prefix_take > 0 {
            out[..prefix_take]
                .copy_from_slice(&self.prefetched[self.offset..self.offset + prefix_take]);
            self.offset += prefix_take;
        }

        if prefix_take < out.len() {
            self.stream.read_exact(&mut out[prefix_take..]).map_err(|error| {
                NetError::new(
                    "net.http.read_body_failed",
                    format!("failed while reading chunked HTTP body: {error}"),
                )
            })?;
        }

        Ok(())
    }

    fn read_line(&mut self) -> NetResult<String> {
        let mut line = Vec::new();

        loop {
            let mut byte = [0_u8; 1];
            self.read_exact_into(&mut byte)?;
            line.push(byte[0]);

            if line.len() > MAX_CHUNK_LINE_BYTES {
                return Err(NetError::new(
                    "net.http.chunk_line_too_large",
                    format!("chunk metadata line exceeds {MAX_CHUNK_LINE_BYTES} bytes"),
                ));
            }

            if line.ends_with(b"\r\n") {
                line.truncate(line.len() - 2);
                return String::from_utf8(line).map_err(|error| {
                    NetError::new(
                        "net.http.chunk_line_invalid_utf8",
                        format!("chunk metadata line is not valid UTF-8: {error}"),
                    )
                });
            }
        }
    }
}

fn read_chunked_body(stream: &mut dyn Read, prefetched: Vec<u8>) -> NetResult<Vec<u8>> {
    let mut reader = PrefixedStreamReader::new(stream, prefetched);
    let mut decoded = Vec::new();

    loop {
        let size_line = reader.read_line()?;
        if size_line.is_empty() {
            continue;
        }

        let size_token = size_line.split(';').next().unwrap_or_default().trim();
        let chunk_size = usize::from_str_radix(size_token, 16).map_err(|error| {
            NetError::new(
                "net.http.chunk_size_invalid",
                format!("invalid chunk size `{size_token}`: {error}"),
            )
        })?;

        if chunk_size == 0 {
            // Trailer fields end at the first empty line.
            while !reader.read_line()?.is_empty() {}
            return Ok(decoded);
        }

        let start = decoded.len();
        let end = start
            .checked_add(chunk_size)
            .filter(|end| *end <= MAX_BODY_BYTES)
            .ok_or_else(body_too_large)?;
        decoded.resize(end, 0);
        reader.read_exact_into(&mut decoded[start..])?;

        let mut terminator = [0_u8; 2];
        reader.read_exact_into(&mut terminator)?;
        if terminator != *b"\r\n" {
            return Err(NetError::new(
                "net.http.chunk_terminator_invalid",
                "chunk data is missing trailing CRLF",
            ));
        }
    }
}

fn find_header_end(buffer: &[u8]) -> Option<usize> {
    buffer
        .windows(4)
        .position(|window| window == b"\r\n\r\n")
        .map(|idx| idx + 4)
}

fn parse_status_line(line: &str) -> NetResult<(HttpVersion, HttpStatusCode)> {
    let mut parts = line.splitn(3, ' ');
    let version = match parts.next() {
        Some("HTTP/1.0") => HttpVersion::Http10,
        Some("HTTP/1.1") => HttpVersion::Http11,
        _ => {
            return Err(NetError::new(
                "net.http.status_line_invalid",
                format!("unsupported HTTP status line `{line}`"),
            ));
        }
    };

    let code = parts
        .next()
        .and_then(|code| code.parse::<u16>().ok())
        .ok_or_else(|| {
            NetError::new(
                "net.http.status_line_invalid",
                format!("missing or invalid status code in `{line}`"),
            )
        })?;

    Ok((version, HttpStatusCode::new(code)?))
}

fn parse_content_length(headers: &[Header]) -> NetResult<Option<usize>> {
    let mut value: Option<usize> = None;

    for header in headers
        .iter()
        .filter(|header| header.name.eq_ignore_ascii_case("content-length"))
    {
        let parsed = header.value.trim().parse::<usize>().map_err(|error| {
            NetError::new(
                "net.http.content_length_invalid",
                format!("invalid Content-Length `{}`: {error}", header.value),
            )
        })?;

        match value {
            Some(existing) if existing != parsed => {
                return Err(NetError::new(
                    "net.http.content_length_conflict",
                    "conflicting Content-Length headers in response",
                ));
            }
            _ => value = Some(parsed),
        }
    }

    Ok(value)
}

fn has_header(headers: &[Header], name: &str) -> bool {
    headers
        .iter()
        .any(|header| header.name.eq_ignore_ascii_case(name))
}

fn header_contains(headers: &[Header], name: &str, value: &str) -> bool {
    headers.iter().any(|header| {
        header.name.eq_ignore_ascii_case(name)
            && header
                .value
                .split(',')
                .any(|token| token.trim().eq_ignore_ascii_case(value))
    })
}

fn decode_content_encoding(headers: &[Header], body: Vec<u8>) -> NetResult<Vec<u8>> {
    let encodings: Vec<String> = headers
        .iter()
        .filter(|header| header.name.eq_ignore_ascii_case("content-encoding"))
        .flat_map(|header| header.value.split(','))
        .map(|token| token.trim().to_ascii_lowercase())
        .filter(|token| !token.is_empty())
        .collect();

    // Codings are listed in the order they were applied.
    let mut decoded = body;
    for encoding in encodings.iter().rev() {
        decoded = match encoding.as_str() {
            "identity" => decoded,
            "gzip" | "x-gzip" => decode_with(GzDecoder::new(Cursor::new(decoded)), "gzip")?,
            "deflate" => decode_deflate(decoded)?,
            "br" => decode_with(Decompressor::new(Cursor::new(decoded), 4096), "brotli")?,
            other => {
                return Err(NetError::new(
                    "net.http.content_encoding_unsupported",
                    format!("unsupported content encoding `{other}`"),
                ));
            }
        };
    }

    Ok(decoded)
}

/// Servers disagree on whether `deflate` means zlib-wrapped or raw deflate.
fn decode_deflate(body: Vec<u8>) -> NetResult<Vec<u8>> {
    let zlib = ZlibDecoder::new(Cursor::new(&body));
    let mut out = Vec::new();
    if read_capped(zlib, &mut out).is_ok() {
        return check_body_len(out);
    }

    decode_with(DeflateDecoder::new(Cursor::new(body)), "deflate")
}

fn decode_with(decoder: impl Read, label: &str) -> NetResult<Vec<u8>> {
    let mut out = Vec::new();
    read_capped(decoder, &mut out).map_err(|error| {
        NetError::new(
            "net.http.decode_failed",
            format!("{label} decode failed: {error}"),
        )
    })?;
    check_body_len(out)
}
