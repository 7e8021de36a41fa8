/// Requested-URL targets longer than this are rejected outright rather than
/// silently truncated into a fixed-size buffer.
pub const MAX_URL_SIZE: usize = 256;

const CONTENT_LENGTH_PREFIX: &[u8] = b"Content-Length: ";
const BROADCAST_TARGET: &[u8] = b"POST /broadcast.service";

#[derive(Debug, PartialEq, Eq)]
pub enum RequestError {
    /// A non-POST request whose header section had no `GET <target>` line.
    MissingTarget,
    /// The GET target exceeded `MAX_URL_SIZE - 1` bytes.
    UrlTooLong,
    /// `Content-Length` on a broadcast POST wasn't a valid base-10 integer.
    InvalidContentLength,
}

#[derive(Debug, PartialEq, Eq)]
pub struct ParsedRequest {
    pub is_post: bool,
    pub content_length: usize,
    pub url: String,
    pub body_offset: usize,
}

/// Parses the header block `buf[..header_end]` (the bytes up to, but not
/// including, the `\r\n\r\n` terminator located by the caller). Non-
/// destructive: scans `buf` without mutating it.
pub fn parse(buf: &[u8], header_end: usize) -> Result<ParsedRequest, RequestError> {
    let header_section = &buf[..header_end];
    let body_offset = header_end + 4;

    let mut is_post = false;
    let mut content_length = 0usize;
    let mut url: Option<String> = None;

    for raw_line in header_section.split(|&b| b == b'\n') {
        let line = strip_trailing_cr(raw_line);

        if line.len() >= 3 && &line[..3] == b"GET" {
            if let Some(tok) = next_token(&line[3..]) {
                if tok.len() > MAX_URL_SIZE - 1 {
                    return Err(RequestError::UrlTooLong);
                }
                url = Some(String::from_utf8_lossy(tok).into_owned());
            }
            continue;
        }

        if line.starts_with(BROADCAST_TARGET) {
            is_post = true;
            continue;
        }

        if is_post && line.starts_with(CONTENT_LENGTH_PREFIX) {
            let digits = &line[CONTENT_LENGTH_PREFIX.len()..];
            content_length = std::str::from_utf8(digits)
                .ok()
                .map(str::trim)
                .and_then(|s| s.parse::<usize>().ok())
                .ok_or(RequestError::InvalidContentLength)?;
            // Parsing stops once content-length is captured.
            break;
        }
    }

    if is_post {
        return Ok(ParsedRequest { is_post: true, content_length, url: String::new(), body_offset });
    }

    match url {
        Some(url) => Ok(ParsedRequest { is_post: false, content_length: 0, url, body_offset }),
        None => Err(RequestError::MissingTarget),
    }
}

fn strip_trailing_cr(line: &[u8]) -> &[u8] {
    match line.split_last() {
        Some((b'\r', rest)) => rest,
        _ => line,
    }
}

fn next_token(bytes: &[u8]) -> Option<&[u8]> {
    let start = bytes.iter().position(|&b| b != b' ' && b != b'\t')?;
    let rest = &bytes[start..];
    let end = rest.iter().position(|&b| b == b' ' || b == b'\t').unwrap_or(rest.len());
    Some(&rest[..end])
}
