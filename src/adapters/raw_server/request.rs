use hyper::header::{HeaderName, HeaderValue};
use hyper::{Method, Request, Uri, Version};
use std::io;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

pub const MAX_HEAD_BYTES: u64 = 16 * 1024;
pub const MAX_HEADERS: usize = 100;

/// Reads one request head, leaving anything after it buffered in `reader`.
///
/// A connection closed before sending anything yields `UnexpectedEof`, any
/// malformed or oversized head yields `InvalidData`.
pub async fn read_request_head<R>(reader: &mut R) -> io::Result<Request<()>>
where
    R: AsyncBufRead + Unpin + ?Sized,
{
    let mut limited = (&mut *reader).take(MAX_HEAD_BYTES);
    let mut line = String::new();

    // Stray empty lines ahead of the request line are tolerated.
    loop {
        line.clear();
        if limited.read_line(&mut line).await? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed before a request was sent",
            ));
        }
        check_complete(&line, limited.limit())?;
        if !line.trim().is_empty() {
            break;
        }
    }

    let mut req = parse_request_line(line.trim_end())?;

    loop {
        line.clear();
        limited.read_line(&mut line).await?;
        check_complete(&line, limited.limit())?;

        let header = line.trim_end_matches(|c: char| c == '\r' || c == '\n');
        if header.is_empty() {
            break;
        }
        if req.headers().len() >= MAX_HEADERS {
            return Err(invalid(format!("more than {} headers", MAX_HEADERS)));
        }

        let (name, value) = header
            .split_once(':')
            .ok_or_else(|| invalid(format!("malformed header line {:?}", header)))?;
        // No whitespace is allowed around the name, so it is not trimmed.
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|err| invalid(format!("invalid header name {:?}: {}", name, err)))?;
        let value = HeaderValue::from_str(value.trim())
            .map_err(|err| invalid(format!("invalid value for header {}: {}", name, err)))?;
        req.headers_mut().append(name, value);
    }

    Ok(req)
}

fn parse_request_line(line: &str) -> io::Result<Request<()>> {
    let mut parts = line.split_whitespace();
    let (method, target, version) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(method), Some(target), Some(version), None) => (method, target, version),
        _ => return Err(invalid(format!("malformed request line {:?}", line))),
    };

    let method = Method::from_bytes(method.as_bytes())
        .map_err(|err| invalid(format!("invalid method {:?}: {}", method, err)))?;
    let uri = target
        .parse::<Uri>()
        .map_err(|err| invalid(format!("invalid request target {:?}: {}", target, err)))?;
    let version = match version {
        "HTTP/1.1" => Version::HTTP_11,
        "HTTP/1.0" => Version::HTTP_10,
        other => return Err(invalid(format!("unsupported protocol version {:?}", other))),
    };

    let mut req = Request::new(());
    *req.method_mut() = method;
    *req.uri_mut() = uri;
    *req.version_mut() = version;
    Ok(req)
}

fn check_complete(line: &str, remaining: u64) -> io::Result<()> {
    if line.ends_with('\n') {
        Ok(())
    } else if remaining == 0 {
        Err(invalid(format!("request head exceeds {} bytes", MAX_HEAD_BYTES)))
    } else {
        Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "connection closed in the middle of the request head",
        ))
    }
}

fn invalid(msg: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg)
}
