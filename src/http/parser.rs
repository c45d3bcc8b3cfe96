#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    InvalidUtf8,
    InvalidStatusLine,
    InvalidStatusCode,
    InvalidHeader,
}

/// One line of a response head as delivered by the transfer engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderLine {
    /// `HTTP/1.1 200 OK`; starts a new response head (redirects and interim
    /// responses produce several).
    Status {
        version: String,
        code: u16,
        reason: Option<String>,
    },
    Field {
        name: String,
        value: String,
    },
    /// Blank line terminating the head.
    End,
}

pub fn parse_header_line(line: &[u8]) -> Result<HeaderLine, ParseError> {
    let line = std::str::from_utf8(line).map_err(|_| ParseError::InvalidUtf8)?;
    let line = line.trim_end_matches(['\r', '\n']);

    if line.is_empty() {
        return Ok(HeaderLine::End);
    }

    if line.starts_with("HTTP/") {
        return parse_status_line(line);
    }

    let (name, value) = line.split_once(':').ok_or(ParseError::InvalidHeader)?;
    let name = name.trim();
    if name.is_empty() {
        return Err(ParseError::InvalidHeader);
    }

    Ok(HeaderLine::Field {
        name: name.to_string(),
        value: value.trim().to_string(),
    })
}

fn parse_status_line(line: &str) -> Result<HeaderLine, ParseError> {
    let mut parts = line.splitn(3, ' ');

    let version = parts.next().ok_or(ParseError::InvalidStatusLine)?;
    let code = parts.next().ok_or(ParseError::InvalidStatusLine)?;
    let code: u16 = code.parse().map_err(|_| ParseError::InvalidStatusCode)?;
    let reason = parts
        .next()
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string);

    Ok(HeaderLine::Status {
        version: version.to_string(),
        code,
        reason,
    })
}
