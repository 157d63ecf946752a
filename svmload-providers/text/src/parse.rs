//! Tokeniser for single SVMLight records.
//!
//! ```text
//! <label>[:<weight>] [qid:<n>] <index>[:<value>] ... [# comment]
//! ```

use crate::errors::LibSvmError;

/// One data line after tokenising.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct ParsedLine {
    pub(crate) label: f32,
    pub(crate) weight: Option<f32>,
    pub(crate) query_id: Option<u64>,
    /// Feature index and explicit value, if one was written.
    pub(crate) pairs: Vec<(u32, Option<f32>)>,
}

impl ParsedLine {
    pub(crate) fn has_explicit_value(&self) -> bool {
        self.pairs.iter().any(|(_, value)| value.is_some())
    }
}

/// Data part of raw line `line` as text, with any `#` comment dropped.
///
/// Comment bytes are never decoded, so they may use any encoding. Invalid
/// UTF-8 before the comment is a malformed token.
pub(crate) fn data_text(raw: &[u8], line: u64) -> Result<&str, LibSvmError> {
    let data = raw
        .split(|&byte| byte == b'#')
        .next()
        .unwrap_or_default();
    std::str::from_utf8(data).map_err(|err| {
        LibSvmError::parse(
            line,
            format!("invalid UTF-8 at byte {}", err.valid_up_to()),
        )
    })
}

/// Parses physical line `line` (one-based). Blank and comment-only lines
/// yield `Ok(None)`.
pub(crate) fn parse_line(text: &str, line: u64) -> Result<Option<ParsedLine>, LibSvmError> {
    let data = text.split_once('#').map_or(text, |(data, _)| data);
    let mut tokens = data.split_ascii_whitespace();
    let Some(head) = tokens.next() else {
        return Ok(None);
    };

    let (label, weight) = match head.split_once(':') {
        Some((label, weight)) => (
            parse_f32(label, line, "label")?,
            Some(parse_f32(weight, line, "weight")?),
        ),
        None => (parse_f32(head, line, "label")?, None),
    };

    let mut query_id = None;
    let mut pairs = Vec::new();
    for token in tokens {
        if let Some(qid) = token.strip_prefix("qid:") {
            if query_id.is_some() {
                return Err(LibSvmError::parse(line, "duplicate `qid` token"));
            }
            let parsed = qid.parse::<u64>().map_err(|_| {
                LibSvmError::parse(line, format!("invalid query id `{qid}`"))
            })?;
            query_id = Some(parsed);
            continue;
        }
        pairs.push(parse_feature(token, line)?);
    }

    Ok(Some(ParsedLine {
        label,
        weight,
        query_id,
        pairs,
    }))
}

fn parse_feature(token: &str, line: u64) -> Result<(u32, Option<f32>), LibSvmError> {
    let (index, value) = token.split_once(':').unwrap_or((token, ""));
    let index = index
        .parse::<u32>()
        .map_err(|_| LibSvmError::parse(line, format!("invalid feature index `{index}`")))?;
    let value = if value.is_empty() {
        None
    } else {
        Some(parse_f32(value, line, "feature value")?)
    };
    Ok((index, value))
}

fn parse_f32(token: &str, line: u64, what: &str) -> Result<f32, LibSvmError> {
    token
        .parse::<f32>()
        .map_err(|_| LibSvmError::parse(line, format!("invalid {what} `{token}`")))
}
