//! Line classification for the server-sent event stream.

/// One line of an event stream, without its line terminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SseLine<'a> {
    /// Frame separator.
    Blank,
    /// `:` comment, usually a keep-alive.
    Comment(&'a str),
    /// `data:` payload.
    Data(&'a str),
    /// Any other `field: value` line (`event`, `id`, `retry`, ...).
    Field { name: &'a str, value: &'a str },
}

/// Classifies a raw line as read from the stream.
pub(crate) fn parse_line(raw: &str) -> SseLine<'_> {
    let line = raw.trim_end_matches(['\n', '\r']);
    if line.trim().is_empty() {
        return SseLine::Blank;
    }
    if let Some(comment) = line.strip_prefix(':') {
        return SseLine::Comment(comment.trim_start());
    }

    let (name, value) = match line.split_once(':') {
        Some((name, value)) => (name, value.strip_prefix(' ').unwrap_or(value)),
        None => (line, ""),
    };
    if name == "data" {
        SseLine::Data(value)
    } else {
        SseLine::Field { name, value }
    }
}
