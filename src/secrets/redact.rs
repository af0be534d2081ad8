//! Streaming secret redaction.

use std::io::{self, Write};

use super::set::SecretSet;

/// Replacement written in place of every secret.
pub const REDACTED: &str = "[REDACTED]";

/// A writer that replaces secret values before forwarding to `inner`.
///
/// Matches may span any number of `write` calls: bytes that could still be
/// the start of a secret are held back until the next write decides them.
/// Call [`RedactingWriter::close`] (or [`RedactingWriter::finish`]) at end of
/// stream to forward the held tail.
///
/// When several secrets start at the same position, the longest wins.
/// Overlapping matches are merged into one span, so no part of either secret
/// is forwarded. A span covering several lines is replaced by one marker per
/// line, so the line structure of the output is preserved.
///
/// # Example
///
/// ```
/// use runway::secrets::{RedactingWriter, SecretSet};
/// use std::io::Write;
///
/// let secrets = SecretSet::new(["ABC123"]);
/// let mut writer = RedactingWriter::new(&secrets, Vec::new());
/// write!(writer, "tok").unwrap();
/// write!(writer, "en=ABC").unwrap();
/// write!(writer, "123").unwrap();
///
/// let output = writer.finish().unwrap();
/// assert_eq!(String::from_utf8(output).unwrap(), "token=[REDACTED]");
/// ```
#[derive(Debug)]
pub struct RedactingWriter<W: Write> {
    inner: W,
    secrets: Vec<Vec<u8>>,
    pending: Vec<u8>,
}

impl<W: Write> RedactingWriter<W> {
    /// Wrap `inner`, redacting every value in `secrets`.
    pub fn new(secrets: &SecretSet, inner: W) -> Self {
        Self {
            inner,
            secrets: secrets.iter().map(|s| s.as_bytes().to_vec()).collect(),
            pending: Vec::with_capacity(secrets.max_len()),
        }
    }

    /// Forward the held tail verbatim.
    pub fn close(&mut self) -> io::Result<()> {
        self.drain(true)?;
        self.inner.flush()
    }

    /// Forward the held tail and return the inner writer.
    pub fn finish(mut self) -> io::Result<W> {
        self.close()?;
        Ok(self.inner)
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Number of bytes currently held back.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    fn drain(&mut self, at_end: bool) -> io::Result<()> {
        let (out, consumed) = scan(&self.secrets, &self.pending, at_end);
        self.inner.write_all(&out)?;
        self.pending.drain(..consumed);
        Ok(())
    }
}

impl<W: Write> Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.secrets.is_empty() {
            self.inner.write_all(buf)?;
            return Ok(buf.len());
        }

        self.pending.extend_from_slice(buf);
        self.drain(false)?;
        Ok(buf.len())
    }

    /// Flushes the inner writer. Held bytes stay held; see [`RedactingWriter::close`].
    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Redact a complete buffer.
pub(crate) fn redact_bytes(secrets: &SecretSet, input: &[u8]) -> Vec<u8> {
    let secrets: Vec<&[u8]> = secrets.iter().map(|s| s.as_bytes()).collect();
    scan(&secrets, input, true).0
}

/// Redact as much of `buffer` as can be decided.
///
/// Returns the output bytes and how many input bytes they cover. Unless
/// `at_end`, scanning stops at the first position whose remainder is a
/// strict prefix of some secret, or whose match could still be extended by
/// a secret that has not fully arrived.
fn scan<S: AsRef<[u8]>>(secrets: &[S], buffer: &[u8], at_end: bool) -> (Vec<u8>, usize) {
    let mut out = Vec::with_capacity(buffer.len());
    let mut pos = 0;

    while pos < buffer.len() {
        let rest = &buffer[pos..];

        if !at_end && could_complete(secrets, rest) {
            break;
        }

        match longest_match(secrets, rest) {
            Some(secret) => match match_end(secrets, buffer, pos, pos + secret.len(), at_end) {
                Some(end) => {
                    push_marker(&mut out, &buffer[pos..end]);
                    pos = end;
                }
                None => break,
            },
            None => {
                out.push(rest[0]);
                pos += 1;
            }
        }
    }

    (out, pos)
}

/// Grow a match at `start` over every secret that begins inside it.
///
/// Returns `None` when an overlapping secret might still complete in a
/// later write.
fn match_end<S: AsRef<[u8]>>(
    secrets: &[S],
    buffer: &[u8],
    start: usize,
    mut end: usize,
    at_end: bool,
) -> Option<usize> {
    let mut pos = start + 1;
    while pos < end {
        let rest = &buffer[pos..];
        if !at_end && could_complete(secrets, rest) {
            return None;
        }
        if let Some(secret) = longest_match(secrets, rest) {
            end = end.max(pos + secret.len());
        }
        pos += 1;
    }
    Some(end)
}

fn could_complete<S: AsRef<[u8]>>(secrets: &[S], rest: &[u8]) -> bool {
    secrets.iter().any(|secret| {
        let secret = secret.as_ref();
        secret.len() > rest.len() && secret.starts_with(rest)
    })
}

fn longest_match<'a, S: AsRef<[u8]>>(secrets: &'a [S], rest: &[u8]) -> Option<&'a [u8]> {
    secrets
        .iter()
        .map(|secret| secret.as_ref())
        .filter(|secret| rest.starts_with(secret))
        .max_by_key(|secret| secret.len())
}

fn push_marker(out: &mut Vec<u8>, span: &[u8]) {
    // a trailing newline ends the span's last line, it does not open a new one
    let body = &span[..span.len() - 1];
    let lines = body.iter().filter(|&&b| b == b'\n').count();

    out.extend_from_slice(REDACTED.as_bytes());
    for _ in 0..lines {
        out.push(b'\n');
        out.extend_from_slice(REDACTED.as_bytes());
    }
}
