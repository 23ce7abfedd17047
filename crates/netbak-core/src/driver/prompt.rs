//! Prompt-driven CLI session over any blocking byte transport.
//!
//! Network device shells have no framing: a command is done when the prompt
//! comes back. `PromptSession` keeps the current base prompt, strips command
//! echo and the trailing prompt from replies, answers pager markers, and copies
//! everything the device sends into an optional transcript.

use std::io::{self, Read, Write};
use std::time::{Duration, Instant};

use super::Session;
use crate::error::BackupError;

const READ_CHUNK: usize = 16 * 1024;
/// Output must be quiet this long before the last line is taken as the prompt.
const DEFAULT_SETTLE: Duration = Duration::from_millis(300);
const IDLE_SLEEP: Duration = Duration::from_millis(10);

/// CLI session on top of a blocking transport (an SSH shell channel in production).
///
/// Reads returning `WouldBlock`/`TimedOut` are treated as "nothing yet"; a read
/// of zero bytes means the device closed the session.
pub struct PromptSession<T> {
    transport: T,
    address: String,
    transcript: Option<Box<dyn Write + Send>>,
    command_timeout: Duration,
    settle: Duration,
    base_prompt: Option<String>,
    decoder: StreamDecoder,
}

impl<T: Read + Write + Send> PromptSession<T> {
    pub fn new(transport: T, address: impl Into<String>, command_timeout: Duration) -> Self {
        Self {
            transport,
            address: address.into(),
            transcript: None,
            command_timeout,
            settle: DEFAULT_SETTLE,
            base_prompt: None,
            decoder: StreamDecoder::default(),
        }
    }

    /// Copy all device output into `sink`.
    pub fn with_transcript(mut self, sink: impl Write + Send + 'static) -> Self {
        self.transcript = Some(Box::new(sink));
        self
    }

    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    /// Prompt the session currently waits for at the end of a command.
    pub fn base_prompt(&self) -> Option<&str> {
        self.base_prompt.as_deref()
    }

    fn connection_error(&self, e: io::Error) -> BackupError {
        BackupError::Connection {
            address: self.address.clone(),
            reason: e.to_string(),
        }
    }

    fn write_raw(&mut self, data: &str) -> Result<(), BackupError> {
        let res = self
            .transport
            .write_all(data.as_bytes())
            .and_then(|_| self.transport.flush());
        res.map_err(|e| self.connection_error(e))
    }

    fn write_line(&mut self, command: &str) -> Result<(), BackupError> {
        self.write_raw(&format!("{command}\n"))
    }

    /// One read. `Ok(None)` when nothing is pending.
    fn read_chunk(&mut self) -> Result<Option<String>, BackupError> {
        let mut buf = [0u8; READ_CHUNK];
        match self.transport.read(&mut buf) {
            Ok(0) => Err(BackupError::Connection {
                address: self.address.clone(),
                reason: "session closed by device".into(),
            }),
            Ok(n) => {
                if let Some(t) = self.transcript.as_mut() {
                    // Transcript is best effort; losing it must not fail the backup.
                    let _ = t.write_all(&buf[..n]).and_then(|_| t.flush());
                }
                Ok(Some(self.decoder.push(&buf[..n])))
            }
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
                ) =>
            {
                Ok(None)
            }
            Err(e) => Err(self.connection_error(e)),
        }
    }

    /// Read until `done(buffer)` holds or `deadline` passes. Returns the buffer
    /// and whether `done` was satisfied.
    fn read_until<F>(
        &mut self,
        deadline: Instant,
        more_pattern: Option<&str>,
        mut done: F,
    ) -> Result<(String, bool), BackupError>
    where
        F: FnMut(&str) -> bool,
    {
        let mut buf = String::new();
        loop {
            if done(&buf) {
                return Ok((buf, true));
            }
            if Instant::now() >= deadline {
                return Ok((buf, false));
            }
            match self.read_chunk()? {
                Some(text) => {
                    let appended_at = buf.len();
                    buf.push_str(&text);
                    if let Some(marker) = more_pattern {
                        if strip_marker(&mut buf, appended_at, marker) {
                            self.write_raw(" ")?;
                        }
                    }
                }
                None => std::thread::sleep(IDLE_SLEEP),
            }
        }
    }
}

impl<T: Read + Write + Send> Session for PromptSession<T> {
    fn find_prompt(&mut self) -> Result<String, BackupError> {
        self.write_line("")?;
        let deadline = Instant::now() + self.command_timeout;
        let mut buf = String::new();
        let mut last_data = Instant::now();
        loop {
            match self.read_chunk()? {
                Some(text) => {
                    buf.push_str(&text);
                    last_data = Instant::now();
                }
                None => {
                    if last_line(&buf).is_some() && last_data.elapsed() >= self.settle {
                        break;
                    }
                    if Instant::now() >= deadline {
                        break;
                    }
                    std::thread::sleep(IDLE_SLEEP);
                }
            }
        }
        let prompt = last_line(&buf).ok_or_else(|| BackupError::Protocol {
            command: "<enter>".into(),
            expected: "any prompt".into(),
        })?;
        tracing::debug!(address = %self.address, prompt = %prompt, "found prompt");
        self.base_prompt = Some(prompt.clone());
        Ok(prompt)
    }

    fn send_expect(
        &mut self,
        command: &str,
        expect: &str,
        timeout: Duration,
    ) -> Result<String, BackupError> {
        self.write_line(command)?;
        let deadline = Instant::now() + timeout;
        let (buf, matched) =
            self.read_until(deadline, None, |b| after_echo(b, command).contains(expect))?;
        if !matched {
            return Err(BackupError::Protocol {
                command: command.to_string(),
                expected: expect.to_string(),
            });
        }
        let reply = after_echo(&buf, command);
        if let Some(line) = last_line(reply).filter(|l| l.contains(expect)) {
            self.base_prompt = Some(line);
        }
        Ok(reply.to_string())
    }

    fn send_command(
        &mut self,
        command: &str,
        timeout: Duration,
        more_pattern: Option<&str>,
    ) -> Result<String, BackupError> {
        let prompt = match self.base_prompt.clone() {
            Some(p) => p,
            None => self.find_prompt()?,
        };
        self.write_line(command)?;
        let deadline = Instant::now() + timeout;
        let (buf, done) = self.read_until(deadline, more_pattern, |b| {
            after_echo(b, command).trim_end().ends_with(prompt.as_str())
        })?;
        if !done {
            return Err(BackupError::Timeout {
                command: command.to_string(),
                timeout,
            });
        }
        let reply = after_echo(&buf, command).trim_end();
        let body = reply.strip_suffix(prompt.as_str()).unwrap_or(reply);
        Ok(body.trim_matches('\n').trim_end().to_string())
    }

    fn command_timeout(&self) -> Duration {
        self.command_timeout
    }
}

/// Turns the raw byte stream into text. A UTF-8 sequence or ANSI escape cut
/// by a read boundary is held back until the rest of it arrives.
#[derive(Debug, Default)]
struct StreamDecoder {
    carry: Vec<u8>,
}

impl StreamDecoder {
    fn push(&mut self, bytes: &[u8]) -> String {
        self.carry.extend_from_slice(bytes);
        let mut text = String::new();
        let mut rest: &[u8] = &self.carry;
        while !rest.is_empty() {
            match std::str::from_utf8(rest) {
                Ok(s) => {
                    text.push_str(s);
                    rest = &[];
                }
                Err(e) => {
                    let (valid, after) = rest.split_at(e.valid_up_to());
                    text.push_str(&String::from_utf8_lossy(valid));
                    match e.error_len() {
                        Some(bad) => {
                            text.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[bad..];
                        }
                        // Incomplete sequence at the end.
                        None => break,
                    }
                }
            }
        }
        let mut carry = rest.to_vec();
        if let Some(at) = incomplete_escape(&text) {
            let mut held = text.split_off(at).into_bytes();
            held.extend_from_slice(&carry);
            carry = held;
        }
        self.carry = carry;
        normalize(&text)
    }
}

/// Start of a trailing ESC or CSI sequence that has not seen its final byte.
fn incomplete_escape(text: &str) -> Option<usize> {
    let at = text.rfind('\u{1b}')?;
    let tail = &text[at + 1..];
    let open = match tail.strip_prefix('[') {
        Some(params) => !params.chars().any(|c| ('@'..='~').contains(&c)),
        None => tail.is_empty(),
    };
    open.then_some(at)
}

/// Drop carriage returns and ANSI CSI sequences (pagers use them to erase their marker).
fn normalize(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\r' => {}
            '\u{1b}' if chars.peek() == Some(&'[') => {
                chars.next();
                // Parameters and intermediates, then one final byte in @..~.
                for n in chars.by_ref() {
                    if ('@'..='~').contains(&n) {
                        break;
                    }
                }
            }
            _ => out.push(c),
        }
    }
    out
}

/// Remove occurrences of `marker` from the part of `buf` appended at
/// `appended_at` (plus enough earlier bytes to catch a split marker).
/// True if any was found.
fn strip_marker(buf: &mut String, appended_at: usize, marker: &str) -> bool {
    if marker.is_empty() {
        return false;
    }
    let mut from = appended_at.saturating_sub(marker.len() - 1);
    while !buf.is_char_boundary(from) {
        from -= 1;
    }
    if !buf[from..].contains(marker) {
        return false;
    }
    let tail = buf.split_off(from);
    buf.push_str(&tail.replace(marker, ""));
    true
}

fn last_line(s: &str) -> Option<String> {
    s.lines()
        .rev()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(str::to_string)
}

/// Part of `buf` after the echoed command line. The echo may be preceded by
/// the prompt or the question it answers, so only the end of the first line is compared.
fn after_echo<'a>(buf: &'a str, command: &str) -> &'a str {
    let command = command.trim();
    match buf.split_once('\n') {
        Some((first, rest)) if first.trim_end().ends_with(command) => rest,
        Some(_) => buf,
        None if buf.trim_end().ends_with(command) => "",
        None => buf,
    }
}
