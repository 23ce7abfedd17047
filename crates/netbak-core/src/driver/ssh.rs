//! SSH session driver (libssh2 via the `ssh2` crate).
//!
//! Opens an interactive PTY shell, since most device CLIs only behave
//! (prompts, pagers, confirmation questions) on a terminal.

use std::fs::File;
use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::PathBuf;
use std::time::Duration;

use super::{PromptSession, Session, SessionDriver};
use crate::error::BackupError;
use crate::inventory::DeviceDescriptor;

/// How long a single channel read may block before the prompt loop re-checks its deadline.
const READ_POLL: Duration = Duration::from_millis(500);
const PTY_COLS: u32 = 256;
const PTY_ROWS: u32 = 48;

/// Connection settings shared by every session of a run.
#[derive(Debug, Clone)]
pub struct SshDriverSettings {
    pub port: u16,
    pub connect_timeout: Duration,
    pub command_timeout: Duration,
    /// Directory for `{platform}-{role}-{address}-session.log` transcripts; `None` disables them.
    pub transcript_dir: Option<PathBuf>,
}

impl Default for SshDriverSettings {
    fn default() -> Self {
        Self {
            port: 22,
            connect_timeout: Duration::from_secs(30),
            command_timeout: Duration::from_secs(60),
            transcript_dir: None,
        }
    }
}

/// Production `SessionDriver`: password-authenticated SSH shell per device.
#[derive(Debug, Clone, Default)]
pub struct SshDriver {
    settings: SshDriverSettings,
}

impl SshDriver {
    pub fn new(settings: SshDriverSettings) -> Self {
        Self { settings }
    }

    /// Transcript path for `device`, if transcripts are enabled.
    pub fn transcript_path(&self, device: &DeviceDescriptor) -> Option<PathBuf> {
        self.settings
            .transcript_dir
            .as_ref()
            .map(|dir| dir.join(format!("{}-session.log", device.stem())))
    }

    fn open_shell(&self, device: &DeviceDescriptor) -> Result<ssh2::Channel, BackupError> {
        let fail = |reason: String| BackupError::Connection {
            address: device.address.clone(),
            reason,
        };

        let addr = (device.address.as_str(), self.settings.port)
            .to_socket_addrs()
            .map_err(|e| fail(format!("resolve: {e}")))?
            .next()
            .ok_or_else(|| fail("address resolved to nothing".into()))?;
        let tcp = TcpStream::connect_timeout(&addr, self.settings.connect_timeout)
            .map_err(|e| fail(format!("tcp connect: {e}")))?;

        let mut session = ssh2::Session::new().map_err(|e| fail(e.to_string()))?;
        session.set_timeout(timeout_ms(self.settings.connect_timeout));
        session.set_tcp_stream(tcp);
        session
            .handshake()
            .map_err(|e| fail(format!("handshake: {e}")))?;
        session
            .userauth_password(&device.username, &device.password)
            .map_err(|e| fail(format!("auth: {e}")))?;
        if !session.authenticated() {
            return Err(fail("authentication rejected".into()));
        }

        let mut channel = session
            .channel_session()
            .map_err(|e| fail(format!("open channel: {e}")))?;
        channel
            .request_pty("vt100", None, Some((PTY_COLS, PTY_ROWS, 0, 0)))
            .map_err(|e| fail(format!("request pty: {e}")))?;
        channel.shell().map_err(|e| fail(format!("start shell: {e}")))?;
        session.set_timeout(timeout_ms(READ_POLL));
        Ok(channel)
    }
}

impl SessionDriver for SshDriver {
    fn connect(&self, device: &DeviceDescriptor) -> Result<Box<dyn Session>, BackupError> {
        let channel = self.open_shell(device)?;
        tracing::debug!(address = %device.address, "ssh shell open");
        let session = PromptSession::new(
            ShellChannel(channel),
            device.address.clone(),
            self.settings.command_timeout,
        );
        match self.open_transcript(device) {
            Some(file) => Ok(Box::new(session.with_transcript(file))),
            None => Ok(Box::new(session)),
        }
    }
}

impl SshDriver {
    /// Truncate-and-open the device's transcript. Best effort: the backup goes
    /// on without a transcript if the file cannot be created.
    fn open_transcript(&self, device: &DeviceDescriptor) -> Option<File> {
        let path = self.transcript_path(device)?;
        match File::create(&path) {
            Ok(file) => Some(file),
            Err(e) => {
                tracing::warn!(
                    address = %device.address,
                    path = %path.display(),
                    error = %e,
                    "cannot create session transcript, continuing without it"
                );
                None
            }
        }
    }
}

/// Shell channel as a plain byte transport.
struct ShellChannel(ssh2::Channel);

impl Read for ShellChannel {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.0.read(buf)
    }
}

impl Write for ShellChannel {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.0.flush()
    }
}

impl Drop for ShellChannel {
    fn drop(&mut self) {
        let _ = self.0.send_eof();
        let _ = self.0.close();
    }
}

fn timeout_ms(d: Duration) -> u32 {
    u32::try_from(d.as_millis()).unwrap_or(u32::MAX)
}
