//! Remote command execution over SSH.
//!
//! One command is in flight at a time; each command runs on its own exec
//! channel of the single live SSH session. Any output on the remote stderr
//! stream marks the command as failed regardless of exit status, since a
//! `tc` mutation must never be assumed to have partially succeeded.

use std::io::Read;
use std::net::TcpStream;
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use crate::config::Node;

/// I/O timeout applied to the SSH session. The engine is strictly
/// sequential, so a hung transport call would otherwise block it forever.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum ExecError {
    /// The remote side wrote to stderr; the command is treated as failed
    /// regardless of its exit status.
    #[error("remote rejected `{command}`: {stderr}")]
    RemoteRejected { command: String, stderr: String },
    #[error("ssh error: {0}")]
    Ssh(#[from] ssh2::Error),
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),
}

/// Output streams captured from one remote command.
#[derive(Debug, Clone, Default)]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_status: i32,
}

/// A live remote-command channel to one node.
pub trait Transport {
    fn exec(&mut self, command: &str) -> Result<ExecOutput, ExecError>;
}

/// Opens a transport for a node. Split from the session manager so tests
/// can substitute a scripted transport.
pub trait Dialer {
    fn dial(&self, node: &Node) -> Result<Box<dyn Transport>, ExecError>;
}

/// Run `command`, surfacing any stderr output as [`ExecError::RemoteRejected`]
/// and returning stdout otherwise.
pub fn run(transport: &mut dyn Transport, command: &str) -> Result<String, ExecError> {
    debug!(%command, "exec");
    let output = transport.exec(command)?;
    if !output.stderr.trim().is_empty() {
        return Err(ExecError::RemoteRejected {
            command: command.to_string(),
            stderr: output.stderr.trim().to_string(),
        });
    }
    Ok(output.stdout)
}

/// Password-authenticated SSH transport. The session closes when the value
/// is dropped, so transport lifetime follows session ownership.
pub struct SshTransport {
    session: ssh2::Session,
}

impl SshTransport {
    pub fn connect(
        addr: &str,
        user: &str,
        password: &str,
        timeout: Duration,
    ) -> Result<Self, ExecError> {
        // Bare addresses default to the ssh port.
        let addr = if addr.contains(':') {
            addr.to_string()
        } else {
            format!("{addr}:22")
        };

        let tcp = TcpStream::connect(&addr)?;
        let mut session = ssh2::Session::new()?;
        session.set_tcp_stream(tcp);
        session.handshake()?;
        session.userauth_password(user, password)?;
        session.set_timeout(timeout.as_millis() as u32);

        debug!(%addr, %user, "ssh session established");
        Ok(Self { session })
    }
}

impl Transport for SshTransport {
    fn exec(&mut self, command: &str) -> Result<ExecOutput, ExecError> {
        let mut channel = self.session.channel_session()?;
        channel.exec(command)?;

        let mut stdout = String::new();
        channel.read_to_string(&mut stdout)?;
        let mut stderr = String::new();
        channel.stderr().read_to_string(&mut stderr)?;

        channel.wait_close()?;
        let exit_status = channel.exit_status()?;

        Ok(ExecOutput {
            stdout,
            stderr,
            exit_status,
        })
    }
}

/// Dials nodes with password SSH using their configured credentials.
pub struct SshDialer {
    timeout: Duration,
}

impl SshDialer {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for SshDialer {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl Dialer for SshDialer {
    fn dial(&self, node: &Node) -> Result<Box<dyn Transport>, ExecError> {
        let transport = SshTransport::connect(&node.addr, &node.user, &node.passwd, self.timeout)?;
        Ok(Box::new(transport))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Canned(ExecOutput);

    impl Transport for Canned {
        fn exec(&mut self, _command: &str) -> Result<ExecOutput, ExecError> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn test_run_returns_stdout() {
        let mut transport = Canned(ExecOutput {
            stdout: "qdisc pfifo_fast 0: root refcnt 2\n".to_string(),
            ..Default::default()
        });
        let out = run(&mut transport, "tc qdisc show dev eth0").unwrap();
        assert!(out.starts_with("qdisc pfifo_fast"));
    }

    #[test]
    fn test_any_stderr_is_a_failure() {
        // stderr wins even with a zero exit status
        let mut transport = Canned(ExecOutput {
            stdout: "partial\n".to_string(),
            stderr: "RTNETLINK answers: Operation not permitted\n".to_string(),
            exit_status: 0,
        });
        let err = run(&mut transport, "tc qdisc delete dev eth0 root").unwrap_err();
        match err {
            ExecError::RemoteRejected { command, stderr } => {
                assert_eq!(command, "tc qdisc delete dev eth0 root");
                assert_eq!(stderr, "RTNETLINK answers: Operation not permitted");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_whitespace_only_stderr_is_ok() {
        let mut transport = Canned(ExecOutput {
            stdout: "ok".to_string(),
            stderr: "\n".to_string(),
            exit_status: 0,
        });
        assert!(run(&mut transport, "tc qdisc show dev eth0").is_ok());
    }
}
