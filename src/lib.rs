//! Remote impairment control library.
//!
//! Manages artificial delay and packet loss on the network interfaces of
//! remote nodes by driving `tc netem` over an SSH session. The engine keeps a
//! per-interface state cache derived from `tc qdisc show` output and
//! synthesizes the minimal correct `tc` command for each requested change
//! (`add` for a pristine interface, `change` re-stating the untouched
//! dimension otherwise, `delete` to clear).

pub mod command;
pub mod config;
pub mod session;
pub mod shell;
pub mod status;
pub mod transport;

// Re-export commonly used items
pub use command::{synthesize, TcOp};
pub use config::{Config, Node};
pub use session::{Manager, Session};
pub use status::{parse_status, ImpairmentState};
pub use transport::{SshDialer, SshTransport, Transport};
