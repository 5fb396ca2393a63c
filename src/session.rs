//! The single active node session and its lifecycle.
//!
//! At most one session exists at a time: one node bound to one live
//! transport, plus the per-interface impairment state cache. A node switch
//! tears the old transport down before dialing the new node and is
//! all-or-nothing; any failure after teardown leaves the manager with no
//! session rather than a half-initialized one.
//!
//! Every mutating operation re-fetches and re-parses the interface status
//! afterwards; the re-fetch, not the issued command, is the source of truth
//! for the cache. A failed operation leaves the cache untouched.

use std::collections::HashMap;

use thiserror::Error;
use tracing::info;

use crate::command::{self, TcOp};
use crate::config::Config;
use crate::status::{self, ImpairmentState, ParseError};
use crate::transport::{self, Dialer, ExecError, Transport};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("unknown node '{0}'")]
    UnknownNode(String),
    #[error("cannot connect to '{addr}': {source}")]
    ConnectError {
        addr: String,
        #[source]
        source: ExecError,
    },
    #[error("unknown interface '{0}' on the active node")]
    UnknownInterface(String),
    #[error("no active session; select a node first")]
    NotConnected,
    #[error(transparent)]
    Exec(#[from] ExecError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// One node bound to one live transport.
pub struct Session {
    node_name: String,
    default_interface: String,
    current: String,
    interfaces: Vec<String>,
    states: HashMap<String, ImpairmentState>,
    transport: Box<dyn Transport>,
}

impl Session {
    pub fn node_name(&self) -> &str {
        &self.node_name
    }

    pub fn default_interface(&self) -> &str {
        &self.default_interface
    }

    /// The interface that `delay`/`loss` operations act on.
    pub fn current_interface(&self) -> &str {
        &self.current
    }

    pub fn interfaces(&self) -> &[String] {
        &self.interfaces
    }

    /// Last confirmed state of one interface.
    pub fn state(&self, interface: &str) -> Option<ImpairmentState> {
        self.states.get(interface).copied()
    }

    /// All cached states in interface-list order.
    pub fn snapshot(&self) -> Vec<(String, ImpairmentState)> {
        self.interfaces
            .iter()
            .map(|interface| {
                (
                    interface.clone(),
                    self.states.get(interface).copied().unwrap_or_default(),
                )
            })
            .collect()
    }

    /// Select the interface that subsequent `delay`/`loss` operations act
    /// on, refreshing its state.
    pub fn select_interface(&mut self, name: &str) -> Result<ImpairmentState, SessionError> {
        self.check_interface(name)?;
        let state = self.fetch(name)?;
        self.current = name.to_string();
        Ok(state)
    }

    pub fn set_delay(&mut self, ms: u32) -> Result<ImpairmentState, SessionError> {
        let interface = self.current.clone();
        self.apply(&interface, TcOp::SetDelay(ms))
    }

    pub fn set_loss(&mut self, percent: u32) -> Result<ImpairmentState, SessionError> {
        let interface = self.current.clone();
        self.apply(&interface, TcOp::SetLoss(percent))
    }

    /// Remove impairments from one interface. The delete is issued even if
    /// the cache says the interface is already clear; any remote rejection
    /// surfaces as an error.
    pub fn clear(&mut self, interface: &str) -> Result<ImpairmentState, SessionError> {
        self.check_interface(interface)?;
        self.apply(interface, TcOp::Clear)
    }

    /// Clear every interface, sequentially in list order.
    pub fn clear_all(&mut self) -> Result<Vec<(String, ImpairmentState)>, SessionError> {
        let interfaces = self.interfaces.clone();
        let mut results = Vec::with_capacity(interfaces.len());
        for interface in interfaces {
            let state = self.apply(&interface, TcOp::Clear)?;
            results.push((interface, state));
        }
        Ok(results)
    }

    /// Re-fetch the status of one interface.
    pub fn status(&mut self, interface: &str) -> Result<ImpairmentState, SessionError> {
        self.check_interface(interface)?;
        self.fetch(interface)
    }

    /// Re-fetch every interface, sequentially in list order.
    pub fn status_all(&mut self) -> Result<Vec<(String, ImpairmentState)>, SessionError> {
        let interfaces = self.interfaces.clone();
        let mut results = Vec::with_capacity(interfaces.len());
        for interface in interfaces {
            let state = self.fetch(&interface)?;
            results.push((interface, state));
        }
        Ok(results)
    }

    fn check_interface(&self, name: &str) -> Result<(), SessionError> {
        if self.interfaces.iter().any(|i| i == name) {
            Ok(())
        } else {
            Err(SessionError::UnknownInterface(name.to_string()))
        }
    }

    /// Synthesize from the cached state, execute, then confirm by re-fetch.
    fn apply(&mut self, interface: &str, op: TcOp) -> Result<ImpairmentState, SessionError> {
        let current = self.states.get(interface).copied().unwrap_or_default();
        let cmd = command::synthesize(op, &current, interface);
        transport::run(self.transport.as_mut(), &cmd)?;
        self.fetch(interface)
    }

    fn fetch(&mut self, interface: &str) -> Result<ImpairmentState, SessionError> {
        let state = fetch_state(self.transport.as_mut(), interface)?;
        self.states.insert(interface.to_string(), state);
        Ok(state)
    }
}

fn fetch_state(
    transport: &mut dyn Transport,
    interface: &str,
) -> Result<ImpairmentState, SessionError> {
    let raw = transport::run(transport, &command::status_query(interface))?;
    let state = status::parse_status(&raw)?;
    info!(interface, %state, "impairment status");
    Ok(state)
}

/// Owns the at-most-one active session and performs node switches.
pub struct Manager {
    config: Config,
    dialer: Box<dyn Dialer>,
    session: Option<Session>,
}

impl Manager {
    pub fn new(config: Config, dialer: Box<dyn Dialer>) -> Self {
        Self {
            config,
            dialer,
            session: None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// The active session, or [`SessionError::NotConnected`].
    pub fn session_mut(&mut self) -> Result<&mut Session, SessionError> {
        self.session.as_mut().ok_or(SessionError::NotConnected)
    }

    /// Switch the active node.
    ///
    /// An unknown node name is rejected before any teardown, leaving the
    /// current session untouched. Once teardown has happened, any failure
    /// (connect, fetch, parse) leaves the manager in the no-session state.
    pub fn switch_node(&mut self, name: &str) -> Result<(), SessionError> {
        let node = self
            .config
            .node(name)
            .cloned()
            .ok_or_else(|| SessionError::UnknownNode(name.to_string()))?;

        // Teardown first: at most one live transport at any time. Dropping
        // the old session closes its transport; dropping nothing is fine.
        if self.session.take().is_some() {
            info!("closed previous session");
        }

        let mut transport =
            self.dialer
                .dial(&node)
                .map_err(|source| SessionError::ConnectError {
                    addr: node.addr.clone(),
                    source,
                })?;

        let mut states = HashMap::new();
        for interface in &node.interfaces {
            let state = fetch_state(transport.as_mut(), interface)?;
            states.insert(interface.clone(), state);
        }

        info!(node = name, default_interface = %node.default_interface, "session established");
        self.session = Some(Session {
            node_name: name.to_string(),
            current: node.default_interface.clone(),
            default_interface: node.default_interface,
            interfaces: node.interfaces,
            states,
            transport,
        });
        Ok(())
    }
}
