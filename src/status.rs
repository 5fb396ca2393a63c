//! Parsing of `tc qdisc show` output into structured impairment state.
//!
//! Two shapes are recognized: the default `pfifo_fast` root qdisc (no
//! impairments) and a `netem` root qdisc with a queue limit and optional
//! `delay`/`loss` clauses. Anything else is a hard parse failure; the engine
//! never guesses or silently defaults the state of an interface.

use std::fmt;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    /// The text matched neither the pfifo_fast nor the netem qdisc shape.
    #[error("unrecognized qdisc status text: {0:?}")]
    UnrecognizedFormat(String),
}

/// Impairment state of one interface, replaced wholesale on every refresh.
///
/// A dimension is active exactly when its `Option` is `Some`; both `None`
/// means the interface is clear. `queue_limit` is only meaningful while a
/// netem qdisc is installed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImpairmentState {
    pub delay_ms: Option<u32>,
    pub loss_percent: Option<u32>,
    pub queue_limit: Option<u32>,
}

impl ImpairmentState {
    /// True when neither delay nor loss is active.
    pub fn is_clear(&self) -> bool {
        self.delay_ms.is_none() && self.loss_percent.is_none()
    }

    pub fn has_delay(&self) -> bool {
        self.delay_ms.is_some()
    }

    pub fn has_loss(&self) -> bool {
        self.loss_percent.is_some()
    }
}

impl fmt::Display for ImpairmentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(limit) = self.queue_limit else {
            return write!(f, "no impairments");
        };
        write!(f, "limit {limit}")?;
        if let Some(ms) = self.delay_ms {
            write!(f, " delay {ms}ms")?;
        }
        if let Some(pct) = self.loss_percent {
            write!(f, " loss {pct}%")?;
        }
        if self.is_clear() {
            write!(f, " (no delay or loss)")?;
        }
        Ok(())
    }
}

/// Parse the output of `tc qdisc show dev <iface>`.
///
/// The scan is token-based. The netem header is matched positionally
/// (`qdisc netem <id>: root refcnt <n> limit <l>`); after the limit the
/// `delay <int>.0ms` and `loss <int>%` clauses are searched independently,
/// in any order.
pub fn parse_status(raw: &str) -> Result<ImpairmentState, ParseError> {
    let unrecognized = || ParseError::UnrecognizedFormat(raw.trim().to_string());

    let mut tokens = raw.split_whitespace();
    if tokens.next() != Some("qdisc") {
        return Err(unrecognized());
    }

    match tokens.next() {
        Some("pfifo_fast") => {
            let header_ok = tokens.next().is_some_and(is_handle)
                && tokens.next() == Some("root")
                && tokens.next() == Some("refcnt");
            if !header_ok {
                return Err(unrecognized());
            }
            Ok(ImpairmentState::default())
        }
        Some("netem") => {
            let header_ok = tokens.next().is_some_and(is_handle)
                && tokens.next() == Some("root")
                && tokens.next() == Some("refcnt")
                && tokens.next().is_some_and(is_integer)
                && tokens.next() == Some("limit");
            if !header_ok {
                return Err(unrecognized());
            }
            let Some(limit) = tokens.next().and_then(|t| t.parse::<u32>().ok()) else {
                return Err(unrecognized());
            };

            let mut state = ImpairmentState {
                queue_limit: Some(limit),
                ..Default::default()
            };

            // delay and loss clauses are independent and order-insensitive
            let rest: Vec<&str> = tokens.collect();
            for pair in rest.windows(2) {
                match pair[0] {
                    "delay" => {
                        if let Some(ms) = parse_delay_value(pair[1]) {
                            state.delay_ms = Some(ms);
                        }
                    }
                    "loss" => {
                        if let Some(pct) = parse_loss_value(pair[1]) {
                            state.loss_percent = Some(pct);
                        }
                    }
                    _ => {}
                }
            }
            Ok(state)
        }
        _ => Err(unrecognized()),
    }
}

/// A qdisc handle token: one or more digits followed by ':', e.g. `8001:`.
fn is_handle(token: &str) -> bool {
    token
        .strip_suffix(':')
        .is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
}

fn is_integer(token: &str) -> bool {
    !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit())
}

/// netem prints whole-millisecond delays as `<int>.0ms`.
fn parse_delay_value(token: &str) -> Option<u32> {
    token.strip_suffix(".0ms")?.parse().ok()
}

fn parse_loss_value(token: &str) -> Option<u32> {
    token.strip_suffix('%')?.parse().ok()
}
