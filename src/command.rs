//! Synthesis of `tc` command strings from requested impairment changes.
//!
//! The remote subsystem distinguishes creating a root netem qdisc (`add`)
//! from mutating an existing one (`change`), and a `change` silently drops
//! any dimension not re-stated. The synthesizer therefore re-emits every
//! currently-active dimension other than the one being set.

use crate::status::ImpairmentState;

/// A requested impairment change for one interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TcOp {
    /// Set the delay in whole milliseconds.
    SetDelay(u32),
    /// Set the packet loss percentage.
    SetLoss(u32),
    /// Remove the netem qdisc entirely.
    Clear,
}

/// Build the exact `tc` command for `op` given the interface's current state.
///
/// `add` is used only when the interface has neither delay nor loss;
/// otherwise `change`. Dimensions are emitted in canonical order (delay,
/// then loss). `Clear` always issues an unconditional delete. Values are
/// passed through without range validation; the remote side rejects bad ones.
pub fn synthesize(op: TcOp, current: &ImpairmentState, interface: &str) -> String {
    match op {
        TcOp::Clear => format!("tc qdisc delete dev {interface} root"),
        TcOp::SetDelay(_) | TcOp::SetLoss(_) => {
            let verb = if current.is_clear() { "add" } else { "change" };

            let delay_ms = match op {
                TcOp::SetDelay(ms) => Some(ms),
                _ => current.delay_ms,
            };
            let loss_percent = match op {
                TcOp::SetLoss(pct) => Some(pct),
                _ => current.loss_percent,
            };

            let mut cmd = format!("tc qdisc {verb} dev {interface} root netem");
            if let Some(ms) = delay_ms {
                cmd.push_str(&format!(" delay {ms}ms"));
            }
            if let Some(pct) = loss_percent {
                cmd.push_str(&format!(" loss {pct}%"));
            }
            cmd
        }
    }
}

/// Build the status query for one interface.
pub fn status_query(interface: &str) -> String {
    format!("tc qdisc show dev {interface}")
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLEAR: ImpairmentState = ImpairmentState {
        delay_ms: None,
        loss_percent: None,
        queue_limit: None,
    };

    fn delay_only(ms: u32) -> ImpairmentState {
        ImpairmentState {
            delay_ms: Some(ms),
            loss_percent: None,
            queue_limit: Some(1000),
        }
    }

    fn loss_only(pct: u32) -> ImpairmentState {
        ImpairmentState {
            delay_ms: None,
            loss_percent: Some(pct),
            queue_limit: Some(1000),
        }
    }

    fn delay_and_loss(ms: u32, pct: u32) -> ImpairmentState {
        ImpairmentState {
            delay_ms: Some(ms),
            loss_percent: Some(pct),
            queue_limit: Some(1000),
        }
    }

    #[test]
    fn test_set_delay_table() {
        assert_eq!(
            synthesize(TcOp::SetDelay(100), &CLEAR, "eth0"),
            "tc qdisc add dev eth0 root netem delay 100ms"
        );
        assert_eq!(
            synthesize(TcOp::SetDelay(200), &delay_only(100), "eth0"),
            "tc qdisc change dev eth0 root netem delay 200ms"
        );
        assert_eq!(
            synthesize(TcOp::SetDelay(100), &loss_only(10), "eth0"),
            "tc qdisc change dev eth0 root netem delay 100ms loss 10%"
        );
        assert_eq!(
            synthesize(TcOp::SetDelay(200), &delay_and_loss(100, 10), "eth0"),
            "tc qdisc change dev eth0 root netem delay 200ms loss 10%"
        );
    }

    #[test]
    fn test_set_loss_table() {
        assert_eq!(
            synthesize(TcOp::SetLoss(10), &CLEAR, "eth0"),
            "tc qdisc add dev eth0 root netem loss 10%"
        );
        assert_eq!(
            synthesize(TcOp::SetLoss(10), &delay_only(100), "eth0"),
            "tc qdisc change dev eth0 root netem delay 100ms loss 10%"
        );
        assert_eq!(
            synthesize(TcOp::SetLoss(20), &loss_only(10), "eth0"),
            "tc qdisc change dev eth0 root netem loss 20%"
        );
        assert_eq!(
            synthesize(TcOp::SetLoss(20), &delay_and_loss(100, 10), "eth0"),
            "tc qdisc change dev eth0 root netem delay 100ms loss 20%"
        );
    }

    #[test]
    fn test_clear_always_deletes() {
        for state in [CLEAR, delay_only(100), loss_only(10), delay_and_loss(100, 10)] {
            assert_eq!(
                synthesize(TcOp::Clear, &state, "eth1"),
                "tc qdisc delete dev eth1 root"
            );
        }
    }

    #[test]
    fn test_verb_follows_current_state() {
        // never `add` when a dimension is active, never `change` from clear
        for state in [delay_only(1), loss_only(1), delay_and_loss(1, 1)] {
            for op in [TcOp::SetDelay(5), TcOp::SetLoss(5)] {
                let cmd = synthesize(op, &state, "eth0");
                assert!(cmd.contains(" change "), "expected change in {cmd:?}");
            }
        }
        for op in [TcOp::SetDelay(5), TcOp::SetLoss(5)] {
            let cmd = synthesize(op, &CLEAR, "eth0");
            assert!(cmd.contains(" add "), "expected add in {cmd:?}");
        }
    }

    #[test]
    fn test_status_query() {
        assert_eq!(status_query("ens3"), "tc qdisc show dev ens3");
    }
}
