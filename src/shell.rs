//! Line-oriented interactive shell over the session manager.
//!
//! Failures of interactive operations are reported and the loop keeps
//! running with the cached state unchanged; only startup failures (handled
//! by the binary) are fatal. An empty line repeats the last command.

use std::io::{self, BufRead, Write};

use anyhow::Result;

use crate::session::Manager;

const HELP: &str = "\
commands:
  node <name>          switch to another configured node
  nodes                list configured nodes
  interface [name]     select an interface (default interface if omitted)
  delay <ms>           set delay on the selected interface
  loss <percent>       set packet loss on the selected interface
  clear [iface|all]    remove impairments (selected interface if omitted)
  status [iface|all]   show impairment status
  help                 show this help
  quit                 exit";

/// Read commands from stdin until EOF or `quit`.
pub fn run(manager: &mut Manager) -> io::Result<()> {
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    let mut last = String::new();

    loop {
        prompt(manager)?;
        let line = match lines.next() {
            Some(line) => line?,
            None => break, // EOF
        };

        let line = line.trim().to_string();
        let line = if line.is_empty() { last.clone() } else { line };
        if line.is_empty() {
            continue;
        }
        last.clone_from(&line);

        if !dispatch(manager, &line) {
            break;
        }
    }
    Ok(())
}

fn prompt(manager: &Manager) -> io::Result<()> {
    let interface = manager
        .session()
        .map(|s| s.current_interface())
        .unwrap_or("-");
    print!("impairctl({interface}): ");
    io::stdout().flush()
}

/// Execute one command line. Returns false when the shell should exit.
pub fn dispatch(manager: &mut Manager, line: &str) -> bool {
    let mut parts = line.split_whitespace();
    let Some(cmd) = parts.next() else {
        return true;
    };
    let arg = parts.next();

    let result = match (cmd, arg) {
        ("quit" | "exit", _) => return false,
        ("help", _) => {
            println!("{HELP}");
            return true;
        }
        ("node", Some(name)) => cmd_node(manager, name),
        ("node", None) => usage("node <name>"),
        ("nodes", _) => {
            for name in manager.config().node_names() {
                println!("{name}");
            }
            return true;
        }
        ("interface", name) => cmd_interface(manager, name),
        ("delay", Some(value)) => cmd_delay(manager, value),
        ("delay", None) => usage("delay <ms>"),
        ("loss", Some(value)) => cmd_loss(manager, value),
        ("loss", None) => usage("loss <percent>"),
        ("clear", target) => cmd_clear(manager, target),
        ("status", target) => cmd_status(manager, target),
        _ => {
            println!("unknown command '{cmd}' (try 'help')");
            return true;
        }
    };

    if let Err(err) = result {
        println!("error: {err:#}");
    }
    true
}

fn usage(text: &str) -> Result<()> {
    println!("usage: {text}");
    Ok(())
}

fn cmd_node(manager: &mut Manager, name: &str) -> Result<()> {
    manager.switch_node(name)?;
    if let Some(session) = manager.session() {
        for (interface, state) in session.snapshot() {
            println!("{interface}: {state}");
        }
    }
    Ok(())
}

fn cmd_interface(manager: &mut Manager, name: Option<&str>) -> Result<()> {
    let session = manager.session_mut()?;
    let name = match name {
        Some(name) => name.to_string(),
        None => session.default_interface().to_string(),
    };
    let state = session.select_interface(&name)?;
    println!("{name}: {state}");
    Ok(())
}

fn cmd_delay(manager: &mut Manager, value: &str) -> Result<()> {
    let ms: u32 = value
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid delay '{value}': expected whole milliseconds"))?;
    let session = manager.session_mut()?;
    let interface = session.current_interface().to_string();
    let state = session.set_delay(ms)?;
    println!("{interface}: {state}");
    Ok(())
}

fn cmd_loss(manager: &mut Manager, value: &str) -> Result<()> {
    let percent: u32 = value
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid loss '{value}': expected whole percent"))?;
    let session = manager.session_mut()?;
    let interface = session.current_interface().to_string();
    let state = session.set_loss(percent)?;
    println!("{interface}: {state}");
    Ok(())
}

fn cmd_clear(manager: &mut Manager, target: Option<&str>) -> Result<()> {
    let session = manager.session_mut()?;
    match target {
        Some("all") => {
            for (interface, state) in session.clear_all()? {
                println!("{interface}: {state}");
            }
        }
        Some(name) => {
            let state = session.clear(name)?;
            println!("{name}: {state}");
        }
        None => {
            let name = session.current_interface().to_string();
            let state = session.clear(&name)?;
            println!("{name}: {state}");
        }
    }
    Ok(())
}

fn cmd_status(manager: &mut Manager, target: Option<&str>) -> Result<()> {
    let session = manager.session_mut()?;
    match target {
        Some("all") => {
            for (interface, state) in session.status_all()? {
                println!("{interface}: {state}");
            }
        }
        Some(name) => {
            let state = session.status(name)?;
            println!("{name}: {state}");
        }
        None => {
            let name = session.current_interface().to_string();
            let state = session.status(&name)?;
            println!("{name}: {state}");
        }
    }
    Ok(())
}
