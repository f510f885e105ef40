//! Interactive prompt.

use meshlink_mesh::{NodeCommand, NodeHandle};
use std::io::{IsTerminal, Write};
use tokio::io::{AsyncBufReadExt, BufReader};

pub const USAGE: &str = "Usage:
  connect <targetID>     -> Start secure handshake
  send <targetID> <msg>  -> Send text message
  broadcast <msg>        -> Send to everyone";

/// One line of user input.
#[derive(Debug, PartialEq, Eq)]
pub enum Input {
    Command(NodeCommand),
    Blank,
    Invalid,
}

pub fn parse_line(line: &str) -> Input {
    let line = line.trim();
    if line.is_empty() {
        return Input::Blank;
    }

    let (cmd, rest) = line.split_once(' ').unwrap_or((line, ""));
    let rest = rest.trim_start();
    match cmd {
        "connect" if !rest.is_empty() => {
            let target = rest.split_whitespace().next().unwrap_or(rest);
            Input::Command(NodeCommand::Connect(target.to_string()))
        }
        "send" => match rest.split_once(' ') {
            Some((to, text)) if !text.trim().is_empty() => Input::Command(NodeCommand::Send {
                to: to.to_string(),
                text: text.trim_start().to_string(),
            }),
            _ => Input::Invalid,
        },
        "broadcast" if !rest.is_empty() => Input::Command(NodeCommand::Broadcast(rest.to_string())),
        _ => Input::Invalid,
    }
}

pub fn prompt(node_id: &str) {
    print!("Node {node_id} > ");
    let _ = std::io::stdout().flush();
}

pub fn is_interactive() -> bool {
    std::io::stdin().is_terminal()
}

/// Read commands from stdin until EOF.
pub async fn run(handle: NodeHandle) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    prompt(handle.node_id());
    while let Some(line) = lines.next_line().await? {
        match parse_line(&line) {
            Input::Command(command) => {
                if let Err(e) = handle.execute(command).await {
                    println!("Error: {e}");
                }
            }
            Input::Invalid => println!("{USAGE}"),
            Input::Blank => {}
        }
        prompt(handle.node_id());
    }
    Ok(())
}
