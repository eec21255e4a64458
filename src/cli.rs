//! Command-line front end: argument parsing and the prompt loop.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::config::{AppConfig, ProviderKind};
use crate::session::ChatSession;

/// An AI-emulated Kali Linux terminal.
///
/// Plain input is answered as if typed into a shell. Use
/// `chat -m "message"` to talk to the assistant instead.
#[derive(Parser, Debug)]
#[command(name = "aiterm")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Backend to use for this run
    #[arg(long, value_enum)]
    pub provider: Option<ProviderKind>,

    /// Model name for the selected backend
    #[arg(long)]
    pub model: Option<String>,

    /// Ollama server URL
    #[arg(long)]
    pub base_url: Option<String>,

    /// Config file (default: ~/.aiterm/config.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Run a single command and exit
    #[arg(trailing_var_arg = true)]
    pub command: Vec<String>,
}

impl Cli {
    /// Apply flag overrides on top of the loaded configuration.
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(provider) = self.provider {
            config.ai.provider = provider;
        }
        if let Some(model) = &self.model {
            config.ai.set_active_model(model.clone());
        }
        if let Some(url) = &self.base_url {
            config.ai.ollama.base_url = url.clone();
        }
    }
}

/// What one line of input asks for.
#[derive(Debug, PartialEq, Eq)]
pub enum Input {
    Empty,
    Exit,
    Clear,
    ResetChat,
    Chat(String),
    Command(String),
}

/// Classify a line typed at the prompt.
pub fn parse_input(line: &str) -> Input {
    let line = line.trim();
    if line.is_empty() {
        return Input::Empty;
    }
    match line.to_lowercase().as_str() {
        "exit" | "quit" => return Input::Exit,
        "clear" => return Input::Clear,
        "chat --reset" => return Input::ResetChat,
        _ => {}
    }
    match parse_chat_message(line) {
        Some(message) => Input::Chat(message.to_string()),
        None => Input::Command(line.to_string()),
    }
}

/// Extract `message` from `chat -m "message"`.
fn parse_chat_message(line: &str) -> Option<&str> {
    let rest = line.strip_prefix("chat")?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let rest = rest.trim_start().strip_prefix("-m")?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let message = rest
        .trim_start()
        .strip_prefix('"')?
        .strip_suffix('"')?;
    if message.is_empty() || message.contains('"') {
        return None;
    }
    Some(message)
}

pub fn banner(session: &ChatSession) -> String {
    let settings = session.settings();
    format!(
        "      *        kali-gpt@terminal\n\
         \x20    ***       -----------------\n\
         \x20   *****      OS: Kali Linux (AI Emulation)\n\
         \x20    ***       Provider: {}\n\
         \x20     *        Model: {}\n\
         \n\
         Welcome to your AI Terminal.\n\
         Type 'help' to see example commands.\n\
         Type 'chat -m \"your message\"' to start a conversation.",
        settings.provider,
        settings.active_model()
    )
}

fn print_chunk(chunk: &str) {
    let mut stdout = std::io::stdout();
    let _ = stdout.write_all(chunk.as_bytes());
    let _ = stdout.flush();
}

/// Run one command non-interactively.
///
/// `clear` and `chat --reset` only make sense inside the prompt loop and are
/// rejected here.
pub async fn run_once(session: &mut ChatSession, command: &str) -> Result<()> {
    match parse_input(command) {
        Input::Empty | Input::Exit => return Ok(()),
        Input::Clear | Input::ResetChat => {
            bail!("'{}' is only available in interactive mode", command.trim())
        }
        Input::Chat(message) => session.chat(&message, &mut print_chunk).await,
        Input::Command(command) => session.execute(&command, &mut print_chunk).await,
    }
    println!();
    Ok(())
}

/// Read prompts from stdin until `exit` or end of input.
pub async fn run_repl(mut session: ChatSession) -> Result<()> {
    println!("{}\n", banner(&session));
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("root@kali:~# ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            println!();
            break;
        };

        match parse_input(&line) {
            Input::Empty => continue,
            Input::Exit => break,
            Input::Clear => {
                // ANSI: clear screen, cursor home.
                print!("\x1b[2J\x1b[H");
                println!("{}\n", banner(&session));
            }
            Input::ResetChat => {
                session.reset();
                println!("Chat session history has been reset.");
            }
            Input::Chat(message) => {
                session.chat(&message, &mut print_chunk).await;
                println!();
            }
            Input::Command(command) => {
                session.execute(&command, &mut print_chunk).await;
                println!();
            }
        }
    }
    Ok(())
}
