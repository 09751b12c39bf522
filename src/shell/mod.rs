//! Interactive terminal chat.
//!
//! The session owns the conversation history and hands it to a
//! [`ChatBackend`] as a read-only slice on every turn. Type `/quit` or
//! `/exit` (or send EOF) to leave, `/history` to reprint the transcript.

pub mod backend;
pub mod render;

pub use backend::{ChatBackend, HttpBackend};

use crate::agent::MAX_HISTORY_TURNS;
use crate::sessions::{History, Role};
use anyhow::Result;
use console::style;
use std::io::{BufRead, Write};

pub const GREETING: &str =
    "Hi there! How can I help you today? I'm your Kairos customer support assistant.";

/// One terminal conversation against a backend.
pub struct ChatSession<B: ChatBackend> {
    backend: B,
    history: History,
}

impl<B: ChatBackend> ChatSession<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            history: History::with_greeting(GREETING),
        }
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Read lines from `input` until `/quit`, `/exit` or EOF, printing each reply to `out`.
    pub async fn run<R: BufRead, W: Write>(&mut self, mut input: R, out: &mut W) -> Result<()> {
        writeln!(out, "{}", style(format!("Kairos support · {}", self.backend.describe())).dim())?;
        writeln!(out, "{}", style("Type /quit or /exit to leave, /history to review.").dim())?;
        writeln!(out)?;
        print_reply(out, GREETING)?;

        loop {
            write!(out, "{} ", style("You:").bold().green())?;
            out.flush()?;

            let mut line = String::new();
            if input.read_line(&mut line)? == 0 {
                break;
            }
            let message = line.trim();
            match message {
                "" => continue,
                "/quit" | "/exit" => break,
                "/history" => {
                    self.print_history(out)?;
                    continue;
                }
                _ => {}
            }

            self.turn(message, out).await?;
        }

        writeln!(out, "\nGoodbye!")?;
        tracing::info!(messages = self.history.len(), "Chat session ended");
        Ok(())
    }

    /// Send one message. Only the last [`MAX_HISTORY_TURNS`] messages go to
    /// the backend. The user message is kept in history even when the turn
    /// fails; the assistant reply is only appended on success.
    pub async fn turn<W: Write>(&mut self, message: &str, out: &mut W) -> Result<()> {
        let context = self.history.recent(MAX_HISTORY_TURNS);
        let outcome = self.backend.send(message, context).await;
        self.history.push_user(message);

        match outcome {
            Ok(result) => {
                tracing::debug!(intent = result.intent.label(), "Turn completed");
                print_reply(out, &result.response)?;
                self.history.push_assistant(result.response);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Turn failed");
                writeln!(out, "{} {e:#}\n", style("Error:").bold().red())?;
            }
        }
        Ok(())
    }

    fn print_history<W: Write>(&self, out: &mut W) -> Result<()> {
        writeln!(out)?;
        for message in &self.history {
            match message.role {
                Role::User => writeln!(out, "{} {}", style("You:").bold().green(), message.content)?,
                Role::Assistant => print_reply(out, &message.content)?,
            }
        }
        Ok(())
    }
}

fn print_reply<W: Write>(out: &mut W, reply: &str) -> Result<()> {
    writeln!(out, "{}", style("Assistant:").bold().cyan())?;
    writeln!(out, "{}\n", render::render_reply(reply))?;
    Ok(())
}
