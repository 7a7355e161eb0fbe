// Chat module
// Interactive terminal conversation over an ApiChatbot


use anyhow::{Context, Result};
use console::{Term, style};
use dialoguer::Input;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tracing::debug;

use crate::chatbot::ApiChatbot;
use crate::config::ChatConfig;

/// Appended to every frame of the typing effect except the last
pub const TYPING_CURSOR: char = '▌';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

/// Ordered history of one conversation, kept in memory only.
///
/// History is shown back to the user but never sent to the model.
#[derive(Debug, Clone, Default)]
pub struct ChatSession {
    turns: Vec<ChatTurn>,
}

impl ChatSession {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn push(&mut self, role: Role, content: impl Into<String>) {
        self.turns.push(ChatTurn {
            role,
            content: content.into(),
        });
    }

    #[inline]
    pub fn clear(&mut self) {
        self.turns.clear();
    }

    #[inline]
    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

/// What a line typed at the prompt asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    Ask(String),
    Clear,
    History,
    Exit,
    Empty,
}

impl ChatCommand {
    #[inline]
    pub fn parse(line: &str) -> Self {
        match line.trim() {
            "" => Self::Empty,
            "/clear" => Self::Clear,
            "/history" => Self::History,
            "/exit" | "/quit" => Self::Exit,
            question => Self::Ask(question.to_string()),
        }
    }
}

/// Frames of the typing effect for `text`.
///
/// Each frame is the prefix of `text` up to the end of the next word,
/// followed by [`TYPING_CURSOR`]; the final frame is the whole trimmed text
/// without a cursor. Whitespace inside the text, newlines included, is kept.
#[inline]
pub fn typing_frames(text: &str) -> Vec<String> {
    let text = text.trim();
    let mut frames: Vec<String> = word_ends(text)
        .into_iter()
        .map(|end| format!("{}{}", &text[..end], TYPING_CURSOR))
        .collect();
    frames.push(text.to_string());
    frames
}

/// Byte offsets just past each whitespace-separated word
fn word_ends(text: &str) -> Vec<usize> {
    let mut ends = Vec::new();
    let mut in_word = false;
    for (i, c) in text.char_indices() {
        if c.is_whitespace() {
            if in_word {
                ends.push(i);
            }
            in_word = false;
        } else {
            in_word = true;
        }
    }
    if in_word {
        ends.push(text.len());
    }
    ends
}

/// Print `text` word by word with a trailing cursor, `delay` apart
#[inline]
pub fn render_typing(term: &Term, text: &str, delay: Duration) -> std::io::Result<()> {
    let frames = typing_frames(text);
    if delay.is_zero() {
        return term.write_line(frames.last().map_or("", String::as_str));
    }

    let mut shown = 0usize;
    for frame in &frames {
        let body = frame.strip_suffix(TYPING_CURSOR).unwrap_or(frame);
        term.write_str(&body[shown..])?;
        shown = body.len();

        if body.len() < frame.len() {
            term.write_str(&TYPING_CURSOR.to_string())?;
            std::thread::sleep(delay);
            term.clear_chars(1)?;
        }
    }
    term.write_line("")
}

fn print_header() {
    eprintln!("{}", style("🤖 API Docs Chat").bold().cyan());
    eprintln!("Ask about endpoints, parameters and usage of the documented API.");
    eprintln!(
        "{}",
        style("Commands: /clear empties the history, /history shows it, /exit leaves").dim()
    );
    eprintln!();
}

fn print_history(session: &ChatSession) {
    if session.is_empty() {
        eprintln!("{}", style("(no messages yet)").dim());
        return;
    }
    for turn in session.turns() {
        let label = match turn.role {
            Role::User => style("You").bold().green(),
            Role::Assistant => style("Assistant").bold().cyan(),
        };
        eprintln!("{}: {}", label, turn.content);
    }
}

fn searching_spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner().with_style(
        ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message("Searching documentation...");
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

/// Read questions from the terminal until `/exit` or end of input
#[inline]
pub async fn run_chat(chatbot: &ApiChatbot, settings: &ChatConfig) -> Result<()> {
    let term = Term::stdout();
    let delay = Duration::from_millis(settings.typing_delay_ms);
    let mut session = ChatSession::new();

    print_header();

    loop {
        let line: String = match Input::new()
            .with_prompt("You")
            .allow_empty(true)
            .interact_text()
        {
            Ok(line) => line,
            Err(dialoguer::Error::IO(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(e) => return Err(e).context("Failed to read input"),
        };

        match ChatCommand::parse(&line) {
            ChatCommand::Empty => {}
            ChatCommand::Exit => break,
            ChatCommand::Clear => {
                session.clear();
                eprintln!("{}", style("History cleared.").dim());
            }
            ChatCommand::History => print_history(&session),
            ChatCommand::Ask(question) => {
                session.push(Role::User, question.as_str());

                let spinner = searching_spinner();
                let reply = chatbot.call_llm(&question).await;
                spinner.finish_and_clear();

                render_typing(&term, &reply, delay).context("Failed to write reply")?;
                session.push(Role::Assistant, reply);
                debug!("Session now has {} turns", session.len());
            }
        }
    }

    eprintln!("{}", style("Goodbye!").dim());
    Ok(())
}
