//! Terminal rendering of assistant replies.
//!
//! Fenced code blocks are pulled out of the reply and printed as an indented
//! preformatted block; everything else is printed as plain text.

use console::style;
use regex::Regex;
use std::sync::LazyLock;

static FENCED_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:\w+)?\n(.*?)\n```").expect("fenced block regex"));

const CODE_INDENT: &str = "    ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Text(String),
    Code(String),
}

/// Split a reply into text and fenced-code segments, in order.
///
/// Whitespace-only text between blocks is dropped; text segments are trimmed.
pub fn parse_assistant_blocks(reply: &str) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut last = 0;

    for caps in FENCED_BLOCK.captures_iter(reply) {
        let Some(whole) = caps.get(0) else { continue };
        push_text(&mut blocks, &reply[last..whole.start()]);
        let code = caps.get(1).map_or("", |m| m.as_str());
        blocks.push(Block::Code(code.to_string()));
        last = whole.end();
    }
    push_text(&mut blocks, &reply[last..]);

    blocks
}

fn push_text(blocks: &mut Vec<Block>, text: &str) {
    let text = text.trim();
    if !text.is_empty() {
        blocks.push(Block::Text(text.to_string()));
    }
}

/// Render blocks for a terminal. Code lines are indented and dimmed when
/// the terminal supports styling.
pub fn render_blocks(blocks: &[Block]) -> String {
    blocks
        .iter()
        .map(|block| match block {
            Block::Text(text) => text.clone(),
            Block::Code(code) => code
                .lines()
                .map(|line| format!("{CODE_INDENT}{}", style(line).cyan()))
                .collect::<Vec<_>>()
                .join("\n"),
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn render_reply(reply: &str) -> String {
    render_blocks(&parse_assistant_blocks(reply))
}
