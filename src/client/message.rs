// src/client/message.rs

//! State change messages, from `-m` or from `$EDITOR`

use anyhow::{Context, Result, bail};
use std::io::Write;
use std::process::Command;

const TEMPLATE: &str = "\n\
# Please enter the message for your push request.\n\
# Lines starting with '#' will be ignored.\n\
# An empty message aborts the current command.\n";

/// Strip comment lines and surrounding whitespace from editor output
pub fn message_from_text(text: &str) -> String {
    text.lines()
        .filter(|line| !line.trim_start().starts_with('#'))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Use `message` if given, otherwise ask for one in the editor
pub fn get_message(message: Option<&str>) -> Result<String> {
    if let Some(message) = message
        && !message.trim().is_empty()
    {
        return Ok(message.to_string());
    }

    let editor = match std::env::var("EDITOR") {
        Ok(editor) if !editor.trim().is_empty() => editor,
        _ => bail!("No EDITOR environment variable set."),
    };
    let message = edit_message(&editor)?;
    if message.is_empty() {
        bail!("A message is required.");
    }
    Ok(message)
}

fn edit_message(editor: &str) -> Result<String> {
    let mut file = tempfile::Builder::new()
        .prefix("pushreq-")
        .suffix(".txt")
        .tempfile()
        .context("Failed to create message file")?;
    file.write_all(TEMPLATE.as_bytes())
        .context("Failed to write message file")?;
    file.flush()?;

    // The editor may carry arguments, e.g. "code --wait"
    let mut parts = editor.split_whitespace();
    let program = parts.next().unwrap_or(editor);
    let status = Command::new(program)
        .args(parts)
        .arg(file.path())
        .status()
        .with_context(|| format!("Failed to run editor {editor}"))?;
    if !status.success() {
        bail!("Error ({}) calling editor {}", status, editor);
    }

    // Re-read by path: some editors replace the file instead of writing it
    let text = std::fs::read_to_string(file.path()).context("Failed to read message file")?;
    Ok(message_from_text(&text))
}
