//! Turns a raw command line into a [`ParsedCommand`].
//!
//! Each stage is a pure function from one value to the next:
//! truncate, expand `$$`, strip a trailing `&`, split into words, pull out `<`/`>`.

use crate::command::ParsedCommand;
use crate::config::{BACKGROUND_MARKER, MAX_ARGS, MAX_LINE_LENGTH, PID_MARKER};

/// Runs every parsing stage over `line` for a shell whose pid is `shell_pid`.
pub fn transform(line: &str, shell_pid: u32) -> ParsedCommand {
    let line = truncate_line(line, MAX_LINE_LENGTH);
    let expanded = expand_pid(line, shell_pid);
    let (rest, background) = strip_background(&expanded);
    let words = tokenize(rest, MAX_ARGS);
    let mut cmd = extract_redirections(words);
    cmd.background = background;
    cmd
}

/// Cuts `line` to at most `max` bytes without splitting a character.
pub fn truncate_line(line: &str, max: usize) -> &str {
    if line.len() <= max {
        return line;
    }
    let mut end = max;
    while !line.is_char_boundary(end) {
        end -= 1;
    }
    &line[..end]
}

/// Replaces every `$$` with `shell_pid`, scanning left to right in pairs.
///
/// `$$$$` expands to the pid twice and `$$$` to the pid followed by `$`.
/// The expanded text never exceeds [`MAX_LINE_LENGTH`].
pub fn expand_pid(line: &str, shell_pid: u32) -> String {
    let pid = shell_pid.to_string();
    let mut expanded = String::with_capacity(line.len().min(MAX_LINE_LENGTH));
    let mut rest = line;
    while let Some(idx) = rest.find(PID_MARKER) {
        expanded.push_str(&rest[..idx]);
        expanded.push_str(&pid);
        rest = &rest[idx + PID_MARKER.len()..];
        if expanded.len() >= MAX_LINE_LENGTH {
            break;
        }
    }
    if expanded.len() < MAX_LINE_LENGTH {
        expanded.push_str(rest);
    }
    let keep = truncate_line(&expanded, MAX_LINE_LENGTH).len();
    expanded.truncate(keep);
    expanded
}

/// Erases a trailing `&` (ignoring trailing whitespace) and reports whether one was found.
pub fn strip_background(line: &str) -> (&str, bool) {
    let trimmed = line.trim_end();
    match trimmed.strip_suffix(BACKGROUND_MARKER) {
        Some(rest) => (rest, true),
        None => (line, false),
    }
}

/// Splits on whitespace, keeping at most `max_args` words.
pub fn tokenize(line: &str, max_args: usize) -> Vec<&str> {
    line.split_whitespace().take(max_args).collect()
}

/// Moves `<file` and `>file` pairs out of the word list.
///
/// An operator with nothing after it is dropped. Later redirections of the same
/// stream replace earlier ones.
pub fn extract_redirections(words: Vec<&str>) -> ParsedCommand {
    let mut cmd = ParsedCommand::default();
    let mut words = words.into_iter();
    while let Some(w) = words.next() {
        match w {
            "<" => {
                if let Some(file) = words.next() {
                    cmd.input_file = Some(file.to_string());
                }
            }
            ">" => {
                if let Some(file) = words.next() {
                    cmd.output_file = Some(file.to_string());
                }
            }
            _ => cmd.argv.push(w.to_string()),
        }
    }
    cmd
}
