//! Reorder: manual `order` editing for one album.
//!
//! A [`ReorderSession`] works on a copy of the album's photos. Nothing
//! reaches the document until [`ReorderSession::commit`]; dropping the
//! session discards every edit.
//!
//! Positions are 0-based in the API and 1-based at the prompt.
//!
//! ```text
//! > move 5 1      photo 5 becomes first, all photos renumbered 1..N
//! > swap 2 3
//! > clear         drop every order, back to newest-first by date
//! > save
//! ```

use crate::document::{Document, sort_images};
use crate::output;
use crate::types::Photo;
use std::io::{self, BufRead, Write};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ReorderError {
    #[error("Album '{0}' is not in the document")]
    UnknownAlbum(String),
    #[error("Position {position} is out of range (album has {len} photos)")]
    OutOfRange { position: usize, len: usize },
}

pub struct ReorderSession {
    key: String,
    images: Vec<Photo>,
    dirty: bool,
}

impl ReorderSession {
    pub fn new(doc: &Document, key: &str) -> Result<Self, ReorderError> {
        let album = doc
            .get(key)
            .ok_or_else(|| ReorderError::UnknownAlbum(key.to_string()))?;
        let mut images = album.images.clone();
        sort_images(&mut images);
        Ok(Self {
            key: key.to_string(),
            images,
            dirty: false,
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Photos in their current display order.
    pub fn images(&self) -> &[Photo] {
        &self.images
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn check(&self, position: usize) -> Result<(), ReorderError> {
        if position < self.images.len() {
            Ok(())
        } else {
            Err(ReorderError::OutOfRange {
                position,
                len: self.images.len(),
            })
        }
    }

    /// Number every photo 1..N in the current order.
    pub fn set_sequential(&mut self) {
        for (i, photo) in self.images.iter_mut().enumerate() {
            photo.order = Some(i as u32 + 1);
        }
        self.dirty = true;
    }

    /// Move the photo at `from` to `to`, then renumber.
    pub fn move_item(&mut self, from: usize, to: usize) -> Result<(), ReorderError> {
        self.check(from)?;
        self.check(to)?;
        let photo = self.images.remove(from);
        self.images.insert(to, photo);
        self.set_sequential();
        Ok(())
    }

    /// Exchange two photos, then renumber.
    pub fn swap(&mut self, a: usize, b: usize) -> Result<(), ReorderError> {
        self.check(a)?;
        self.check(b)?;
        self.images.swap(a, b);
        self.set_sequential();
        Ok(())
    }

    /// Remove every `order`; the album falls back to date order.
    pub fn clear_order(&mut self) {
        for photo in &mut self.images {
            photo.order = None;
        }
        sort_images(&mut self.images);
        self.dirty = true;
    }

    /// Write the edited photos back into the document.
    pub fn commit(self, doc: &mut Document) -> Result<(), ReorderError> {
        let Some(album) = doc.get_mut(&self.key) else {
            return Err(ReorderError::UnknownAlbum(self.key));
        };
        album.images = self.images;
        sort_images(&mut album.images);
        Ok(())
    }
}

/// How an interactive session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    Save,
    Quit,
}

enum Command {
    List,
    Sequential,
    Move(usize, usize),
    Swap(usize, usize),
    Clear,
    Save,
    Quit,
    Help,
}

const HELP: &[&str] = &[
    "Commands:",
    "  list              show photos in current order",
    "  seq               number photos 1..N as shown",
    "  move FROM TO      move a photo (1-based positions)",
    "  swap A B          exchange two photos",
    "  clear             remove all order values",
    "  save              write changes and exit",
    "  quit              discard changes and exit",
];

fn parse_position(word: Option<&str>) -> Result<usize, String> {
    let word = word.ok_or("missing position")?;
    match word.parse::<usize>() {
        Ok(n) if n >= 1 => Ok(n - 1),
        _ => Err(format!("'{word}' is not a position (1, 2, 3, ...)")),
    }
}

fn parse_command(line: &str) -> Result<Command, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(Command::Help);
    };
    let command = match verb.to_lowercase().as_str() {
        "l" | "list" | "ls" => Command::List,
        "seq" | "sequential" => Command::Sequential,
        "m" | "move" | "mv" => {
            let from = parse_position(words.next())?;
            Command::Move(from, parse_position(words.next())?)
        }
        "s" | "swap" => {
            let a = parse_position(words.next())?;
            Command::Swap(a, parse_position(words.next())?)
        }
        "c" | "clear" => Command::Clear,
        "w" | "save" => Command::Save,
        "q" | "quit" | "exit" => Command::Quit,
        "h" | "help" | "?" => Command::Help,
        other => return Err(format!("unknown command '{other}', try 'help'")),
    };
    if words.next().is_some() {
        return Err("too many arguments".to_string());
    }
    Ok(command)
}

fn write_lines(out: &mut impl Write, lines: &[String]) -> io::Result<()> {
    for line in lines {
        writeln!(out, "{line}")?;
    }
    Ok(())
}

/// Drive a session from a line-oriented prompt.
///
/// Bad input is reported and the prompt repeats; only `save`, `quit` or end
/// of input end the session. End of input discards, like `quit`.
pub fn run_interactive(
    session: &mut ReorderSession,
    input: &mut impl BufRead,
    out: &mut impl Write,
) -> io::Result<SessionEnd> {
    write_lines(out, &output::format_reorder_listing(session.key(), session.images()))?;
    writeln!(out, "Type 'help' for commands.")?;

    let mut line = String::new();
    loop {
        write!(out, "> ")?;
        out.flush()?;
        line.clear();
        if input.read_line(&mut line)? == 0 {
            writeln!(out)?;
            return Ok(SessionEnd::Quit);
        }

        let command = match parse_command(line.trim()) {
            Ok(c) => c,
            Err(msg) => {
                writeln!(out, "error: {msg}")?;
                continue;
            }
        };

        let result = match command {
            Command::List => Ok(()),
            Command::Sequential => {
                session.set_sequential();
                Ok(())
            }
            Command::Move(from, to) => session.move_item(from, to),
            Command::Swap(a, b) => session.swap(a, b),
            Command::Clear => {
                session.clear_order();
                Ok(())
            }
            Command::Save => return Ok(SessionEnd::Save),
            Command::Quit => {
                if session.is_dirty() {
                    writeln!(out, "Changes discarded.")?;
                }
                return Ok(SessionEnd::Quit);
            }
            Command::Help => {
                write_lines(out, &HELP.iter().map(|s| s.to_string()).collect::<Vec<_>>())?;
                continue;
            }
        };

        match result {
            Ok(()) => write_lines(
                out,
                &output::format_reorder_listing(session.key(), session.images()),
            )?,
            // Shown 1-based, like the prompt.
            Err(ReorderError::OutOfRange { position, len }) => writeln!(
                out,
                "error: position {} is out of range (1-{})",
                position + 1,
                len
            )?,
            Err(e) => writeln!(out, "error: {e}")?,
        }
    }
}
