use crate::error::Result;
use std::path::{Path, PathBuf};
use tokio::fs;

/// One line of a properties file, preserved in document order so the file can
/// be rewritten without disturbing comments, blank lines or key order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyLine {
    KeyValue { name: String, value: String },
    Comment(String),
    Blank,
}

/// Structure-preserving store for `server.properties`.
///
/// A missing file is not an error — it behaves as an empty store. `set` only
/// replaces the value of an existing key in place; it never appends, because
/// the file schema belongs to the server itself (it rewrites the file with its
/// full key set on boot).
#[derive(Debug)]
pub struct PropertiesStore {
    path: PathBuf,
    lines: Option<Vec<PropertyLine>>,
}

impl PropertiesStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lines: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// (Re)read the file from disk. Absence yields an empty store.
    pub async fn load(&mut self) -> Result<()> {
        let contents = match fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No properties file at {:?}, starting empty", self.path);
                self.lines = Some(Vec::new());
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        self.lines = Some(parse_lines(&contents));
        Ok(())
    }

    async fn ensure_loaded(&mut self) -> Result<&mut Vec<PropertyLine>> {
        if self.lines.is_none() {
            self.load().await?;
        }
        // Loaded above; the Option is always Some here.
        Ok(self.lines.as_mut().unwrap())
    }

    /// Look up a key's value. Loads the file on first access.
    pub async fn get(&mut self, name: &str) -> Result<Option<String>> {
        let lines = self.ensure_loaded().await?;
        Ok(lines.iter().find_map(|line| match line {
            PropertyLine::KeyValue { name: n, value } if n == name => Some(value.clone()),
            _ => None,
        }))
    }

    /// Replace a single key's value in place and rewrite the file.
    /// Returns whether the key existed.
    pub async fn set(&mut self, name: &str, value: &str) -> Result<bool> {
        let found = self.set_many(&[(name.to_string(), value.to_string())]).await?;
        Ok(found.is_empty())
    }

    /// Replace several keys' values in place, then rewrite the file once.
    /// Pairs whose key is absent are dropped; their names are returned so the
    /// caller can report them.
    pub async fn set_many(&mut self, pairs: &[(String, String)]) -> Result<Vec<String>> {
        let path = self.path.clone();
        let lines = self.ensure_loaded().await?;

        let mut missing = Vec::new();
        for (name, value) in pairs {
            let mut matched = false;
            for line in lines.iter_mut() {
                if let PropertyLine::KeyValue { name: n, value: v } = line {
                    if n == name {
                        *v = value.clone();
                        matched = true;
                    }
                }
            }
            if !matched {
                log::debug!("Property {:?} not present in {:?}, dropped", name, path);
                missing.push(name.clone());
            }
        }

        self.save().await?;
        Ok(missing)
    }

    /// Rewrite the whole file from the in-memory line sequence.
    pub async fn save(&self) -> Result<()> {
        let lines = match &self.lines {
            Some(lines) => lines,
            None => return Ok(()),
        };

        let mut out = String::new();
        for line in lines {
            match line {
                PropertyLine::KeyValue { name, value } => {
                    out.push_str(name);
                    out.push('=');
                    out.push_str(value);
                }
                PropertyLine::Comment(raw) => out.push_str(raw),
                PropertyLine::Blank => {}
            }
            out.push('\n');
        }

        fs::write(&self.path, out).await?;
        Ok(())
    }

    /// The parsed line sequence, if loaded.
    pub fn lines(&self) -> Option<&[PropertyLine]> {
        self.lines.as_deref()
    }
}

fn parse_lines(contents: &str) -> Vec<PropertyLine> {
    let mut pieces: Vec<&str> = contents.split('\n').collect();
    // A trailing newline produces one empty trailing piece that is not a line.
    if contents.ends_with('\n') {
        pieces.pop();
    }

    pieces
        .into_iter()
        .map(|raw| {
            let raw = raw.strip_suffix('\r').unwrap_or(raw);
            if raw.is_empty() {
                PropertyLine::Blank
            } else if raw.starts_with('#') {
                PropertyLine::Comment(raw.to_string())
            } else if let Some(eq) = find_unescaped_eq(raw) {
                PropertyLine::KeyValue {
                    name: raw[..eq].to_string(),
                    value: raw[eq + 1..].to_string(),
                }
            } else {
                // No separator at all (including whitespace-only lines); keep
                // the line verbatim so round-trips stay lossless.
                PropertyLine::Comment(raw.to_string())
            }
        })
        .collect()
}

/// Position of the first `=` not preceded by a backslash escape.
fn find_unescaped_eq(line: &str) -> Option<usize> {
    let mut escaped = false;
    for (i, c) in line.char_indices() {
        match c {
            '\\' => escaped = !escaped,
            '=' if !escaped => return Some(i),
            _ => escaped = false,
        }
    }
    None
}
