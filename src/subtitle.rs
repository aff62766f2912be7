//! SRT-style subtitle documents: parsing, serialisation and file I/O.
//!
//! A document is a sequence of blank-line separated blocks of the form
//! `index / timing / text...`. Index and timing are kept verbatim and are
//! never rewritten; only the text of well-formed entries may change.

pub mod encoding;

use std::path::Path;

use tokio::fs;
use tracing::{debug, info, warn};

use crate::error::{Result, SubtransError};
use encoding::{TextEncoding, decode_with_candidates};

/// A structurally complete subtitle block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtitleEntry {
    /// Sequence label exactly as written in the source.
    pub index: String,
    /// Timing range token, e.g. `00:00:01,000 --> 00:00:03,500`.
    pub timing: String,
    /// Caption lines in order.
    pub lines: Vec<String>,
}

impl SubtitleEntry {
    /// Numeric value of the index label, if it is a positive integer.
    pub fn number(&self) -> Option<u32> {
        self.index.trim().parse::<u32>().ok().filter(|n| *n > 0)
    }

    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    /// Replace the caption text.
    ///
    /// Blank lines are dropped so the new text can never split the block.
    /// Returns `false` and leaves the entry untouched if nothing remains.
    pub fn set_text(&mut self, text: &str) -> bool {
        let lines: Vec<String> = text
            .lines()
            .map(|line| line.trim_end().to_string())
            .filter(|line| !line.trim().is_empty())
            .collect();

        if lines.is_empty() {
            return false;
        }
        self.lines = lines;
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubtitleBlock {
    Entry(SubtitleEntry),
    /// Fewer than three lines; passed through exactly as read.
    Malformed(String),
}

impl SubtitleBlock {
    fn from_lines(lines: &[&str]) -> Self {
        if lines.len() < 3 {
            return Self::Malformed(lines.join("\n"));
        }
        Self::Entry(SubtitleEntry {
            index: lines[0].to_string(),
            timing: lines[1].to_string(),
            lines: lines[2..].iter().map(|l| l.to_string()).collect(),
        })
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::Malformed(_))
    }

    pub fn as_entry(&self) -> Option<&SubtitleEntry> {
        match self {
            Self::Entry(entry) => Some(entry),
            Self::Malformed(_) => None,
        }
    }

    fn render(&self) -> String {
        match self {
            Self::Entry(entry) => format!("{}\n{}\n{}", entry.index, entry.timing, entry.text()),
            Self::Malformed(raw) => raw.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubtitleDocument {
    pub blocks: Vec<SubtitleBlock>,
}

impl SubtitleDocument {
    /// Split decoded content into blocks. Never fails: blocks that are too
    /// short become `SubtitleBlock::Malformed`.
    pub fn parse(content: &str) -> Self {
        let normalized = content.replace("\r\n", "\n");
        let mut blocks = Vec::new();
        let mut current: Vec<&str> = Vec::new();

        for line in normalized.split('\n') {
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() {
                if !current.is_empty() {
                    blocks.push(SubtitleBlock::from_lines(&current));
                    current.clear();
                }
            } else {
                current.push(line);
            }
        }
        if !current.is_empty() {
            blocks.push(SubtitleBlock::from_lines(&current));
        }

        let malformed = blocks.iter().filter(|b| b.is_malformed()).count();
        if malformed > 0 {
            warn!("{} of {} subtitle blocks are malformed and will be passed through", malformed, blocks.len());
        }
        debug!("Parsed {} subtitle blocks", blocks.len());

        Self { blocks }
    }

    /// Render the document with one blank line between blocks and a single
    /// trailing newline. An empty document renders as an empty string.
    pub fn serialize(&self) -> String {
        if self.blocks.is_empty() {
            return String::new();
        }
        let mut out = self
            .blocks
            .iter()
            .map(SubtitleBlock::render)
            .collect::<Vec<_>>()
            .join("\n\n");
        out.push('\n');
        out
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Read, decode and parse a subtitle file.
    pub async fn load<P: AsRef<Path>>(path: P, candidates: &[TextEncoding]) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).await.map_err(|source| SubtransError::Filesystem {
            path: path.to_path_buf(),
            source,
        })?;

        let (content, used) = decode_with_candidates(&bytes, candidates, &path.display().to_string())?;
        info!("Loaded {} ({} bytes, {})", path.display(), bytes.len(), used);

        Ok(Self::parse(&content))
    }

    /// Serialise and write the document as UTF-8, creating missing parent
    /// directories first.
    pub async fn write_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let fs_error = |source| SubtransError::Filesystem {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(fs_error)?;
        }
        fs::write(path, self.serialize()).await.map_err(fs_error)?;

        info!("Subtitle file written: {}", path.display());
        Ok(())
    }
}
