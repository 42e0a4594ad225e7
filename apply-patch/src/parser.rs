//! This module is responsible for parsing & validating a patch into a list of "hunks".
//! (It does not attempt to actually check that the patch can be applied to the filesystem.)
//!
//! The official Lark grammar for the apply-patch format is:
//!
//! start: begin_patch hunk+ end_patch
//! begin_patch: "*** Begin Patch" LF
//! end_patch: "*** End Patch" LF?
//!
//! hunk: add_hunk | delete_hunk | update_hunk
//! add_hunk: "*** Add File: " filename LF add_line+
//! delete_hunk: "*** Delete File: " filename LF
//! update_hunk: "*** Update File: " filename LF change_move? change?
//! filename: /(.+)/
//! add_line: "+" /(.*)/ LF -> line
//!
//! change_move: "*** Move to: " filename LF
//! change: (change_context | change_line)+ eof_line?
//! change_context: ("@@" | "@@ " /(.+)/) LF
//! change_line: ("+" | "-" | " ") /(.*)/ LF
//! eof_line: "*** End of File" LF
//!
//! The parser below is strict: a blank line inside an update hunk is an
//! error rather than an implicit context line, and nothing may follow the
//! end marker.
use std::path::PathBuf;

use thiserror::Error;

pub const BEGIN_PATCH_MARKER: &str = "*** Begin Patch";
pub const END_PATCH_MARKER: &str = "*** End Patch";
pub(crate) const ADD_FILE_MARKER: &str = "*** Add File: ";
pub(crate) const DELETE_FILE_MARKER: &str = "*** Delete File: ";
pub(crate) const UPDATE_FILE_MARKER: &str = "*** Update File: ";
pub(crate) const MOVE_TO_MARKER: &str = "*** Move to: ";
pub(crate) const EOF_MARKER: &str = "*** End of File";
pub(crate) const CHANGE_CONTEXT_MARKER: &str = "@@";

#[derive(Debug, PartialEq, Error, Clone)]
pub enum ParseError {
    #[error("apply_patch input is empty")]
    EmptyInput,
    #[error("apply_patch missing Begin Patch header")]
    MissingBeginMarker,
    #[error("apply_patch missing End Patch footer")]
    MissingEndMarker,
    #[error("apply_patch contains trailing content")]
    TrailingContent,
    #[error("Invalid add line: {0}")]
    InvalidAddLine(String),
    #[error("Add file '{0}' has no content")]
    EmptyAddFile(String),
    #[error("Unexpected empty line in update hunk")]
    EmptyUpdateLine,
    #[error("Invalid update line: {0}")]
    InvalidUpdateLine(String),
    #[error("Unexpected line: {0}")]
    UnexpectedLine(String),
}
use ParseError::*;

#[derive(Debug, PartialEq, Clone)]
#[allow(clippy::enum_variant_names)]
pub enum Hunk {
    AddFile {
        path: PathBuf,
        /// One entry per `+` line, without the marker.
        lines: Vec<String>,
    },
    DeleteFile {
        path: PathBuf,
    },
    UpdateFile {
        path: PathBuf,
        move_path: Option<PathBuf>,

        /// Chunks are applied in order with a forward-only search cursor.
        chunks: Vec<UpdateFileChunk>,

        /// Set when the update carried an end-of-file marker: the rewritten
        /// file then ends without a trailing newline.
        is_end_of_file: bool,
    },
}

impl Hunk {
    pub fn path(&self) -> &PathBuf {
        match self {
            Hunk::AddFile { path, .. } | Hunk::DeleteFile { path } | Hunk::UpdateFile { path, .. } => {
                path
            }
        }
    }
}

#[derive(Debug, PartialEq, Clone, Default)]
pub struct UpdateFileChunk {
    /// Context and deleted lines, in order: what must be found in the file.
    pub old_lines: Vec<String>,
    /// Context and inserted lines, in order: what replaces the match.
    pub new_lines: Vec<String>,
}

impl UpdateFileChunk {
    fn is_empty(&self) -> bool {
        self.old_lines.is_empty() && self.new_lines.is_empty()
    }
}

pub fn parse_patch(patch: &str) -> Result<Vec<Hunk>, ParseError> {
    if patch.trim().is_empty() {
        return Err(EmptyInput);
    }

    let normalized = patch.replace("\r\n", "\n").replace('\r', "\n");
    let mut lines: Vec<&str> = normalized.split('\n').collect();
    if lines.last().is_some_and(|line| line.is_empty()) {
        lines.pop();
    }

    if lines.first() != Some(&BEGIN_PATCH_MARKER) {
        return Err(MissingBeginMarker);
    }

    let mut hunks = Vec::new();
    let mut index = 1;
    let mut saw_end_marker = false;
    while index < lines.len() {
        let line = lines[index];
        if line == END_PATCH_MARKER {
            saw_end_marker = true;
            index += 1;
            break;
        }

        if let Some(path) = line.strip_prefix(ADD_FILE_MARKER) {
            let path = path.trim();
            index += 1;
            let mut contents = Vec::new();
            while let Some(add_line) = lines.get(index).filter(|l| !is_hunk_header(l)) {
                let Some(content) = add_line.strip_prefix('+') else {
                    return Err(InvalidAddLine((*add_line).to_string()));
                };
                contents.push(content.to_string());
                index += 1;
            }
            if contents.is_empty() {
                return Err(EmptyAddFile(path.to_string()));
            }
            hunks.push(Hunk::AddFile {
                path: PathBuf::from(path),
                lines: contents,
            });
            continue;
        }

        if let Some(path) = line.strip_prefix(DELETE_FILE_MARKER) {
            index += 1;
            hunks.push(Hunk::DeleteFile {
                path: PathBuf::from(path.trim()),
            });
            continue;
        }

        if let Some(path) = line.strip_prefix(UPDATE_FILE_MARKER) {
            let path = path.trim();
            index += 1;
            let move_path = lines
                .get(index)
                .and_then(|l| l.strip_prefix(MOVE_TO_MARKER))
                .map(|p| PathBuf::from(p.trim()));
            if move_path.is_some() {
                index += 1;
            }

            let mut chunks = Vec::new();
            let mut current = UpdateFileChunk::default();
            let mut is_end_of_file = false;
            while let Some(update_line) = lines.get(index).filter(|l| !is_hunk_header(l)) {
                index += 1;
                if update_line.starts_with(CHANGE_CONTEXT_MARKER) {
                    if !current.is_empty() {
                        chunks.push(std::mem::take(&mut current));
                    }
                    continue;
                }
                if *update_line == EOF_MARKER {
                    is_end_of_file = true;
                    continue;
                }

                let mut chars = update_line.chars();
                match chars.next() {
                    None => return Err(EmptyUpdateLine),
                    Some(' ') => {
                        let text = chars.as_str().to_string();
                        current.old_lines.push(text.clone());
                        current.new_lines.push(text);
                    }
                    Some('-') => current.old_lines.push(chars.as_str().to_string()),
                    Some('+') => current.new_lines.push(chars.as_str().to_string()),
                    Some(_) => return Err(InvalidUpdateLine((*update_line).to_string())),
                }
            }
            if !current.is_empty() {
                chunks.push(current);
            }

            hunks.push(Hunk::UpdateFile {
                path: PathBuf::from(path),
                move_path,
                chunks,
                is_end_of_file,
            });
            continue;
        }

        return Err(UnexpectedLine(line.to_string()));
    }

    if !saw_end_marker {
        return Err(MissingEndMarker);
    }
    if index < lines.len() {
        return Err(TrailingContent);
    }

    Ok(hunks)
}

fn is_hunk_header(line: &str) -> bool {
    line == END_PATCH_MARKER
        || line.starts_with(ADD_FILE_MARKER)
        || line.starts_with(DELETE_FILE_MARKER)
        || line.starts_with(UPDATE_FILE_MARKER)
}
