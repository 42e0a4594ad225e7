mod parser;
mod seek_sequence;
mod standalone_executable;

use std::path::Path;
use std::path::PathBuf;

pub use parser::BEGIN_PATCH_MARKER;
pub use parser::END_PATCH_MARKER;
pub use parser::Hunk;
pub use parser::ParseError;
pub use parser::UpdateFileChunk;
pub use parser::parse_patch;
pub use standalone_executable::main;
use thiserror::Error;
use tracing::debug;

/// Detailed instructions for the model on how to use the `apply_patch` tool.
pub const APPLY_PATCH_TOOL_INSTRUCTIONS: &str = include_str!("../apply_patch_tool_instructions.md");

#[derive(Debug, Error)]
pub enum ApplyPatchError {
    #[error(transparent)]
    ParseError(#[from] ParseError),
    #[error("Add file '{0}' already exists")]
    AddTargetExists(String),
    #[error("Delete file '{0}' not found")]
    DeleteTargetMissing(String),
    #[error("Update file '{0}' not found")]
    UpdateTargetMissing(String),
    #[error("Update file '{0}' context not found")]
    ContextNotFound(String),
    #[error("Move target '{0}' already exists")]
    MoveTargetExists(String),
    #[error("{context}: {source}")]
    IoError {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl ApplyPatchError {
    fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        ApplyPatchError::IoError {
            context: context.into(),
            source,
        }
    }
}

impl PartialEq for ApplyPatchError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ApplyPatchError::ParseError(a), ApplyPatchError::ParseError(b)) => a == b,
            (ApplyPatchError::AddTargetExists(a), ApplyPatchError::AddTargetExists(b))
            | (ApplyPatchError::DeleteTargetMissing(a), ApplyPatchError::DeleteTargetMissing(b))
            | (ApplyPatchError::UpdateTargetMissing(a), ApplyPatchError::UpdateTargetMissing(b))
            | (ApplyPatchError::ContextNotFound(a), ApplyPatchError::ContextNotFound(b))
            | (ApplyPatchError::MoveTargetExists(a), ApplyPatchError::MoveTargetExists(b)) => a == b,
            (
                ApplyPatchError::IoError {
                    context: ctx_a,
                    source: src_a,
                },
                ApplyPatchError::IoError {
                    context: ctx_b,
                    source: src_b,
                },
            ) => ctx_a == ctx_b && src_a.kind() == src_b.kind(),
            _ => false,
        }
    }
}

/// Counts of what a successfully applied patch touched.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ApplyPatchSummary {
    pub added: usize,
    pub updated: usize,
    pub deleted: usize,
}

impl std::fmt::Display for ApplyPatchSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Applied patch: added {}, updated {}, deleted {}.",
            self.added, self.updated, self.deleted
        )
    }
}

/// Parses `patch` and applies it relative to `base_dir`.
///
/// The whole patch is parsed before anything touches the filesystem, so a
/// malformed patch mutates nothing. Operations are then applied in order
/// and there is no rollback: if operation k fails, operations 1..k-1 stay
/// committed.
pub fn apply_patch(patch: &str, base_dir: &Path) -> Result<ApplyPatchSummary, ApplyPatchError> {
    let hunks = parse_patch(patch)?;
    apply_hunks(&hunks, base_dir)
}

pub fn apply_hunks(hunks: &[Hunk], base_dir: &Path) -> Result<ApplyPatchSummary, ApplyPatchError> {
    let mut summary = ApplyPatchSummary::default();
    for hunk in hunks {
        match hunk {
            Hunk::AddFile { path, lines } => {
                let target = resolve_path(base_dir, path);
                if target.is_file() {
                    return Err(ApplyPatchError::AddTargetExists(display(path)));
                }
                create_parent_dirs(&target)?;
                std::fs::write(&target, lines.join("\n")).map_err(|e| {
                    ApplyPatchError::io(format!("Failed to write file {}", target.display()), e)
                })?;
                debug!(path = %target.display(), "added file");
                summary.added += 1;
            }
            Hunk::DeleteFile { path } => {
                let target = resolve_path(base_dir, path);
                if !target.is_file() {
                    return Err(ApplyPatchError::DeleteTargetMissing(display(path)));
                }
                std::fs::remove_file(&target).map_err(|e| {
                    ApplyPatchError::io(format!("Failed to delete file {}", target.display()), e)
                })?;
                debug!(path = %target.display(), "deleted file");
                summary.deleted += 1;
            }
            Hunk::UpdateFile {
                path,
                move_path,
                chunks,
                is_end_of_file,
            } => {
                let target = resolve_path(base_dir, path);
                if !target.is_file() {
                    return Err(ApplyPatchError::UpdateTargetMissing(display(path)));
                }
                let original = std::fs::read_to_string(&target).map_err(|e| {
                    ApplyPatchError::io(format!("Failed to read file {}", target.display()), e)
                })?;
                let mut file = FileLines::parse(&original);
                file.apply_chunks(chunks)
                    .ok_or_else(|| ApplyPatchError::ContextNotFound(display(path)))?;
                if *is_end_of_file {
                    file.ends_with_newline = false;
                }
                std::fs::write(&target, file.render()).map_err(|e| {
                    ApplyPatchError::io(format!("Failed to write file {}", target.display()), e)
                })?;

                if let Some(move_path) = move_path {
                    let destination = resolve_path(base_dir, move_path);
                    if destination.is_file() {
                        return Err(ApplyPatchError::MoveTargetExists(display(move_path)));
                    }
                    create_parent_dirs(&destination)?;
                    std::fs::rename(&target, &destination).map_err(|e| {
                        ApplyPatchError::io(
                            format!("Failed to move file {}", target.display()),
                            e,
                        )
                    })?;
                }
                debug!(path = %target.display(), "updated file");
                summary.updated += 1;
            }
        }
    }
    Ok(summary)
}

/// A text file split into lines, remembering how it should be written back.
#[derive(Debug, PartialEq)]
struct FileLines {
    lines: Vec<String>,
    newline: &'static str,
    ends_with_newline: bool,
}

impl FileLines {
    fn parse(content: &str) -> Self {
        let ends_with_newline = content.ends_with('\n') || content.ends_with('\r');
        let newline = if content.contains("\r\n") { "\r\n" } else { "\n" };
        let normalized = content.replace("\r\n", "\n").replace('\r', "\n");
        let mut lines: Vec<String> = normalized.split('\n').map(str::to_string).collect();
        if ends_with_newline && lines.last().is_some_and(String::is_empty) {
            lines.pop();
        }
        Self {
            lines,
            newline,
            ends_with_newline,
        }
    }

    /// Applies chunks with a forward-only cursor. Returns `None` when a
    /// chunk's old lines cannot be found at or after the cursor.
    fn apply_chunks(&mut self, chunks: &[UpdateFileChunk]) -> Option<()> {
        let mut cursor = 0;
        for chunk in chunks {
            let start = if chunk.old_lines.is_empty() {
                cursor.min(self.lines.len())
            } else {
                seek_sequence::seek_sequence(&self.lines, &chunk.old_lines, cursor)?
            };
            self.lines.splice(
                start..start + chunk.old_lines.len(),
                chunk.new_lines.iter().cloned(),
            );
            cursor = start + chunk.new_lines.len();
        }
        Some(())
    }

    fn render(&self) -> String {
        let mut content = self.lines.join(self.newline);
        if self.ends_with_newline {
            content.push_str(self.newline);
        }
        content
    }
}

fn resolve_path(base_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

fn create_parent_dirs(path: &Path) -> Result<(), ApplyPatchError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|e| {
            ApplyPatchError::io(
                format!("Failed to create parent directories for {}", path.display()),
                e,
            )
        })?;
    }
    Ok(())
}

fn display(path: &Path) -> String {
    path.display().to_string()
}
