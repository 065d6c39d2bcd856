//! Fixed-window source chunker.
//!
//! Splits a file into overlapping character windows and records
//! 1-based line numbers for each window via binary search over a
//! precomputed line-offset table. Non-UTF-8 files are skipped by
//! returning an empty list with no error, so binaries never reach the
//! embedding backend.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Window size in characters.
const CHUNK_SIZE: usize = 1000;

/// Overlap between consecutive windows in characters.
const CHUNK_OVERLAP: usize = 100;

/// A contiguous code fragment, the unit of indexing and retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub file_path: String,
    pub content: String,
    /// 1-based line of the first character in the chunk.
    pub start_line: usize,
    /// 1-based line of the last character in the chunk.
    pub end_line: usize,
}

/// Reads a file and splits it into chunks.
///
/// Returns an empty list for non-UTF-8 or blank files; only the read
/// itself can fail.
pub fn chunk_file(path: &Path) -> std::io::Result<Vec<Chunk>> {
    let bytes = std::fs::read(path)?;
    let Ok(content) = String::from_utf8(bytes) else {
        return Ok(Vec::new());
    };
    Ok(chunk_content(&path.display().to_string(), &content))
}

/// Splits `content` into overlapping windows tagged with line numbers.
pub fn chunk_content(file_path: &str, content: &str) -> Vec<Chunk> {
    if content.trim().is_empty() {
        return Vec::new();
    }

    // Char offset of the first character of each line.
    let mut line_offsets = vec![0usize];
    for (offset, c) in content.chars().enumerate() {
        if c == '\n' {
            line_offsets.push(offset + 1);
        }
    }

    // 1-based line containing the given char offset.
    let find_line = |offset: usize| -> usize {
        line_offsets
            .partition_point(|&start| start <= offset)
            .max(1)
    };

    let chars: Vec<char> = content.chars().collect();
    let step = CHUNK_SIZE - CHUNK_OVERLAP;
    let mut chunks = Vec::new();
    let mut start = 0;

    loop {
        let end = (start + CHUNK_SIZE).min(chars.len());
        chunks.push(Chunk {
            file_path: file_path.to_string(),
            content: chars[start..end].iter().collect(),
            start_line: find_line(start),
            end_line: find_line(end.saturating_sub(1)),
        });
        if end == chars.len() {
            break;
        }
        start += step;
    }

    chunks
}
