/// Parser for Go's `-coverprofile` format.
///
/// Reference: https://go.dev/blog/cover
///
/// Format:
///   mode: set|count|atomic
///   <file>:<startLine>.<startCol>,<endLine>.<endCol> <numStatements> <count>
///
/// Every non-empty line after the optional mode header must be a block.
/// Blocks that describe the same range (as produced by concatenating
/// profiles) are folded together the way `go tool cover` does it.
use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use super::ProfileParser;
use crate::error::{CovgateError, Result};
use crate::model::StatementRange;

static BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.+):([0-9]+)\.([0-9]+),([0-9]+)\.([0-9]+) ([0-9]+) ([0-9]+)$").unwrap()
});

/// Counting mode declared in the profile header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Set,
    Count,
    Atomic,
}

impl std::str::FromStr for Mode {
    type Err = CovgateError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "set" => Ok(Mode::Set),
            "count" => Ok(Mode::Count),
            "atomic" => Ok(Mode::Atomic),
            _ => Err(CovgateError::ProfileParse {
                line: 1,
                message: format!("unknown mode '{s}'"),
            }),
        }
    }
}

/// Go coverage profile parser.
pub struct GocoverParser;

impl ProfileParser for GocoverParser {
    fn parse(&self, input: &[u8]) -> Result<Vec<StatementRange>> {
        parse(input)
    }

    fn filter(&self, input: &[u8], keep: &dyn Fn(&str) -> bool) -> Vec<u8> {
        filter(input, keep)
    }
}

/// Parse Go coverage profile from raw bytes.
pub fn parse(input: &[u8]) -> Result<Vec<StatementRange>> {
    if input.iter().all(u8::is_ascii_whitespace) {
        return Err(CovgateError::EmptyProfile);
    }

    let mut mode = Mode::Set;
    let mut file_order: Vec<String> = Vec::new();
    let mut file_blocks: HashMap<String, Vec<(usize, StatementRange)>> = HashMap::new();

    for (idx, raw) in input.split(|b| *b == b'\n').enumerate() {
        let line_no = idx + 1;
        let line = std::str::from_utf8(raw)
            .map_err(|_| CovgateError::ProfileParse {
                line: line_no,
                message: "invalid UTF-8".to_string(),
            })?
            .trim();
        if line.is_empty() {
            continue;
        }

        if let Some(m) = line.strip_prefix("mode:") {
            if !file_order.is_empty() {
                return Err(CovgateError::ProfileParse {
                    line: line_no,
                    message: "mode header after coverage blocks".to_string(),
                });
            }
            mode = m.trim().parse().map_err(|_| CovgateError::ProfileParse {
                line: line_no,
                message: format!("unknown mode '{}'", m.trim()),
            })?;
            continue;
        }

        let block = parse_block_line(line).ok_or_else(|| CovgateError::ProfileParse {
            line: line_no,
            message: format!("malformed block '{line}'"),
        })?;
        if !file_blocks.contains_key(&block.path) {
            file_order.push(block.path.clone());
        }
        file_blocks
            .entry(block.path.clone())
            .or_default()
            .push((line_no, block));
    }

    let mut ranges = Vec::new();
    for path in file_order {
        if let Some(blocks) = file_blocks.remove(&path) {
            ranges.extend(fold_duplicates(blocks, mode)?);
        }
    }
    Ok(ranges)
}

/// Keep the mode header and the block lines whose path passes `keep`.
/// Lines that are not valid blocks are dropped.
pub fn filter(input: &[u8], keep: &dyn Fn(&str) -> bool) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len());
    for raw in input.split(|b| *b == b'\n') {
        let Ok(line) = std::str::from_utf8(raw) else {
            continue;
        };
        let line = line.trim();
        let kept = line.starts_with("mode:")
            || parse_block_line(line).is_some_and(|block| keep(&block.path));
        if kept {
            out.extend_from_slice(line.as_bytes());
            out.push(b'\n');
        }
    }
    out
}

/// Parse a single block line.
fn parse_block_line(line: &str) -> Option<StatementRange> {
    let caps = BLOCK_RE.captures(line)?;
    let num = |i: usize| caps.get(i)?.as_str().parse::<u64>().ok();
    let pos = |i: usize| caps.get(i)?.as_str().parse::<u32>().ok();

    let range = StatementRange {
        path: caps.get(1)?.as_str().to_string(),
        start_line: pos(2)?,
        start_col: pos(3)?,
        end_line: pos(4)?,
        end_col: pos(5)?,
        num_statements: num(6)?,
        hit_count: num(7)?,
    };
    if (range.end_line, range.end_col) < (range.start_line, range.start_col) {
        return None;
    }
    Some(range)
}

/// Sort one file's blocks by position and fold identical ranges together.
/// Each block carries the profile line it came from.
fn fold_duplicates(
    mut blocks: Vec<(usize, StatementRange)>,
    mode: Mode,
) -> Result<Vec<StatementRange>> {
    blocks.sort_by_key(|(line, b)| (b.start_line, b.start_col, b.end_line, b.end_col, *line));

    let mut folded: Vec<StatementRange> = Vec::with_capacity(blocks.len());
    for (line, block) in blocks {
        match folded.last_mut() {
            Some(last)
                if (last.start_line, last.start_col, last.end_line, last.end_col)
                    == (block.start_line, block.start_col, block.end_line, block.end_col) =>
            {
                if last.num_statements != block.num_statements {
                    return Err(CovgateError::ProfileParse {
                        line,
                        message: format!(
                            "inconsistent statement count for {}:{}.{}",
                            block.path, block.start_line, block.start_col
                        ),
                    });
                }
                last.hit_count = match mode {
                    Mode::Set => last.hit_count.max(block.hit_count).min(1),
                    Mode::Count | Mode::Atomic => last.hit_count.saturating_add(block.hit_count),
                };
            }
            _ => folded.push(block),
        }
    }
    Ok(folded)
}
