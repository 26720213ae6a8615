//! SEARCH/REPLACE diff wire format.
//!
//! ```text
//! <<<<<<< SEARCH
//! <lines to find>
//! =======
//! <replacement lines>
//! >>>>>>> REPLACE
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{EditError, EditResult};

pub const SEARCH_MARKER: &str = "<<<<<<< SEARCH";
pub const DIVIDER: &str = "=======";
pub const REPLACE_MARKER: &str = ">>>>>>> REPLACE";

/// One SEARCH/REPLACE unit. Either body may be empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffBlock {
    pub search: String,
    pub replace: String,
}

/// Parse the first SEARCH/REPLACE block in `diff_text`.
pub fn parse(diff_text: &str) -> EditResult<DiffBlock> {
    let lines: Vec<&str> = diff_text.split('\n').collect();
    scan_block(&lines, 0).map(|(block, _)| block)
}

/// Parse up to `limit` consecutive SEARCH/REPLACE blocks.
///
/// Text after the last honored block is ignored. Fails if not even one block
/// is well-formed.
pub fn parse_blocks(diff_text: &str, limit: usize) -> EditResult<Vec<DiffBlock>> {
    let lines: Vec<&str> = diff_text.split('\n').collect();
    let (first, mut next) = scan_block(&lines, 0)?;
    let mut blocks = vec![first];

    while blocks.len() < limit {
        match scan_block(&lines, next) {
            Ok((block, after)) => {
                blocks.push(block);
                next = after;
            }
            Err(_) => break,
        }
    }

    Ok(blocks)
}

/// Render a block in the exact wire format.
pub fn render(block: &DiffBlock) -> String {
    format!(
        "{}\n{}\n{}\n{}\n{}",
        SEARCH_MARKER, block.search, DIVIDER, block.replace, REPLACE_MARKER
    )
}

/// Scan `lines[from..]` for the next block.
/// Returns the block and the index of the line after its REPLACE marker.
///
/// Each marker closes at its first occurrence, so marker-like text further
/// down the payload is never absorbed into a body.
fn scan_block(lines: &[&str], from: usize) -> EditResult<(DiffBlock, usize)> {
    let search_at = find_marker(lines, from, SEARCH_MARKER)
        .ok_or_else(|| EditError::InvalidDiffFormat(format!("missing '{}' marker", SEARCH_MARKER)))?;
    let divider_at = find_marker(lines, search_at + 1, DIVIDER).ok_or_else(|| {
        EditError::InvalidDiffFormat(format!("missing '{}' after '{}'", DIVIDER, SEARCH_MARKER))
    })?;
    let replace_at = find_marker(lines, divider_at + 1, REPLACE_MARKER).ok_or_else(|| {
        EditError::InvalidDiffFormat(format!("missing '{}' after '{}'", REPLACE_MARKER, DIVIDER))
    })?;

    let block = DiffBlock {
        search: lines[search_at + 1..divider_at].join("\n"),
        replace: lines[divider_at + 1..replace_at].join("\n"),
    };
    Ok((block, replace_at + 1))
}

/// Marker lines are compared with trailing whitespace (including `\r`) removed.
fn find_marker(lines: &[&str], from: usize, marker: &str) -> Option<usize> {
    lines
        .iter()
        .enumerate()
        .skip(from)
        .find(|(_, line)| line.trim_end() == marker)
        .map(|(idx, _)| idx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_block() {
        let diff = "<<<<<<< SEARCH\nLine 2: This is the second line.\n=======\nLine 2: This is the modified line.\n>>>>>>> REPLACE";
        let block = parse(diff).unwrap();
        assert_eq!(block.search, "Line 2: This is the second line.");
        assert_eq!(block.replace, "Line 2: This is the modified line.");
    }

    #[test]
    fn test_parse_multiline_bodies() {
        let diff = "<<<<<<< SEARCH\na\nb\n=======\nc\nd\ne\n>>>>>>> REPLACE\n";
        let block = parse(diff).unwrap();
        assert_eq!(block.search, "a\nb");
        assert_eq!(block.replace, "c\nd\ne");
    }

    #[test]
    fn test_empty_bodies_are_valid() {
        let block = parse("<<<<<<< SEARCH\n=======\n>>>>>>> REPLACE").unwrap();
        assert_eq!(block.search, "");
        assert_eq!(block.replace, "");

        let block = parse("<<<<<<< SEARCH\nremove me\n=======\n>>>>>>> REPLACE").unwrap();
        assert_eq!(block.search, "remove me");
        assert_eq!(block.replace, "");
    }

    #[test]
    fn test_surrounding_text_is_ignored() {
        let diff = "Please apply:\n<<<<<<< SEARCH\nold\n=======\nnew\n>>>>>>> REPLACE\nthanks";
        let block = parse(diff).unwrap();
        assert_eq!(block.search, "old");
        assert_eq!(block.replace, "new");
    }

    #[test]
    fn test_non_greedy_takes_first_block_only() {
        let diff = "<<<<<<< SEARCH\none\n=======\nuno\n>>>>>>> REPLACE\n<<<<<<< SEARCH\ntwo\n=======\ndos\n>>>>>>> REPLACE";
        let block = parse(diff).unwrap();
        assert_eq!(block.search, "one");
        assert_eq!(block.replace, "uno");
    }

    #[test]
    fn test_missing_divider() {
        let err = parse("<<<<<<< SEARCH\nold\nnew\n>>>>>>> REPLACE").unwrap_err();
        assert!(matches!(err, EditError::InvalidDiffFormat(_)));
    }

    #[test]
    fn test_markers_out_of_order() {
        let err = parse(">>>>>>> REPLACE\nnew\n=======\nold\n<<<<<<< SEARCH").unwrap_err();
        assert!(matches!(err, EditError::InvalidDiffFormat(_)));
    }

    #[test]
    fn test_missing_search_marker() {
        let err = parse("old\n=======\nnew\n>>>>>>> REPLACE").unwrap_err();
        assert!(matches!(err, EditError::InvalidDiffFormat(_)));
    }

    #[test]
    fn test_crlf_and_trailing_space_markers() {
        let diff = "<<<<<<< SEARCH\r\nold\r\n======= \r\nnew\r\n>>>>>>> REPLACE\r\n";
        let block = parse(diff).unwrap();
        assert_eq!(block.search, "old\r");
        assert_eq!(block.replace, "new\r");
    }

    #[test]
    fn test_parse_blocks_respects_limit() {
        let diff = "<<<<<<< SEARCH\none\n=======\nuno\n>>>>>>> REPLACE\n<<<<<<< SEARCH\ntwo\n=======\ndos\n>>>>>>> REPLACE\n<<<<<<< SEARCH\nthree\n=======\ntres\n>>>>>>> REPLACE";
        assert_eq!(parse_blocks(diff, 1).unwrap().len(), 1);
        let blocks = parse_blocks(diff, 2).unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[1].search, "two");
        assert_eq!(parse_blocks(diff, 10).unwrap().len(), 3);
    }

    #[test]
    fn test_render_produces_wire_format() {
        let block = DiffBlock {
            search: "old".into(),
            replace: "new".into(),
        };
        assert_eq!(
            render(&block),
            "<<<<<<< SEARCH\nold\n=======\nnew\n>>>>>>> REPLACE"
        );
        assert_eq!(parse(&render(&block)).unwrap(), block);
    }
}
