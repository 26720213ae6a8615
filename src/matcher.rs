//! Line-window fuzzy matching.
//!
//! The pattern is compared against every window of the same number of lines in
//! the content. Each comparison uses the Ratcliff/Obershelp ratio with whole
//! lines as the comparison unit:
//! 1. Find the longest run of identical consecutive lines in both sequences
//! 2. Recurse into the unmatched regions to its left and right
//! 3. Score `2 * matched / total` over both sequences
//!
//! The scan is O(windows * pattern_len^2) line comparisons and is not chunked,
//! so very large files block the caller for the full scan.

/// The best window found by [`locate`].
#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    /// The window's original lines joined with `\n`.
    pub text: String,
    /// Similarity of the window to the pattern, in `[0, 1]`.
    pub ratio: f64,
    /// 0-based index of the window's first line in the content.
    pub start_line: usize,
    /// Number of lines in the window.
    pub line_count: usize,
}

/// Locate the span of `content` that best matches `search_text`.
///
/// Blank lines in the pattern are dropped while blank lines in the content are
/// kept, so a pattern with blank lines matches a shorter window than it spans.
/// Ties keep the earliest window. Returns `None` unless the best ratio is
/// strictly greater than `threshold`.
pub fn locate(search_text: &str, content: &str, threshold: f64) -> Option<Match> {
    let search_lines: Vec<&str> = search_text.split('\n').filter(|l| !l.is_empty()).collect();
    let content_lines: Vec<&str> = content.split('\n').collect();

    if search_lines.len() > content_lines.len() {
        return None;
    }

    let window = search_lines.len();
    let mut best_ratio = 0.0_f64;
    let mut best_start: Option<usize> = None;

    for start in 0..=content_lines.len() - window {
        let ratio = similarity_ratio(&search_lines, &content_lines[start..start + window]);
        if ratio > best_ratio {
            best_ratio = ratio;
            best_start = Some(start);
        }
    }

    let start = best_start?;
    if best_ratio <= threshold {
        return None;
    }

    Some(Match {
        text: content_lines[start..start + window].join("\n"),
        ratio: best_ratio,
        start_line: start,
        line_count: window,
    })
}

/// Ratcliff/Obershelp similarity of two line sequences.
///
/// Two empty sequences are identical (ratio 1.0).
pub fn similarity_ratio(a: &[&str], b: &[&str]) -> f64 {
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matched_lines(a, b) as f64 / total as f64
}

/// Total length of the matching blocks between `a` and `b`.
fn matched_lines(a: &[&str], b: &[&str]) -> usize {
    let mut matched = 0;
    let mut pending = vec![(0, a.len(), 0, b.len())];

    while let Some((alo, ahi, blo, bhi)) = pending.pop() {
        let (i, j, size) = longest_match(a, b, alo, ahi, blo, bhi);
        if size == 0 {
            continue;
        }
        matched += size;
        if alo < i && blo < j {
            pending.push((alo, i, blo, j));
        }
        if i + size < ahi && j + size < bhi {
            pending.push((i + size, ahi, j + size, bhi));
        }
    }

    matched
}

/// Longest run of equal lines in `a[alo..ahi]` and `b[blo..bhi]`.
///
/// Returns `(i, j, size)`. Among runs of equal size the one starting earliest
/// in `a` wins, then the one starting earliest in `b`.
fn longest_match(
    a: &[&str],
    b: &[&str],
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let width = bhi - blo;
    let mut best = (alo, blo, 0);
    // run_len[k + 1] = length of the run ending at a[i - 1], b[blo + k]
    let mut prev = vec![0usize; width + 1];
    let mut curr = vec![0usize; width + 1];

    for i in alo..ahi {
        for k in 0..width {
            let j = blo + k;
            curr[k + 1] = if a[i] == b[j] { prev[k] + 1 } else { 0 };
            let run = curr[k + 1];
            if run > best.2 {
                best = (i + 1 - run, j + 1 - run, run);
            }
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;

    const THRESHOLD: f64 = 0.70;

    #[test]
    fn test_exact_subsequence_is_returned_verbatim() {
        let content = "alpha\nbeta\ngamma\ndelta";
        let m = locate("beta\ngamma", content, THRESHOLD).unwrap();
        assert_eq!(m.text, "beta\ngamma");
        assert_eq!(m.ratio, 1.0);
        assert_eq!(m.start_line, 1);
        assert_eq!(m.line_count, 2);
    }

    #[test]
    fn test_no_shared_lines() {
        let content = "one\ntwo\nthree";
        assert!(locate("four\nfive", content, THRESHOLD).is_none());
    }

    #[test]
    fn test_tolerates_drift_above_threshold() {
        let content = "fn main() {\n    let x = 1;\n    let y = 2;\n    println!(\"{}\", x + y);\n}";
        let search = "fn main() {\n    let x = 1;\n    let y = 3;\n    println!(\"{}\", x + y);";
        let m = locate(search, content, THRESHOLD).unwrap();
        // 3 of 4 lines agree: 2 * 3 / 8
        assert_eq!(m.ratio, 0.75);
        assert_eq!(
            m.text,
            "fn main() {\n    let x = 1;\n    let y = 2;\n    println!(\"{}\", x + y);"
        );
    }

    #[test]
    fn test_below_threshold() {
        let content = "a\nb\nc\nd\nz";
        assert!(locate("a\nb\nc\nx\ny", content, THRESHOLD).is_none());
        let m = locate("a\nb\nc\nx\ny", content, 0.5).unwrap();
        assert_eq!(m.ratio, 0.6);
    }

    #[test]
    fn test_threshold_is_strict() {
        let content = "l0\nl1\nl2\nl3\nl4\nl5\nl6\nl7\nl8\nl9";
        let search = "l0\nl1\nl2\nl3\nl4\nl5\nl6\nx\ny\nz";
        assert!(locate(search, content, THRESHOLD).is_none());
        let m = locate(search, content, 0.69).unwrap();
        assert_eq!(m.ratio, 0.7);
    }

    #[test]
    fn test_ties_keep_earliest_window() {
        let content = "head\nrepeat\ntail\nrepeat\ntail";
        let m = locate("repeat\ntail", content, THRESHOLD).unwrap();
        assert_eq!(m.start_line, 1);
    }

    #[test]
    fn test_blank_pattern_lines_are_dropped() {
        let content = "first\nsecond\nthird";
        let m = locate("first\n\nsecond\n", content, THRESHOLD).unwrap();
        assert_eq!(m.text, "first\nsecond");
        assert_eq!(m.line_count, 2);
    }

    #[test]
    fn test_content_blank_lines_are_kept() {
        let content = "first\n\nsecond";
        let m = locate("first\nsecond", content, 0.4).unwrap();
        assert_eq!(m.text, "first\n");
        assert_eq!(m.ratio, 0.5);
    }

    #[test]
    fn test_pattern_longer_than_content() {
        assert!(locate("a\nb\nc", "a\nb", THRESHOLD).is_none());
    }

    #[test]
    fn test_empty_pattern_matches_empty_window_at_start() {
        let m = locate("", "anything\nhere", THRESHOLD).unwrap();
        assert_eq!(m.text, "");
        assert_eq!(m.start_line, 0);
        assert_eq!(m.line_count, 0);
    }

    #[test]
    fn test_ratio_recurses_into_gaps() {
        let a = ["x", "a", "b", "y", "c"];
        let b = ["a", "b", "q", "c", "r"];
        // blocks: [a, b] then [c]
        assert_eq!(similarity_ratio(&a, &b), 2.0 * 3.0 / 10.0);
    }

    #[test]
    fn test_ratio_of_empty_sequences() {
        assert_eq!(similarity_ratio(&[], &[]), 1.0);
        assert_eq!(similarity_ratio(&["a"], &[]), 0.0);
    }

    #[test]
    fn test_longest_match_prefers_earliest() {
        let a = ["p", "q", "p", "q"];
        let b = ["p", "q"];
        assert_eq!(longest_match(&a, &b, 0, 4, 0, 2), (0, 0, 2));
    }
}
