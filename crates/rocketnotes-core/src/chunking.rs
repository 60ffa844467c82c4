//! Markdown section chunking for embedding.
//!
//! A note is split at level 1-3 headers. Each header stays at the top of the
//! section it opens, text before the first header forms its own section,
//! and header-looking lines inside fenced code blocks are ignored.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::defaults::MIN_EMBED_CHARS;

static HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#{1,3}\s+\S").expect("static header pattern"));

fn is_fence(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with("```") || trimmed.starts_with("~~~")
}

/// Whether text is long enough to be worth embedding.
pub fn is_substantial(text: &str) -> bool {
    text.trim().chars().count() > MIN_EMBED_CHARS
}

/// Split markdown into header-delimited sections, dropping trivial ones.
pub fn split_markdown_sections(markdown: &str) -> Vec<String> {
    let mut sections = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut in_fence = false;

    for line in markdown.lines() {
        if is_fence(line) {
            in_fence = !in_fence;
        } else if !in_fence && HEADER.is_match(line) && !current.is_empty() {
            sections.push(current.join("\n"));
            current.clear();
        }
        current.push(line);
    }
    if !current.is_empty() {
        sections.push(current.join("\n"));
    }

    sections
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| is_substantial(s))
        .collect()
}

/// Text embedded for one section: the document title, a newline, the section.
pub fn chunk_text(title: &str, section: &str) -> String {
    format!("{}\n{}", title, section)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_splits_on_headers_and_keeps_them() {
        let md = "# Groceries list\nmilk and eggs\n## Hardware store\nscrews and nails";
        let sections = split_markdown_sections(md);
        assert_eq!(
            sections,
            vec![
                "# Groceries list\nmilk and eggs".to_string(),
                "## Hardware store\nscrews and nails".to_string(),
            ]
        );
    }

    #[test]
    fn test_preamble_is_its_own_section() {
        let md = "Some leading paragraph text\n# Heading one here\nbody of heading one";
        let sections = split_markdown_sections(md);
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0], "Some leading paragraph text");
    }

    #[test]
    fn test_level_four_header_does_not_split() {
        let md = "# Top level heading\n#### small heading\nstill the same section";
        assert_eq!(split_markdown_sections(md).len(), 1);
    }

    #[test]
    fn test_hashtag_line_does_not_split() {
        let md = "# Reading notes today
#rust #ownership
more about the borrow checker";
        assert_eq!(split_markdown_sections(md).len(), 1);
        assert!(HEADER.is_match("### Heading"));
        assert!(!HEADER.is_match("###   "));
    }

    #[test]
    fn test_headers_inside_code_fence_are_ignored() {
        let md = "# Shell snippets\n```bash\n# not a header, a comment\necho hi\n```\nafter";
        assert_eq!(split_markdown_sections(md).len(), 1);
    }

    #[test]
    fn test_short_sections_are_dropped() {
        let md = "# A\nshort\n# A longer heading\nwith a body that counts";
        let sections = split_markdown_sections(md);
        assert_eq!(sections.len(), 1);
        assert!(sections[0].starts_with("# A longer heading"));
    }

    #[test]
    fn test_is_substantial_boundary() {
        assert!(!is_substantial("twelve chars"));
        assert!(is_substantial("thirteen char"));
        assert!(!is_substantial("   padded   "));
    }

    #[test]
    fn test_chunk_text() {
        assert_eq!(chunk_text("Hello", "World body"), "Hello\nWorld body");
    }

    #[test]
    fn test_empty_input() {
        assert!(split_markdown_sections("").is_empty());
    }
}
