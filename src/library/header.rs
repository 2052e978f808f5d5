//! Leading tag-line parsing.
//!
//! A post may open with a line made only of `{tag}` groups:
//!
//! ```text
//! {rust}{notes}{pinned}
//! Body text starts here.
//! ```
//!
//! The line is recognized only when every non-blank character on it belongs to
//! a group. Trailing spaces, tabs and the `\r` of a CRLF ending are tolerated;
//! anything else (leading whitespace, text between or after groups, an empty
//! `{}`) makes the line ordinary content.

/// Reserved tag that pins a post ahead of everything else
pub const PINNED_TAG: &str = "pinned";

/// Result of splitting a raw source into its tag header and canonical body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header<'a> {
    /// Tags in declaration order, de-duplicated, without `pinned`
    pub tags: Vec<String>,

    /// Whether the reserved `pinned` tag was declared
    pub pinned: bool,

    /// Canonical content (the source minus the tag line)
    pub body: &'a str,
}

/// Split a raw source into tags and canonical content
pub fn split_header(raw: &str) -> Header<'_> {
    let (first_line, rest) = match raw.find('\n') {
        Some(pos) => (&raw[..pos], &raw[pos + 1..]),
        None => (raw, ""),
    };

    match parse_tag_line(first_line) {
        Some(groups) => {
            let mut tags: Vec<String> = Vec::with_capacity(groups.len());
            let mut pinned = false;

            for name in groups {
                if name == PINNED_TAG {
                    pinned = true;
                } else if !tags.iter().any(|t| t == name) {
                    tags.push(name.to_string());
                }
            }

            Header {
                tags,
                pinned,
                body: rest,
            }
        }
        None => Header {
            tags: Vec::new(),
            pinned: false,
            body: raw,
        },
    }
}

/// Parse a line of `{name}` groups, returning the names if the whole line matches
fn parse_tag_line(line: &str) -> Option<Vec<&str>> {
    let mut remaining = line.trim_end_matches(|c| matches!(c, ' ' | '\t' | '\r'));
    let mut groups = Vec::new();

    while !remaining.is_empty() {
        let inner = remaining.strip_prefix('{')?;
        let close = inner.find('}')?;
        let name = &inner[..close];

        if name.is_empty() || name.contains('{') {
            return None;
        }

        groups.push(name);
        remaining = &inner[close + 1..];
    }

    if groups.is_empty() {
        None
    } else {
        Some(groups)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_and_pin_extracted() {
        let header = split_header("{a}{b}{pinned}\nBody text");

        assert_eq!(header.tags, vec!["a".to_string(), "b".to_string()]);
        assert!(header.pinned);
        assert_eq!(header.body, "Body text");
    }

    #[test]
    fn test_plain_first_line_is_content() {
        let raw = "Just a normal sentence.\nMore text";
        let header = split_header(raw);

        assert!(header.tags.is_empty());
        assert!(!header.pinned);
        assert_eq!(header.body, raw);
    }

    #[test]
    fn test_trailing_whitespace_tolerated() {
        let header = split_header("{rust} \t\r\nBody");
        assert_eq!(header.tags, vec!["rust".to_string()]);
        assert_eq!(header.body, "Body");
    }

    #[test]
    fn test_trailing_text_rejects_line() {
        let raw = "{rust} is great\nBody";
        let header = split_header(raw);
        assert!(header.tags.is_empty());
        assert_eq!(header.body, raw);
    }

    #[test]
    fn test_leading_whitespace_rejects_line() {
        let raw = " {rust}\nBody";
        assert_eq!(split_header(raw).body, raw);
    }

    #[test]
    fn test_gap_between_groups_rejects_line() {
        let raw = "{a} {b}\nBody";
        assert!(split_header(raw).tags.is_empty());
    }

    #[test]
    fn test_empty_and_nested_groups_reject_line() {
        assert!(split_header("{}\nBody").tags.is_empty());
        assert!(split_header("{a{b}}\nBody").tags.is_empty());
        assert!(split_header("{unclosed\nBody").tags.is_empty());
    }

    #[test]
    fn test_header_only_source() {
        let header = split_header("{draft}");
        assert_eq!(header.tags, vec!["draft".to_string()]);
        assert_eq!(header.body, "");
    }

    #[test]
    fn test_duplicate_tags_collapsed() {
        let header = split_header("{a}{b}{a}{pinned}{pinned}\nx");
        assert_eq!(header.tags, vec!["a".to_string(), "b".to_string()]);
        assert!(header.pinned);
    }

    #[test]
    fn test_only_first_line_considered() {
        let raw = "Intro\n{a}{b}\nBody";
        let header = split_header(raw);
        assert!(header.tags.is_empty());
        assert_eq!(header.body, raw);
    }
}
