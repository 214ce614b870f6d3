//! MDX text analysis
//!
//! Posts are stored as MDX source and rendered by the frontend. On save the
//! backend only needs two derived values: the estimated reading time and a
//! plain-text excerpt. Both come from walking the Markdown with
//! pulldown-cmark after ESM lines are dropped; JSX shows up as HTML events
//! and is skipped.

use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd};

/// Words read per minute
pub const WORDS_PER_MINUTE: usize = 200;

/// Excerpt length in characters, before the ellipsis
pub const EXCERPT_CHARS: usize = 160;

/// Values derived from a post body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MdxSummary {
    pub word_count: usize,
    pub reading_minutes: i64,
    pub excerpt: String,
}

/// Analyse an MDX body
pub fn summarize(body_mdx: &str) -> MdxSummary {
    let markdown = strip_esm(body_mdx);

    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);

    let mut word_count = 0;
    let mut prose = String::new();
    let mut in_code_block = false;

    for event in Parser::new_ext(&markdown, options) {
        match event {
            Event::Start(Tag::CodeBlock(_)) => in_code_block = true,
            Event::End(TagEnd::CodeBlock) => in_code_block = false,
            Event::Text(text) => {
                word_count += text.split_whitespace().count();
                if !in_code_block {
                    push_prose(&mut prose, &text);
                }
            }
            Event::Code(code) => {
                word_count += code.split_whitespace().count();
                push_prose(&mut prose, &code);
            }
            Event::SoftBreak | Event::HardBreak => push_prose(&mut prose, " "),
            Event::End(TagEnd::Paragraph) | Event::End(TagEnd::Heading(_)) | Event::End(TagEnd::Item) => {
                push_prose(&mut prose, " ")
            }
            _ => {}
        }
    }

    MdxSummary {
        word_count,
        reading_minutes: reading_minutes(word_count),
        excerpt: excerpt(&prose, EXCERPT_CHARS),
    }
}

/// Minutes at `WORDS_PER_MINUTE`, rounded up, never below 1
pub fn reading_minutes(word_count: usize) -> i64 {
    word_count.div_ceil(WORDS_PER_MINUTE).max(1) as i64
}

/// Collapse whitespace and cut to `max_chars` on a word boundary.
///
/// A truncated excerpt ends with `…`.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if normalized.chars().count() <= max_chars {
        return normalized;
    }

    let cut: String = normalized.chars().take(max_chars).collect();
    let next_is_space = normalized.chars().nth(max_chars) == Some(' ');
    let trimmed = if next_is_space {
        cut.as_str()
    } else {
        match cut.rfind(' ') {
            Some(idx) if idx > 0 => &cut[..idx],
            _ => cut.as_str(),
        }
    };

    format!(
        "{}…",
        trimmed.trim_end_matches(|c: char| c.is_whitespace() || c == ',' || c == ';' || c == ':')
    )
}

fn push_prose(prose: &mut String, text: &str) {
    prose.push_str(text);
}

/// Drop top-level `import`/`export` lines outside fenced code
fn strip_esm(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut fence: Option<&str> = None;

    for line in source.lines() {
        let trimmed = line.trim_start();
        if let Some(marker) = fence {
            if trimmed.starts_with(marker) {
                fence = None;
            }
        } else if trimmed.starts_with("```") {
            fence = Some("```");
        } else if trimmed.starts_with("~~~") {
            fence = Some("~~~");
        } else if line.starts_with("import ") || line.starts_with("export ") {
            continue;
        }
        out.push_str(line);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimum_one_minute() {
        assert_eq!(summarize("").reading_minutes, 1);
        assert_eq!(summarize("Just a few words.").reading_minutes, 1);
    }

    #[test]
    fn test_reading_minutes_rounds_up() {
        assert_eq!(reading_minutes(200), 1);
        assert_eq!(reading_minutes(201), 2);
        assert_eq!(reading_minutes(1000), 5);
    }

    #[test]
    fn test_esm_and_jsx_are_ignored() {
        let body = "import Chart from '../components/Chart'\nexport const meta = { draft: true }\n\n# Title\n\n<Chart data={points} />\n\nBody text here.\n";
        let summary = summarize(body);
        assert_eq!(summary.excerpt, "Title Body text here.");
        assert_eq!(summary.word_count, 4);
    }

    #[test]
    fn test_import_inside_code_fence_is_kept() {
        let body = "```js\nimport x from 'y'\n```\n";
        let summary = summarize(body);
        assert_eq!(summary.word_count, 4);
        assert_eq!(summary.excerpt, "");
    }

    #[test]
    fn test_markup_is_stripped_from_excerpt() {
        let summary = summarize("Some **bold** and [a link](https://example.com) and `code`.");
        assert_eq!(summary.excerpt, "Some bold and a link and code.");
    }

    #[test]
    fn test_excerpt_truncates_on_word_boundary() {
        let text = "alpha beta gamma delta";
        assert_eq!(excerpt(text, 13), "alpha beta…");
        assert_eq!(excerpt(text, 10), "alpha beta…");
        assert_eq!(excerpt(text, 100), text);
    }
}
