//! Plain-text projection of rich-text (Markdown) content.
//!
//! The projection is lossy and one-way: structural markup is stripped,
//! headings become a numbered outline, emphasis markers and link targets are
//! dropped, every line is trimmed, and blank-line runs collapse to one.
//!
//! Each line's text is settled to a fixed point within the single pass, so
//! nested markup (`# # x`, `&amp;amp;`, `[[a](b)](c)`) is fully unwrapped and
//! applying [`to_plain_text`] to its own output is a no-op.

use std::sync::LazyLock;

use regex::Regex;

const RULE: &str = "────────────────────";

static HEADING: LazyLock<Regex> = LazyLock::new(|| pattern(r"^(#{1,6})\s+(.+)$"));
static BULLET: LazyLock<Regex> = LazyLock::new(|| pattern(r"^[-*+]\s+(.*)$"));
static LEADING_HEADING: LazyLock<Regex> = LazyLock::new(|| pattern(r"^#{1,6}\s+"));
static LEADING_BULLET: LazyLock<Regex> = LazyLock::new(|| pattern(r"^[-*+]\s+"));
static THEMATIC_BREAK: LazyLock<Regex> = LazyLock::new(|| pattern(r"^(\*{3,}|-{3,}|_{3,})$"));
static IMAGE: LazyLock<Regex> = LazyLock::new(|| pattern(r"!\[([^\]]*)\]\([^)]*\)"));
static LINK: LazyLock<Regex> = LazyLock::new(|| pattern(r"\[([^\]]+)\]\([^)]*\)"));
static STAR_EMPHASIS: LazyLock<Regex> = LazyLock::new(|| pattern(r"\*([^*\s][^*]*?)\*"));
static UNDERSCORE_EMPHASIS: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"(^|[^\w])_([^_\s][^_]*?)_([^\w]|$)"));

fn pattern(source: &str) -> Regex {
    Regex::new(source).expect("hard-coded pattern compiles")
}

/// Projects rich-text `content` to plain text.
///
/// Idempotent: `to_plain_text(&to_plain_text(x)) == to_plain_text(x)`.
pub fn to_plain_text(content: &str) -> String {
    let mut outline = Outline::default();
    let mut lines: Vec<String> = Vec::new();

    for raw in content.lines() {
        let line = raw.trim();
        if line.starts_with("```") {
            continue;
        }
        let line = strip_quote_markers(line);

        if let Some(caps) = HEADING.captures(line) {
            let level = caps[1].len();
            let title = settle(&caps[2]);
            if level >= 2 {
                lines.push(String::new());
            }
            lines.push(outline.label(level, &title).trim_end().to_string());
        } else if THEMATIC_BREAK.is_match(line) {
            lines.push(RULE.to_string());
        } else if line.starts_with('|') {
            if let Some(row) = table_row(line) {
                lines.push(settle(&row));
            }
        } else if let Some(caps) = BULLET.captures(line) {
            lines.push(format!("• {}", settle(&caps[1])).trim_end().to_string());
        } else {
            lines.push(settle(line));
        }
    }

    collapse_blank_runs(lines).trim().to_string()
}

/// Repeats [`settle_once`] until the text stops changing.
///
/// The result carries no leading block marker and no inline markup, so a
/// later projection reads it as a plain line and leaves it alone.
fn settle(text: &str) -> String {
    let mut current = text.trim().to_string();
    loop {
        // Every step shortens the text, drops its pipes or lands on RULE.
        let next = settle_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn settle_once(text: &str) -> String {
    let text = strip_quote_markers(text.trim());
    if THEMATIC_BREAK.is_match(text) {
        return RULE.to_string();
    }
    if text.starts_with('|') {
        return table_row(text).unwrap_or_default();
    }
    let text = LEADING_HEADING.replace(text, "");
    let text = LEADING_BULLET.replace(&text, "");
    inline(&text).trim().to_string()
}

fn strip_quote_markers(line: &str) -> &str {
    let mut rest = line;
    while let Some(stripped) = rest.strip_prefix('>') {
        rest = stripped.trim_start();
    }
    rest
}

/// Hierarchical heading counters for levels 2 to 4.
#[derive(Default)]
struct Outline {
    counters: [u32; 3],
}

impl Outline {
    fn label(&mut self, level: usize, title: &str) -> String {
        match level {
            1 => title.to_string(),
            2..=4 => {
                let depth = level - 2;
                self.counters[depth] += 1;
                for deeper in &mut self.counters[depth + 1..] {
                    *deeper = 0;
                }
                let number = self.counters[..=depth]
                    .iter()
                    .map(u32::to_string)
                    .collect::<Vec<_>>()
                    .join(".");
                if depth == 0 {
                    format!("{number}. {title}")
                } else {
                    format!("{number} {title}")
                }
            }
            _ => format!("• {title}"),
        }
    }
}

fn table_row(line: &str) -> Option<String> {
    let is_separator = line.contains('-')
        && line.chars().all(|c| matches!(c, '|' | '-' | ':' | ' '));
    if is_separator {
        return None;
    }
    let cells: Vec<&str> = line
        .split('|')
        .map(str::trim)
        .filter(|cell| !cell.is_empty())
        .collect();
    Some(inline(&cells.join("  ")).trim().to_string())
}

fn inline(text: &str) -> String {
    let text = IMAGE.replace_all(text, "${1}");
    let text = LINK.replace_all(&text, "${1}");
    let text = text
        .replace('`', "")
        .replace("**", "")
        .replace("__", "")
        .replace("~~", "");
    let text = STAR_EMPHASIS.replace_all(&text, "${1}");
    let text = UNDERSCORE_EMPHASIS.replace_all(&text, "${1}${2}${3}");
    decode_entities(&text)
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

fn collapse_blank_runs(lines: Vec<String>) -> String {
    let mut out: Vec<String> = Vec::with_capacity(lines.len());
    for line in lines {
        if line.is_empty() && out.last().is_some_and(String::is_empty) {
            continue;
        }
        out.push(line);
    }
    out.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_headings_become_numbered_outline() {
        let md = "# Title\n\nIntro **bold** text.\n\n## Background\n\nSee [docs](http://x).\n\n### Detail\n\n- item one\n- item two\n\n## Next\n";
        assert_eq!(
            to_plain_text(md),
            "Title\n\nIntro bold text.\n\n1. Background\n\nSee docs.\n\n1.1 Detail\n\n• item one\n• item two\n\n2. Next"
        );
    }

    #[test]
    fn test_deep_headings() {
        let md = "## A\n### B\n#### C\n##### D\n### E";
        assert_eq!(to_plain_text(md), "1. A\n\n1.1 B\n\n1.1.1 C\n\n• D\n\n1.2 E");
    }

    #[test]
    fn test_code_fences_are_dropped_but_code_kept() {
        let md = "Before\n```rust\nfn main() {}\n```\nAfter `inline`";
        assert_eq!(to_plain_text(md), "Before\nfn main() {}\nAfter inline");
    }

    #[test]
    fn test_blank_runs_collapse_and_lines_trim() {
        assert_eq!(to_plain_text("  a  \n\n\n\n   b\n\n"), "a\n\nb");
    }

    #[test]
    fn test_tables_quotes_and_rules() {
        let md = "| Name | Value |\n|------|:-----:|\n| x | 1 |\n\n> quoted *text*\n\n---";
        assert_eq!(
            to_plain_text(md),
            format!("Name  Value\nx  1\n\nquoted text\n\n{RULE}")
        );
    }

    #[test]
    fn test_images_and_entities() {
        assert_eq!(
            to_plain_text("![logo](a.png) Fish &amp; Chips &lt;3"),
            "logo Fish & Chips <3"
        );
    }

    #[test]
    fn test_snake_case_words_keep_underscores() {
        assert_eq!(to_plain_text("call my_func_name now"), "call my_func_name now");
        assert_eq!(to_plain_text("an _emphasised_ word"), "an emphasised word");
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(to_plain_text(""), "");
        assert_eq!(to_plain_text("\n\n  \n"), "");
    }

    #[test]
    fn test_projection_of_projection_is_unchanged() {
        let md = "# T\n## &amp;lt; H\n> > - **x** [y](z)\n|a|b|\n|--|--|\n";
        let once = to_plain_text(md);
        assert_eq!(to_plain_text(&once), once);
    }

    #[test]
    fn test_nested_entities_unwrap_completely() {
        let md = format!("&{}", "amp;".repeat(100));
        let once = to_plain_text(&md);
        assert_eq!(once, "&");
        assert_eq!(to_plain_text(&once), once);

        assert_eq!(to_plain_text("&amp;amp;lt;b&amp;gt;"), "<b>");
    }

    #[test]
    fn test_stacked_heading_markers_collapse() {
        let md = format!("{}x", "# ".repeat(100));
        let once = to_plain_text(&md);
        assert_eq!(once, "x");
        assert_eq!(to_plain_text(&once), once);

        let md = format!("## {}Scope", "# ".repeat(70));
        assert_eq!(to_plain_text(&md), "1. Scope");
    }

    #[test]
    fn test_interleaved_block_markers_collapse() {
        let md = format!("{}**done**", "# - > ".repeat(40));
        let once = to_plain_text(&md);
        assert_eq!(once, "done");
        assert_eq!(to_plain_text(&once), once);
    }

    #[test]
    fn test_nested_links_keep_innermost_text() {
        let md = format!("{}a{}", "[".repeat(80), "](b)".repeat(80));
        let once = to_plain_text(&md);
        assert_eq!(once, "a");
        assert_eq!(to_plain_text(&once), once);
    }

    #[test]
    fn test_markup_revealed_by_inline_stripping_is_settled() {
        assert_eq!(to_plain_text("`# - x`"), "x");
        assert_eq!(to_plain_text("# `---`"), RULE);
        assert_eq!(to_plain_text("- `| a | b |`"), "• a  b");
        assert_eq!(to_plain_text("&gt; quoted"), "quoted");
    }

    fn nesting_fragment() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("# ".to_string()),
            Just("- ".to_string()),
            Just("> ".to_string()),
            Just("&amp;".to_string()),
            Just("`".to_string()),
            Just("**".to_string()),
            Just("[".to_string()),
            Just("](u)".to_string()),
        ]
    }

    fn markdown_fragment() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("# ".to_string()),
            Just("## ".to_string()),
            Just("### ".to_string()),
            Just("#### ".to_string()),
            Just("- ".to_string()),
            Just("> ".to_string()),
            Just("**".to_string()),
            Just("*".to_string()),
            Just("_".to_string()),
            Just("`".to_string()),
            Just("```".to_string()),
            Just("---".to_string()),
            Just("| ".to_string()),
            Just("[a](b)".to_string()),
            Just("![i](j)".to_string()),
            Just("&amp;".to_string()),
            Just("\n".to_string()),
            Just("\n\n\n".to_string()),
            Just("  ".to_string()),
            "[a-z0-9 .]{1,8}",
            "[\\PC]{1,4}",
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        #[test]
        fn prop_projection_is_idempotent(parts in prop::collection::vec(markdown_fragment(), 0..24)) {
            let input = parts.concat();
            let once = to_plain_text(&input);
            prop_assert_eq!(to_plain_text(&once), once);
        }

        #[test]
        fn prop_projection_is_idempotent_on_deep_nesting(
            parts in prop::collection::vec(nesting_fragment(), 64..160),
            tail in "[a-z&;<> ]{0,12}",
        ) {
            let input = format!("{}{tail}", parts.concat());
            let once = to_plain_text(&input);
            prop_assert_eq!(to_plain_text(&once), once);
        }

        #[test]
        fn prop_projection_is_idempotent_on_arbitrary_text(input in "\\PC{0,120}") {
            let once = to_plain_text(&input);
            prop_assert_eq!(to_plain_text(&once), once);
        }
    }
}
