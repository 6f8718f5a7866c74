//! Plain-text export of a chat, for the clipboard, `.txt` download and PDF pages.

use crate::chat::{ChatMessage, ChatRole};
use crate::{CareError, CareResult};

/// Page geometry, measured in characters and lines.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageLayout {
    pub chars_per_line: usize,
    pub lines_per_page: usize,
}

impl PageLayout {
    /// # Errors
    ///
    /// Returns `CareError::InvalidInput` if either dimension is zero.
    pub fn new(chars_per_line: usize, lines_per_page: usize) -> CareResult<Self> {
        if chars_per_line == 0 || lines_per_page == 0 {
            return Err(CareError::InvalidInput(
                "page layout needs at least one line of one character".into(),
            ));
        }
        Ok(Self {
            chars_per_line,
            lines_per_page,
        })
    }
}

impl Default for PageLayout {
    /// A4 at 10pt with 10mm margins, roughly.
    fn default() -> Self {
        Self {
            chars_per_line: 95,
            lines_per_page: 38,
        }
    }
}

/// Render `messages` as `Q: …` / `A: …` blocks separated by blank lines.
///
/// Questions are written as typed. Answers use their structured plain-text form. Messages
/// with no text are skipped.
pub fn transcript_text(messages: &[ChatMessage]) -> String {
    entries(messages).collect::<Vec<_>>().join("\n\n")
}

fn entries(messages: &[ChatMessage]) -> impl Iterator<Item = String> + '_ {
    messages.iter().filter_map(|message| {
        let text = message.plain_text();
        if text.trim().is_empty() {
            return None;
        }
        Some(match message.role {
            ChatRole::User => format!("Q: {text}"),
            ChatRole::Assistant => format!("A: {text}"),
        })
    })
}

/// Word-wrap `text` to at most `width` characters per line.
///
/// Existing line breaks are kept, blank lines included. A line's leading indent, together with
/// a `- ` or `* ` bullet marker, stays on its first wrapped line and counts against the width;
/// an indent is cut to `width - 1` characters so some text always follows it. Words longer
/// than the room left on a line are split.
pub fn wrap_lines(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();

    for paragraph in text.split('\n') {
        let (prefix, body) = split_prefix(paragraph);
        let mut current: String = prefix.chars().take(width - 1).collect();
        let mut current_len = current.chars().count();
        let mut has_words = false;

        for word in body.split_whitespace() {
            let mut word: Vec<char> = word.chars().collect();

            loop {
                let gap = usize::from(has_words);
                if current_len + gap + word.len() <= width {
                    if has_words {
                        current.push(' ');
                    }
                    current_len += gap + word.len();
                    current.extend(word);
                    has_words = true;
                    break;
                }
                if has_words {
                    lines.push(std::mem::take(&mut current));
                    current_len = 0;
                    has_words = false;
                    continue;
                }
                let rest = word.split_off(width - current_len);
                current.extend(word);
                lines.push(std::mem::take(&mut current));
                current_len = 0;
                word = rest;
            }
        }

        lines.push(current);
    }

    lines
}

/// Leading whitespace plus any bullet marker, and the text after them.
fn split_prefix(line: &str) -> (&str, &str) {
    let body = line.trim_start();
    let indent_len = line.len() - body.len();
    let marker_len = if body.starts_with("- ") || body.starts_with("* ") {
        2
    } else {
        0
    };
    line.split_at(indent_len + marker_len)
}

/// Split a transcript into pages of wrapped lines.
///
/// Each message starts on a fresh line and is followed by one blank line. A message never
/// begins on the last line of a page; it moves to the next page instead.
pub fn paginate(messages: &[ChatMessage], layout: PageLayout) -> Vec<Vec<String>> {
    let mut pages: Vec<Vec<String>> = Vec::new();
    let mut page: Vec<String> = Vec::new();

    for entry in entries(messages) {
        if !page.is_empty() && page.len() + 1 >= layout.lines_per_page {
            pages.push(std::mem::take(&mut page));
        }
        for line in wrap_lines(&entry, layout.chars_per_line) {
            if page.len() == layout.lines_per_page {
                pages.push(std::mem::take(&mut page));
            }
            page.push(line);
        }
        if page.len() < layout.lines_per_page {
            page.push(String::new());
        }
    }

    while page.last().is_some_and(String::is_empty) {
        page.pop();
    }
    if !page.is_empty() {
        pages.push(page);
    }
    pages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markdown::FormattedResponse;

    fn headache_chat() -> Vec<ChatMessage> {
        vec![
            ChatMessage::user("What helps a headache?"),
            ChatMessage::assistant_formatted(FormattedResponse::parse(
                "## Advice\n**Rest** and hydrate.\n- Drink water\n- Dim lights",
            )),
        ]
    }

    #[test]
    fn test_transcript_text_q_and_a() {
        assert_eq!(
            transcript_text(&headache_chat()),
            "Q: What helps a headache?\n\nA: ## Advice\n**Rest** and hydrate.\n\n  - Drink water\n  - Dim lights"
        );
    }

    #[test]
    fn test_transcript_of_empty_chat_is_empty() {
        assert_eq!(transcript_text(&[]), "");
    }

    #[test]
    fn test_transcript_skips_empty_questions() {
        let messages = vec![ChatMessage::user(""), ChatMessage::assistant_text("hi")];
        assert_eq!(transcript_text(&messages), "A: hi");
    }

    #[test]
    fn test_wrap_lines_breaks_on_words() {
        assert_eq!(
            wrap_lines("the quick brown fox", 10),
            vec!["the quick", "brown fox"]
        );
    }

    #[test]
    fn test_wrap_lines_splits_long_words_and_keeps_blank_lines() {
        assert_eq!(
            wrap_lines("abcdefghij\n\nxy", 4),
            vec!["abcd", "efgh", "ij", "", "xy"]
        );
    }

    #[test]
    fn test_wrap_lines_keeps_list_indent() {
        assert_eq!(
            wrap_lines("  - Drink water", 40),
            vec!["  - Drink water"]
        );
    }

    #[test]
    fn test_wrap_lines_indent_counts_against_first_chunk() {
        assert_eq!(
            wrap_lines("  abcdefghij", 4),
            vec!["  ab", "cdef", "ghij"]
        );
    }

    #[test]
    fn test_wrap_lines_keeps_bullet_with_long_word() {
        assert_eq!(
            wrap_lines("  - Supercalifragilistic", 10),
            vec!["  - Superc", "alifragili", "stic"]
        );
    }

    #[test]
    fn test_wrap_lines_clamps_wide_indent() {
        let lines = wrap_lines("      ab", 3);
        assert_eq!(lines, vec!["  a", "b"]);
        assert!(lines.iter().all(|l| l.chars().count() <= 3));
    }

    #[test]
    fn test_wrap_lines_never_exceeds_width() {
        let text = "A: ## Advice\n\n  - Drink plenty of water\n      deeply indented words";
        for width in 1..12 {
            for line in wrap_lines(text, width) {
                assert!(line.chars().count() <= width, "{line:?} wider than {width}");
            }
        }
    }

    #[test]
    fn test_paginate_moves_to_next_page() {
        let messages: Vec<ChatMessage> = (0..4)
            .map(|i| ChatMessage::user(format!("question {i}")))
            .collect();
        let pages = paginate(&messages, PageLayout::new(40, 4).unwrap());

        assert_eq!(
            pages,
            vec![
                vec!["Q: question 0", "", "Q: question 1", ""],
                vec!["Q: question 2", "", "Q: question 3"],
            ]
        );
    }

    #[test]
    fn test_paginate_splits_long_answer_across_pages() {
        let messages = vec![ChatMessage::assistant_text("one two three four five six")];
        let pages = paginate(&messages, PageLayout::new(8, 2).unwrap());
        assert_eq!(
            pages,
            vec![vec!["A: one", "two"], vec!["three", "four"], vec!["five six"]]
        );
    }

    #[test]
    fn test_layout_rejects_zero() {
        assert!(PageLayout::new(0, 10).is_err());
        assert!(PageLayout::new(10, 0).is_err());
    }
}
