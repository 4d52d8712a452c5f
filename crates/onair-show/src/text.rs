//! Script clean-up and sentence segmentation.
//!
//! A generated script goes through three steps before synthesis:
//! [`strip_markup`] removes formatting that must never be read aloud,
//! [`split_sentences`] cuts it into units at terminal punctuation, and
//! [`speakable`] drops stage directions from each sentence.

/// Words that end in a period without ending a sentence.
const ABBREVIATIONS: &[&str] = &[
    "mr", "mrs", "ms", "dr", "prof", "sr", "jr", "st", "vs", "etc", "e.g", "i.e", "inc", "ltd",
    "co", "no", "approx", "dept", "est", "fig", "mt", "u.s", "u.k", "a.m", "p.m",
];

/// Remove formatting a language model tends to emit around its answer.
///
/// Handles:
/// - reasoning blocks (`<think>`, `<reasoning>`) → removed entirely
/// - fenced code blocks → removed
/// - headings, blockquotes, list markers → text only
/// - links `[text](url)` → text
/// - inline code, `**bold**`, `__bold__`, `~~strike~~` → text only
/// - HTML tags → removed
///
/// Single-asterisk actions (`*laughs.*`), bracketed and parenthesised
/// directions are kept: they matter to segmentation and are dropped later by
/// [`speakable`].
#[must_use]
pub fn strip_markup(text: &str) -> String {
    let text = strip_tag_block(text, "<think", "</think>");
    let text = strip_tag_block(&text, "<reasoning>", "</reasoning>");

    let mut out = String::with_capacity(text.len());
    let mut in_code_block = false;
    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("```") {
            in_code_block = !in_code_block;
            continue;
        }
        if in_code_block || is_horizontal_rule(trimmed) {
            continue;
        }
        let cleaned = strip_line(trimmed);
        if !cleaned.trim().is_empty() {
            out.push(' ');
            out.push_str(&cleaned);
        }
    }
    collapse_whitespace(&out)
}

/// Split a script into sentences.
///
/// A sentence ends at `.`, `!`, `?` or `…` (plus any closing quotes)
/// followed by whitespace or the end of the text. No split happens inside
/// `*...*`, `[...]` or `(...)`, after a known abbreviation or an initial, or
/// inside a number such as `3.5`. An ellipsis only ends a sentence when the
/// next word is capitalised.
#[must_use]
pub fn split_sentences(text: &str) -> Vec<String> {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let byte_after = |i: usize| chars.get(i + 1).map_or(text.len(), |&(pos, _)| pos);

    let mut sentences = Vec::new();
    let mut start = 0;
    let mut depth = 0usize;
    let mut in_action = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i].1;
        match c {
            '(' | '[' => depth += 1,
            ')' | ']' => depth = depth.saturating_sub(1),
            '*' if is_action_marker(&chars, i, in_action) => in_action = !in_action,
            _ => {}
        }

        if is_terminal(c) && depth == 0 && !in_action {
            let mut end = i;
            while chars
                .get(end + 1)
                .is_some_and(|&(_, next)| is_terminal(next) || is_closing_quote(next))
            {
                end += 1;
            }
            let at_break = chars.get(end + 1).is_none_or(|&(_, next)| next.is_whitespace());
            let run = &text[chars[i].0..byte_after(end)];

            if at_break && ends_sentence(text, &chars, i, end, run) {
                let sentence = text[start..byte_after(end)].trim();
                if !sentence.is_empty() {
                    sentences.push(sentence.to_string());
                }
                start = byte_after(end);
            }
            i = end + 1;
            continue;
        }
        i += 1;
    }

    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail.to_string());
    }
    sentences
}

/// The part of a sentence a voice should actually say.
///
/// Drops `*actions*`, `[directions]` and `(asides)`. May return an empty
/// string for a sentence that is nothing but a direction.
#[must_use]
pub fn speakable(sentence: &str) -> String {
    let chars: Vec<(usize, char)> = sentence.char_indices().collect();
    let mut out = String::with_capacity(sentence.len());
    let mut depth = 0usize;
    let mut in_action = false;

    for (i, &(_, c)) in chars.iter().enumerate() {
        match c {
            '(' | '[' => depth += 1,
            ')' | ']' if depth > 0 => depth -= 1,
            '*' if is_action_marker(&chars, i, in_action) => in_action = !in_action,
            _ if depth == 0 && !in_action => out.push(c),
            _ => {}
        }
    }

    let spoken = collapse_whitespace(&out);
    // A leftover run of punctuation is not worth a synthesis call.
    if spoken.chars().any(char::is_alphanumeric) {
        spoken
    } else {
        String::new()
    }
}

// ── Segmentation helpers ───────────────────────────────────────────

const fn is_terminal(c: char) -> bool {
    matches!(c, '.' | '!' | '?' | '…')
}

const fn is_closing_quote(c: char) -> bool {
    matches!(c, '"' | '\'' | '\u{201D}' | '\u{2019}')
}

/// A `*` opens an action when followed by a non-space and closes one when
/// preceded by a non-space. `5 * 3` is neither.
fn is_action_marker(chars: &[(usize, char)], i: usize, in_action: bool) -> bool {
    if in_action {
        i > 0 && !chars[i - 1].1.is_whitespace()
    } else {
        chars.get(i + 1).is_some_and(|&(_, next)| !next.is_whitespace() && next != '*')
            && (i == 0 || chars[i - 1].1 != '*')
    }
}

fn ends_sentence(text: &str, chars: &[(usize, char)], first: usize, last: usize, run: &str) -> bool {
    if run.contains("...") || run.contains('…') {
        return chars[last + 1..]
            .iter()
            .map(|&(_, c)| c)
            .find(|c| !c.is_whitespace())
            .is_none_or(char::is_uppercase);
    }
    if run != "." {
        return true;
    }

    let word_start = chars[..first]
        .iter()
        .rev()
        .find(|&&(_, c)| c.is_whitespace() || c == '(' || c == '"')
        .map_or(0, |&(pos, c)| pos + c.len_utf8());
    let word = &text[word_start..chars[first].0];

    let is_initial = {
        let mut it = word.chars();
        matches!((it.next(), it.next()), (Some(c), None) if c.is_uppercase())
    };
    !(is_initial || ABBREVIATIONS.contains(&word.to_lowercase().as_str()))
}

// ── Markup helpers ─────────────────────────────────────────────────

/// Remove every `<open…>…close` block, case-insensitively.
fn strip_tag_block(text: &str, open_prefix: &str, close_tag: &str) -> String {
    let haystack = text.to_ascii_lowercase();
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;

    while let Some(offset) = haystack[cursor..].find(open_prefix) {
        let open = cursor + offset;
        let closed = haystack[open..].find('>').and_then(|gt| {
            let body = open + gt + 1;
            haystack[body..]
                .find(close_tag)
                .map(|close| body + close + close_tag.len())
        });
        out.push_str(&text[cursor..open]);
        match closed {
            Some(end) => cursor = end,
            // Unterminated block: everything after it is reasoning too.
            None => return out,
        }
    }
    out.push_str(&text[cursor..]);
    out
}

fn is_horizontal_rule(line: &str) -> bool {
    let marks: Vec<char> = line.chars().filter(|c| !c.is_whitespace()).collect();
    marks.len() >= 3
        && matches!(marks[0], '-' | '*' | '_')
        && marks.iter().all(|&c| c == marks[0])
}

fn strip_line(line: &str) -> String {
    let mut s = line.trim_start_matches('>').trim_start();
    s = s.trim_start_matches('#').trim_start();
    for bullet in ["- ", "+ ", "• "] {
        if let Some(rest) = s.strip_prefix(bullet) {
            s = rest;
        }
    }
    if let Some(pos) = s.find(|c: char| !c.is_ascii_digit()) {
        if pos > 0 && (s[pos..].starts_with(". ") || s[pos..].starts_with(") ")) {
            s = &s[pos + 2..];
        }
    }

    let s = strip_links(s);
    let s = s.replace("**", "").replace("__", "").replace("~~", "").replace('`', "");
    strip_html_tags(&s)
}

fn strip_links(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(open) = rest.find('[') {
        let after = &rest[open + 1..];
        let link = after.find("](").and_then(|close| {
            after[close + 2..]
                .find(')')
                .map(|end| (&after[..close], close + 2 + end + 1))
        });
        match link {
            Some((label, consumed)) if !label.contains('[') => {
                out.push_str(&rest[..open]);
                out.push_str(label);
                rest = &after[consumed..];
            }
            _ => {
                out.push_str(&rest[..=open]);
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

fn strip_html_tags(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_tag = false;
    for (i, c) in text.char_indices() {
        match c {
            '<' if text[i + 1..].starts_with(|n: char| n.is_ascii_alphabetic() || n == '/') => {
                in_tag = true;
            }
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_terminal_punctuation() {
        let s = split_sentences("Good evening. Are you ready? Let's go!");
        assert_eq!(s, vec!["Good evening.", "Are you ready?", "Let's go!"]);
    }

    #[test]
    fn keeps_closing_quotes_with_their_sentence() {
        let s = split_sentences("She said \"no way.\" Then she left.");
        assert_eq!(s, vec!["She said \"no way.\"", "Then she left."]);
    }

    #[test]
    fn abbreviations_and_decimals_do_not_split() {
        let s = split_sentences("Dr. Smith measured 3.5 degrees, e.g. a record. Wow.");
        assert_eq!(
            s,
            vec!["Dr. Smith measured 3.5 degrees, e.g. a record.", "Wow."]
        );
    }

    #[test]
    fn initials_do_not_split() {
        let s = split_sentences("J. R. Tolkien wrote it. Classic.");
        assert_eq!(s, vec!["J. R. Tolkien wrote it.", "Classic."]);
    }

    #[test]
    fn never_splits_inside_stage_directions() {
        let s = split_sentences("That's wild! *laughs. loudly.* Anyway [pause... beat.] we move on. (sighs.) Next.");
        assert_eq!(
            s,
            vec![
                "That's wild!",
                "*laughs. loudly.* Anyway [pause... beat.] we move on.",
                "(sighs.) Next.",
            ]
        );
    }

    #[test]
    fn multiplication_is_not_an_action() {
        let s = split_sentences("Five * three is fifteen. Math.");
        assert_eq!(s, vec!["Five * three is fifteen.", "Math."]);
    }

    #[test]
    fn ellipsis_splits_only_before_a_capital() {
        assert_eq!(
            split_sentences("Well... I think so."),
            vec!["Well...", "I think so."]
        );
        assert_eq!(
            split_sentences("Well... maybe not."),
            vec!["Well... maybe not."]
        );
    }

    #[test]
    fn text_without_punctuation_is_one_sentence() {
        assert_eq!(split_sentences("  no punctuation here  "), vec!["no punctuation here"]);
        assert!(split_sentences("   ").is_empty());
    }

    #[test]
    fn strips_reasoning_blocks() {
        let text = "<think>Let me plan the joke.</think>\nHere's the news. <THINK duration=\"2\">hidden</THINK>Bye.";
        assert_eq!(strip_markup(text), "Here's the news. Bye.");
    }

    #[test]
    fn unterminated_reasoning_is_dropped() {
        assert_eq!(strip_markup("Hello. <think>still going"), "Hello.");
    }

    #[test]
    fn strips_markdown_but_keeps_actions() {
        let text = "## Tonight\n- **Big** story: [the vote](https://example.com)\n*grins.* `Stay` tuned.";
        assert_eq!(
            strip_markup(text),
            "Tonight Big story: the vote *grins.* Stay tuned."
        );
    }

    #[test]
    fn code_blocks_and_rules_are_removed() {
        let text = "Before.\n```\nlet x = 1;\n```\n---\nAfter.";
        assert_eq!(strip_markup(text), "Before. After.");
    }

    #[test]
    fn comparison_signs_survive_tag_stripping() {
        assert_eq!(strip_markup("Rates < 3 percent. <b>Bold</b>."), "Rates < 3 percent. Bold.");
    }

    #[test]
    fn speakable_drops_directions() {
        assert_eq!(speakable("*laughs.* Anyway, back to you."), "Anyway, back to you.");
        assert_eq!(speakable("Right [pause] so (quietly) yes."), "Right so yes.");
        assert_eq!(speakable("[pause...]"), "");
        assert_eq!(speakable("(sighs.) ."), "");
    }
}
