use once_cell::sync::Lazy;
use regex::Regex;

static MENTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"<@!?\d+>").expect("valid mention pattern"));

/// Removes user-mention tokens (`<@123>`, `<@!123>`) and leaves everything else untouched.
pub fn strip_mentions(text: &str) -> String {
    MENTION.replace_all(text, "").into_owned()
}

/// Substitutes `{key}` placeholders in `template` in a single pass.
///
/// Substituted values are copied verbatim and never rescanned, so a value that
/// itself contains `{key}` text reaches the output unchanged. Unknown braces
/// are kept as they are.
pub fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open..];
        let hit = values.iter().find_map(|(key, value)| {
            tail.strip_prefix('{')
                .and_then(|t| t.strip_prefix(*key))
                .and_then(|t| t.strip_prefix('}'))
                .map(|after| (*value, after))
        });
        match hit {
            Some((value, after)) => {
                out.push_str(value);
                rest = after;
            }
            None => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Longest prefix of `text` holding at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Splits `text` into consecutive pieces of at most `budget` characters.
///
/// Cuts always land on character boundaries, so concatenating the pieces gives
/// back `text` exactly. Empty input yields no pieces.
pub fn split_chunks(text: &str, budget: usize) -> Vec<&str> {
    assert!(budget > 0, "chunk budget must be positive");
    let mut chunks = Vec::new();
    let mut rest = text;
    while !rest.is_empty() {
        let head = truncate_chars(rest, budget);
        chunks.push(head);
        rest = &rest[head.len()..];
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_only_numeric_mentions() {
        assert_eq!(strip_mentions("<@123> hello <@!42>there"), " hello there");
        assert_eq!(strip_mentions("mail me @ <@abc> or <@>"), "mail me @ <@abc> or <@>");
        assert_eq!(strip_mentions("no mentions, ünïcode ✓"), "no mentions, ünïcode ✓");
    }

    #[test]
    fn fill_template_does_not_rescan_values() {
        let filled = fill_template(
            "{a}|{b}|{c}|{unknown}",
            &[("a", "{b}"), ("b", "x{c}"), ("c", "{a}")],
        );
        assert_eq!(filled, "{b}|x{c}|{a}|{unknown}");
        assert_eq!(fill_template("{{a}} {", &[("a", "1")]), "{1} {");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("abc", 0), "");
    }

    #[test]
    fn chunks_cover_text_exactly() {
        let text = "a".repeat(4001);
        let chunks = split_chunks(&text, 1800);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 1800);
        assert_eq!(chunks[2].len(), 401);
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn chunks_count_is_ceiling_of_char_length() {
        let text = "🔥".repeat(10);
        let chunks = split_chunks(&text, 3);
        assert_eq!(chunks.len(), 4);
        assert!(chunks.iter().all(|c| c.chars().count() <= 3));
        assert_eq!(chunks.concat(), text);
        assert!(split_chunks("", 5).is_empty());
    }
}
