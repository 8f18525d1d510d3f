//! Filename sanitizer

/// Characters that are never allowed in a path segment
const FORBIDDEN: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Maximum number of characters kept before the ellipsis is appended
pub const MAX_NAME_CHARS: usize = 200;

/// Make a string safe to use as a file or directory name
///
/// Steps, in order:
/// 1. drop `< > : " / \ | ? *`
/// 2. drop anything that is not a word character, whitespace, `-`, `_`, `.`, `(` or `)`
/// 3. collapse whitespace runs to one space and trim
/// 4. cut to 200 characters and append `...` when longer
///
/// The function is total and depends only on its input.
///
/// # Examples
///
/// ```
/// use tubeshelf::naming::sanitize;
///
/// assert_eq!(sanitize("Title: With/Slashes?"), "Title WithSlashes");
/// assert_eq!(sanitize("  Spaced    out  "), "Spaced out");
/// ```
pub fn sanitize(text: &str) -> String {
    let without_forbidden: String = text.chars().filter(|c| !FORBIDDEN.contains(c)).collect();

    let whitelisted: String = without_forbidden
        .chars()
        .filter(|&c| is_word_char(c) || c.is_whitespace() || matches!(c, '-' | '.' | '(' | ')'))
        .collect();

    let collapsed = whitelisted.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() > MAX_NAME_CHARS {
        let mut truncated: String = collapsed.chars().take(MAX_NAME_CHARS).collect();
        truncated.push_str("...");
        truncated
    } else {
        collapsed
    }
}

/// Unicode word character (letters, digits, underscore)
fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forbidden_characters_are_removed_not_replaced() {
        assert_eq!(sanitize("Title/With/Slashes"), "TitleWithSlashes");
        assert_eq!(sanitize("Title:With:Colons"), "TitleWithColons");
        assert_eq!(sanitize("Title<With>Brackets"), "TitleWithBrackets");
        assert_eq!(sanitize("Title|With|Pipes"), "TitleWithPipes");
        assert_eq!(sanitize("Title?With?Questions"), "TitleWithQuestions");
        assert_eq!(sanitize("Title*With*Stars"), "TitleWithStars");
        assert_eq!(sanitize("Title\"With\"Quotes"), "TitleWithQuotes");
        assert_eq!(sanitize("Back\\Slash"), "BackSlash");
    }

    #[test]
    fn other_punctuation_is_dropped_but_whitelist_survives() {
        assert_eq!(sanitize("Rock & Roll!"), "Rock Roll");
        assert_eq!(sanitize("Part (1) - the_end."), "Part (1) - the_end.");
        assert_eq!(sanitize("It's #1 @home"), "Its 1 home");
    }

    #[test]
    fn unicode_letters_are_kept() {
        assert_eq!(sanitize("Café Olé"), "Café Olé");
        assert_eq!(sanitize("日本語 タイトル"), "日本語 タイトル");
    }

    #[test]
    fn whitespace_is_collapsed_and_trimmed() {
        assert_eq!(sanitize("  a \t b\n\nc  "), "a b c");
        // Removing punctuation can leave double spaces behind
        assert_eq!(sanitize("a & b"), "a b");
    }

    #[test]
    fn long_names_are_truncated_with_ellipsis() {
        let long = "A".repeat(300);
        let out = sanitize(&long);
        assert!(out.chars().count() <= MAX_NAME_CHARS + 3);
        assert!(out.ends_with("..."));
        assert_eq!(out, format!("{}...", "A".repeat(200)));

        let exact = "B".repeat(200);
        assert_eq!(sanitize(&exact), exact);
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        let long = "é".repeat(250);
        let out = sanitize(&long);
        assert_eq!(out.chars().count(), 203);
    }

    #[test]
    fn output_never_contains_forbidden_characters() {
        let nasty = "<>:\"/\\|?* mixed <up> \"stuff\" a/b\\c|d?e*f";
        let out = sanitize(nasty);
        assert!(!out.chars().any(|c| FORBIDDEN.contains(&c)), "{out:?}");
    }

    #[test]
    fn clean_input_is_unchanged() {
        for clean in [
            "Only Connect - Series 21 - Episode 3",
            "Game of Thrones S01E01",
            "University Challenge S55E04 - Newcastle v. Edinburgh",
        ] {
            assert_eq!(sanitize(clean), clean);
            assert_eq!(sanitize(&sanitize(clean)), clean);
        }
    }

    #[test]
    fn empty_and_all_forbidden_inputs_give_empty_output() {
        assert_eq!(sanitize(""), "");
        assert_eq!(sanitize("???***"), "");
    }
}
