//! Transcript post-processing.

/// Clean raw decoder output: collapse whitespace runs (including
/// newlines) to single spaces and remove stray spaces before
/// punctuation left behind by segment joining.
pub fn clean_transcript(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");

    let mut cleaned = collapsed;
    for p in ['.', ',', '!', '?', ':', ';'] {
        let spaced = format!(" {}", p);
        let plain = p.to_string();
        while cleaned.contains(&spaced) {
            cleaned = cleaned.replace(&spaced, &plain);
        }
    }

    cleaned.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_whitespace_runs() {
        assert_eq!(clean_transcript("one   two\t three"), "one two three");
    }

    #[test]
    fn collapses_newlines() {
        assert_eq!(clean_transcript("line one\n\nline two"), "line one line two");
    }

    #[test]
    fn removes_space_before_punctuation() {
        assert_eq!(
            clean_transcript("Hello , world . How are you ?"),
            "Hello, world. How are you?"
        );
    }

    #[test]
    fn handles_repeated_space_punctuation() {
        assert_eq!(clean_transcript("wait  .  .  ."), "wait...");
    }

    #[test]
    fn trims_edges() {
        assert_eq!(clean_transcript("  padded  "), "padded");
    }

    #[test]
    fn empty_input_stays_empty() {
        assert_eq!(clean_transcript(""), "");
        assert_eq!(clean_transcript("   \n\t "), "");
    }

    #[test]
    fn plain_text_is_untouched() {
        assert_eq!(
            clean_transcript("The quick brown fox."),
            "The quick brown fox."
        );
    }
}
