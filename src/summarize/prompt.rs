//! Role-marked chat prompt for the summarization model.
//!
//! The template wraps a fixed system instruction and the input text in
//! the turn markers the instruct model was trained on; generation stops
//! when the model emits the end-of-turn marker.

use crate::defaults::{SUMMARY_REQUEST, SYSTEM_INSTRUCTION};

/// Marker opening a conversation turn.
pub const TURN_START: &str = "<|im_start|>";

/// Marker closing a conversation turn; also the stop marker during generation.
pub const END_OF_TURN: &str = "<|im_end|>";

/// Render a system block, a user block, and an open assistant turn.
pub fn chat_prompt(system: &str, user: &str) -> String {
    format!(
        "{TURN_START}system\n{system}{END_OF_TURN}\n\
         {TURN_START}user\n{user}{END_OF_TURN}\n\
         {TURN_START}assistant\n"
    )
}

/// The full summarization prompt for one transcript.
pub fn summary_prompt(text: &str) -> String {
    chat_prompt(SYSTEM_INSTRUCTION, &format!("{SUMMARY_REQUEST}\n\n{text}"))
}

/// Remove the end-of-turn marker and surrounding whitespace from model output.
pub fn strip_end_of_turn(output: &str) -> String {
    output.replace(END_OF_TURN, "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_prompt_has_all_three_blocks() {
        let p = chat_prompt("be brief", "hello");
        assert!(p.starts_with("<|im_start|>system\nbe brief<|im_end|>\n"));
        assert!(p.contains("<|im_start|>user\nhello<|im_end|>\n"));
        assert!(p.ends_with("<|im_start|>assistant\n"));
    }

    #[test]
    fn summary_prompt_embeds_the_text() {
        let p = summary_prompt("meeting notes go here");
        assert!(p.contains("meeting notes go here"));
        assert!(p.contains(SYSTEM_INSTRUCTION));
        assert!(p.contains(SUMMARY_REQUEST));
    }

    #[test]
    fn strip_removes_marker_and_whitespace() {
        assert_eq!(strip_end_of_turn("summary text<|im_end|>\n"), "summary text");
        assert_eq!(strip_end_of_turn("  plain  "), "plain");
    }

    #[test]
    fn strip_removes_multiple_markers() {
        assert_eq!(strip_end_of_turn("<|im_end|>a<|im_end|>"), "a");
    }

    #[test]
    fn strip_of_marker_only_is_empty() {
        assert_eq!(strip_end_of_turn("<|im_end|>"), "");
        assert_eq!(strip_end_of_turn("   "), "");
    }
}
