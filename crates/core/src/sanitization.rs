//! Input sanitization for free-text fields that cross a trust boundary:
//! author biographies, work descriptions, and search query strings, all
//! of which are echoed back to clients in the HTTP envelope.

/// Sanitize a generic text field: strip HTML/script content and cap length.
pub fn sanitize_text(input: &str, max_length: usize) -> String {
    let cleaned = ammonia::clean(input);
    cleaned.chars().take(max_length).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_script_tags_from_a_work_description() {
        let input = "A gritty space opera.<script>alert('xss')</script>";
        let result = sanitize_text(input, 256);
        assert!(!result.contains("<script>"));
        assert!(result.contains("gritty space opera"));
    }

    #[test]
    fn strips_inline_event_handlers_from_an_author_bio() {
        let input = "<div onclick=\"steal()\">Ursula K. Le Guin</div>";
        let result = sanitize_text(input, 256);
        assert!(!result.contains("onclick"));
        assert!(result.contains("Ursula K. Le Guin"));
    }

    #[test]
    fn caps_length_to_the_requested_field_limit() {
        let bio = "a".repeat(500);
        let result = sanitize_text(&bio, 120);
        assert_eq!(result.chars().count(), 120);
    }

    #[test]
    fn leaves_plain_text_untouched() {
        let input = "The Left Hand of Darkness, first published 1969.";
        assert_eq!(sanitize_text(input, 256), input);
    }
}
