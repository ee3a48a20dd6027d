use crate::error::AppError;

/// Clamps `input` to at most `limit` characters without splitting a character.
pub fn truncate(input: &str, limit: usize) -> String {
    match input.char_indices().nth(limit) {
        Some((byte_index, _)) => input[..byte_index].to_string(),
        None => input.to_string(),
    }
}

/// Joins path segments into a slash separated store path.
pub fn path<I, S>(segments: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    segments
        .into_iter()
        .map(|segment| segment.as_ref().trim_matches('/').to_string())
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// Rejects values that cannot be a single path segment, Firebase bans `. # $ [ ]` in keys.
pub fn validate_key(field: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::MalformedPayload(format!("{field} must not be empty")));
    }

    if value.contains(['/', '.', '#', '$', '[', ']']) {
        return Err(AppError::MalformedPayload(format!(
            "{field} contains a reserved character"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{path, truncate, validate_key};

    #[test]
    fn test_truncate_ascii() {
        assert_eq!(truncate("hello world", 5), "hello");
        assert_eq!(truncate("short", 50), "short");
        assert_eq!(truncate("", 3), "");
    }

    #[test]
    fn test_truncate_exact_limit() {
        assert_eq!(truncate("abcde", 5), "abcde");
    }

    #[test]
    fn test_truncate_counts_characters() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("日本語テキスト", 3), "日本語");
        assert_eq!(truncate("🦀🦀🦀", 1), "🦀");
    }

    #[test]
    fn test_validate_key() {
        assert!(validate_key("user_id", "alice").is_ok());
        assert!(validate_key("user_id", "uid-42_x").is_ok());
        assert!(validate_key("user_id", "").is_err());
        assert!(validate_key("user_id", "   ").is_err());
        assert!(validate_key("user_id", "alice/decks").is_err());
        assert!(validate_key("user_id", "a.b").is_err());
    }

    #[test]
    fn test_path() {
        assert_eq!(path(["users", "alice"]), "users/alice");
        assert_eq!(path(["decks", "3", "flashcards", "0"]), "decks/3/flashcards/0");
        assert_eq!(path(["/decks/", "", "7"]), "decks/7");
    }
}
