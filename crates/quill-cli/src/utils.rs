//! Shared utilities

/// Truncate a string to `max` characters, appending "..." if truncated.
/// Operates on Unicode char boundaries, not bytes.
pub fn truncate_chars(s: &str, max: usize) -> String {
    let mut chars = s.chars();
    let truncated: String = chars.by_ref().take(max).collect();
    if chars.next().is_some() {
        format!("{}...", truncated)
    } else {
        truncated
    }
}

/// Collapse a multi-line text to one line for list views
pub fn one_line(s: &str, max: usize) -> String {
    truncate_chars(&s.replace('\n', " "), max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_chars_counts_chars() {
        assert_eq!(truncate_chars("héllo", 3), "hél...");
        assert_eq!(truncate_chars("hi", 3), "hi");
    }

    #[test]
    fn test_one_line() {
        assert_eq!(one_line("a\nb", 10), "a b");
    }
}
