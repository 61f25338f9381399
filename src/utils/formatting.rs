use serenity::all::UserId;

/// Zero-width space inserted after `@` so pasted content cannot ping
const ZERO_WIDTH_SPACE: char = '\u{200b}';

const BAR_WIDTH: usize = 18;

/// Format a user mention
pub fn mention_user(user_id: UserId) -> String {
    format!("<@{}>", user_id)
}

/// Format a channel mention
pub fn mention_channel(channel_id: u64) -> String {
    format!("<#{}>", channel_id)
}

/// Format a number with commas
pub fn format_number(n: i64) -> String {
    let s = n.abs().to_string();
    let mut result = String::new();

    for (count, c) in s.chars().rev().enumerate() {
        if count > 0 && count % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }

    if n < 0 {
        result.push('-');
    }

    result.chars().rev().collect()
}

/// Truncate a string to a maximum number of characters, adding ellipsis if needed
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}

/// Defuse user, role, `@everyone` and `@here` mentions in user-authored text
pub fn sanitize_mentions(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    for c in content.chars() {
        out.push(c);
        if c == '@' {
            out.push(ZERO_WIDTH_SPACE);
        }
    }
    out
}

/// `▬▬▬🔘▬▬▬▬` style bar for the now-playing embed
pub fn progress_bar(position_ms: u64, length_ms: u64) -> String {
    let slot = if length_ms == 0 {
        0
    } else {
        ((position_ms.min(length_ms) as u128 * (BAR_WIDTH - 1) as u128) / length_ms as u128) as usize
    };

    (0..BAR_WIDTH)
        .map(|i| if i == slot { "🔘" } else { "▬" })
        .collect()
}

/// Markdown link with brackets in the label escaped
pub fn link(label: &str, url: &str) -> String {
    format!("[{}]({})", label.replace('[', "(").replace(']', ")"), url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(1234567), "1,234,567");
        assert_eq!(format_number(-1000), "-1,000");
    }

    #[test]
    fn test_truncate_counts_chars() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello world", 8), "hello...");
        assert_eq!(truncate("ééééé", 4), "é...");
    }

    #[test]
    fn test_sanitize_mentions() {
        let cleaned = sanitize_mentions("hi @everyone and <@123>");
        assert!(!cleaned.contains("@everyone"));
        assert!(!cleaned.contains("<@123>"));
        assert_eq!(cleaned.replace(ZERO_WIDTH_SPACE, ""), "hi @everyone and <@123>");
    }

    #[test]
    fn test_progress_bar_bounds() {
        assert!(progress_bar(0, 200_000).starts_with("🔘"));
        assert!(progress_bar(200_000, 200_000).ends_with("🔘"));
        assert!(progress_bar(999_999, 200_000).ends_with("🔘"));
        assert_eq!(progress_bar(10, 0).chars().filter(|c| *c == '▬').count(), BAR_WIDTH - 1);
    }
}
