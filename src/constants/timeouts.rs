use std::time::Duration;

/// Per-user interval between interactions on one UI session (default, overridable via env)
pub const DEFAULT_UI_COOLDOWN_SECONDS: u64 = 2;

/// Timeout applied to every outbound HTTP call
pub const DEFAULT_HTTP_TIMEOUT_SECONDS: u64 = 30;

/// Modal dialogs are rejected once this much time passed since they were opened
pub const MODAL_TIMEOUT: Duration = Duration::from_secs(180);

/// Minigame sessions expire after this long without interaction
pub const GAME_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Paginated embeds stay interactive for this long
pub const PAGINATOR_TIMEOUT: Duration = Duration::from_secs(3 * 60);

/// Search result menus stay interactive for this long
pub const SEARCH_MENU_TIMEOUT: Duration = Duration::from_secs(60);

/// Interactive `tag create` prompt for the name
pub const TAG_NAME_PROMPT: Duration = Duration::from_secs(30);

/// Interactive `tag create` prompt for the content
pub const TAG_CONTENT_PROMPT: Duration = Duration::from_secs(120);

/// Invocation error replies delete themselves after this long
pub const INVOCATION_ERROR_TTL: Duration = Duration::from_secs(60);

/// Voice channel connect timeout
pub const VOICE_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// How long a freshly launched audio node may take to accept connections
pub const NODE_STARTUP_GRACE: Duration = Duration::from_secs(90);

/// Interval between expired UI session sweeps
pub const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Delay before retrying a transient failure
pub const RETRY_DELAY: Duration = Duration::from_millis(750);

/// Format a track length or position given in milliseconds (`m:ss` or `h:mm:ss`)
pub fn format_millis(ms: u64) -> String {
    let total_secs = ms / 1000;
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

/// Format a duration for display in prose
pub fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();

    if total_secs < 60 {
        format!("{} second{}", total_secs, if total_secs == 1 { "" } else { "s" })
    } else if total_secs < 3600 {
        let mins = total_secs / 60;
        format!("{} minute{}", mins, if mins == 1 { "" } else { "s" })
    } else if total_secs < 86400 {
        let hours = total_secs / 3600;
        format!("{} hour{}", hours, if hours == 1 { "" } else { "s" })
    } else {
        let days = total_secs / 86400;
        format!("{} day{}", days, if days == 1 { "" } else { "s" })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_millis() {
        assert_eq!(format_millis(0), "0:00");
        assert_eq!(format_millis(200_000), "3:20");
        assert_eq!(format_millis(3_700_000), "1:01:40");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(1)), "1 second");
        assert_eq!(format_duration(Duration::from_secs(180)), "3 minutes");
        assert_eq!(format_duration(Duration::from_secs(7200)), "2 hours");
    }
}
