use serenity::all::{Colour, CreateEmbed, CreateEmbedFooter};

// ============================================================================
// Color Palette
// ============================================================================

/// Primary brand color - Deep blue
pub const PRIMARY_COLOR: Colour = Colour::from_rgb(59, 130, 246);

/// Music notifications - Violet
pub const MUSIC_COLOR: Colour = Colour::from_rgb(139, 92, 246);

/// Success color - Emerald green
pub const SUCCESS_COLOR: Colour = Colour::from_rgb(16, 185, 129);

/// Error color - Rose red
pub const ERROR_COLOR: Colour = Colour::from_rgb(244, 63, 94);

/// Warning color - Amber
pub const WARNING_COLOR: Colour = Colour::from_rgb(245, 158, 11);

/// Info/neutral color - Slate
pub const INFO_COLOR: Colour = Colour::from_rgb(100, 116, 139);

// ============================================================================
// Text Formatting
// ============================================================================

/// Bullet point character
pub const BULLET: &str = "•";

// ============================================================================
// Embed Builders
// ============================================================================

pub fn standard_embed() -> CreateEmbed {
    CreateEmbed::new().color(PRIMARY_COLOR)
}

pub fn music_embed() -> CreateEmbed {
    CreateEmbed::new().color(MUSIC_COLOR)
}

pub fn success_embed() -> CreateEmbed {
    CreateEmbed::new().color(SUCCESS_COLOR)
}

pub fn error_embed() -> CreateEmbed {
    CreateEmbed::new().color(ERROR_COLOR)
}

pub fn warning_embed() -> CreateEmbed {
    CreateEmbed::new().color(WARNING_COLOR)
}

pub fn info_embed() -> CreateEmbed {
    CreateEmbed::new().color(INFO_COLOR)
}

/// Red embed used for domain errors reported inline
pub fn domain_error(description: impl Into<String>) -> CreateEmbed {
    error_embed().title("Error").description(description)
}

/// Footer attributing an action to a user
pub fn requested_by(name: &str) -> CreateEmbedFooter {
    CreateEmbedFooter::new(format!("Requested by {}", name))
}

// ============================================================================
// Text Helpers
// ============================================================================

/// Format a list of items with bullet points
pub fn bullet_list<S: AsRef<str>>(items: &[S]) -> String {
    items
        .iter()
        .map(|item| format!("{} {}", BULLET, item.as_ref()))
        .collect::<Vec<_>>()
        .join("\n")
}
