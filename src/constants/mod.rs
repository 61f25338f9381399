pub mod embeds;
pub mod emojis;
pub mod timeouts;
