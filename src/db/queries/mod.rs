pub mod games;
pub mod guild_settings;
pub mod prefix;
pub mod tags;
pub mod users;
