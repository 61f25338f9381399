mod game_record;
mod guild_settings;
mod tag;
mod user_uid;

pub use game_record::{GameTally, LeaderboardEntry, SinglePlayerGame, TwoPlayerGame, TwoPlayerTotals};
pub use guild_settings::GuildSettings;
pub use tag::{Tag, TagAlias};
pub use user_uid::UserUid;
