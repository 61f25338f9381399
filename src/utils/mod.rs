pub mod formatting;
pub mod permissions;
pub mod retry;
