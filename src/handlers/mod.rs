pub mod event_handler;
pub mod interaction;
pub mod voice_state;
