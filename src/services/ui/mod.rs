pub mod effect;
pub mod engine;
pub mod session;

pub use effect::{Effect, ModalField, ModalSpec, Reply};
pub use engine::{spawn_sweeper, UiEngine};
pub use session::{Admission, EndReason, EventKind, SessionView, UiEvent, ViewContext};
