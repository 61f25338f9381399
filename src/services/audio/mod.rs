pub mod controller;
pub mod node;
pub mod protocol;
pub mod queue;
pub mod search;
pub mod session;
pub mod supervisor;
pub mod track;

pub use node::{NodeClient, NodeEndpoint, NodeMessage};
pub use search::Resolver;
pub use session::{LoopMode, SharedSession, VoiceRegistry, VoiceSession};
pub use supervisor::NodeSupervisor;
pub use track::{Source, Track};
