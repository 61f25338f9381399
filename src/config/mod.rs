mod settings;

pub use settings::{NodeSettings, Settings};
