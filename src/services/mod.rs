pub mod audio;
pub mod dictionary;
pub mod games;
pub mod prefix;
pub mod tags;
pub mod translate;
pub mod ui;
