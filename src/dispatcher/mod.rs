pub mod handler;

pub use handler::{BuildInfo, CommandDispatcher};
