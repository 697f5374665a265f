pub mod parser;
pub mod response;
pub mod types;

pub use parser::CommandParser;
pub use response::{FailureTag, Response, ResponseSerialiser, ResponseSink};
pub use types::{AtError, Command, CommandProfile, InstanceId, LengthRule, Namespace};
