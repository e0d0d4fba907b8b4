//! External command construction and execution

pub mod command;
pub mod subprocess;

pub use command::ToolCommand;
pub use subprocess::{CommandRunner, LogSink, ProcessRunner};
