//! Command dispatch and slave state.

pub mod handlers;
pub mod machine;

pub use handlers::{CommandResult, HandlerContext, handle_command};
pub use machine::SlaveState;
