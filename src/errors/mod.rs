mod assistant_error;
mod session_error;

pub use assistant_error::{AssistantError, ErrorKind};
pub use session_error::SessionError;
