//! Message and message handlers
pub mod types;
pub use types::*;

pub mod handlers;
pub use handlers::HandleMsg;
pub use handlers::MessageContext;
