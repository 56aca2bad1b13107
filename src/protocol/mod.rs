//! Wire protocol events, both directions.

pub mod inbound;
pub mod outbound;

pub use inbound::{ConversationItem, ErrorInfo, RateLimit, ResponseInfo, ServerEvent, SessionInfo};
pub use outbound::{ClientEvent, SessionUpdateParams};
