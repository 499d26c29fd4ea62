pub mod channel;
pub mod session;
pub mod sync;

pub use channel::{connect_with_retry, ChannelEvent, EventReceiver, RealtimeChannel, RealtimeConnector};
pub use session::{ChatNotice, ChatSession, SendOutcome, SessionState};
