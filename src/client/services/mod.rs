pub mod api_client;
pub mod message_parser;
pub mod websocket_client;

pub use api_client::{ChatHistoryApi, DiscoveryApi, DiscoveryFilters, HttpApiClient};
pub use websocket_client::{WebSocketChannel, WebSocketConnector};
