//! Authority channel: wire protocol and connection lifecycle

pub mod connection;
pub mod protocol;

pub use connection::{Channel, ConnectionError, ConnectionManager, ConnectionState, Connector, WsConnector};
pub use protocol::{ClientMsg, RemoteEntity, ServerMsg, Vec3};
