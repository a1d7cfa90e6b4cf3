mod connection_state;
mod transport;
mod transport_kind;

pub use connection_state::{Connection, ConnectionState};
pub use transport::Transport;
pub use transport_kind::TransportKind;
