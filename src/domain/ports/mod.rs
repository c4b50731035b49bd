mod client_connection;
mod directory_handler;
mod upstream;

pub use client_connection::ClientConnection;
pub use directory_handler::DirectoryHandler;
pub use upstream::{UpstreamConnector, UpstreamDirectory};
