//! Application Layer
//!
//! Use cases that compose domain services with the outbound ports.

mod request_dispatcher;
mod session_store;

pub use request_dispatcher::RequestDispatcher;
pub use session_store::SessionStore;
