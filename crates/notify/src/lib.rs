//! External notification transports (§11 supplemented behaviour): the
//! `Transport` boundary the dispatcher sends through, plus reference
//! implementations.

pub mod error;
pub mod stdout;
pub mod transport;
pub mod webhook;

pub use error::TransportError;
pub use stdout::StdoutTransport;
pub use transport::{Notification, Transport};
pub use webhook::WebhookTransport;
