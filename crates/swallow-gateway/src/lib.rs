//! HTTP query interface: `/ask`, `/chunks`, `/ping` and `/health`.

mod error;
mod handlers;
mod router;
mod server;

pub use error::GatewayError;
pub use router::build_router;
pub use server::{AppState, GatewayServer};
