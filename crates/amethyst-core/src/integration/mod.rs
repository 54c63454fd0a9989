//! Integration layer - External system interfaces.
//!
//! This module contains the seam to the Discord client library:
//! - The gateway trait and the handler callbacks it drives
//! - The library of built-in gateway events

pub mod gateway;
pub mod library;

pub use gateway::{BoxedGateway, Gateway, GatewayHandler};
pub use library::GatewayEvent;
