//! # Kiosk server
//! This crate hosts the server for self-service kiosks that take payment by bank transfer. It is responsible for:
//! Accepting payment requests from kiosks over a WebSocket and verifying each one against the brokerage account.
//! Reporting verification progress and the final result back to the kiosk that asked.
//! Streaming order events to every connected order dashboard.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/api/ws/payment`: The payment channel (WebSocket).
//! * `/api/orders/stream`: Server-sent order events.
//! * `/api/orders/events`: Order event intake for the order service.
//! * `/api/deposit/balance`: The cached account balance.

pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod integrations;
pub mod order_stream;
pub mod payment_channel;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
