//! # Order Workflow
//!
//! Order placement and stock reservation for a small shop.
//!
//! - [`workflow::OrderWorkflow`] places, reads, updates and cancels orders.
//! - [`catalog::ProductCatalog`] maintains the products they draw on.
//! - [`store`] defines the storage contracts plus an actor-backed in-memory
//!   store and, with the `postgres` feature, a PostgreSQL one.
//! - [`app_system::OrderSystem`] wires it all together from an
//!   [`config::AppConfig`].

pub mod actor_framework;
pub mod app_system;
pub mod catalog;
pub mod config;
pub mod domain;
pub mod error;
pub mod store;
pub mod workflow;

#[cfg(test)]
mod mock_framework;
