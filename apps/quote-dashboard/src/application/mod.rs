//! Application Layer - Use cases and port definitions.
//!
//! This layer contains the dashboard session service and the port
//! interfaces that define how the domain interacts with external systems.

/// Port interfaces for external systems (clock, feed source).
pub mod ports;

/// Application services for the dashboard session.
pub mod services;
