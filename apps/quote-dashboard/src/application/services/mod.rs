//! Application Services
//!
//! Services that orchestrate domain logic and coordinate between ports.
//!
//! - `DashboardSession`: Owns the dashboard graph and its leaf entry points

mod session;

pub use session::{DashboardSession, DashboardSubscription, DashboardUpdate};
