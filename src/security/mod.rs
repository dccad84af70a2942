//! Read-only SQL guard.

pub mod guard;

pub use guard::SqlGuard;
