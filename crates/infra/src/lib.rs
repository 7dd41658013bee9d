//! Wiring: opens the flat-file data directory and hands out the
//! configured services.

mod context;

pub use context::OpsContext;
