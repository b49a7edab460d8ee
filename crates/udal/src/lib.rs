//! Entry point of the access layer: pick a vendor once, get a
//! [`Database`](udal_core::Database) whose backend is fixed for its lifetime.

#[cfg(not(any(feature = "oracle", feature = "odbc")))]
compile_error!("enable at least one backend feature: `oracle` or `odbc`");

mod backend;
mod factory;

pub use backend::{Backend, BackendStatement};
pub use factory::Factory;
pub use udal_core::*;
