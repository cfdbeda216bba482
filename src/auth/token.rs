//! Access tokens handed back by the grant chain.

pub mod record;
pub mod secret;
