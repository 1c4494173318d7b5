//! Domain types of the relay: configuration, session parameters, engine
//! events and the error taxonomy.  Nothing in here performs I/O.

pub mod config;
pub mod error;
pub mod events;
pub mod settings;
