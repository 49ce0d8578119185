//! `sync_server`
//!
//! Authoritative server side:
//! - Participant registry (the single source of truth)
//! - Full-world broadcast after every change
//! - Connection lifecycle: id assignment, welcome, cleanup
//! - Inbound message handling (`press_key`)
//!
//! Concurrency model:
//! - One task per connection, all sharing one [`Hub`]
//! - Registry and id counter behind a single lock; mutate-then-broadcast is
//!   atomic with respect to other events

pub mod broadcast;
pub mod handler;
pub mod hub;
pub mod lifecycle;
pub mod registry;
pub mod server;

pub use hub::Hub;
pub use server::SyncServer;
