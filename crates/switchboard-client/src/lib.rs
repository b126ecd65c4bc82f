//! Client library for Switchboard: a typed API client, a read-through
//! query cache with request dedup, the event subscriber bridge that keeps
//! the cache honest, and mutation lifecycle tracking.
//!
//! The pieces compose: [`ApiClient`] implements [`QueryFetcher`], the
//! [`QueryCache`] reads through whatever fetcher it is given, and an
//! [`EventBridge`] subscribed to the server's stream invalidates keys as
//! domain events arrive.

pub mod api;
pub mod bridge;
pub mod cache;
pub mod keys;
pub mod mutation;

pub use api::{ApiClient, ApiError, AttachTaskBody, QueryFetcher, ROLE_HEADER};
pub use bridge::{BridgeConfig, ConnectionState, EventBridge};
pub use cache::{KeyState, QueryCache};
pub use keys::{invalidation_keys, QueryKey, Resource, Scope};
pub use mutation::{MutationHandle, MutationState};
