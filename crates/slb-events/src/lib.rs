//! SLB Events - request lifecycle event bus.
//!
//! Events are hints, not truth: the store is the durable record, and the
//! broker publishes only after a store commit succeeds. Subscribers that
//! fall behind lose events (broadcast semantics); the daemon turns that lag
//! into a `slow_consumer` disconnect, while the polling watcher simply
//! resynchronizes from the store.
//!
//! # Example
//!
//! ```rust
//! use slb_events::{EventBus, EventMetadata, SlbEvent};
//! use slb_core::{RequestId, RiskTier};
//!
//! # async fn example() {
//! let bus = EventBus::new();
//! let mut receiver = bus.subscribe();
//!
//! bus.publish(SlbEvent::RequestPending {
//!     metadata: EventMetadata::new("request-engine"),
//!     request_id: RequestId::new(),
//!     project_path: "/work/demo".to_string(),
//!     tier: RiskTier::Dangerous,
//!     command: "rm -rf ./build".to_string(),
//! });
//!
//! let event = receiver.recv().await.unwrap();
//! assert_eq!(event.event_type(), "request_pending");
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod bus;
mod event;

pub use bus::{DEFAULT_CHANNEL_CAPACITY, EventBus, EventReceiver, Lagged};
pub use event::{EventFilter, EventMetadata, SlbEvent};
