//! Local order book synchronization from a REST snapshot plus a diff stream.
//!
//! A [`DepthSubscriber`] opens the diff stream, requests the snapshot once
//! the first event has arrived and hands both to a [`BookReconciler`]
//! running on its own task. Callers read the result through the returned
//! [`SubscriptionHandle`]:
//!
//! ```ignore
//! let handle = subscriber.subscribe("BTCUSDT");
//! handle.on_update(|view| println!("{:?}", view.best_bid));
//! let outcome = handle.join().await;
//! ```
//!
//! Every [`SyncError`] is terminal for the subscription. [`supervise`]
//! wraps the resubscribe policy for callers that want the book kept alive.

mod config;
mod error;
mod publish;
mod reconciler;
mod subscription;
mod supervisor;

pub use config::{SyncConfig, DEFAULT_MAX_BUFFERED_EVENTS};
pub use error::SyncError;
pub use publish::{ViewCallback, ViewPublisher};
pub use reconciler::{BookReconciler, EventOutcome, SnapshotOutcome, SyncState};
pub use subscription::{DepthSubscriber, SubscriptionHandle};
pub use supervisor::supervise;
