pub mod aggregator;
pub mod lock;
pub mod notify;
pub mod reconcile;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

#[cfg(test)]
mod boundary_tests;

pub use aggregator::{group, GroupEntry, TitleGroup};
pub use lock::TickLock;
pub use notify::{ChannelSender, Delivery, Dispatcher};
pub use reconcile::{Pacing, Reconciler, TickStats};
