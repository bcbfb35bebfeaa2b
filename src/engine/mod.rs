pub mod coordinator;
pub mod merger;

pub use coordinator::{Delivery, DeliveryPhase, SearchCoordinator, SearchSettings};
pub use merger::ResultMerger;

#[cfg(test)]
mod tests;
