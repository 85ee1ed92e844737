pub mod batches;
pub mod reconcile;
