//! Domain models for sale authoring.

pub mod batch;
pub mod line_item;
pub mod product;

pub use batch::Batch;
pub use line_item::{AllocationEntry, SaleDraft, SaleLineItemDraft};
pub use product::Product;
