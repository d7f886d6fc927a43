//! Operation classification
//!
//! Every operation passing through the dispatcher is looked up here before
//! any routing happens. The lists are fixed at compile time.

mod classify;

pub use classify::{OpCategory, OperationClassifier};
