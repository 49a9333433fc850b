//! revtree - versioned tree storage on copy-on-write pages
//!
//! Every commit produces a new immutable revision that shares all unchanged
//! pages with its predecessor. Nodes may carry DeweyID labels whose order is
//! document order.

pub mod cli;
pub mod crash_point;
pub mod dewey;
pub mod node;
pub mod observability;
pub mod page;
pub mod resource;
pub mod storage;
pub mod trx;
