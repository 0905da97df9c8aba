//! # jobrank Serving
//!
//! Chooses between the learned model and the heuristic at request time and
//! reports which one produced the ranking.

pub mod selector;

pub use selector::{RankerId, RankerKind, RankerSelector, RankingResponse};
