//! Core types for turnwire.

pub mod fragment;
pub mod generation;
pub mod message;
pub mod usage;

pub use fragment::*;
pub use generation::*;
pub use message::*;
pub use usage::*;
