//! Protocol module - XCP packet definitions.

pub mod constants;
pub mod error;
pub mod frame;

pub use constants::*;
pub use error::ErrorCode;
pub use frame::{Frame, Request};
