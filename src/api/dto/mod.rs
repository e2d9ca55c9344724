//! Data Transfer Objects for REST request/response serialization.
//!
//! Prices are whole currency units; captured amounts are minor units.

pub mod calendar_dto;
pub mod session_dto;
pub mod wallet_dto;

pub use calendar_dto::*;
pub use session_dto::*;
pub use wallet_dto::*;
