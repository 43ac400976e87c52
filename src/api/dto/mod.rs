//! Data Transfer Objects for REST request/response serialization.

pub mod fleet_dto;

pub use fleet_dto::*;
