//! Data Transfer Objects for REST request/response serialization.

pub mod channel_dto;

pub use channel_dto::*;
