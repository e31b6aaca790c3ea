pub mod aws;
pub mod client;
pub mod dto;
pub mod panel;

pub use client::{ConditionalResponse, UpstreamClient, UpstreamError};
