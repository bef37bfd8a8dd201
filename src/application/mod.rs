//! Application Layer
//!
//! Contains the realtime relay and the services that feed it. This layer
//! orchestrates the flow of data between the presentation and domain layers.

pub mod dto;
pub mod events;
pub mod relay;
pub mod services;
