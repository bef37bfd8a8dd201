//! Application Services
//!
//! Business logic services that coordinate persistence, local delivery
//! and the realtime relay.
//!
//! ## Available Services
//!
//! - **MessagingService**: Chat messages and typing indicators
//! - **NotificationService**: User notifications

pub mod delivery;
pub mod messaging_service;
pub mod notification_service;

pub use delivery::LocalDelivery;
pub use messaging_service::{MessagingError, MessagingService, MessagingServiceImpl};
pub use notification_service::{
    NewNotification, NotificationError, NotificationService, NotificationServiceImpl,
};
