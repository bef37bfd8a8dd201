//! HTTP API tests against the full router with mock repositories.

mod health_tests;
mod message_tests;
mod notification_tests;
