//! Cross-instance relay tests over the in-process bus.

mod fanout_tests;
mod gateway_tests;
