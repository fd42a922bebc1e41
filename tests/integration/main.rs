//! Integration tests over the in-memory backing store

mod api_tests;
mod circulation_flow;
mod support;
