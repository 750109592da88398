// Testing Tools Library
//
// This crate provides testing utilities and tools for the relay.
// Currently includes:
// - relay-test-client: socket and ingress integration testing tool

pub mod api_client;
pub mod output;
pub mod scenarios;
pub mod ws_client;
