//! This module holds typed parameters for the ingress endpoint inputs.
//!
//! Each parameter type mirrors the wire shape a producer sends and converts into
//! the relay's own input type, so the relay core stays free of HTTP and OpenAPI
//! concerns.

pub(crate) mod message;
pub(crate) mod update;
