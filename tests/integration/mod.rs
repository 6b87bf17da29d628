//! Integration tests for the catalog cache

mod browsing;
mod consistency;
mod http_source;
mod support;
