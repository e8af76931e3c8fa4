//! Upstream bridge-metrics adapters.

mod http;

pub use http::HttpBridgeSource;
