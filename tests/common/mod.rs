//! Shared helpers for the integration tests.
//!
//! - `fixtures`: canned provider response bodies
//! - `logger`: structured per-test logging

pub mod fixtures;
pub mod logger;

/// Base URL of a local port that refuses connections.
#[allow(dead_code)]
pub fn refused_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);
    format!("http://{addr}")
}
