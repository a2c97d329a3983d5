//! Concrete [`Transport`](cloudbox_core::traits::Transport) binding.

pub mod http;
mod wire;

pub use http::HttpTransport;
