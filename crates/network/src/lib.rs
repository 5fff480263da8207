// crates/network/src/lib.rs
//! Network layer for sync: connectivity monitoring and the remote API

mod client;
mod connectivity;
mod error;
mod remote;

pub use client::{join_segments, parse_base_url, Client, ClientConfig};
pub use connectivity::{
    ConnectivityChecker, ConnectivityHandle, ConnectivityMonitor, ConnectivitySignal, Debouncer,
};
pub use error::{NetworkError, NetworkResult};
pub use remote::{
    classify_status, HttpRemote, MutationRequest, RemoteApi, RemoteError, IDEMPOTENCY_HEADER,
};
