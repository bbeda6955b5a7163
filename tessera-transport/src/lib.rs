//! # tessera-transport
//!
//! Framed envelope transport for the Tessera serialization framework.
//!
//! This crate provides:
//! - `Channel` - sends and receives envelopes over any tokio byte stream
//! - `CancelHandle` - unblocks suspended operations on a channel
//! - `TcpClient` / `TcpServer` - TCP-based channels
//!
//! ## Concurrency
//!
//! Socket I/O runs on the calling task. With `SendFlags::offload` or
//! `RecvFlags::offload` the encode/decode step moves to tokio's blocking
//! pool instead. Channels share nothing but the read-only type registry.

mod channel;
mod tcp;
mod worker;

pub use channel::{CancelHandle, Channel, ChannelState};
pub use tcp::{TcpChannel, TcpClient, TcpClientConfig, TcpServer, TcpServerConfig};
