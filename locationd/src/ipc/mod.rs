//! Process-to-process IPC: the service and its sessions published on a
//! Unix domain socket with object-path and interface addressing.
//!
//! The wire is newline-delimited JSON envelopes (method call, method
//! return, error, signal) mirroring the message-bus model the service
//! names come from: `com.ubuntu.location.Service` at
//! `/com/ubuntu/location/Service`.

pub mod provider;
pub mod skeleton;
pub mod stub;
pub mod wire;

pub use skeleton::Skeleton;
pub use stub::{ServiceStub, SessionStub, StubError};
