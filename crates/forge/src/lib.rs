extern crate self as forge;

pub mod runtime;
pub mod subprocess;

pub use forge_collections as collections;
pub use forge_core as core;
pub use forge_io as io;
pub use forge_metadata as metadata;
pub use forge_net as net;
pub use forge_sync as sync;
pub use forge_worker as worker;

pub use core_affinity;
pub use tracing;

pub use runtime::{Runtime, RuntimeConfig};
pub use subprocess::{start_process, ProcessOptions, ProcessOutcome};
