// # ddns-core
//
// Core library for the DDNS update-and-recover daemon.
//
// ## Architecture Overview
//
// This library provides the core functionality for keeping a dynamic DNS
// record alive:
// - **Credentials**: Loader for the provider's Basic-auth credential pair
// - **DnsUpdater**: Trait for pushing an update to the provider endpoint
// - **NetworkRestarter**: Trait for recovering the host's network stack
// - **DdnsEngine**: Timer-driven loop that updates, recovers and retries
// - **EngineStats**: In-memory view of engine events for operators
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Core logic is separate from implementations
// 2. **Explicit Errors**: Every failure is a `Result`, the daemon decides exit codes
// 3. **Library-First**: The engine can be embedded and driven without the daemon
// 4. **Bounded Work**: Every blocking step (HTTP, child process) carries a timeout

pub mod config;
pub mod credentials;
pub mod engine;
pub mod error;
pub mod stats;
pub mod traits;

// Re-export core types for convenience
pub use config::{DdnsConfig, EngineConfig, FailurePolicy, ProviderConfig, RestartConfig};
pub use credentials::Credentials;
pub use engine::{CycleOutcome, DdnsEngine, EngineEvent, EngineState};
pub use error::{Error, Result};
pub use stats::EngineStats;
pub use traits::{DnsUpdater, NetworkRestarter};
