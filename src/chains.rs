//! Chain-specific probe strategies and the builtin definition table.
//!
//! Each chain module exposes a `definitions()` list; [`builtin_registry`]
//! assembles them into the one static table the orchestrator consumes at
//! startup.

pub mod evm;
pub mod rpc;
pub mod solana;
pub mod ton;
mod ws;

use crate::collector::{MetricRegistry, RegistryError};

/// Build the registry of all builtin chain definitions.
pub fn builtin_registry() -> Result<MetricRegistry, RegistryError> {
    let mut registry = MetricRegistry::new();
    registry.register("Ethereum", evm::definitions())?;
    registry.register("Base", evm::definitions())?;
    registry.register("Solana", solana::definitions())?;
    registry.register("Ton", ton::definitions())?;
    Ok(registry)
}
