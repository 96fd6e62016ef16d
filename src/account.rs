// =============================================================================
// Account Resolver (C3) — agent-key to master-account resolution
// =============================================================================

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use crate::error::EngineError;
use crate::types::AccountRole;
use crate::venue::VenuePort;

pub struct AccountResolver {
    venue: Arc<dyn VenuePort>,
    key_addr: String,
    master_addr: RwLock<Option<String>>,
}

impl AccountResolver {
    pub fn new(venue: Arc<dyn VenuePort>, key_addr: String) -> Self {
        Self { venue, key_addr, master_addr: RwLock::new(None) }
    }

    /// Resolve (and cache) the master account this process's configured key
    /// trades on behalf of. Fails with `ConfigurationError` if the venue
    /// cannot attribute the key to a known role.
    pub async fn resolve(&self) -> Result<String, EngineError> {
        if let Some(addr) = self.master_addr.read().clone() {
            return Ok(addr);
        }

        let role = self
            .venue
            .user_role(&self.key_addr)
            .await
            .map_err(|e| EngineError::Configuration(e.to_string()))?;

        let master = match role {
            AccountRole::Master => self.key_addr.clone(),
            AccountRole::Agent { master_addr } => master_addr,
        };

        info!(key_addr = %self.key_addr, master_addr = %master, "account role resolved");
        *self.master_addr.write() = Some(master.clone());
        Ok(master)
    }

    /// Force re-resolution on the next call, e.g. after a key rotation.
    pub fn invalidate(&self) {
        *self.master_addr.write() = None;
    }
}
