//! Best-effort governor for platforms with no supported resource-capping
//! primitive (e.g. macOS). Logs once per module and otherwise no-ops,
//! per spec: unsupported platforms run modules uncapped rather than
//! failing to spawn them.

use aegis_common::error::GovernorError;

use super::ResourceGovernor;

pub struct FallbackGovernor {
    module_name: String,
    warned: bool,
}

impl FallbackGovernor {
    pub fn new(module_name: &str) -> Self {
        Self {
            module_name: module_name.to_string(),
            warned: false,
        }
    }
}

impl ResourceGovernor for FallbackGovernor {
    fn apply(&mut self, _pid: u32) -> Result<(), GovernorError> {
        if !self.warned {
            tracing::warn!(module = %self.module_name, "resource governor unsupported on this platform; running uncapped");
            self.warned = true;
        }
        Ok(())
    }

    fn release(&mut self) {}
}
