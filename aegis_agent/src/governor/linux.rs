//! cgroup v2 governor.
//!
//! One cgroup per module under [`CGROUP_ROOT`], named after the module.
//! `cpu.max` and `memory.max` are written once at creation; each
//! observed pid is appended to `cgroup.procs` (cgroup v2 adopts a
//! process into the group the instant its pid is written there, no
//! further action needed on the child's part).

use std::fs;
use std::path::PathBuf;

use aegis_common::consts::{CGROUP_CPU_MAX, CGROUP_ROOT, MEM_CAP_BYTES};
use aegis_common::error::GovernorError;

use super::ResourceGovernor;

pub struct LinuxCgroupGovernor {
    module_name: String,
    cgroup_path: Option<PathBuf>,
}

impl LinuxCgroupGovernor {
    pub fn new(module_name: &str) -> Self {
        Self {
            module_name: module_name.to_string(),
            cgroup_path: None,
        }
    }

    fn ensure_created(&mut self) -> Result<&PathBuf, GovernorError> {
        if self.cgroup_path.is_none() {
            let path = PathBuf::from(CGROUP_ROOT).join(&self.module_name);
            fs::create_dir_all(&path).map_err(|e| GovernorError::Create {
                module: self.module_name.clone(),
                reason: e.to_string(),
            })?;

            if let Err(e) = fs::write(path.join("cpu.max"), CGROUP_CPU_MAX) {
                tracing::warn!(module = %self.module_name, error = %e, "failed to set cgroup cpu.max");
            }
            if let Err(e) = fs::write(path.join("memory.max"), MEM_CAP_BYTES.to_string()) {
                tracing::warn!(module = %self.module_name, error = %e, "failed to set cgroup memory.max");
            }

            self.cgroup_path = Some(path);
        }
        Ok(self.cgroup_path.as_ref().expect("just set"))
    }
}

impl ResourceGovernor for LinuxCgroupGovernor {
    fn apply(&mut self, pid: u32) -> Result<(), GovernorError> {
        let path = self.ensure_created()?.join("cgroup.procs");
        fs::write(&path, pid.to_string()).map_err(|e| GovernorError::Attach {
            module: self.module_name.clone(),
            pid,
            reason: e.to_string(),
        })
    }

    fn release(&mut self) {
        // The cgroup directory is intentionally left behind: removing it
        // while a lingering zombie still references it fails with EBUSY,
        // and the next Apply() for this module recreates it anyway.
    }
}
