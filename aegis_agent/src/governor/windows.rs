//! Windows Job Object governor.
//!
//! One Job Object per module, created on first `apply` and reused for
//! every subsequent pid (a respawned child is assigned to the same
//! job). `JOB_OBJECT_LIMIT_KILL_ON_JOB_CLOSE` means closing the job
//! handle on `release` also terminates any child still inside it.

use std::ffi::c_void;
use std::mem;
use std::ptr;

use winapi::shared::minwindef::DWORD;
use winapi::um::handleapi::CloseHandle;
use winapi::um::jobapi2::{AssignProcessToJobObject, CreateJobObjectW, SetInformationJobObject};
use winapi::um::processthreadsapi::OpenProcess;
use winapi::um::winnt::{
    HANDLE, JOBOBJECT_EXTENDED_LIMIT_INFORMATION, JOB_OBJECT_LIMIT_JOB_MEMORY,
    JOB_OBJECT_LIMIT_KILL_ON_JOB_CLOSE, JobObjectExtendedLimitInformation,
    PROCESS_SET_QUOTA, PROCESS_TERMINATE,
};

use aegis_common::consts::{CPU_CAP_HUNDREDTHS_PERCENT, MEM_CAP_BYTES};
use aegis_common::error::GovernorError;

use super::ResourceGovernor;

/// `JOBOBJECT_CPU_RATE_CONTROL_INFORMATION`. Missing from the `winapi`
/// crate (it postdates the Job Object APIs winapi was generated
/// against). Defined here to match the Win32 ABI.
#[repr(C)]
struct JobObjectCpuRateControlInformation {
    control_flags: DWORD,
    // A union in the real struct (CpuRate | Weight | RateControlTolerance);
    // we only ever populate the hard-cap CpuRate member.
    cpu_rate: DWORD,
}

const JOB_OBJECT_CPU_RATE_CONTROL_ENABLE: DWORD = 0x1;
const JOB_OBJECT_CPU_RATE_CONTROL_HARD_CAP: DWORD = 0x4;
const JOBOBJECT_CPU_RATE_CONTROL_INFORMATION_CLASS: u32 = 15;

pub struct WindowsJobGovernor {
    module_name: String,
    job: Option<usize>, // HANDLE, stored as usize so the struct stays Send
}

unsafe impl Send for WindowsJobGovernor {}

impl WindowsJobGovernor {
    pub fn new(module_name: &str) -> Self {
        Self {
            module_name: module_name.to_string(),
            job: None,
        }
    }

    fn ensure_created(&mut self) -> Result<HANDLE, GovernorError> {
        if let Some(job) = self.job {
            return Ok(job as HANDLE);
        }

        let job = unsafe { CreateJobObjectW(ptr::null_mut(), ptr::null()) };
        if job.is_null() {
            return Err(GovernorError::Create {
                module: self.module_name.clone(),
                reason: "CreateJobObjectW returned NULL".to_string(),
            });
        }

        let cpu_info = JobObjectCpuRateControlInformation {
            control_flags: JOB_OBJECT_CPU_RATE_CONTROL_ENABLE | JOB_OBJECT_CPU_RATE_CONTROL_HARD_CAP,
            cpu_rate: CPU_CAP_HUNDREDTHS_PERCENT,
        };
        let ok = unsafe {
            SetInformationJobObject(
                job,
                JOBOBJECT_CPU_RATE_CONTROL_INFORMATION_CLASS as winapi::um::winnt::JOBOBJECTINFOCLASS,
                &cpu_info as *const _ as *mut c_void,
                mem::size_of_val(&cpu_info) as u32,
            )
        };
        if ok == 0 {
            tracing::warn!(module = %self.module_name, "SetInformationJobObject(CpuRateControl) failed");
        }

        let mut mem_info: JOBOBJECT_EXTENDED_LIMIT_INFORMATION = unsafe { mem::zeroed() };
        mem_info.BasicLimitInformation.LimitFlags =
            JOB_OBJECT_LIMIT_JOB_MEMORY | JOB_OBJECT_LIMIT_KILL_ON_JOB_CLOSE;
        mem_info.JobMemoryLimit = MEM_CAP_BYTES as usize;
        let ok = unsafe {
            SetInformationJobObject(
                job,
                JobObjectExtendedLimitInformation,
                &mem_info as *const _ as *mut c_void,
                mem::size_of_val(&mem_info) as u32,
            )
        };
        if ok == 0 {
            tracing::warn!(module = %self.module_name, "SetInformationJobObject(ExtendedLimit) failed");
        }

        self.job = Some(job as usize);
        Ok(job)
    }
}

impl ResourceGovernor for WindowsJobGovernor {
    fn apply(&mut self, pid: u32) -> Result<(), GovernorError> {
        let job = self.ensure_created()?;

        let process = unsafe { OpenProcess(PROCESS_SET_QUOTA | PROCESS_TERMINATE, 0, pid) };
        if process.is_null() {
            return Err(GovernorError::Attach {
                module: self.module_name.clone(),
                pid,
                reason: "OpenProcess returned NULL".to_string(),
            });
        }

        let ok = unsafe { AssignProcessToJobObject(job, process) };
        unsafe { CloseHandle(process) };

        if ok == 0 {
            return Err(GovernorError::Attach {
                module: self.module_name.clone(),
                pid,
                reason: "AssignProcessToJobObject failed".to_string(),
            });
        }
        Ok(())
    }

    fn release(&mut self) {
        if let Some(job) = self.job.take() {
            unsafe {
                CloseHandle(job as HANDLE);
            }
        }
    }
}

impl Drop for WindowsJobGovernor {
    fn drop(&mut self) {
        self.release();
    }
}
