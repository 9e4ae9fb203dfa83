//! System call handlers
//!
//! Handlers that only compute a value return a [`SyscallResult`] for the
//! dispatcher to store. Handlers that change which process runs (exit,
//! sleep) return the [`NextAction`] themselves.

use super::userptr::{user_cstr, user_slice, user_slice_mut};
use super::{ProcessInfo, SyscallResult, SystemInfo};
use crate::config::N_PROCS;
use crate::devices::Devices;
use crate::process::{PcbIndex, Pid, ProcessState};
use crate::system::Kernel;
use crate::task::NextAction;
use crate::time::ms_to_ticks;

/// Upper bound on a single write, counted or NUL-terminated.
pub const MAX_WRITE_SIZE: usize = 4096;

/// exit(): release the caller's stack and PCB, then run someone else.
pub fn sys_exit(kernel: &mut Kernel, caller: PcbIndex) -> NextAction {
    let was_current = kernel.current() == Some(caller);
    log::info!("sys_exit: pid {}", kernel.pcb(caller).pid);
    kernel.destroy_process(caller);
    if was_current {
        kernel.dispatch()
    } else {
        NextAction::Continue
    }
}

/// spawnp(entry, prio): create a child and make it Ready. The caller keeps
/// running.
pub fn sys_spawnp(kernel: &mut Kernel, caller: PcbIndex, entry: u64, prio: u64) -> SyscallResult {
    let prio = u8::try_from(prio).unwrap_or(u8::MAX);
    match kernel.create_process(entry, prio) {
        Ok(child) => {
            let parent = kernel.pcb(caller).pid;
            let p = kernel.pcb_mut(child);
            p.ppid = parent;
            let pid = p.pid;
            kernel.schedule(child);
            log::info!("sys_spawnp: pid {} spawned pid {}", parent, pid);
            SyscallResult::Ok(pid.as_u16() as u64)
        }
        Err(e) => {
            log::warn!("sys_spawnp: pid {} failed: {}", kernel.pcb(caller).pid, e);
            SyscallResult::Err
        }
    }
}

/// sleep(ms): a zero-tick sleep is a yield; otherwise park the caller in
/// the sleep queue until `now + ticks`. Either way a new dispatch follows.
pub fn sys_sleep(kernel: &mut Kernel, caller: PcbIndex, ms: u64) -> NextAction {
    let ticks = ms_to_ticks(ms);
    if ticks == 0 {
        kernel.schedule(caller);
    } else {
        let wakeup = kernel.ticks().saturating_add(ticks);
        let p = kernel.pcb_mut(caller);
        p.state = ProcessState::Sleeping;
        p.wakeup = wakeup;
        log::debug!("sys_sleep: pid {} until tick {}", p.pid, wakeup);
        let sleep = kernel.sleep_queue();
        kernel.queues.insert(sleep, caller.as_usize(), wakeup);
    }
    kernel.dispatch()
}

/// read(fd, buf, count): copy whatever input is buffered, up to `count`
/// bytes. Never waits.
pub fn sys_read(devices: &mut Devices<'_>, fd: u64, buf: u64, count: u64) -> SyscallResult {
    let Some(dev) = devices.by_fd(fd) else {
        log::warn!("sys_read: bad fd {}", fd);
        return SyscallResult::Err;
    };
    let want = dev.pending().min(count as usize);
    // SAFETY: flat shared address space; `buf` is the caller's buffer of at
    // least `count` bytes.
    let Some(out) = (unsafe { user_slice_mut(buf, want) }) else {
        return SyscallResult::Err;
    };
    let mut n = 0;
    for slot in out.iter_mut() {
        match dev.read_byte() {
            Some(b) => *slot = b,
            None => break,
        }
        n += 1;
    }
    SyscallResult::Ok(n as u64)
}

/// write(fd, buf, count): write exactly `count` bytes, or up to the NUL
/// terminator when `count` is 0.
pub fn sys_write(devices: &mut Devices<'_>, fd: u64, buf: u64, count: u64) -> SyscallResult {
    let Some(dev) = devices.by_fd(fd) else {
        log::warn!("sys_write: bad fd {}", fd);
        return SyscallResult::Err;
    };
    if count > MAX_WRITE_SIZE as u64 {
        log::warn!("sys_write: count {} exceeds {}", count, MAX_WRITE_SIZE);
        return SyscallResult::Err;
    }
    // SAFETY: flat shared address space; `buf` is the caller's buffer of
    // `count` bytes, or a NUL-terminated string when `count` is 0.
    let bytes = unsafe {
        if count == 0 {
            user_cstr(buf, MAX_WRITE_SIZE)
        } else {
            user_slice(buf, count as usize)
        }
    };
    match bytes {
        Some(bytes) => {
            dev.write_bytes(bytes);
            SyscallResult::Ok(bytes.len() as u64)
        }
        None => SyscallResult::Err,
    }
}

/// get_process_info(code, pid): pid 0 means the caller.
pub fn sys_get_process_info(kernel: &Kernel, caller: PcbIndex, code: u64, pid: u64) -> SyscallResult {
    let target = if pid == 0 {
        Some(caller)
    } else {
        u16::try_from(pid)
            .ok()
            .and_then(|pid| kernel.processes().find(Pid::new(pid)))
    };
    let (Some(target), Some(code)) = (target, ProcessInfo::from_u64(code)) else {
        return SyscallResult::Err;
    };

    let p = kernel.pcb(target);
    let value = match code {
        ProcessInfo::Pid => p.pid.as_u16() as u64,
        ProcessInfo::Ppid => p.ppid.as_u16() as u64,
        ProcessInfo::State => p.state.code(),
        ProcessInfo::Wakeup => p.wakeup,
        ProcessInfo::Priority => p.priority as u64,
        ProcessInfo::Quantum => p.quantum as u64,
        ProcessInfo::DefaultQuantum => p.default_quantum as u64,
    };
    SyscallResult::Ok(value)
}

/// get_system_info(code)
pub fn sys_get_system_info(kernel: &Kernel, code: u64) -> SyscallResult {
    match SystemInfo::from_u64(code) {
        Some(SystemInfo::Time) => SyscallResult::Ok(kernel.ticks()),
        Some(SystemInfo::NumProcs) => SyscallResult::Ok(kernel.active_processes() as u64),
        Some(SystemInfo::MaxProcs) => SyscallResult::Ok(N_PROCS as u64),
        None => SyscallResult::Err,
    }
}
