//! System call dispatcher
//!
//! Routes the current process's trap to its handler based on the number in
//! its saved RAX.

use super::handlers;
use super::SyscallNumber;
use crate::devices::Devices;
use crate::process::context::context_dump;
use crate::system::Kernel;
use crate::task::NextAction;

impl Kernel {
    /// Handle a syscall trap from the current process.
    ///
    /// An out-of-range number is treated as exit: the caller is terminated
    /// rather than the kernel faulting on a malformed call.
    pub fn handle_syscall(&mut self, devices: &mut Devices<'_>) -> NextAction {
        let Some(caller) = self.current() else {
            log::error!("syscall: trap with no current process");
            panic!("syscall: no current process");
        };
        let Some(ctx) = self.context(caller).copied() else {
            panic!("syscall: current process has no context");
        };
        let number = ctx.syscall_number();
        let (arg1, arg2, arg3) = ctx.args();

        let syscall = match SyscallNumber::from_u64(number) {
            Some(s) => s,
            None => {
                log::warn!(
                    "PID {} syscall {} out of range, forcing exit",
                    self.pcb(caller).pid,
                    number
                );
                context_dump("bad syscall", &ctx);
                SyscallNumber::Exit
            }
        };

        let result = match syscall {
            SyscallNumber::Exit => return handlers::sys_exit(self, caller),
            SyscallNumber::Sleep => return handlers::sys_sleep(self, caller, arg1),
            SyscallNumber::SpawnP => handlers::sys_spawnp(self, caller, arg1, arg2),
            SyscallNumber::Read => handlers::sys_read(devices, arg1, arg2, arg3),
            SyscallNumber::Write => handlers::sys_write(devices, arg1, arg2, arg3),
            SyscallNumber::GetProcessInfo => handlers::sys_get_process_info(self, caller, arg1, arg2),
            SyscallNumber::GetSystemInfo => handlers::sys_get_system_info(self, arg1),
        };
        self.set_return(caller, result.as_return());
        NextAction::Continue
    }
}
