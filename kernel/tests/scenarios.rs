//! End-to-end behaviour of the process execution core, driven through the
//! same entry points the trap driver uses.

use std::collections::VecDeque;

use kernel::config::{KernelConfig, N_PCBS, PRIO_USER_LOW};
use kernel::devices::{CharDevice, Devices};
use kernel::process::{PcbIndex, ProcessState};
use kernel::queue::{compare_time, QueueEngine, QueueOrder};
use kernel::syscall::SyscallNumber;
use kernel::{Kernel, NextAction};

#[derive(Default)]
struct MockDevice {
    input: VecDeque<u8>,
    output: Vec<u8>,
}

impl CharDevice for MockDevice {
    fn pending(&self) -> usize {
        self.input.len()
    }

    fn read_byte(&mut self) -> Option<u8> {
        self.input.pop_front()
    }

    fn write_bytes(&mut self, bytes: &[u8]) {
        self.output.extend_from_slice(bytes);
    }
}

fn boot(default_quantum: u32) -> Kernel {
    let mut kernel = Kernel::new(KernelConfig {
        default_quantum,
        exit_trampoline: 0xffff_8000,
    });
    kernel.init();
    kernel
}

fn spawn(kernel: &mut Kernel, prio: u8) -> PcbIndex {
    let pcb = kernel.create_process(0x40_0000, prio).unwrap();
    kernel.schedule(pcb);
    pcb
}

/// Trap the current process into the kernel with the given syscall.
fn syscall(kernel: &mut Kernel, number: u64, args: (u64, u64, u64)) -> NextAction {
    let current = kernel.current().unwrap();
    let ctx = kernel.context_mut(current).unwrap();
    ctx.rax = number;
    ctx.rdi = args.0;
    ctx.rsi = args.1;
    ctx.rdx = args.2;
    let mut console = MockDevice::default();
    let mut sio = MockDevice::default();
    let mut devices = Devices::new(&mut console, &mut sio);
    kernel.handle_syscall(&mut devices)
}

fn ret(kernel: &Kernel, pcb: PcbIndex) -> i64 {
    kernel.context(pcb).unwrap().return_value()
}

fn queued_anywhere(kernel: &Kernel, pcb: PcbIndex) -> bool {
    (0..4).any(|level| kernel.ready_at(level).any(|p| p == pcb))
        || kernel.sleepers().any(|(_, p)| p == pcb)
}

#[test]
fn scenario_a_priority_then_insertion_order() {
    let mut k = boot(10);
    let p1a = spawn(&mut k, 1);
    let p0 = spawn(&mut k, 0);
    let p1b = spawn(&mut k, 1);

    assert_eq!(k.dispatch(), NextAction::SwitchTo(p0));
    k.destroy_process(p0);
    assert_eq!(k.dispatch(), NextAction::SwitchTo(p1a));
    k.destroy_process(p1a);
    assert_eq!(k.dispatch(), NextAction::SwitchTo(p1b));
}

#[test]
fn scenario_b_sleep_until_wakeup_tick() {
    let mut k = boot(10);
    let _idle = spawn(&mut k, PRIO_USER_LOW);
    let q = spawn(&mut k, 1);
    let p = spawn(&mut k, 1);
    assert_eq!(k.dispatch(), NextAction::SwitchTo(q));

    for _ in 0..5 {
        assert_eq!(k.clock_tick(), NextAction::Continue);
    }
    let t = k.ticks();

    // q sleeps longer, p goes to sleep after it but must end up ahead.
    assert_eq!(syscall(&mut k, SyscallNumber::Sleep as u64, (2000, 0, 0)), NextAction::SwitchTo(p));
    syscall(&mut k, SyscallNumber::Sleep as u64, (1000, 0, 0));
    let order: Vec<_> = k.sleepers().collect();
    assert_eq!(order, vec![(t + 1000, p), (t + 2000, q)]);

    while k.ticks() < t + 999 {
        k.clock_tick();
        assert_eq!(k.pcb(p).state, ProcessState::Sleeping);
    }
    k.clock_tick();
    assert_eq!(k.ticks(), t + 1000);
    assert_ne!(k.pcb(p).state, ProcessState::Sleeping);
    assert_eq!(k.pcb(q).state, ProcessState::Sleeping);

    // The idle process yields the CPU at its next quantum expiry.
    for _ in 0..10 {
        k.clock_tick();
    }
    assert_eq!(k.current(), Some(p));
    assert_eq!(k.check_invariants(), Ok(()));
}

#[test]
fn scenario_c_quantum_expiry_preempts() {
    let mut k = boot(3);
    let _idle = spawn(&mut k, PRIO_USER_LOW);
    let a = spawn(&mut k, 2);
    let b = spawn(&mut k, 2);
    assert_eq!(k.dispatch(), NextAction::SwitchTo(a));

    assert_eq!(k.clock_tick(), NextAction::Continue);
    assert_eq!(k.clock_tick(), NextAction::Continue);
    assert_eq!(k.pcb(a).state, ProcessState::Running);
    assert_eq!(k.clock_tick(), NextAction::SwitchTo(b));

    assert_eq!(k.pcb(a).state, ProcessState::Ready);
    assert_eq!(k.pcb(b).state, ProcessState::Running);
    assert_eq!(k.ready_at(2).collect::<Vec<_>>(), vec![a]);
    assert_eq!(k.check_invariants(), Ok(()));
}

#[test]
fn scenario_d_exit_hands_cpu_to_highest_ready() {
    let mut k = boot(10);
    let x = spawn(&mut k, 0);
    let low = spawn(&mut k, 3);
    let high = spawn(&mut k, 1);
    assert_eq!(k.dispatch(), NextAction::SwitchTo(x));

    let pcbs = k.free_pcb_count();
    let stacks = k.free_stack_count();
    let pid = k.pcb(x).pid;

    assert_eq!(syscall(&mut k, SyscallNumber::Exit as u64, (0, 0, 0)), NextAction::SwitchTo(high));
    assert!(k.pcb(x).is_free());
    assert_eq!(k.processes().find(pid), None);
    assert_eq!(k.free_pcb_count(), pcbs + 1);
    assert_eq!(k.free_stack_count(), stacks + 1);
    assert!(!queued_anywhere(&k, x));
    assert_eq!(k.ready_at(3).collect::<Vec<_>>(), vec![low]);
    assert_eq!(k.check_invariants(), Ok(()));
}

#[test]
fn scenario_e_spawn_on_exhausted_pool_fails() {
    let mut k = boot(10);
    let _idle = spawn(&mut k, PRIO_USER_LOW);
    let caller = spawn(&mut k, 1);
    k.dispatch();
    k.clock_tick();
    k.clock_tick();

    while k.free_pcb_count() > 0 {
        syscall(&mut k, SyscallNumber::SpawnP as u64, (0x50_0000, 2, 0));
        assert!(ret(&k, caller) > 0);
    }
    assert_eq!(k.active_processes(), N_PCBS);

    let before = (k.pcb(caller).state, k.pcb(caller).priority, k.pcb(caller).quantum);
    assert_eq!(syscall(&mut k, SyscallNumber::SpawnP as u64, (0x50_0000, 2, 0)), NextAction::Continue);
    assert_eq!(ret(&k, caller), -1);
    assert_eq!((k.pcb(caller).state, k.pcb(caller).priority, k.pcb(caller).quantum), before);
    assert_eq!(k.current(), Some(caller));
    assert_eq!(k.check_invariants(), Ok(()));
}

#[test]
fn ordered_queue_traversal_is_sorted_and_stable() {
    let mut q = QueueEngine::<64, 4>::new();
    q.init_module();
    let id = q.alloc_one(QueueOrder::Ordered(compare_time)).unwrap();

    let mut seed = 0x2545_f491u64;
    for seq in 0..48 {
        seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        q.insert(id, seq, (seed >> 60) % 6);
    }

    let entries: Vec<_> = q.iter(id).collect();
    assert_eq!(entries.len(), 48);
    for pair in entries.windows(2) {
        let ((k0, d0), (k1, d1)) = (pair[0], pair[1]);
        assert!(k0 <= k1);
        if k0 == k1 {
            assert!(d0 < d1, "equal keys out of insertion order");
        }
    }
}

#[test]
fn pools_round_trip() {
    let mut k = boot(10);
    let before = (k.free_pcb_count(), k.free_stack_count(), k.free_node_count(), k.active_processes());

    let pcb = k.create_process(0x1000, 2).unwrap();
    k.destroy_process(pcb);
    assert_eq!(
        (k.free_pcb_count(), k.free_stack_count(), k.free_node_count(), k.active_processes()),
        before
    );

    let mut q = QueueEngine::<16, 4>::new();
    q.init_module();
    let (queues, nodes) = (q.free_queue_count(), q.free_node_count());
    let id = q.alloc_one(QueueOrder::Fifo).unwrap();
    q.dealloc(id);
    assert_eq!((q.free_queue_count(), q.free_node_count()), (queues, nodes));
}

#[test]
fn invariants_hold_under_mixed_workload() {
    let mut k = boot(4);
    let idle = spawn(&mut k, PRIO_USER_LOW);
    for prio in [0, 1, 2, 2] {
        spawn(&mut k, prio);
    }
    k.dispatch();

    for step in 0..3000u64 {
        k.clock_tick();
        assert_eq!(k.check_invariants(), Ok(()), "after tick at step {}", step);

        let current = k.current().unwrap();
        if current == idle || step % 5 != 0 {
            continue;
        }
        let call = match (step / 5) % 6 {
            0 => (SyscallNumber::Sleep as u64, ((step % 7) * 3, 0, 0)),
            1 => (SyscallNumber::SpawnP as u64, (0x60_0000, (step / 5) % 5, 0)),
            2 => (SyscallNumber::GetProcessInfo as u64, (step % 8, 0, 0)),
            3 if k.active_processes() > 6 => (SyscallNumber::Exit as u64, (0, 0, 0)),
            4 => (SyscallNumber::Sleep as u64, (40, 0, 0)),
            _ => (SyscallNumber::GetSystemInfo as u64, (step % 4, 0, 0)),
        };
        syscall(&mut k, call.0, call.1);
        assert_eq!(k.check_invariants(), Ok(()), "after syscall {} at step {}", call.0, step);
    }
    assert_ne!(k.pcb(idle).state, ProcessState::Free);
}

#[test]
fn console_io_through_syscalls() {
    let mut k = boot(10);
    let caller = spawn(&mut k, 1);
    k.dispatch();

    let mut console = MockDevice::default();
    let mut sio = MockDevice::default();
    console.input.extend(b"ok");

    let msg = b"hello\0";
    let mut buf = [0u8; 4];
    {
        let ctx = k.context_mut(caller).unwrap();
        ctx.rax = SyscallNumber::Write as u64;
        ctx.rdi = 0;
        ctx.rsi = msg.as_ptr() as u64;
        ctx.rdx = 0;
    }
    let mut devices = Devices::new(&mut console, &mut sio);
    k.handle_syscall(&mut devices);
    assert_eq!(ret(&k, caller), 5);

    {
        let ctx = k.context_mut(caller).unwrap();
        ctx.rax = SyscallNumber::Read as u64;
        ctx.rdi = 0;
        ctx.rsi = buf.as_mut_ptr() as u64;
        ctx.rdx = buf.len() as u64;
    }
    k.handle_syscall(&mut devices);
    assert_eq!(ret(&k, caller), 2);
    drop(devices);

    assert_eq!(console.output, b"hello");
    assert_eq!(&buf[..2], b"ok");
    assert!(sio.output.is_empty());
}
