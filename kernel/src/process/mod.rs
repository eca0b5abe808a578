pub mod pcb;

use alloc::string::String;
use alloc::vec::Vec;
use spin::Mutex;
use lazy_static::lazy_static;
use x86_64::VirtAddr;

use crate::memory::mmap::MmapRegion;
use crate::memory::spt::Spt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ProcessId(pub u32);

/// The minimal owner record every page, frame, and mmap region points back
/// to. Scheduling (threads, priority, wait reasons) is out of scope per
/// SPEC_FULL.md §1 and is not modeled here.
pub struct Process {
    pub id: ProcessId,
    pub name: String,
    pub spt: Spt,
    /// Stack pointer last captured at a user->kernel transition; consulted
    /// by the fault handler for kernel-origin faults (SPEC_FULL.md §4.6).
    pub user_rsp: VirtAddr,
    pub mmap_regions: Vec<MmapRegion>,
}

impl Process {
    fn new(id: ProcessId, name: String) -> Self {
        Self {
            id,
            name,
            spt: Spt::new(),
            user_rsp: VirtAddr::zero(),
            mmap_regions: Vec::new(),
        }
    }
}

pub struct ProcessTable {
    processes: Vec<Process>,
    next_id: u32,
    current: Option<ProcessId>,
}

impl ProcessTable {
    pub fn new() -> Self {
        Self {
            processes: Vec::new(),
            next_id: 1,
            current: None,
        }
    }

    pub fn create(&mut self, name: String) -> ProcessId {
        let id = ProcessId(self.next_id);
        self.next_id += 1;
        self.processes.push(Process::new(id, name));
        if self.current.is_none() {
            self.current = Some(id);
        }
        id
    }

    pub fn get_mut(&mut self, id: ProcessId) -> Option<&mut Process> {
        self.processes.iter_mut().find(|p| p.id == id)
    }

    pub fn remove(&mut self, id: ProcessId) {
        if let Some(pos) = self.processes.iter().position(|p| p.id == id) {
            let mut proc = self.processes.remove(pos);
            proc.spt.kill();
        }
    }
}

/// Copies `parent`'s SPT into `child`'s. Snapshots `parent`'s pages under a
/// single brief lock, then materializes and inserts each child page with
/// the process-table lock released in between — `spt::fork_copy_page` is
/// where frame acquisition and any swap/file I/O happens, and it can itself
/// trigger eviction, which looks up an arbitrary owning process. Holding
/// `PROCESS_TABLE` across that (the old `ProcessTable::fork` took one lock
/// for the whole copy) self-deadlocks against `spin::Mutex`, which is not
/// reentrant; this keeps every lock acquisition here leaf-level instead.
pub fn fork(child: ProcessId, parent: ProcessId) -> Result<(), crate::memory::VmError> {
    use crate::memory::VmError;

    let entries = with_process(parent, |p| p.spt.fork_entries()).ok_or(VmError::BadArgument)?;

    for entry in entries {
        let page = match crate::memory::spt::fork_copy_page(child, entry) {
            Ok(page) => page,
            Err(e) => {
                with_process_mut(child, |p| p.spt.kill());
                return Err(e);
            }
        };
        let mmap_ctx = page.mmap_ctx().cloned();
        let inserted = with_process_mut(child, |p| p.spt.insert(page));
        match inserted {
            Some(Ok(())) => {
                if let Some(ctx) = mmap_ctx {
                    ctx.lock().refcnt += 1;
                }
            }
            _ => {
                with_process_mut(child, |p| p.spt.kill());
                return Err(VmError::BadArgument);
            }
        }
    }
    Ok(())
}

lazy_static! {
    pub static ref PROCESS_TABLE: Mutex<ProcessTable> = Mutex::new(ProcessTable::new());
}

pub fn init() -> ProcessId {
    PROCESS_TABLE.lock().create(String::from("kernel"))
}

pub fn current_pid() -> Option<ProcessId> {
    PROCESS_TABLE.lock().current
}

pub fn set_current(id: ProcessId) {
    PROCESS_TABLE.lock().current = Some(id);
}

/// Runs `f` against the process identified by `pid`, holding the process
/// table lock only for the duration of the closure. VM code uses this to
/// reach a specific owner's SPT without needing its own reference.
pub fn with_process_mut<R>(pid: ProcessId, f: impl FnOnce(&mut Process) -> R) -> Option<R> {
    let mut table = PROCESS_TABLE.lock();
    table.get_mut(pid).map(f)
}

pub fn with_process<R>(pid: ProcessId, f: impl FnOnce(&Process) -> R) -> Option<R> {
    let mut table = PROCESS_TABLE.lock();
    table.get_mut(pid).map(|p| f(&*p))
}
