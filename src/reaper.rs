//! Interrupt handling and process-tree teardown.
//!
//! The stages delegate to tools that fork helpers of their own, so cleanup
//! walks the live process table instead of tracking pids: every descendant
//! of the runner gets a TERM, and whatever survives the grace period gets a
//! KILL. Failures are swallowed throughout; this runs on exit paths where
//! there is nobody left to report to.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use sysinfo::{Pid, ProcessStatus, ProcessesToUpdate, Signal, System};

/// How long terminated descendants get to exit before being killed.
pub const GRACE_PERIOD: Duration = Duration::from_secs(3);

const POLL: Duration = Duration::from_millis(100);

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

extern "C" fn note_interrupt(_signal: libc::c_int) {
    INTERRUPTED.store(true, Ordering::Relaxed);
}

/// Cancellation flag checked at every suspension point.
#[derive(Clone, Copy, Debug)]
pub struct CancelToken(&'static AtomicBool);

impl CancelToken {
    /// A token nothing signals; callers trip it by hand.
    pub fn new() -> Self {
        CancelToken(Box::leak(Box::new(AtomicBool::new(false))))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Sleep in short ticks; returns false if cancelled along the way.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.is_cancelled() {
                return false;
            }
            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() {
                return true;
            }
            thread::sleep(left.min(POLL));
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Install the SIGINT handler and return the token it trips.
pub fn interrupt_token() -> CancelToken {
    let handler = note_interrupt as extern "C" fn(libc::c_int);
    unsafe { libc::signal(libc::SIGINT, handler as libc::sighandler_t) };
    CancelToken(&INTERRUPTED)
}

/// Terminate every descendant of the current process.
pub fn reap_descendants() {
    if let Ok(own_pid) = sysinfo::get_current_pid() {
        reap_below(own_pid);
    }
}

fn reap_below(root: Pid) {
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::All, true);

    let targets = descendants_of(&system, root);
    if targets.is_empty() {
        return;
    }
    for pid in &targets {
        if let Some(process) = system.process(*pid) {
            process.kill_with(Signal::Term);
        }
    }

    let deadline = Instant::now() + GRACE_PERIOD;
    loop {
        thread::sleep(POLL);
        system.refresh_processes(ProcessesToUpdate::Some(&targets), true);
        let alive: Vec<Pid> = targets
            .iter()
            .copied()
            .filter(|pid| is_alive(&system, *pid))
            .collect();
        if alive.is_empty() {
            return;
        }
        if Instant::now() >= deadline {
            for pid in alive {
                if let Some(process) = system.process(pid) {
                    process.kill();
                }
            }
            return;
        }
    }
}

/// Snapshot of the descendant set, recomputed from scratch on every call;
/// the stages spawn and retire children continuously, so a cached pid list
/// would go stale immediately.
fn descendants_of(system: &System, root: Pid) -> Vec<Pid> {
    let mut found = Vec::new();
    let mut frontier = vec![root];
    while let Some(parent) = frontier.pop() {
        for (pid, process) in system.processes() {
            if process.parent() == Some(parent) && !found.contains(pid) {
                found.push(*pid);
                frontier.push(*pid);
            }
        }
    }
    found
}

fn is_alive(system: &System, pid: Pid) -> bool {
    match system.process(pid) {
        Some(process) => !matches!(
            process.status(),
            ProcessStatus::Zombie | ProcessStatus::Dead
        ),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;

    #[test]
    fn token_starts_clear_and_latches() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        token.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn cancelled_sleep_returns_early() {
        let token = CancelToken::new();
        token.cancel();
        let started = Instant::now();
        assert!(!token.sleep(Duration::from_secs(10)));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn reaps_every_descendant_within_the_grace_period() {
        let mut harness = Command::new("sh")
            .arg("-c")
            .arg("for i in 1 2 3 4 5; do sleep 300 & done; wait")
            .spawn()
            .unwrap();
        let root = Pid::from_u32(harness.id());

        // Wait for the five sleepers to show up in the process table.
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let mut system = System::new();
            system.refresh_processes(ProcessesToUpdate::All, true);
            if descendants_of(&system, root).len() >= 5 {
                break;
            }
            assert!(Instant::now() < deadline, "sleepers never appeared");
            thread::sleep(Duration::from_millis(50));
        }

        let started = Instant::now();
        reap_below(root);
        assert!(started.elapsed() <= GRACE_PERIOD + Duration::from_secs(2));

        // The harness shell leaves its `wait` once the sleepers are gone.
        harness.wait().unwrap();
        let mut system = System::new();
        system.refresh_processes(ProcessesToUpdate::All, true);
        let leftovers: Vec<Pid> = descendants_of(&system, root)
            .into_iter()
            .filter(|pid| is_alive(&system, *pid))
            .collect();
        assert!(leftovers.is_empty(), "descendants survived: {leftovers:?}");
    }
}
