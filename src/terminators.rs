//! Terminators for controlling and interrupting long-running solves.
//!
//! - [`InterruptTerminator`]: responds to Ctrl-C (SIGINT) or a programmatic
//!   interrupt.
//! - [`TimeOutTerminator`]: terminates after a specified wall-clock budget.
//! - [`MultipleTerminators`]: combines several terminators, firing on the
//!   first one that does.
//!
//! # Note
//! [`InterruptTerminator`] installs a global signal handler and can only be
//! constructed once per process; a second construction panics.

use std::sync::{Arc, atomic::AtomicBool};

use crate::Status;

pub trait Terminator {
    fn initialize(&mut self) {}

    fn terminate(&mut self) -> Option<Status>;
}

/// Terminator that responds to Ctrl-C (SIGINT) or [`InterruptTerminator::interrupt`].
pub struct InterruptTerminator {
    interrupted: Arc<AtomicBool>,
}

impl InterruptTerminator {
    pub fn new() -> Self {
        let interrupted = Arc::new(AtomicBool::new(false));
        ctrlc::set_handler({
            let interrupted_clone = interrupted.clone();
            move || {
                interrupted_clone.store(true, std::sync::atomic::Ordering::SeqCst);
            }
        })
        .expect("Error setting Ctrl-C handler");
        Self { interrupted }
    }

    pub fn interrupt(&mut self) {
        self.interrupted.store(true, std::sync::atomic::Ordering::SeqCst);
    }
}

impl Default for InterruptTerminator {
    fn default() -> Self {
        Self::new()
    }
}

impl Terminator for InterruptTerminator {
    fn terminate(&mut self) -> Option<Status> {
        if self.interrupted.load(std::sync::atomic::Ordering::SeqCst) {
            Some(Status::Interrupted)
        } else {
            None
        }
    }
}

/// Terminator that triggers once `max_time_secs` has elapsed since `initialize`.
pub struct TimeOutTerminator {
    max_time_secs: u64,
    start_time: std::time::Instant,
}

impl TimeOutTerminator {
    pub fn new(max_time_secs: u64) -> Self {
        Self {
            max_time_secs,
            start_time: std::time::Instant::now(),
        }
    }
}

impl Terminator for TimeOutTerminator {
    fn initialize(&mut self) {
        self.start_time = std::time::Instant::now();
    }

    fn terminate(&mut self) -> Option<Status> {
        if self.start_time.elapsed().as_secs() >= self.max_time_secs {
            Some(Status::TimeLimitReached)
        } else {
            None
        }
    }
}

/// A terminator that never fires. Used when the caller has no external
/// cancellation source.
pub struct NoOpTerminator;

impl Terminator for NoOpTerminator {
    fn terminate(&mut self) -> Option<Status> {
        None
    }
}

/// Combines several terminators; fires on the first one that does.
pub struct MultipleTerminators {
    terminators: Vec<Box<dyn Terminator>>,
}

impl MultipleTerminators {
    pub fn new(terminators: Vec<Box<dyn Terminator>>) -> Self {
        Self { terminators }
    }
}

impl Terminator for MultipleTerminators {
    fn initialize(&mut self) {
        for terminator in &mut self.terminators {
            terminator.initialize();
        }
    }

    fn terminate(&mut self) -> Option<Status> {
        for terminator in &mut self.terminators {
            if let Some(status) = terminator.as_mut().terminate() {
                return Some(status);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_terminator_never_fires() {
        let mut t = NoOpTerminator;
        assert_eq!(t.terminate(), None);
    }

    #[test]
    fn timeout_terminator_fires_immediately_for_zero_budget() {
        let mut t = TimeOutTerminator::new(0);
        t.initialize();
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert_eq!(t.terminate(), Some(Status::TimeLimitReached));
    }

    #[test]
    fn multiple_terminators_fires_on_first_match() {
        let mut t = MultipleTerminators::new(vec![
            Box::new(NoOpTerminator),
            Box::new(TimeOutTerminator::new(0)),
        ]);
        t.initialize();
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert_eq!(t.terminate(), Some(Status::TimeLimitReached));
    }

    #[cfg(unix)]
    mod platform {
        pub fn send_sigint() {
            use nix::sys::signal::{self, Signal};
            use nix::unistd::Pid;

            let pid = std::process::id() as i32;
            signal::kill(Pid::from_raw(pid), Signal::SIGINT).expect("failed to send SIGINT");
        }
    }

    #[cfg(windows)]
    mod platform {
        pub fn send_sigint() {
            use windows_sys::Win32::System::Console::{CTRL_C_EVENT, GenerateConsoleCtrlEvent};

            unsafe {
                GenerateConsoleCtrlEvent(CTRL_C_EVENT, 0);
            }
        }
    }

    /// Self-signals SIGINT (or a Ctrl-C console event on Windows) from a
    /// background thread and checks that `InterruptTerminator` observes it.
    /// `InterruptTerminator::new` installs a process-global handler, so this
    /// is the only test in the crate allowed to construct one.
    #[test]
    fn interrupt_terminator_observes_real_sigint() {
        let mut terminator = InterruptTerminator::new();

        std::thread::spawn(|| {
            std::thread::sleep(std::time::Duration::from_millis(50));
            platform::send_sigint();
        });

        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        loop {
            if let Some(status) = terminator.terminate() {
                assert_eq!(status, Status::Interrupted);
                break;
            }
            assert!(std::time::Instant::now() < deadline, "SIGINT was never observed");
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
    }
}
