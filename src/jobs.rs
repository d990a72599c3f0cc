use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;

use crate::spawn::Status;

/// Slots reserved up front; the registry grows past this when needed.
pub const DEFAULT_JOB_CAPACITY: usize = 30;

/// Outstanding background children, oldest first.
pub struct JobManager {
    pids: Vec<Pid>,
}

impl JobManager {
    pub fn new() -> Self {
        JobManager {
            pids: Vec::with_capacity(DEFAULT_JOB_CAPACITY),
        }
    }

    pub fn add(&mut self, pid: Pid) {
        if self.pids.contains(&pid) {
            tracing::warn!(pid = pid.as_raw(), "pid already tracked");
            return;
        }
        if self.pids.len() == self.pids.capacity() {
            tracing::debug!(tracked = self.pids.len(), "growing job registry");
        }
        self.pids.push(pid);
    }

    pub fn pids(&self) -> &[Pid] {
        &self.pids
    }

    pub fn len(&self) -> usize {
        self.pids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pids.is_empty()
    }

    /// Checks every tracked pid once without blocking. Finished children are
    /// returned in registration order and dropped from the registry; the
    /// rest keep their relative order.
    pub fn poll_all(&mut self) -> Vec<(Pid, Status)> {
        let mut finished = Vec::new();

        self.pids.retain(|&pid| match waitpid(pid, Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::StillAlive) => true,
            Ok(status) => match Status::from_wait(status) {
                Some(status) => {
                    tracing::debug!(pid = pid.as_raw(), %status, "reaped background job");
                    finished.push((pid, status));
                    false
                }
                None => true,
            },
            Err(Errno::ECHILD) => {
                tracing::warn!(pid = pid.as_raw(), "no longer a child, dropping");
                false
            }
            Err(e) => {
                tracing::warn!(pid = pid.as_raw(), error = %e, "error checking job");
                true
            }
        });

        finished
    }

    /// Sends SIGTERM to every tracked job without waiting for any of them.
    pub fn terminate_all(&self) {
        for &pid in &self.pids {
            if let Err(e) = kill(pid, Signal::SIGTERM) {
                tracing::debug!(pid = pid.as_raw(), error = %e, "kill failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;

    fn spawn(script: &str) -> Pid {
        let child = Command::new("sh").arg("-c").arg(script).spawn().unwrap();
        Pid::from_raw(child.id() as i32)
    }

    /// Blocks until `pid` has exited but leaves it for `poll_all` to reap.
    #[cfg(target_os = "linux")]
    fn wait_exited(pid: Pid) {
        use nix::sys::wait::{waitid, Id};
        loop {
            match waitid(Id::Pid(pid), WaitPidFlag::WEXITED | WaitPidFlag::WNOWAIT) {
                Err(Errno::EINTR) => continue,
                _ => return,
            }
        }
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn reports_in_registration_order() {
        let mut jobs = JobManager::new();
        let pids = [spawn("sleep 0.2; exit 3"), spawn("exit 0"), spawn("kill -TERM $$")];
        for &pid in &pids {
            jobs.add(pid);
        }
        assert_eq!(jobs.pids(), pids);

        for &pid in &pids {
            wait_exited(pid);
        }

        let finished = jobs.poll_all();
        assert_eq!(
            finished,
            vec![
                (pids[0], Status::Exited(3)),
                (pids[1], Status::Exited(0)),
                (pids[2], Status::Signaled(15)),
            ]
        );
        assert!(jobs.is_empty());
        assert!(jobs.poll_all().is_empty());
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn running_jobs_keep_their_place() {
        let mut jobs = JobManager::new();
        let slow_a = spawn("sleep 30");
        let quick = spawn("exit 1");
        let slow_b = spawn("sleep 30");
        jobs.add(slow_a);
        jobs.add(quick);
        jobs.add(slow_b);

        wait_exited(quick);
        assert_eq!(jobs.poll_all(), vec![(quick, Status::Exited(1))]);
        assert_eq!(jobs.pids(), [slow_a, slow_b]);

        jobs.terminate_all();
        for pid in [slow_a, slow_b] {
            wait_exited(pid);
        }
        assert_eq!(
            jobs.poll_all(),
            vec![(slow_a, Status::Signaled(15)), (slow_b, Status::Signaled(15))]
        );
    }

    #[test]
    fn duplicates_are_ignored() {
        let mut jobs = JobManager::new();
        let pid = spawn("exit 0");
        jobs.add(pid);
        jobs.add(pid);
        assert_eq!(jobs.len(), 1);
        let _ = waitpid(pid, None);
    }

    #[test]
    fn grows_past_default_capacity() {
        let mut jobs = JobManager::new();
        let pids: Vec<Pid> = (0..DEFAULT_JOB_CAPACITY + 5).map(|_| spawn("exit 0")).collect();
        for &pid in &pids {
            jobs.add(pid);
        }
        assert_eq!(jobs.pids(), pids.as_slice());

        let mut reaped = Vec::new();
        while !jobs.is_empty() {
            reaped.extend(jobs.poll_all().into_iter().map(|(pid, _)| pid));
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
        reaped.sort();
        let mut expected = pids;
        expected.sort();
        assert_eq!(reaped, expected);
    }

    #[test]
    fn forgets_pids_that_are_not_children() {
        let mut jobs = JobManager::new();
        jobs.add(Pid::from_raw(1));
        assert!(jobs.poll_all().is_empty());
        assert!(jobs.is_empty());
    }
}
