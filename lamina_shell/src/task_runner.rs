// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! One thread per role, each draining a queue of posted tasks.

use core::fmt;
use std::io;
use std::thread::{self, JoinHandle, ThreadId};

use crossbeam_channel::{Receiver, Sender};

type Task = Box<dyn FnOnce() + Send + 'static>;

enum Message {
    Run(Task),
    Stop,
}

/// The job a task runner's thread does.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ThreadRole {
    /// Host-facing events and surface lifecycle.
    Platform,
    /// Scene building and the animator.
    Ui,
    /// Preroll, Paint, and presentation.
    Raster,
    /// Resource loading.
    Io,
}

impl ThreadRole {
    /// All roles in spawn order.
    pub const ALL: [Self; 4] = [Self::Platform, Self::Ui, Self::Raster, Self::Io];

    /// Lowercase role name used in thread names.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Platform => "platform",
            Self::Ui => "ui",
            Self::Raster => "raster",
            Self::Io => "io",
        }
    }
}

/// Handle for posting tasks to one thread. Cheap to clone.
#[derive(Clone)]
pub struct TaskRunner {
    role: ThreadRole,
    thread: ThreadId,
    sender: Sender<Message>,
}

impl fmt::Debug for TaskRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskRunner")
            .field("role", &self.role)
            .field("thread", &self.thread)
            .finish_non_exhaustive()
    }
}

impl TaskRunner {
    /// Role this runner serves.
    #[must_use]
    pub fn role(&self) -> ThreadRole {
        self.role
    }

    /// Queues `task`. Returns `false` if the runner has stopped; the task is
    /// dropped.
    pub fn post(&self, task: impl FnOnce() + Send + 'static) -> bool {
        let ok = self.sender.send(Message::Run(Box::new(task))).is_ok();
        if !ok {
            log::debug!("{} runner stopped; task dropped", self.role.name());
        }
        ok
    }

    /// Runs `task` on the runner's thread and waits for its result.
    ///
    /// Runs inline when called from that thread. Returns `None` if the
    /// runner stopped before the task ran.
    pub fn post_sync<R: Send + 'static>(&self, task: impl FnOnce() -> R + Send + 'static) -> Option<R> {
        if self.runs_tasks_on_current_thread() {
            return Some(task());
        }
        let (tx, rx) = crossbeam_channel::bounded(1);
        if !self.post(move || {
            let _ = tx.send(task());
        }) {
            return None;
        }
        rx.recv().ok()
    }

    /// Returns `true` when called from the runner's thread.
    #[must_use]
    pub fn runs_tasks_on_current_thread(&self) -> bool {
        thread::current().id() == self.thread
    }
}

/// The four runners a shell uses.
#[derive(Clone, Debug)]
pub struct TaskRunners {
    /// Host events.
    pub platform: TaskRunner,
    /// Engine and animator.
    pub ui: TaskRunner,
    /// Rasterizer.
    pub raster: TaskRunner,
    /// Resource work.
    pub io: TaskRunner,
}

impl TaskRunners {
    /// Runner for `role`.
    #[must_use]
    pub fn get(&self, role: ThreadRole) -> &TaskRunner {
        match role {
            ThreadRole::Platform => &self.platform,
            ThreadRole::Ui => &self.ui,
            ThreadRole::Raster => &self.raster,
            ThreadRole::Io => &self.io,
        }
    }
}

/// Owns the runner threads.
pub struct ThreadHost {
    threads: Vec<(TaskRunner, JoinHandle<()>)>,
}

impl fmt::Debug for ThreadHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadHost").field("threads", &self.threads.len()).finish()
    }
}

impl ThreadHost {
    /// Spawns one thread per [`ThreadRole`], named `{prefix}.{role}`.
    ///
    /// # Errors
    ///
    /// Returns the OS error if a thread cannot be spawned. Threads already
    /// started are stopped.
    pub fn spawn(prefix: &str) -> io::Result<(Self, TaskRunners)> {
        let mut host = Self { threads: Vec::new() };
        for role in ThreadRole::ALL {
            let (sender, receiver) = crossbeam_channel::unbounded();
            let handle = thread::Builder::new()
                .name(format!("{prefix}.{}", role.name()))
                .spawn(move || drain(&receiver))?;
            let runner = TaskRunner {
                role,
                thread: handle.thread().id(),
                sender,
            };
            host.threads.push((runner, handle));
        }
        let runner = |role: ThreadRole| host.threads.iter().find(|(r, _)| r.role == role).map(|(r, _)| r.clone());
        let (Some(platform), Some(ui), Some(raster), Some(io)) = (
            runner(ThreadRole::Platform),
            runner(ThreadRole::Ui),
            runner(ThreadRole::Raster),
            runner(ThreadRole::Io),
        ) else {
            return Err(io::Error::other("task runner missing after spawn"));
        };
        Ok((host, TaskRunners { platform, ui, raster, io }))
    }

    /// Stops every runner after the tasks already queued and joins the
    /// threads.
    pub fn join(mut self) {
        self.stop_and_join();
    }

    fn stop_and_join(&mut self) {
        for (runner, _) in &self.threads {
            let _ = runner.sender.send(Message::Stop);
        }
        for (runner, handle) in self.threads.drain(..) {
            if runner.runs_tasks_on_current_thread() {
                log::warn!("{} runner cannot join itself", runner.role.name());
                continue;
            }
            if handle.join().is_err() {
                log::warn!("{} runner panicked", runner.role.name());
            }
        }
    }
}

impl Drop for ThreadHost {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}

fn drain(receiver: &Receiver<Message>) {
    for message in receiver {
        match message {
            Message::Run(task) => task(),
            Message::Stop => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn tasks_run_in_order_on_their_thread() {
        let (host, runners) = ThreadHost::spawn("test").expect("spawn");
        let log = Arc::new(parking_lot::Mutex::new(Vec::new()));
        for i in 0..5 {
            let log = Arc::clone(&log);
            let ui = runners.ui.clone();
            assert!(
                runners.ui.post(move || log.lock().push((i, ui.runs_tasks_on_current_thread()))),
                "post accepted"
            );
        }
        let name = runners.ui.post_sync(|| thread::current().name().map(str::to_owned));
        assert_eq!(name, Some(Some("test.ui".to_owned())), "named thread");
        assert_eq!(
            *log.lock(),
            (0..5).map(|i| (i, true)).collect::<Vec<_>>(),
            "FIFO on the ui thread"
        );
        assert!(!runners.raster.runs_tasks_on_current_thread(), "test thread is not raster");
        host.join();
    }

    #[test]
    fn post_sync_runs_inline_on_own_thread() {
        let (host, runners) = ThreadHost::spawn("inline").expect("spawn");
        let raster = runners.raster.clone();
        let nested = runners.raster.post_sync(move || raster.post_sync(|| 7));
        assert_eq!(nested, Some(Some(7)), "no deadlock on re-entry");
        host.join();
    }

    #[test]
    fn post_after_join_is_rejected() {
        let (host, runners) = ThreadHost::spawn("stopped").expect("spawn");
        let count = Arc::new(AtomicUsize::new(0));
        host.join();
        let c = Arc::clone(&count);
        assert!(!runners.io.post(move || { c.fetch_add(1, Ordering::SeqCst); }), "runner gone");
        assert_eq!(runners.io.post_sync(|| 1), None, "no result from a stopped runner");
        assert_eq!(count.load(Ordering::SeqCst), 0, "task never ran");
    }
}
