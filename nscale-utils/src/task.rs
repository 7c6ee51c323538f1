//
// Copyright (c) The nscale Contributors
//
// SPDX-License-Identifier: MIT
//

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task;
use tokio::time;
pub use tokio::time::error::Elapsed;
use tracing::error;

/// A handle which can be used to manipulate the task created by the
/// [`Task::spawn`] function.
///
/// Dropping this handle cancels the task.
#[derive(Debug)]
pub struct Task<T> {
    join_handle: task::JoinHandle<T>,
}

/// A group of homogeneous tasks joined as one unit.
///
/// The group is the phase barrier of the harness: no phase proceeds until
/// every task of the previous phase has completed, and per-task outputs
/// (including errors) are handed back to the caller instead of being
/// dropped or merely logged.
///
/// A bounded group additionally caps how many task bodies may run
/// concurrently, using a counting semaphore acquired inside each task.
#[derive(Debug)]
pub struct TaskGroup<T> {
    limit: Option<Arc<Semaphore>>,
    tasks: Vec<Task<T>>,
}

// ===== impl Task =====

impl<T> Task<T> {
    /// Spawns a new asynchronous task, returning a handle for it.
    pub fn spawn<Fut>(future: Fut) -> Task<T>
    where
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        Task {
            join_handle: task::spawn(future),
        }
    }
}

impl<T> Future for Task<T> {
    type Output = Result<T, task::JoinError>;

    fn poll(
        mut self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Self::Output> {
        Pin::new(&mut self.join_handle).poll(cx)
    }
}

impl<T> Drop for Task<T> {
    fn drop(&mut self) {
        self.join_handle.abort();
    }
}

// ===== impl TaskGroup =====

impl<T> TaskGroup<T>
where
    T: Send + 'static,
{
    /// Creates an unbounded task group.
    pub fn new() -> TaskGroup<T> {
        Default::default()
    }

    /// Creates a task group limiting the number of concurrently running
    /// task bodies to `limit`.
    pub fn bounded(limit: usize) -> TaskGroup<T> {
        TaskGroup {
            limit: Some(Arc::new(Semaphore::new(limit))),
            tasks: Vec::new(),
        }
    }

    /// Spawns a new task owned by the group.
    ///
    /// In a bounded group the concurrency permit is acquired inside the
    /// spawned task, so spawning never blocks; the body starts running
    /// once a permit is available and releases it on completion.
    pub fn spawn<Fut>(&mut self, future: Fut)
    where
        Fut: Future<Output = T> + Send + 'static,
    {
        match &self.limit {
            Some(limit) => {
                let limit = limit.clone();
                self.tasks.push(Task::spawn(async move {
                    // The semaphore is never closed.
                    let _permit = limit.acquire_owned().await.unwrap();
                    future.await
                }));
            }
            None => {
                self.tasks.push(Task::spawn(future));
            }
        }
    }

    /// Waits for every task of the group to complete and returns their
    /// outputs in spawn order.
    ///
    /// Panics from task bodies are resumed on the joining task.
    pub async fn join_all(self) -> Vec<T> {
        let mut outputs = Vec::with_capacity(self.tasks.len());
        for task in self.tasks {
            match task.await {
                Ok(output) => outputs.push(output),
                Err(error) if error.is_panic() => {
                    std::panic::resume_unwind(error.into_panic());
                }
                Err(error) => {
                    error!(%error, "task cancelled");
                }
            }
        }
        outputs
    }
}

impl<T> Default for TaskGroup<T> {
    fn default() -> TaskGroup<T> {
        TaskGroup {
            limit: None,
            tasks: Vec::new(),
        }
    }
}

// ===== global functions =====

/// Polls an asynchronous condition until it yields a value or the
/// deadline expires.
///
/// The condition is evaluated immediately, then once per poll interval.
/// Expiration surfaces as an explicit [`Elapsed`] error; the in-flight
/// condition future is dropped at that point.
pub async fn poll_until<T, F, Fut>(
    deadline: Duration,
    poll_interval: Duration,
    mut condition: F,
) -> Result<T, Elapsed>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    time::timeout(deadline, async {
        let mut interval = time::interval(poll_interval);
        loop {
            interval.tick().await;
            if let Some(value) = condition().await {
                break value;
            }
        }
    })
    .await
}

// ===== unit tests =====
