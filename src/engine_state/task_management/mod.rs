//! # Task Management System
//!
//! This module provides the worker pool that generates region grids off the
//! streaming thread.
//!
//! ## Architecture Overview
//!
//! The task management system consists of several key components:
//! - `TaskManager`: Central coordinator for task distribution and worker management
//! - `Task`: A unit of work that can be executed asynchronously
//! - `TaskResult`: The result of a completed task, which can spawn additional tasks
//! - `TaskChannel`: Communication channel between the owning thread and one worker
//!
//! Each worker has a dedicated channel for task distribution. Tasks are handed
//! out round-robin, one in flight per worker; the rest wait in a FIFO queue.
//!
//! ## Task Lifecycle
//! 1. Tasks are created and published via `TaskManager::publish_task()`
//! 2. The manager distributes tasks to available worker channels using round-robin
//! 3. Workers process tasks and return results. A panicking task is caught and
//!    reported through `Task::on_panic` instead of killing the worker
//! 4. Results are applied on the owning thread in `process_completed_tasks()`
//! 5. Results can spawn new tasks
//!
//! ## Example Usage
//! ```rust,ignore
//! let mut task_manager = TaskManager::new(num_workers)?;
//!
//! task_manager.publish_task(Box::new(MyTask::new(...)));
//!
//! // In the owning loop:
//! task_manager.process_completed_tasks(&mut context);
//! task_manager.process_queued_tasks();
//! ```

pub mod task;

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};
use std::thread::{self, JoinHandle};

use log::{error, info};
use task::{Task, TaskResult};

use crate::error::{panic_message, StreamingError};

/// A communication channel between the owning thread and a worker thread.
///
/// # Fields
/// - `task_sender`: Sends tasks to the worker; dropping it stops the worker
/// - `result_receiver`: Receives task results from the worker
/// - `num_tasks_in_flight`: Tracks number of tasks currently being processed
/// - `worker`: Handle to the worker thread, joined on shutdown
pub struct TaskChannel<C> {
    task_sender: Option<Sender<Box<dyn Task<C>>>>,
    result_receiver: Receiver<Box<dyn TaskResult<C>>>,
    num_tasks_in_flight: usize,
    worker: Option<JoinHandle<()>>,
    disconnected: bool,
}

impl<C> TaskChannel<C> {
    fn is_available(&self) -> bool {
        !self.disconnected && self.num_tasks_in_flight < MAX_TASKS_IN_FLIGHT
    }
}

/// Manages a pool of worker threads and coordinates task execution.
///
/// The `TaskManager` is responsible for:
/// - Creating and joining worker threads
/// - Distributing tasks across available workers
/// - Collecting results and applying them to a context of type `C`
/// - Queuing tasks when all workers are busy
pub struct TaskManager<C: 'static> {
    channels: Vec<TaskChannel<C>>,
    queued_tasks: VecDeque<Box<dyn Task<C>>>,
    current_channel: usize,
}

/// Maximum number of tasks that can be in flight per worker channel.
///
/// Keeping it at 1 leaves the rest of the work in the shared queue, where it
/// can still be skipped cheaply once cancelled.
pub const MAX_TASKS_IN_FLIGHT: usize = 1;

impl<C: 'static> TaskManager<C> {
    /// Creates a new `TaskManager` with the specified number of worker threads.
    ///
    /// # Arguments
    /// * `num_workers` - Number of worker threads to create
    ///
    /// # Errors
    /// Returns [`StreamingError::Spawn`] if a worker thread cannot be created.
    /// Workers spawned before the failure are stopped and joined.
    pub fn new(num_workers: usize) -> Result<Self, StreamingError> {
        info!(
            "Starting {} generation workers (available parallelism: {:?})",
            num_workers,
            thread::available_parallelism()
        );

        let mut manager = TaskManager {
            channels: Vec::with_capacity(num_workers),
            queued_tasks: VecDeque::new(),
            current_channel: 0,
        };

        for index in 0..num_workers {
            let (task_tx, task_rx) = channel::<Box<dyn Task<C>>>();
            let (result_tx, result_rx) = channel::<Box<dyn TaskResult<C>>>();

            let task_closure = move || {
                while let Ok(task) = task_rx.recv() {
                    let result = match panic::catch_unwind(AssertUnwindSafe(|| task.process())) {
                        Ok(result) => result,
                        Err(payload) => {
                            let reason = panic_message(payload.as_ref());
                            error!("Generation task panicked: {}", reason);
                            task.on_panic(reason)
                        }
                    };
                    if result_tx.send(result).is_err() {
                        break;
                    }
                }
            };

            let worker = thread::Builder::new()
                .name(format!("terrain-worker-{}", index))
                .spawn(task_closure)
                .map_err(StreamingError::Spawn)?;

            manager.channels.push(TaskChannel {
                task_sender: Some(task_tx),
                result_receiver: result_rx,
                num_tasks_in_flight: 0,
                worker: Some(worker),
                disconnected: false,
            });
        }

        Ok(manager)
    }

    /// Attempts to send a task to a specific worker channel.
    ///
    /// # Returns
    /// - `Ok(())` if the task was successfully sent to the worker
    /// - `Err(task)` if the worker is gone; the channel is marked disconnected
    fn try_send_task(
        &mut self,
        task: Box<dyn Task<C>>,
        channel_idx: usize,
    ) -> Result<(), Box<dyn Task<C>>> {
        let channel = &mut self.channels[channel_idx];
        let Some(sender) = &channel.task_sender else {
            return Err(task);
        };
        match sender.send(task) {
            Ok(_) => {
                channel.num_tasks_in_flight += 1;
                Ok(())
            }
            Err(returned) => {
                error!("Generation worker {} is gone", channel_idx);
                channel.disconnected = true;
                Err(returned.0)
            }
        }
    }

    /// Finds an available worker channel that can accept a new task.
    ///
    /// Round-robin starting from the channel after the last one used, skipping
    /// busy and disconnected channels.
    fn find_available_channel(&self) -> Option<usize> {
        let count = self.channels.len();
        (0..count)
            .map(|step| (self.current_channel + step) % count)
            .find(|&index| self.channels[index].is_available())
    }

    /// Publishes a new task for execution.
    ///
    /// # Returns
    /// - `true` if the task was immediately scheduled on an available worker
    /// - `false` if the task was queued because all workers are busy
    pub fn publish_task(&mut self, task: Box<dyn Task<C>>) -> bool {
        match self.find_available_channel() {
            Some(channel_idx) => match self.try_send_task(task, channel_idx) {
                Ok(_) => {
                    self.current_channel = (channel_idx + 1) % self.channels.len();
                    true
                }
                Err(task) => {
                    self.queued_tasks.push_back(task);
                    false
                }
            },
            None => {
                self.queued_tasks.push_back(task);
                false
            }
        }
    }

    /// Hands queued tasks to workers until the queue is empty or every worker is busy.
    ///
    /// Tasks leave the queue in FIFO order.
    ///
    /// # Returns
    /// The number of tasks handed out.
    pub fn process_queued_tasks(&mut self) -> usize {
        let mut sent = 0;
        while let Some(channel_idx) = self.find_available_channel() {
            let Some(task) = self.queued_tasks.pop_front() else {
                break;
            };
            match self.try_send_task(task, channel_idx) {
                Ok(_) => {
                    self.current_channel = (channel_idx + 1) % self.channels.len();
                    sent += 1;
                }
                Err(task) => self.queued_tasks.push_front(task),
            }
        }
        sent
    }

    /// Applies every completed task result to `context`.
    ///
    /// Follow-up tasks returned by results are published afterwards.
    ///
    /// # Returns
    /// The number of results applied.
    pub fn process_completed_tasks(&mut self, context: &mut C) -> usize {
        let mut tasks_to_queue = Vec::new();
        let mut handled = 0;
        for channel in &mut self.channels {
            loop {
                match channel.result_receiver.try_recv() {
                    Ok(result) => {
                        channel.num_tasks_in_flight = channel.num_tasks_in_flight.saturating_sub(1);
                        tasks_to_queue.extend(result.handle_result(context));
                        handled += 1;
                    }
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        if !channel.disconnected {
                            error!("Generation worker exited unexpectedly");
                        }
                        channel.disconnected = true;
                        channel.num_tasks_in_flight = 0;
                        break;
                    }
                }
            }
        }

        for task in tasks_to_queue {
            self.publish_task(task);
        }
        handled
    }

    /// Number of tasks waiting for a worker.
    pub fn queued_len(&self) -> usize {
        self.queued_tasks.len()
    }

    /// Number of tasks currently on workers.
    pub fn in_flight(&self) -> usize {
        self.channels.iter().map(|c| c.num_tasks_in_flight).sum()
    }

    /// Whether every worker has gone away.
    pub fn is_disconnected(&self) -> bool {
        self.channels.iter().all(|c| c.disconnected)
    }

    /// Drops queued work, stops every worker and waits for them to exit.
    ///
    /// A worker finishes the task it is running before it exits.
    pub fn shutdown(mut self) {
        self.stop_workers();
    }

    fn stop_workers(&mut self) {
        self.queued_tasks.clear();
        for channel in &mut self.channels {
            channel.task_sender = None;
        }
        for channel in &mut self.channels {
            if let Some(worker) = channel.worker.take() {
                if worker.join().is_err() {
                    error!("Generation worker panicked outside a task");
                }
            }
        }
    }
}

impl<C: 'static> Drop for TaskManager<C> {
    fn drop(&mut self) {
        self.stop_workers();
    }
}
