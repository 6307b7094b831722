//! # Task System Core Traits
//!
//! This module defines the fundamental building blocks of the task system,
//! which provides a framework for executing work asynchronously across multiple threads.
//!
//! ## Core Components
//! - `Task`: Represents a unit of work that can be executed asynchronously
//! - `TaskResult`: Represents the result of a completed task
//!
//! ## Task Lifecycle
//! 1. A `Task` is created and scheduled via `TaskManager::publish_task()`
//! 2. The task's `process()` method is called on a worker thread
//! 3. The task returns a boxed `TaskResult`
//! 4. The result's `handle_result()` is called on the owning thread with
//!    exclusive access to the manager's context
//! 5. The result can spawn new tasks
//!
//! ## Thread Safety
//! - `Task` must be `Send` to be transferred between threads
//! - `TaskResult` must be `Send` to be transferred back to the owning thread
//! - Only results touch the context, and they do so on the owning thread

/// A unit of work that can be executed on a worker thread.
///
/// Tasks own everything they need. `C` is the context their results are
/// applied to.
pub trait Task<C>: Send {
    /// Performs the work on a worker thread.
    ///
    /// # Returns
    /// A boxed `TaskResult` that will be applied on the owning thread.
    fn process(&self) -> Box<dyn TaskResult<C>>;

    /// Builds the result reported when `process()` panicked.
    ///
    /// # Arguments
    /// * `reason` - The panic message
    fn on_panic(&self, reason: String) -> Box<dyn TaskResult<C>>;
}

/// The outcome of processing a `Task`.
pub trait TaskResult<C>: Send {
    /// Applies the outcome to the context.
    ///
    /// # Returns
    /// Follow-up tasks to schedule (can be empty).
    fn handle_result(self: Box<Self>, context: &mut C) -> Vec<Box<dyn Task<C>>>;
}
