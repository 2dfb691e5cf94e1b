//! Queue module: the per-manager invocation queues.

mod invocation_queue;

pub use invocation_queue::InvocationQueue;
