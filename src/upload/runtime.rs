use super::{TaskResult, UploadTask};
use crate::backend::{GpuDevice, GpuResource, UploadRuntime};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// Upload runtime that queues tasks until the render thread flushes them.
#[derive(Debug, Default)]
pub struct QueuedUploadRuntime {
    queue: Mutex<VecDeque<Arc<UploadTask>>>,
}

impl QueuedUploadRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tasks waiting to run.
    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    /// Run every queued task on the calling thread. Returns how many
    /// uploaded a frame.
    pub fn flush(&self, gpu: &dyn GpuDevice) -> usize {
        let tasks: Vec<_> = self.queue.lock().drain(..).collect();
        tasks
            .iter()
            .filter(|task| task.run(gpu) == TaskResult::Ok)
            .count()
    }
}

impl UploadRuntime for QueuedUploadRuntime {
    fn start(&self, task: Arc<UploadTask>) {
        self.queue.lock().push_back(task);
    }

    fn cancel(&self, task: &Arc<UploadTask>) {
        self.queue.lock().retain(|queued| !Arc::ptr_eq(queued, task));
    }

    fn has_reference(&self, resource: GpuResource) -> bool {
        self.queue.lock().iter().any(|task| task.references(resource))
    }
}
