use std::thread;

use super::traits::Dispatch;

/// Runs each job on its own named worker thread
#[derive(Debug, Default, Clone)]
pub struct ThreadDispatch;

impl Dispatch for ThreadDispatch {
    fn spawn(&self, name: &str, job: Box<dyn FnOnce() + Send>) {
        let spawned = thread::Builder::new()
            .name(format!("session-{}", name))
            .spawn(job);
        if let Err(e) = spawned {
            log::error!("Failed to spawn {} worker: {}", name, e);
        }
    }
}
