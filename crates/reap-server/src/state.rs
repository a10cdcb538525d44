use tokio::sync::{Mutex, MutexGuard};

/// Shared application state, available to all route handlers via `State<Arc<AppState<R>>>`.
pub struct AppState<R> {
    pub runner: R,
    /// Bearer token for the run endpoint (None = no authentication).
    pub api_key: Option<String>,
    run_lock: Mutex<()>,
}

impl<R> AppState<R> {
    pub fn new(runner: R, api_key: Option<String>) -> Self {
        Self {
            runner,
            api_key: api_key.filter(|k| !k.is_empty()),
            run_lock: Mutex::new(()),
        }
    }

    /// Claims the single run slot, or `None` while another run holds it.
    pub fn try_begin_run(&self) -> Option<MutexGuard<'_, ()>> {
        self.run_lock.try_lock().ok()
    }
}
