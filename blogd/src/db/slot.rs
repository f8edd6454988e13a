use std::future::Future;
use tokio::sync::OnceCell;

/// A value initialized at most once per process.
///
/// Placed in a `static`, the slot outlives every caller, so code that is re-entered (a reloaded
/// router, a second `Application` in tests) sees the value built by the first caller instead of
/// opening another pool. Concurrent first callers wait for a single constructor run. A failed run
/// leaves the slot empty and the next caller tries again.
pub struct PoolSlot<P> {
    cell: OnceCell<P>,
}

impl<P> PoolSlot<P> {
    pub const fn new() -> Self {
        Self {
            cell: OnceCell::const_new(),
        }
    }

    pub async fn get_or_try_init<F, Fut, E>(&self, init: F) -> Result<&P, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<P, E>>,
    {
        self.cell.get_or_try_init(init).await
    }

    pub fn get(&self) -> Option<&P> {
        self.cell.get()
    }

    pub fn is_initialized(&self) -> bool {
        self.cell.initialized()
    }
}

impl<P> Default for PoolSlot<P> {
    fn default() -> Self {
        Self::new()
    }
}
