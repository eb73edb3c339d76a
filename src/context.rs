//! Per-run execution settings passed into every long-running operation.
//!
//! A [`RunContext`] carries the tile size, worker count, a [`CancelToken`]
//! and an optional progress hook. Nothing here is global: two runs in the
//! same process can use different pools and be cancelled independently.

use std::fmt;
use std::ops::Range;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::constants::DEFAULT_TILE_ROWS;
use crate::error::{Error, Result};

/// Callback receiving `(rows_done, rows_total)` after each tile.
pub type ProgressHook = Arc<dyn Fn(usize, usize) + Send + Sync>;

/// Shared flag that asks a running operation to stop before its next tile.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create a token in the not-cancelled state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Every clone observes it.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Execution settings for one classification, compaction or RGB run.
#[derive(Clone)]
pub struct RunContext {
    tile_rows: usize,
    threads: usize,
    cancel: CancelToken,
    progress: Option<ProgressHook>,
}

impl RunContext {
    /// Default tile size, rayon's default pool, no progress reporting.
    pub fn new() -> Self {
        Self {
            tile_rows: DEFAULT_TILE_ROWS,
            threads: 0,
            cancel: CancelToken::new(),
            progress: None,
        }
    }

    /// Rows read and processed per tile (at least one).
    pub fn with_tile_rows(mut self, tile_rows: usize) -> Self {
        self.tile_rows = tile_rows.max(1);
        self
    }

    /// Worker threads; 0 uses rayon's default pool.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Use an externally owned cancel token.
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// Install a progress callback.
    pub fn with_progress<F>(mut self, hook: F) -> Self
    where
        F: Fn(usize, usize) + Send + Sync + 'static,
    {
        self.progress = Some(Arc::new(hook));
        self
    }

    pub fn tile_rows(&self) -> usize {
        self.tile_rows
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Return [`Error::Cancelled`] if cancellation was requested.
    pub fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            log::info!("Run cancelled");
            return Err(Error::Cancelled);
        }
        Ok(())
    }

    /// Forward progress to the hook, if any.
    pub fn report(&self, done: usize, total: usize) {
        if let Some(hook) = &self.progress {
            hook(done, total);
        }
    }

    /// Split `0..rows` into consecutive tiles of at most `tile_rows` rows.
    pub fn tiles(&self, rows: usize) -> impl Iterator<Item = Range<usize>> + use<> {
        let step = self.tile_rows;
        (0..rows)
            .step_by(step)
            .map(move |start| start..(start + step).min(rows))
    }

    /// Worker pool for this run.
    ///
    /// With `threads == 0` work runs on the global rayon pool; otherwise a
    /// dedicated pool of that size lives as long as the returned value.
    pub fn worker_pool(&self) -> Result<WorkerPool> {
        if self.threads == 0 {
            return Ok(WorkerPool(None));
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.threads)
            .build()?;
        log::debug!("Using a pool of {} worker threads", self.threads);
        Ok(WorkerPool(Some(pool)))
    }
}

/// Rayon pool selected by a [`RunContext`].
#[derive(Debug)]
pub struct WorkerPool(Option<rayon::ThreadPool>);

impl WorkerPool {
    /// Run `op` inside the pool so its parallel iterators use its workers.
    pub fn install<R, F>(&self, op: F) -> R
    where
        R: Send,
        F: FnOnce() -> R + Send,
    {
        match &self.0 {
            Some(pool) => pool.install(op),
            None => op(),
        }
    }

    /// Number of worker threads.
    pub fn current_num_threads(&self) -> usize {
        match &self.0 {
            Some(pool) => pool.current_num_threads(),
            None => rayon::current_num_threads(),
        }
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RunContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunContext")
            .field("tile_rows", &self.tile_rows)
            .field("threads", &self.threads)
            .field("cancelled", &self.cancel.is_cancelled())
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_tiles_cover_all_rows() {
        let ctx = RunContext::new().with_tile_rows(4);
        let tiles: Vec<_> = ctx.tiles(10).collect();
        assert_eq!(tiles, vec![0..4, 4..8, 8..10]);
        assert_eq!(ctx.tiles(0).count(), 0);
    }

    #[test]
    fn test_zero_tile_rows_is_clamped() {
        let ctx = RunContext::new().with_tile_rows(0);
        assert_eq!(ctx.tile_rows(), 1);
    }

    #[test]
    fn test_cancel_is_shared() {
        let token = CancelToken::new();
        let ctx = RunContext::new().with_cancel_token(token.clone());
        assert!(ctx.check_cancelled().is_ok());
        token.cancel();
        assert!(matches!(ctx.check_cancelled(), Err(Error::Cancelled)));
    }

    #[test]
    fn test_progress_hook() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let ctx = RunContext::new().with_progress(move |done, total| {
            sink.lock().unwrap().push((done, total));
        });
        ctx.report(1, 2);
        ctx.report(2, 2);
        assert_eq!(*seen.lock().unwrap(), vec![(1, 2), (2, 2)]);
    }

    #[test]
    fn test_dedicated_pool() {
        let pool = RunContext::new().with_threads(2).worker_pool().unwrap();
        assert_eq!(pool.current_num_threads(), 2);
        assert_eq!(pool.install(rayon::current_num_threads), 2);
    }
}
