//! The execution context shared by every pipeline stage.
//!
//! A `Session` owns the worker pool that per-record work runs on.
//! It is created once, passed by reference to each stage, and released when
//! it is dropped (or explicitly via `stop()`), so early returns release it too.

use log::{debug, info};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::error::Result;

pub const DEFAULT_APP_NAME: &str = "PneumoniaImageProcessing";

pub struct Session
{
    app_name: String,
    pool: ThreadPool,
}

pub struct SessionBuilder
{
    app_name: String,
    /// 0 means one thread per logical core.
    num_threads: usize,
}

impl SessionBuilder
{
    pub fn app_name(mut self, app_name: &str) -> Self
    {
        self.app_name = app_name.to_string();
        self
    }

    pub fn num_threads(mut self, num_threads: usize) -> Self
    {
        self.num_threads = num_threads;
        self
    }

    pub fn build(self) -> Result<Session>
    {
        let thread_prefix = self.app_name.clone();
        let pool = ThreadPoolBuilder::new()
            .num_threads(self.num_threads)
            .thread_name(move |i| format!("{}-worker-{}", thread_prefix, i))
            .build()?;

        info!("Session {:?} started with {} worker threads", self.app_name, pool.current_num_threads());

        Ok(Session { app_name: self.app_name, pool })
    }
}

impl Session
{
    pub fn builder() -> SessionBuilder
    {
        SessionBuilder
        {
            app_name: DEFAULT_APP_NAME.to_string(),
            num_threads: 0,
        }
    }

    pub fn app_name(&self) -> &str
    {
        &self.app_name
    }

    pub fn num_threads(&self) -> usize
    {
        self.pool.current_num_threads()
    }

    /// Applies `f` to every item on the session's pool.
    /// Output order matches input order.
    pub fn map<T, U, F>(&self, items: Vec<T>, f: F) -> Vec<U>
    where
        T: Send,
        U: Send,
        F: Fn(T) -> U + Sync + Send,
    {
        self.pool.install(|| items.into_par_iter().map(f).collect())
    }

    /// Like `map`, but stops at the first error.
    pub fn try_map<T, U, F>(&self, items: Vec<T>, f: F) -> Result<Vec<U>>
    where
        T: Send,
        U: Send,
        F: Fn(T) -> Result<U> + Sync + Send,
    {
        self.pool.install(|| items.into_par_iter().map(f).collect())
    }

    /// Runs `op` inside the session's pool, so any rayon work it does uses the session's threads.
    pub fn install<R, OP>(&self, op: OP) -> R
    where
        R: Send,
        OP: FnOnce() -> R + Send,
    {
        self.pool.install(op)
    }

    pub fn stop(self)
    {
        debug!("Stopping session {:?}", self.app_name);
    }
}

impl Drop for Session
{
    fn drop(&mut self)
    {
        info!("Session {:?} stopped", self.app_name);
    }
}
