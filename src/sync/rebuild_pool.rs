//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了异步缓存重建线程池。
//!
//! 固定数量的工作任务共享一个有界队列。队列满时拒绝提交；无论任务
//! 成功、失败、panic、被取消还是被拒绝，提交时附带的清理步骤（通常是
//! 释放重建锁）都会执行。

use crate::error::{CacheError, Result};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

struct RebuildJob {
    key: String,
    task: BoxFuture<'static, Result<()>>,
    cleanup: BoxFuture<'static, ()>,
    cancel: CancellationToken,
    finished: Arc<AtomicBool>,
    reply: oneshot::Sender<Result<()>>,
}

impl RebuildJob {
    /// 不执行任务，只做清理并回报取消
    async fn abandon(self) {
        run_cleanup(&self.key, self.cleanup).await;
        self.finished.store(true, Ordering::Release);
        let _ = self.reply.send(Err(CacheError::RebuildCancelled(self.key)));
    }
}

/// 已提交重建任务的句柄
///
/// 可用于等待任务结束、取消任务或查询是否完成
#[derive(Debug)]
pub struct RebuildHandle {
    key: String,
    cancel: CancellationToken,
    finished: Arc<AtomicBool>,
    rx: oneshot::Receiver<Result<()>>,
}

impl RebuildHandle {
    /// 重建的缓存键
    pub fn key(&self) -> &str {
        &self.key
    }

    /// 请求取消任务；清理步骤仍会执行
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// 任务（含清理）是否已经结束
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    /// 等待任务结束并返回其结果
    pub async fn wait(self) -> Result<()> {
        match self.rx.await {
            Ok(outcome) => outcome,
            Err(_) => Err(CacheError::RebuildCancelled(self.key)),
        }
    }
}

/// 线程池统计
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub submitted: u64,
    pub rejected: u64,
    pub succeeded: u64,
    pub failed: u64,
}

#[derive(Debug, Default)]
struct Counters {
    submitted: AtomicU64,
    rejected: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
}

/// 重建线程池
///
/// 由调用方显式创建并持有，生命周期结束前应调用 [`RebuildPool::shutdown`]
pub struct RebuildPool {
    tx: mpsc::Sender<RebuildJob>,
    rx: Arc<Mutex<mpsc::Receiver<RebuildJob>>>,
    capacity: usize,
    shutdown: CancellationToken,
    workers: Mutex<Vec<JoinHandle<()>>>,
    counters: Arc<Counters>,
}

impl std::fmt::Debug for RebuildPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RebuildPool")
            .field("capacity", &self.capacity)
            .field("closed", &self.shutdown.is_cancelled())
            .field("stats", &self.stats())
            .finish()
    }
}

impl RebuildPool {
    /// 创建线程池并启动工作任务
    ///
    /// 必须在 tokio 运行时内调用
    ///
    /// # 参数
    ///
    /// * `workers` - 工作任务数量（至少为1）
    /// * `queue_capacity` - 等待队列容量（至少为1）
    pub fn new(workers: usize, queue_capacity: usize) -> Self {
        let workers = workers.max(1);
        let capacity = queue_capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        let rx = Arc::new(Mutex::new(rx));
        let shutdown = CancellationToken::new();
        let counters = Arc::new(Counters::default());

        let handles = (0..workers)
            .map(|id| {
                let rx = rx.clone();
                let shutdown = shutdown.clone();
                let counters = counters.clone();
                tokio::spawn(async move { worker_loop(id, rx, shutdown, counters).await })
            })
            .collect();

        info!(
            "Rebuild pool started: workers={}, queue_capacity={}",
            workers, capacity
        );

        Self {
            tx,
            rx,
            capacity,
            shutdown,
            workers: Mutex::new(handles),
            counters,
        }
    }

    /// 队列容量
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 是否已关闭
    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// 统计快照
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            submitted: self.counters.submitted.load(Ordering::Relaxed),
            rejected: self.counters.rejected.load(Ordering::Relaxed),
            succeeded: self.counters.succeeded.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
        }
    }

    /// 提交重建任务
    ///
    /// 不等待任务执行。队列已满返回 `PoolSaturated`，线程池已关闭返回
    /// `PoolClosed`；这两种情况下 `cleanup` 会在返回前执行完毕。
    #[instrument(skip(self, task, cleanup), level = "debug")]
    pub async fn submit<T, C>(&self, key: &str, task: T, cleanup: C) -> Result<RebuildHandle>
    where
        T: Future<Output = Result<()>> + Send + 'static,
        C: Future<Output = ()> + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let finished = Arc::new(AtomicBool::new(false));
        let (reply, rx) = oneshot::channel();
        let job = RebuildJob {
            key: key.to_string(),
            task: task.boxed(),
            cleanup: cleanup.boxed(),
            cancel: cancel.clone(),
            finished: finished.clone(),
            reply,
        };

        if self.shutdown.is_cancelled() {
            run_cleanup(key, job.cleanup).await;
            return Err(CacheError::PoolClosed);
        }

        match self.tx.try_send(job) {
            Ok(()) => {
                self.counters.submitted.fetch_add(1, Ordering::Relaxed);
                debug!("Rebuild task queued: key={}", key);
                Ok(RebuildHandle {
                    key: key.to_string(),
                    cancel,
                    finished,
                    rx,
                })
            }
            Err(mpsc::error::TrySendError::Full(job)) => {
                self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                warn!(
                    "Rebuild pool saturated, rejecting task: key={}, capacity={}",
                    key, self.capacity
                );
                run_cleanup(key, job.cleanup).await;
                Err(CacheError::PoolSaturated {
                    capacity: self.capacity,
                })
            }
            Err(mpsc::error::TrySendError::Closed(job)) => {
                run_cleanup(key, job.cleanup).await;
                Err(CacheError::PoolClosed)
            }
        }
    }

    /// 关闭线程池
    ///
    /// 停止接收新任务，等待正在执行的任务正常结束（不会取消它们）；尚在
    /// 队列中的任务不再执行，只执行其清理步骤并以 `RebuildCancelled` 结束。
    pub async fn shutdown(&self) {
        if self.shutdown.is_cancelled() {
            return;
        }
        self.shutdown.cancel();

        let handles: Vec<JoinHandle<()>> = self.workers.lock().await.drain(..).collect();
        for handle in handles {
            if let Err(e) = handle.await {
                error!("Rebuild worker terminated abnormally: {}", e);
            }
        }

        let mut rx = self.rx.lock().await;
        rx.close();
        let mut abandoned = 0usize;
        while let Ok(job) = rx.try_recv() {
            job.abandon().await;
            abandoned += 1;
        }
        info!(
            "Rebuild pool shut down, {} queued task(s) abandoned",
            abandoned
        );
    }
}

async fn worker_loop(
    id: usize,
    rx: Arc<Mutex<mpsc::Receiver<RebuildJob>>>,
    shutdown: CancellationToken,
    counters: Arc<Counters>,
) {
    debug!("Rebuild worker {} started", id);
    loop {
        let next = tokio::select! {
            biased;
            _ = shutdown.cancelled() => None,
            job = async { rx.lock().await.recv().await } => job,
        };
        let Some(job) = next else {
            break;
        };

        let ok = run_job(job).await;
        if ok {
            counters.succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            counters.failed.fetch_add(1, Ordering::Relaxed);
        }
    }
    debug!("Rebuild worker {} stopped", id);
}

async fn run_job(job: RebuildJob) -> bool {
    let RebuildJob {
        key,
        task,
        cleanup,
        cancel,
        finished,
        reply,
    } = job;

    let outcome = tokio::select! {
        _ = cancel.cancelled() => Err(CacheError::RebuildCancelled(key.clone())),
        res = AssertUnwindSafe(task).catch_unwind() => match res {
            Ok(res) => res,
            Err(panic) => Err(CacheError::RebuildPanicked {
                key: key.clone(),
                message: panic_message(panic.as_ref()),
            }),
        },
    };

    run_cleanup(&key, cleanup).await;

    match &outcome {
        Ok(()) => debug!("Rebuild task finished: key={}", key),
        Err(e) => error!("Rebuild task failed: key={}, error={}", key, e),
    }

    let ok = outcome.is_ok();
    finished.store(true, Ordering::Release);
    let _ = reply.send(outcome);
    ok
}

async fn run_cleanup(key: &str, cleanup: BoxFuture<'static, ()>) {
    if let Err(panic) = AssertUnwindSafe(cleanup).catch_unwind().await {
        error!(
            "Rebuild cleanup panicked: key={}, error={}",
            key,
            panic_message(panic.as_ref())
        );
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
