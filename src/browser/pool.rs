//! 浏览器会话池
//!
//! 容量由信号量限制，空闲会话放在互斥锁保护的列表里复用。
//! 新会话在锁外创建，避免启动浏览器时阻塞其他线程归还会话。

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};

use crate::browser::session::BrowserSession;
use crate::error::{AppResult, BrowserError};

/// 会话工厂
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn create(&self) -> AppResult<Box<dyn BrowserSession>>;
}

/// 从池中借出的会话
///
/// 调用 [`BrowserPool::release`] 归还。未归还就被丢弃的会话不会回到池里
/// （例如所在任务被中止），其状态未知，直接销毁，名额照常释放。
pub struct PooledSession {
    session: Box<dyn BrowserSession>,
    _permit: OwnedSemaphorePermit,
}

impl Deref for PooledSession {
    type Target = dyn BrowserSession;

    fn deref(&self) -> &Self::Target {
        self.session.as_ref()
    }
}

impl DerefMut for PooledSession {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.session.as_mut()
    }
}

/// 浏览器会话池
pub struct BrowserPool {
    factory: Arc<dyn SessionFactory>,
    permits: Arc<Semaphore>,
    idle: Mutex<Vec<Box<dyn BrowserSession>>>,
    closed: AtomicBool,
    created: AtomicUsize,
    capacity: usize,
    acquire_timeout: Duration,
}

impl BrowserPool {
    /// 创建会话池
    ///
    /// # 参数
    /// - `factory`: 创建新会话的工厂
    /// - `capacity`: 同时借出的会话上限
    /// - `acquire_timeout`: 等待空闲名额的最长时间
    pub fn new(factory: Arc<dyn SessionFactory>, capacity: usize, acquire_timeout: Duration) -> Self {
        let capacity = capacity.max(1);
        Self {
            factory,
            permits: Arc::new(Semaphore::new(capacity)),
            idle: Mutex::new(Vec::with_capacity(capacity)),
            closed: AtomicBool::new(false),
            created: AtomicUsize::new(0),
            capacity,
            acquire_timeout,
        }
    }

    fn idle_list(&self) -> MutexGuard<'_, Vec<Box<dyn BrowserSession>>> {
        // 持锁期间不会 panic，中毒时数据依然可用
        self.idle.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// 借出一个会话，优先复用空闲会话
    pub async fn acquire(&self) -> AppResult<PooledSession> {
        if self.is_closed() {
            return Err(BrowserError::PoolClosed.into());
        }

        let permit = match tokio::time::timeout(self.acquire_timeout, self.permits.clone().acquire_owned()).await {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => return Err(BrowserError::PoolClosed.into()),
            Err(_) => {
                warn!("等待浏览器会话超时 ({:?})", self.acquire_timeout);
                return Err(BrowserError::PoolExhausted {
                    waited: self.acquire_timeout,
                }
                .into());
            }
        };

        let reused = self.idle_list().pop();
        let session = match reused {
            Some(session) => {
                debug!("复用空闲浏览器会话");
                session
            }
            None => {
                let session = self.factory.create().await?;
                let total = self.created.fetch_add(1, Ordering::SeqCst) + 1;
                info!("🌐 新建浏览器会话 (累计 {} 个)", total);
                session
            }
        };

        Ok(PooledSession {
            session,
            _permit: permit,
        })
    }

    /// 归还会话
    ///
    /// 池已关闭时直接关闭该会话
    pub async fn release(&self, session: PooledSession) {
        let PooledSession { session, _permit } = session;

        // 关闭标志与空闲列表在同一把锁下检查，shutdown 取走列表之后不会再有会话放回
        let rejected = {
            let mut idle = self.idle_list();
            if self.is_closed() {
                Some(session)
            } else {
                idle.push(session);
                None
            }
        };

        if let Some(mut session) = rejected {
            if let Err(e) = session.close().await {
                warn!("关闭浏览器会话失败: {}", e);
            }
        }
        // _permit 在此之后释放，下一个等待者一定能看到刚归还的会话
    }

    /// 关闭会话池：拒绝新的借出，并关闭所有空闲会话
    pub async fn shutdown(&self) {
        let drained: Vec<Box<dyn BrowserSession>> = {
            let mut idle = self.idle_list();
            if self.closed.swap(true, Ordering::SeqCst) {
                return;
            }
            std::mem::take(&mut *idle)
        };
        self.permits.close();

        let count = drained.len();
        for mut session in drained {
            if let Err(e) = session.close().await {
                warn!("关闭浏览器会话失败: {}", e);
            }
        }
        info!("浏览器会话池已关闭，释放 {} 个空闲会话", count);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn idle_count(&self) -> usize {
        self.idle_list().len()
    }

    /// 当前借出的会话数
    pub fn in_use(&self) -> usize {
        if self.is_closed() {
            return 0;
        }
        self.capacity - self.permits.available_permits()
    }

    /// 累计创建过的会话数
    pub fn created_count(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::matcher::Matcher;
    use crate::browser::session::{Control, PageCondition};
    use crate::error::AppError;

    struct NullSession {
        closed: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl BrowserSession for NullSession {
        async fn navigate(&self, _url: &str) -> AppResult<()> {
            Ok(())
        }
        async fn find(&self, _matcher: &Matcher) -> AppResult<Option<Control>> {
            Ok(None)
        }
        async fn set_value(&self, _control: &Control, _value: &str) -> AppResult<()> {
            Ok(())
        }
        async fn select_option(&self, _control: &Control, _index: usize) -> AppResult<()> {
            Ok(())
        }
        async fn click(&self, _control: &Control) -> AppResult<()> {
            Ok(())
        }
        async fn submit_form(&self) -> AppResult<()> {
            Ok(())
        }
        async fn submit_via_script(&self) -> AppResult<()> {
            Ok(())
        }
        async fn press_enter(&self, _control: &Control) -> AppResult<()> {
            Ok(())
        }
        async fn check(&self, _condition: PageCondition) -> AppResult<bool> {
            Ok(false)
        }
        async fn page_source(&self) -> AppResult<String> {
            Ok(String::new())
        }
        async fn close(&mut self) -> AppResult<()> {
            self.closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[derive(Default)]
    struct CountingFactory {
        closed: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl SessionFactory for CountingFactory {
        async fn create(&self) -> AppResult<Box<dyn BrowserSession>> {
            Ok(Box::new(NullSession {
                closed: self.closed.clone(),
            }))
        }
    }

    fn pool(capacity: usize, timeout_ms: u64) -> (BrowserPool, Arc<AtomicUsize>) {
        let factory = CountingFactory::default();
        let closed = factory.closed.clone();
        (
            BrowserPool::new(Arc::new(factory), capacity, Duration::from_millis(timeout_ms)),
            closed,
        )
    }

    #[tokio::test]
    async fn test_released_session_is_reused() {
        let (pool, _) = pool(2, 100);
        let first = pool.acquire().await.unwrap();
        assert_eq!(pool.in_use(), 1);
        pool.release(first).await;
        assert_eq!(pool.idle_count(), 1);

        let second = pool.acquire().await.unwrap();
        assert_eq!(pool.created_count(), 1);
        pool.release(second).await;
    }

    #[tokio::test]
    async fn test_acquire_times_out_when_exhausted() {
        let (pool, _) = pool(1, 50);
        let held = pool.acquire().await.unwrap();
        let err = pool.acquire().await.err().unwrap();
        assert!(matches!(err, AppError::Browser(BrowserError::PoolExhausted { .. })));
        pool.release(held).await;
    }

    #[tokio::test]
    async fn test_dropped_session_frees_slot_without_returning() {
        let (pool, _) = pool(1, 50);
        let held = pool.acquire().await.unwrap();
        drop(held);
        assert_eq!(pool.idle_count(), 0);
        let again = pool.acquire().await.unwrap();
        assert_eq!(pool.created_count(), 2);
        pool.release(again).await;
    }

    #[tokio::test]
    async fn test_shutdown_closes_idle_and_rejects_acquire() {
        let (pool, closed) = pool(2, 50);
        let a = pool.acquire().await.unwrap();
        let b = pool.acquire().await.unwrap();
        pool.release(a).await;

        pool.shutdown().await;
        assert_eq!(closed.load(Ordering::SeqCst), 1);
        assert!(matches!(
            pool.acquire().await,
            Err(AppError::Browser(BrowserError::PoolClosed))
        ));

        // 关闭后归还的会话直接关闭
        pool.release(b).await;
        assert_eq!(closed.load(Ordering::SeqCst), 2);
        assert_eq!(pool.idle_count(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_release_racing_shutdown_never_leaks_session() {
        for _ in 0..50 {
            let (shared, closed) = pool(4, 100);
            let shared = Arc::new(shared);
            let mut held = Vec::new();
            for _ in 0..4 {
                held.push(shared.acquire().await.unwrap());
            }

            let mut handles = Vec::new();
            for session in held {
                let pool = shared.clone();
                handles.push(tokio::spawn(async move { pool.release(session).await }));
            }
            let closer = {
                let pool = shared.clone();
                tokio::spawn(async move { pool.shutdown().await })
            };
            for handle in handles {
                handle.await.unwrap();
            }
            closer.await.unwrap();

            assert_eq!(shared.idle_count(), 0);
            assert_eq!(closed.load(Ordering::SeqCst), 4);
        }
    }
}
