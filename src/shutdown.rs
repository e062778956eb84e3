use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use fleet_core::{CancellationSignal, CancellationSource};
use tracing::{debug, info};

/// 优雅关闭管理器
///
/// 所有后台组件订阅同一个取消信号，`shutdown` 只会生效一次。
#[derive(Clone)]
pub struct ShutdownManager {
    source: Arc<CancellationSource>,
    is_shutdown: Arc<AtomicBool>,
}

impl ShutdownManager {
    pub fn new() -> Self {
        Self {
            source: Arc::new(CancellationSource::new()),
            is_shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// 订阅关闭信号，关闭之后订阅的信号立即处于已取消状态
    pub fn subscribe(&self) -> CancellationSignal {
        self.source.signal()
    }

    /// 触发关闭
    pub fn shutdown(&self) {
        if self.is_shutdown.swap(true, Ordering::SeqCst) {
            debug!("关闭管理器已经触发过关闭");
            return;
        }

        info!("触发系统关闭");
        self.source.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.is_shutdown.load(Ordering::SeqCst)
    }
}

impl Default for ShutdownManager {
    fn default() -> Self {
        Self::new()
    }
}
