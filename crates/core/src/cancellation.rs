//! 协作式取消信号
//!
//! 后台触发器和状态更新批次共享同一个信号：触发器在等待下一次执行时监听变化，
//! 批次在处理每条提醒之间以及提交之前检查是否已取消。

use tokio::sync::watch;

/// 取消信号的接收端
#[derive(Debug, Clone)]
pub struct CancellationSignal {
    rx: watch::Receiver<bool>,
}

/// 取消信号的发送端
#[derive(Debug)]
pub struct CancellationSource {
    tx: watch::Sender<bool>,
}

impl CancellationSource {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    pub fn signal(&self) -> CancellationSignal {
        CancellationSignal {
            rx: self.tx.subscribe(),
        }
    }

    pub fn cancel(&self) {
        // 没有订阅者时send_replace依然会更新值
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Default for CancellationSource {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationSignal {
    /// 永远不会被取消的信号
    pub fn never() -> Self {
        let (tx, rx) = watch::channel(false);
        // 发送端被丢弃后 changed() 返回错误，cancelled() 会一直挂起
        drop(tx);
        Self { rx }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// 等待取消发生
    pub async fn cancelled(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}
