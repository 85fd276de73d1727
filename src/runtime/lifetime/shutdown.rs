//! 停机协调
//!
//! 一个信号源，多个等待方（HTTP server、click consumer）。

use std::future::Future;

use tokio::sync::watch;

#[derive(Clone)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

impl Default for ShutdownTrigger {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownTrigger {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// 触发后完成；在触发之后才调用也会立即完成
    pub fn wait(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut rx = self.tx.subscribe();
        async move {
            // 所有 trigger 都被丢弃时 wait_for 返回错误，同样视为停机
            let _ = rx.wait_for(|stopped| *stopped).await;
        }
    }
}
