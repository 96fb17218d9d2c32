//! 后台清理过期的输入状态
//!
//! 读取路径已经按时间窗口过滤，清理任务只负责回收存储空间。

use std::{sync::Arc, time::Duration};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::services::TypingService;

pub fn spawn_typing_sweeper(
    service: Arc<TypingService>,
    interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("输入状态清理任务已停止");
                    break;
                }
                _ = ticker.tick() => {
                    match service.sweep_stale().await {
                        Ok(0) => {}
                        Ok(removed) => tracing::debug!(removed, "已清理过期输入状态"),
                        Err(err) => tracing::warn!(error = %err, "清理输入状态失败"),
                    }
                }
            }
        }
    })
}
