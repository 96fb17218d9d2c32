//! 输入状态服务
//!
//! 输入状态没有显式过期：读取时按时间窗口过滤，后台清理只是回收空间。

use std::sync::Arc;

use chrono::Duration;
use domain::{ChannelId, ChannelType, OrgId, RoleRequirement, TypingIndicator, TypingKey};

use crate::{
    access::{AccessGate, Caller},
    clock::Clock,
    error::ApplicationError,
    repository::TypingIndicatorRepository,
};

pub const DEFAULT_TYPING_WINDOW_SECS: i64 = 8;

pub struct TypingServiceDependencies {
    pub gate: Arc<AccessGate>,
    pub repository: Arc<dyn TypingIndicatorRepository>,
    pub clock: Arc<dyn Clock>,
    /// 超过该时长未刷新的状态视为已停止输入
    pub window: Duration,
}

pub struct TypingService {
    deps: TypingServiceDependencies,
}

impl TypingService {
    pub fn new(deps: TypingServiceDependencies) -> Self {
        Self { deps }
    }

    pub fn window(&self) -> Duration {
        self.deps.window
    }

    pub async fn set_typing(
        &self,
        caller: Caller,
        channel_id: ChannelId,
        channel_type: ChannelType,
        organization_id: OrgId,
        is_typing: bool,
    ) -> Result<(), ApplicationError> {
        let membership = self
            .deps
            .gate
            .authorize(caller, organization_id, RoleRequirement::Any)
            .await?;
        let key = TypingKey {
            channel_id,
            channel_type,
            user_id: membership.user_id,
        };

        if is_typing {
            let indicator = TypingIndicator::new(key, organization_id, self.deps.clock.now());
            self.deps.repository.upsert(indicator).await?;
            return Ok(());
        }

        // 清除失败不影响调用方，过期过滤会兜底
        if let Err(err) = self.deps.repository.remove(key).await {
            tracing::warn!(
                user_id = %key.user_id,
                channel_id = %channel_id,
                channel_type = %channel_type,
                error = %err,
                "清除输入状态失败"
            );
        }
        Ok(())
    }

    /// 时间窗口内仍在输入的用户；`exclude_self` 时去掉调用者本人
    pub async fn list_active_typers(
        &self,
        caller: Caller,
        channel_id: ChannelId,
        channel_type: ChannelType,
        organization_id: OrgId,
        exclude_self: bool,
    ) -> Result<Vec<TypingIndicator>, ApplicationError> {
        let membership = self
            .deps
            .gate
            .authorize(caller, organization_id, RoleRequirement::Any)
            .await?;
        let as_of = self.deps.clock.now();

        let rows = self
            .deps
            .repository
            .list_since(channel_id, channel_type, as_of - self.deps.window)
            .await?;
        Ok(rows
            .into_iter()
            .filter(|row| row.is_active(as_of, self.deps.window))
            .filter(|row| !(exclude_self && row.user_id == membership.user_id))
            .collect())
    }

    /// 删除早于时间窗口的记录，返回删除条数
    pub async fn sweep_stale(&self) -> Result<u64, ApplicationError> {
        let cutoff = self.deps.clock.now() - self.deps.window;
        Ok(self.deps.repository.remove_older_than(cutoff).await?)
    }
}
