//! 协作核心领域模型
//!
//! 包含成员关系、频道、消息、输入状态、在线状态、通知与审计日志等实体，
//! 以及它们自身的校验规则。

pub mod activity_log;
pub mod channel;
pub mod errors;
pub mod membership;
pub mod message;
pub mod notification;
pub mod presence;
pub mod typing;
pub mod value_objects;

// 重新导出常用类型
pub use activity_log::*;
pub use channel::*;
pub use errors::*;
pub use membership::*;
pub use message::*;
pub use notification::*;
pub use presence::*;
pub use typing::*;
pub use value_objects::*;
