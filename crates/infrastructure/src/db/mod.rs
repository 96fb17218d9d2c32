//! PostgreSQL 仓储实现

pub mod repositories;
