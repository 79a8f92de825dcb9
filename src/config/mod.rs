// ==========================================
// 车间管理系统 - 配置层
// ==========================================
// 职责: 导入管道参数配置
// 说明: 导入会话不落库，配置保持进程内
// ==========================================

pub mod import_config;

// 重导出核心配置类型
pub use import_config::{ConfigError, DefaultImportConfig, ImportConfigReader};
