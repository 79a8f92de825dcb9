// ==========================================
// 车间管理系统 - 导入配置读取 Trait
// ==========================================
// 职责: 定义导入管道所需的配置读取接口与默认实现
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use async_trait::async_trait;
use std::error::Error;

/// 配置读取错误（对上层不透明，由调用方折叠进各自错误类型）
pub type ConfigError = Box<dyn Error + Send + Sync>;

// ==========================================
// ImportConfigReader Trait
// ==========================================
// 用途: 导入管道所需的配置读取接口
// 实现者: DefaultImportConfig（进程内常量）
#[async_trait]
pub trait ImportConfigReader: Send + Sync {
    /// 获取落库分块大小
    ///
    /// # 默认值
    /// - 500
    async fn get_chunk_size(&self) -> Result<usize, ConfigError>;

    /// 获取映射建议的人工复核置信度阈值
    ///
    /// 置信度低于该值且有目标字段的映射标记 needs_review
    ///
    /// # 默认值
    /// - 0.7
    async fn get_needs_review_threshold(&self) -> Result<f64, ConfigError>;

    /// 获取送交建议服务的样本行数
    ///
    /// 全量数据绝不送出，只送表头 + 前 N 行
    ///
    /// # 默认值
    /// - 5
    async fn get_sample_row_count(&self) -> Result<usize, ConfigError>;

    /// 获取送交建议服务的最大列数（超限列自动丢弃）
    ///
    /// # 默认值
    /// - 30
    async fn get_max_suggest_columns(&self) -> Result<usize, ConfigError>;

    /// 获取外部协作方（建议服务/存量查询）调用超时（毫秒）
    ///
    /// # 默认值
    /// - 10_000
    async fn get_collaborator_timeout_ms(&self) -> Result<u64, ConfigError>;

    /// 存量查询失败后是否允许单次重试
    ///
    /// 查询幂等可重试；落库插入不幂等，永不自动重试
    ///
    /// # 默认值
    /// - true
    async fn get_lookup_retry_enabled(&self) -> Result<bool, ConfigError>;
}

// ==========================================
// DefaultImportConfig - 进程内默认配置
// ==========================================
#[derive(Debug, Clone)]
pub struct DefaultImportConfig {
    pub chunk_size: usize,
    pub needs_review_threshold: f64,
    pub sample_row_count: usize,
    pub max_suggest_columns: usize,
    pub collaborator_timeout_ms: u64,
    pub lookup_retry_enabled: bool,
}

impl Default for DefaultImportConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            needs_review_threshold: 0.7,
            sample_row_count: 5,
            max_suggest_columns: 30,
            collaborator_timeout_ms: 10_000,
            lookup_retry_enabled: true,
        }
    }
}

#[async_trait]
impl ImportConfigReader for DefaultImportConfig {
    async fn get_chunk_size(&self) -> Result<usize, ConfigError> {
        Ok(self.chunk_size)
    }

    async fn get_needs_review_threshold(&self) -> Result<f64, ConfigError> {
        Ok(self.needs_review_threshold)
    }

    async fn get_sample_row_count(&self) -> Result<usize, ConfigError> {
        Ok(self.sample_row_count)
    }

    async fn get_max_suggest_columns(&self) -> Result<usize, ConfigError> {
        Ok(self.max_suggest_columns)
    }

    async fn get_collaborator_timeout_ms(&self) -> Result<u64, ConfigError> {
        Ok(self.collaborator_timeout_ms)
    }

    async fn get_lookup_retry_enabled(&self) -> Result<bool, ConfigError> {
        Ok(self.lookup_retry_enabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_default_values() {
        let config = DefaultImportConfig::default();
        assert_eq!(config.get_chunk_size().await.unwrap(), 500);
        assert_eq!(config.get_sample_row_count().await.unwrap(), 5);
        assert!((config.get_needs_review_threshold().await.unwrap() - 0.7).abs() < f64::EPSILON);
    }
}
