// ==========================================
// 车间管理系统 - 导入领域基础类型
// ==========================================
// 职责: 枚举类型定义（导入域/冲突类型/校验类型）
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// ImportDomain - 导入域
// ==========================================
/// 导入域: 每个域对应一张业务表和一套静态字段 Schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportDomain {
    /// 客户档案
    Customers,
    /// 零件档案
    Parts,
    /// 库存资源档案
    Inventory,
}

impl ImportDomain {
    /// 对应的业务表名
    pub fn table_name(&self) -> &'static str {
        match self {
            ImportDomain::Customers => "customers",
            ImportDomain::Parts => "parts",
            ImportDomain::Inventory => "inventory",
        }
    }

    /// 从字符串解析（用于 CLI / API 入参）
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "customers" => Some(ImportDomain::Customers),
            "parts" => Some(ImportDomain::Parts),
            "inventory" => Some(ImportDomain::Inventory),
            _ => None,
        }
    }
}

impl fmt::Display for ImportDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

// ==========================================
// ConflictKind - 冲突类型
// ==========================================
/// 冲突类型
///
/// - CsvDuplicate: 同批次内自然键重复
/// - StoreDuplicate: 与已落库记录的自然键重复
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    CsvDuplicate,
    StoreDuplicate,
}

// ==========================================
// ValidationKind - 校验错误类型
// ==========================================
/// 行级校验错误类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationKind {
    /// 必填字段缺失或为空
    MissingRequiredField,
}
