// ==========================================
// 车间管理系统 - 列映射建议
// ==========================================
// 职责: 规则分类器 + 可选外部建议服务的混合分析
// 红线: 全量数据绝不送出，外部协作方只见表头与样本行；
//       外部调用失败/超时不静默降级，向上抛错由会话处置
// ==========================================

use crate::config::ImportConfigReader;
use crate::domain::import::{ColumnMapping, Row};
use crate::domain::schema::DomainSchema;
use crate::domain::types::ImportDomain;
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::error::{ImportError, ImportResult};

// ==========================================
// 分类规则表
// ==========================================
/// 任何导入域都应跳过的列（标识/审计列）
const UNIVERSAL_SKIP_PATTERNS: &[&str] = &[
    r"^(id|uuid|guid|pk|primary_?key)$",
    r"^(row_?num(ber)?|row_?id|index|seq(uence)?|line_?num(ber)?)$",
    r"^(created|updated|modified|deleted|imported)_?(at|on|date|time|by)?$",
    r"^(timestamp|date_?created|date_?modified|last_?modified)$",
    r"^(status|active|enabled|is_?active|is_?deleted)$",
];

/// 命中即无法本地判断、需交外部建议服务的表头特征
const UNCERTAIN_INDICATORS: &[&str] = &[
    "custom", "field", "attr", "attribute", "misc", "other", "extra", "user_defined", "udf",
    "flex", "spare",
];

/// 表头归一化: 小写，空白/横线折叠为下划线
pub fn normalize_header(header: &str) -> String {
    let mut normalized = String::with_capacity(header.len());
    let mut last_was_sep = true;
    for c in header.trim().chars() {
        if c.is_whitespace() || c == '-' || c == '_' {
            if !last_was_sep {
                normalized.push('_');
                last_was_sep = true;
            }
        } else {
            for lower in c.to_lowercase() {
                normalized.push(lower);
            }
            last_was_sep = false;
        }
    }
    normalized.trim_end_matches('_').to_string()
}

// ==========================================
// 外部建议服务接口
// ==========================================
/// 送交外部建议服务的请求（仅含规则无法判定的列）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestionRequest {
    pub domain: ImportDomain,
    pub headers: Vec<String>,
    /// 请求列的样本值（行 x 列，与 headers 对齐）
    pub sample_rows: Vec<Vec<String>>,
}

/// 混合分析的完整输出
#[derive(Debug, Clone, Serialize)]
pub struct SuggestionResponse {
    /// 与原始表头顺序对齐的映射建议
    pub mappings: Vec<ColumnMapping>,
    pub unmapped_required: Vec<String>,
    pub discarded_columns: Vec<String>,
}

// 用途: 规则无法判定的列交由外部服务给出映射建议
// 实现者: 生产环境对接远端服务; 测试用 Mock
#[async_trait]
pub trait MappingSuggester: Send + Sync {
    async fn suggest(&self, request: SuggestionRequest) -> ImportResult<Vec<ColumnMapping>>;
}

// ==========================================
// 规则分类器
// ==========================================
enum Classification {
    Resolved(ColumnMapping),
    NeedsExternal,
}

fn skip_mapping(source_column: &str, confidence: f64, rationale: &str) -> ColumnMapping {
    ColumnMapping {
        source_column: source_column.to_string(),
        target_field: None,
        confidence,
        rationale: rationale.to_string(),
        needs_review: false,
        is_manual: false,
    }
}

/// 全部静态模式串的预编译缓存（通用跳过 + 各域 Schema 模式）
static COMPILED_PATTERNS: LazyLock<HashMap<&'static str, Regex>> = LazyLock::new(|| {
    let mut compiled = HashMap::new();
    let mut absorb = |patterns: &'static [&'static str]| {
        for pattern in patterns {
            if let Ok(re) = Regex::new(pattern) {
                compiled.insert(*pattern, re);
            }
        }
    };

    absorb(UNIVERSAL_SKIP_PATTERNS);
    for domain in [
        ImportDomain::Customers,
        ImportDomain::Parts,
        ImportDomain::Inventory,
    ] {
        for field in DomainSchema::for_domain(domain).fields {
            absorb(field.patterns);
        }
    }
    compiled
});

fn matches_any(patterns: &[&str], normalized: &str) -> bool {
    patterns.iter().any(|pattern| {
        COMPILED_PATTERNS
            .get(*pattern)
            .map(|re| re.is_match(normalized))
            .unwrap_or(false)
    })
}

/// 对单列运行规则分类
///
/// 判定顺序: 审计列跳过 -> Schema 模式命中 -> 空列/常量列跳过
/// -> 不确定特征/领域提示交外部 -> 默认跳过
fn classify_column(
    schema: &DomainSchema,
    header: &str,
    samples: &[&str],
) -> Classification {
    let normalized = normalize_header(header);

    if matches_any(UNIVERSAL_SKIP_PATTERNS, &normalized) {
        return Classification::Resolved(skip_mapping(
            header,
            0.95,
            "identity or audit column, not importable data",
        ));
    }

    for field in schema.fields {
        if field.disabled {
            continue;
        }
        if matches_any(field.patterns, &normalized) {
            return Classification::Resolved(ColumnMapping {
                source_column: header.to_string(),
                target_field: Some(field.key.to_string()),
                confidence: 0.95,
                rationale: format!("header matches known pattern for {}", field.label),
                needs_review: false,
                is_manual: false,
            });
        }
    }

    let non_empty: Vec<&str> = samples
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();
    if non_empty.is_empty() {
        return Classification::Resolved(skip_mapping(
            header,
            0.8,
            "column has no sample values",
        ));
    }
    // 样本不足 3 条不足以认定常量列
    if non_empty.len() >= 3 && non_empty.iter().all(|v| *v == non_empty[0]) {
        return Classification::Resolved(skip_mapping(
            header,
            0.7,
            "column holds a single constant value",
        ));
    }

    if UNCERTAIN_INDICATORS.iter().any(|ind| normalized.contains(ind)) {
        return Classification::NeedsExternal;
    }
    if schema
        .domain_hints
        .iter()
        .any(|hint| normalized.contains(&normalize_header(hint)))
    {
        return Classification::NeedsExternal;
    }

    Classification::Resolved(skip_mapping(
        header,
        0.6,
        "no recognized pattern for this column",
    ))
}

// ==========================================
// HybridAnalyzer
// ==========================================
/// 混合映射分析器
///
/// 规则分类器先行；仅规则无法判定的列（且在列数上限内）
/// 交给外部建议服务。未配置外部服务时，这些列降级为待复核丢弃。
#[derive(Clone)]
pub struct HybridAnalyzer {
    external: Option<Arc<dyn MappingSuggester>>,
}

impl HybridAnalyzer {
    pub fn new(external: Option<Arc<dyn MappingSuggester>>) -> Self {
        Self { external }
    }

    pub fn rules_only() -> Self {
        Self { external: None }
    }

    /// 分析表头与样本行，产出完整建议集
    ///
    /// # 参数
    /// - sample_rows: 已截取的样本行（调用方负责截到 sample_row_count）
    ///
    /// # 返回
    /// - Err(SuggestionFailed / SuggestionTimeout): 外部服务失败，调用方决定重试
    pub async fn analyze(
        &self,
        domain: ImportDomain,
        headers: &[String],
        sample_rows: &[Row],
        config: &dyn ImportConfigReader,
    ) -> ImportResult<SuggestionResponse> {
        let schema = DomainSchema::for_domain(domain);
        let max_columns = config.get_max_suggest_columns().await?;
        let timeout_ms = config.get_collaborator_timeout_ms().await?;

        // 每列样本值（与表头对齐）
        let column_samples: Vec<Vec<&str>> = (0..headers.len())
            .map(|i| {
                sample_rows
                    .iter()
                    .map(|row| row.cells.get(i).map(|c| c.as_str()).unwrap_or(""))
                    .collect()
            })
            .collect();

        let mut resolved: Vec<Option<ColumnMapping>> = vec![None; headers.len()];
        let mut uncertain: Vec<usize> = Vec::new();

        // 列数上限只对非空列计数: 空列先行剔除，不占分析预算
        let mut non_empty_seen = 0usize;
        for (i, header) in headers.iter().enumerate() {
            let is_empty = column_samples[i].iter().all(|s| s.trim().is_empty());
            if !is_empty {
                if non_empty_seen >= max_columns {
                    resolved[i] = Some(skip_mapping(
                        header,
                        0.6,
                        "beyond analyzable column limit",
                    ));
                    continue;
                }
                non_empty_seen += 1;
            }
            match classify_column(schema, header, &column_samples[i]) {
                Classification::Resolved(mapping) => resolved[i] = Some(mapping),
                Classification::NeedsExternal => uncertain.push(i),
            }
        }

        if !uncertain.is_empty() {
            match &self.external {
                Some(external) => {
                    let answers = self
                        .ask_external(
                            external.as_ref(),
                            domain,
                            headers,
                            sample_rows,
                            &uncertain,
                            timeout_ms,
                        )
                        .await?;
                    for (i, mapping) in answers {
                        resolved[i] = Some(mapping);
                    }
                }
                None => {
                    debug!(count = uncertain.len(), "无外部建议服务, 不确定列降级为待复核");
                    for &i in &uncertain {
                        let mut mapping =
                            skip_mapping(&headers[i], 0.0, "could not classify, needs manual review");
                        mapping.needs_review = true;
                        resolved[i] = Some(mapping);
                    }
                }
            }
        }

        let mappings: Vec<ColumnMapping> = resolved
            .into_iter()
            .enumerate()
            .map(|(i, m)| m.unwrap_or_else(|| skip_mapping(&headers[i], 0.0, "unclassified")))
            .collect();

        let unmapped_required = schema
            .required_fields()
            .into_iter()
            .filter(|field| {
                !mappings
                    .iter()
                    .any(|m| m.target_field.as_deref() == Some(field))
            })
            .map(|f| f.to_string())
            .collect();
        let discarded_columns = mappings
            .iter()
            .filter(|m| m.target_field.is_none())
            .map(|m| m.source_column.clone())
            .collect();

        info!(
            domain = %domain,
            columns = headers.len(),
            mapped = mappings.iter().filter(|m| m.target_field.is_some()).count(),
            "列映射分析完成"
        );

        Ok(SuggestionResponse {
            mappings,
            unmapped_required,
            discarded_columns,
        })
    }

    /// 将不确定列投影后送外部建议服务（带超时）
    async fn ask_external(
        &self,
        external: &dyn MappingSuggester,
        domain: ImportDomain,
        headers: &[String],
        sample_rows: &[Row],
        uncertain: &[usize],
        timeout_ms: u64,
    ) -> ImportResult<Vec<(usize, ColumnMapping)>> {
        let request = SuggestionRequest {
            domain,
            headers: uncertain.iter().map(|&i| headers[i].clone()).collect(),
            sample_rows: sample_rows
                .iter()
                .map(|row| {
                    uncertain
                        .iter()
                        .map(|&i| row.cells.get(i).cloned().unwrap_or_default())
                        .collect()
                })
                .collect(),
        };

        let suggested = tokio::time::timeout(
            Duration::from_millis(timeout_ms),
            external.suggest(request),
        )
        .await
        .map_err(|_| ImportError::SuggestionTimeout)??;

        let mut answers = Vec::with_capacity(uncertain.len());
        for &i in uncertain {
            let answer = suggested
                .iter()
                .find(|m| m.source_column == headers[i])
                .cloned();
            match answer {
                Some(mapping) => answers.push((i, mapping)),
                None => {
                    warn!(column = %headers[i], "外部建议未覆盖该列, 降级为待复核");
                    let mut mapping =
                        skip_mapping(&headers[i], 0.0, "no suggestion returned, needs manual review");
                    mapping.needs_review = true;
                    answers.push((i, mapping));
                }
            }
        }
        Ok(answers)
    }
}
