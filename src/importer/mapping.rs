// ==========================================
// 车间管理系统 - 列映射模型
// ==========================================
// 职责: 维护源列到目标字段的认领关系，支撑人工改派与行投影
// 红线: 任一时刻一个目标字段至多被一个源列认领；
//       改派必须作为单个原子动作完成，禁止"先清后设"两步写
// ==========================================

use crate::domain::import::{ColumnMapping, MappedRecord, MappingSummary, ReassignmentRequest, Row};
use crate::domain::schema::DomainSchema;
use crate::domain::types::ImportDomain;
use tracing::{debug, warn};

use super::error::{ImportError, ImportResult};

/// 人工选择映射时写入的理由
const MANUAL_RATIONALE: &str = "manually selected by user";

// ==========================================
// MappingSlot / SetMappingOutcome
// ==========================================
/// 一个源列的映射槽位（绑定解析文档中的列下标）
#[derive(Debug, Clone)]
pub struct MappingSlot {
    /// 该列在表头/单元格数组中的下标
    pub column_index: usize,
    pub mapping: ColumnMapping,
}

/// set_mapping 的结果
#[derive(Debug, Clone)]
pub enum SetMappingOutcome {
    /// 映射已直接生效
    Applied,
    /// 目标字段已被其他列认领，需人工确认改派
    ReassignmentRequired(ReassignmentRequest),
}

// ==========================================
// MappingSet
// ==========================================
/// 一次导入会话的完整映射集合
#[derive(Debug, Clone)]
pub struct MappingSet {
    domain: ImportDomain,
    slots: Vec<MappingSlot>,
}

impl MappingSet {
    /// 从表头初始化映射集合（全部列初始为丢弃）
    ///
    /// 表头文本在集合内作为源列标识，重复表头只保留首个槽位。
    pub fn new(domain: ImportDomain, headers: &[String]) -> Self {
        let mut slots: Vec<MappingSlot> = Vec::with_capacity(headers.len());

        for (column_index, header) in headers.iter().enumerate() {
            if slots.iter().any(|s| s.mapping.source_column == *header) {
                warn!(header = %header, "重复表头, 仅保留首个同名列");
                continue;
            }
            slots.push(MappingSlot {
                column_index,
                mapping: ColumnMapping {
                    source_column: header.clone(),
                    target_field: None,
                    confidence: 0.0,
                    rationale: String::new(),
                    needs_review: false,
                    is_manual: false,
                },
            });
        }

        Self { domain, slots }
    }

    pub fn domain(&self) -> ImportDomain {
        self.domain
    }

    pub fn slots(&self) -> &[MappingSlot] {
        &self.slots
    }

    pub fn mappings(&self) -> Vec<&ColumnMapping> {
        self.slots.iter().map(|s| &s.mapping).collect()
    }

    /// 当前认领某目标字段的源列
    pub fn holder_of(&self, target_field: &str) -> Option<&str> {
        self.slots
            .iter()
            .find(|s| s.mapping.target_field.as_deref() == Some(target_field))
            .map(|s| s.mapping.source_column.as_str())
    }

    // ==========================================
    // 建议吸收
    // ==========================================
    /// 吸收自动建议，并做不变量消毒
    ///
    /// - 置信度截断到 [0,1]，NaN 视为 0
    /// - 未知/禁用目标字段降级为丢弃并标记复核
    /// - 同一目标字段被多列认领时，后到者降级为丢弃
    /// - 置信度低于阈值且有目标字段的标记 needs_review
    pub fn absorb_suggestions(&mut self, suggestions: Vec<ColumnMapping>, threshold: f64) {
        let schema = DomainSchema::for_domain(self.domain);

        for suggestion in suggestions {
            let Some(slot) = self
                .slots
                .iter_mut()
                .find(|s| s.mapping.source_column == suggestion.source_column)
            else {
                warn!(column = %suggestion.source_column, "建议引用了不存在的源列, 忽略");
                continue;
            };

            let confidence = if suggestion.confidence.is_nan() {
                0.0
            } else {
                suggestion.confidence.clamp(0.0, 1.0)
            };

            let mut target_field = suggestion.target_field;
            let mut rationale = suggestion.rationale;
            let mut needs_review = false;

            if let Some(field) = target_field.as_deref() {
                if !schema.is_mappable(field) {
                    warn!(column = %slot.mapping.source_column, field = %field, "建议的目标字段未知或禁用, 降级为丢弃");
                    rationale = format!("{} (unknown target field: {})", rationale, field);
                    target_field = None;
                    needs_review = true;
                }
            }

            slot.mapping = ColumnMapping {
                source_column: slot.mapping.source_column.clone(),
                target_field,
                confidence,
                rationale,
                needs_review,
                is_manual: false,
            };
        }

        // 后到的重复认领降级
        let mut claimed: Vec<String> = Vec::new();
        for slot in &mut self.slots {
            if let Some(field) = slot.mapping.target_field.clone() {
                if claimed.contains(&field) {
                    warn!(column = %slot.mapping.source_column, field = %field, "目标字段已被其他列认领, 降级为丢弃");
                    slot.mapping.rationale =
                        format!("{} (field already claimed)", slot.mapping.rationale);
                    slot.mapping.target_field = None;
                    slot.mapping.needs_review = true;
                } else {
                    claimed.push(field);
                }
            }
        }

        for slot in &mut self.slots {
            if slot.mapping.target_field.is_some() && slot.mapping.confidence < threshold {
                slot.mapping.needs_review = true;
            }
        }
    }

    // ==========================================
    // 人工编辑
    // ==========================================
    /// 人工设置/清除一个源列的目标字段
    ///
    /// # 返回
    /// - Ok(Applied): 直接生效
    /// - Ok(ReassignmentRequired): 目标字段已被其他列认领，待人工确认
    /// - Err(UnknownColumn / UnknownField)
    pub fn set_mapping(
        &mut self,
        source_column: &str,
        target_field: Option<&str>,
    ) -> ImportResult<SetMappingOutcome> {
        let schema = DomainSchema::for_domain(self.domain);

        if !self
            .slots
            .iter()
            .any(|s| s.mapping.source_column == source_column)
        {
            return Err(ImportError::UnknownColumn(source_column.to_string()));
        }

        if let Some(field) = target_field {
            if !schema.is_mappable(field) {
                return Err(ImportError::UnknownField(field.to_string()));
            }

            match self.holder_of(field) {
                Some(holder) if holder != source_column => {
                    return Ok(SetMappingOutcome::ReassignmentRequired(
                        ReassignmentRequest {
                            source_column: source_column.to_string(),
                            target_field: field.to_string(),
                            currently_holding_column: holder.to_string(),
                        },
                    ));
                }
                _ => {}
            }
        }

        self.apply_manual(source_column, target_field, MANUAL_RATIONALE);
        debug!(column = %source_column, field = ?target_field, "人工映射已生效");
        Ok(SetMappingOutcome::Applied)
    }

    /// 原子完成一次经确认的改派
    ///
    /// 持有列释放与请求列认领在同一调用内完成，
    /// 中间不存在"字段双认领"或"字段悬空丢失"的可见状态。
    ///
    /// # 返回
    /// - Err(StaleReassignment): 请求发出后认领关系已变化
    pub fn confirm_reassignment(&mut self, request: &ReassignmentRequest) -> ImportResult<()> {
        match self.holder_of(&request.target_field) {
            Some(holder) if holder == request.currently_holding_column => {}
            _ => return Err(ImportError::StaleReassignment),
        }
        if !self
            .slots
            .iter()
            .any(|s| s.mapping.source_column == request.source_column)
        {
            return Err(ImportError::UnknownColumn(request.source_column.clone()));
        }

        self.apply_manual(
            &request.currently_holding_column,
            None,
            "released during reassignment",
        );
        self.apply_manual(
            &request.source_column,
            Some(&request.target_field),
            MANUAL_RATIONALE,
        );
        debug!(
            field = %request.target_field,
            from = %request.currently_holding_column,
            to = %request.source_column,
            "字段改派完成"
        );
        Ok(())
    }

    fn apply_manual(&mut self, source_column: &str, target_field: Option<&str>, rationale: &str) {
        if let Some(slot) = self
            .slots
            .iter_mut()
            .find(|s| s.mapping.source_column == source_column)
        {
            slot.mapping.target_field = target_field.map(|f| f.to_string());
            slot.mapping.confidence = 1.0;
            slot.mapping.rationale = rationale.to_string();
            slot.mapping.needs_review = false;
            slot.mapping.is_manual = true;
        }
    }

    // ==========================================
    // 汇总与投影
    // ==========================================
    /// 映射变更后的汇总（每次变更后重算，不做增量维护）
    pub fn summary(&self) -> MappingSummary {
        let schema = DomainSchema::for_domain(self.domain);

        let mut unmapped_required = Vec::new();
        let mut unmapped_optional = Vec::new();
        for field in schema.fields {
            if field.disabled || self.holder_of(field.key).is_some() {
                continue;
            }
            if field.required {
                unmapped_required.push(field.key.to_string());
            } else {
                unmapped_optional.push(field.key.to_string());
            }
        }

        let discarded_columns = self
            .slots
            .iter()
            .filter(|s| s.mapping.target_field.is_none())
            .map(|s| s.mapping.source_column.clone())
            .collect();

        MappingSummary {
            unmapped_required,
            unmapped_optional,
            discarded_columns,
        }
    }

    /// 将一行投影为字段键值记录
    ///
    /// 丢弃列剔除；单元格修剪后为空的不进入记录；
    /// 行短于表头时缺失单元格按空处理。
    pub fn project(&self, row: &Row) -> MappedRecord {
        let mut values = std::collections::HashMap::new();

        for slot in &self.slots {
            let Some(field) = slot.mapping.target_field.as_ref() else {
                continue;
            };
            let Some(cell) = row.cells.get(slot.column_index) else {
                continue;
            };
            let trimmed = cell.trim();
            if !trimmed.is_empty() {
                values.insert(field.clone(), trimmed.to_string());
            }
        }

        MappedRecord {
            row_number: row.row_number,
            values,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn suggestion(column: &str, field: Option<&str>, confidence: f64) -> ColumnMapping {
        ColumnMapping {
            source_column: column.to_string(),
            target_field: field.map(|f| f.to_string()),
            confidence,
            rationale: "matched column pattern".to_string(),
            needs_review: false,
            is_manual: false,
        }
    }

    #[test]
    fn test_absorb_clamps_confidence_and_flags_review() {
        let mut set = MappingSet::new(ImportDomain::Parts, &headers(&["pn", "desc"]));
        set.absorb_suggestions(
            vec![
                suggestion("pn", Some("part_number"), 1.7),
                suggestion("desc", Some("description"), 0.4),
            ],
            0.7,
        );

        let mappings = set.mappings();
        assert!((mappings[0].confidence - 1.0).abs() < f64::EPSILON);
        assert!(!mappings[0].needs_review);
        assert!(mappings[1].needs_review);
    }

    #[test]
    fn test_absorb_downgrades_unknown_field_and_double_claim() {
        let mut set = MappingSet::new(ImportDomain::Parts, &headers(&["a", "b", "c"]));
        set.absorb_suggestions(
            vec![
                suggestion("a", Some("part_number"), 0.9),
                suggestion("b", Some("part_number"), 0.8), // 重复认领
                suggestion("c", Some("no_such_field"), 0.9),
            ],
            0.7,
        );

        assert_eq!(set.holder_of("part_number"), Some("a"));
        let mappings = set.mappings();
        assert!(mappings[1].target_field.is_none());
        assert!(mappings[1].needs_review);
        assert!(mappings[2].target_field.is_none());
        assert!(mappings[2].needs_review);
    }

    #[test]
    fn test_set_mapping_manual_override() {
        let mut set = MappingSet::new(ImportDomain::Customers, &headers(&["col1"]));
        let outcome = set.set_mapping("col1", Some("name")).unwrap();
        assert!(matches!(outcome, SetMappingOutcome::Applied));

        let mapping = &set.mappings()[0];
        assert_eq!(mapping.target_field.as_deref(), Some("name"));
        assert!((mapping.confidence - 1.0).abs() < f64::EPSILON);
        assert_eq!(mapping.rationale, MANUAL_RATIONALE);
        assert!(mapping.is_manual);
        assert!(!mapping.needs_review);
    }

    #[test]
    fn test_set_mapping_rejects_unknown_inputs() {
        let mut set = MappingSet::new(ImportDomain::Customers, &headers(&["col1"]));
        assert!(matches!(
            set.set_mapping("ghost", Some("name")),
            Err(ImportError::UnknownColumn(_))
        ));
        assert!(matches!(
            set.set_mapping("col1", Some("ghost_field")),
            Err(ImportError::UnknownField(_))
        ));
    }

    #[test]
    fn test_reassignment_round_trip() {
        let mut set = MappingSet::new(ImportDomain::Customers, &headers(&["col1", "col2"]));
        set.set_mapping("col1", Some("name")).unwrap();

        let outcome = set.set_mapping("col2", Some("name")).unwrap();
        let SetMappingOutcome::ReassignmentRequired(request) = outcome else {
            panic!("期望进入改派流程");
        };
        assert_eq!(request.currently_holding_column, "col1");

        set.confirm_reassignment(&request).unwrap();
        assert_eq!(set.holder_of("name"), Some("col2"));

        let released = &set.mappings()[0];
        assert!(released.target_field.is_none());
        assert!(released.is_manual);
    }

    #[test]
    fn test_stale_reassignment_rejected() {
        let mut set = MappingSet::new(ImportDomain::Customers, &headers(&["col1", "col2"]));
        set.set_mapping("col1", Some("name")).unwrap();

        let SetMappingOutcome::ReassignmentRequired(request) =
            set.set_mapping("col2", Some("name")).unwrap()
        else {
            panic!("期望进入改派流程");
        };

        // 确认前认领关系已变化
        set.set_mapping("col1", None).unwrap();
        assert!(matches!(
            set.confirm_reassignment(&request),
            Err(ImportError::StaleReassignment)
        ));
    }

    #[test]
    fn test_summary_partitions_fields() {
        let mut set = MappingSet::new(ImportDomain::Parts, &headers(&["pn", "junk"]));
        set.set_mapping("pn", Some("part_number")).unwrap();

        let summary = set.summary();
        assert!(summary.unmapped_required.is_empty());
        assert!(summary
            .unmapped_optional
            .contains(&"description".to_string()));
        assert_eq!(summary.discarded_columns, vec!["junk".to_string()]);
    }

    #[test]
    fn test_project_drops_discarded_and_empty_cells() {
        let mut set = MappingSet::new(ImportDomain::Parts, &headers(&["pn", "junk", "desc"]));
        set.set_mapping("pn", Some("part_number")).unwrap();
        set.set_mapping("desc", Some("description")).unwrap();

        let row = Row {
            row_number: 7,
            cells: vec!["P-100".to_string(), "noise".to_string(), "  ".to_string()],
        };
        let record = set.project(&row);

        assert_eq!(record.row_number, 7);
        assert_eq!(record.values.get("part_number").unwrap(), "P-100");
        assert!(!record.values.contains_key("description"));
        assert_eq!(record.values.len(), 1);
    }

    #[test]
    fn test_project_short_row() {
        let mut set = MappingSet::new(ImportDomain::Parts, &headers(&["pn", "desc"]));
        set.set_mapping("pn", Some("part_number")).unwrap();
        set.set_mapping("desc", Some("description")).unwrap();

        let row = Row {
            row_number: 1,
            cells: vec!["P-1".to_string()],
        };
        let record = set.project(&row);
        assert_eq!(record.values.len(), 1);
    }
}
