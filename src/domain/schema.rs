// ==========================================
// 车间管理系统 - 导入域静态 Schema
// ==========================================
// 职责: 每个导入域（客户/零件/库存）的目标字段定义、
//       自然键配置、表头自动映射模式
// 说明: 模式串作用于归一化后的表头（小写、分隔符折叠为下划线）
// ==========================================

use crate::domain::types::ImportDomain;
use serde::Serialize;

// ==========================================
// FieldType / FieldDefinition
// ==========================================
/// 目标字段值类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Text,
    /// 数值字段，落库前解析并保留 2 位小数
    Number,
}

/// 目标字段定义（每个导入域静态配置）
#[derive(Debug, Clone, Copy, Serialize)]
pub struct FieldDefinition {
    /// 字段 key（落库列名）
    pub key: &'static str,
    /// 展示用标签
    pub label: &'static str,
    /// 是否必填
    pub required: bool,
    /// 禁用字段不可被映射认领
    pub disabled: bool,
    pub field_type: FieldType,
    /// 表头自动映射模式（锚定正则，作用于归一化表头）
    pub patterns: &'static [&'static str],
    /// 缺省值（落库时对缺失字段补齐）
    pub default_value: Option<&'static str>,
}

// ==========================================
// DomainSchema
// ==========================================
/// 一个导入域的完整 Schema
#[derive(Debug, Clone, Copy)]
pub struct DomainSchema {
    pub domain: ImportDomain,
    pub fields: &'static [FieldDefinition],
    /// 自然键字段（用于批内/跨库重复检测）
    pub unique_fields: &'static [&'static str],
    /// 领域提示词（命中的未识别列交给建议服务判断）
    pub domain_hints: &'static [&'static str],
}

impl DomainSchema {
    /// 获取指定导入域的静态 Schema
    pub fn for_domain(domain: ImportDomain) -> &'static DomainSchema {
        match domain {
            ImportDomain::Customers => &CUSTOMERS_SCHEMA,
            ImportDomain::Parts => &PARTS_SCHEMA,
            ImportDomain::Inventory => &INVENTORY_SCHEMA,
        }
    }

    /// 按 key 查找字段定义
    pub fn field(&self, key: &str) -> Option<&'static FieldDefinition> {
        self.fields.iter().find(|f| f.key == key)
    }

    /// 必填字段 key 列表
    pub fn required_fields(&self) -> Vec<&'static str> {
        self.fields
            .iter()
            .filter(|f| f.required && !f.disabled)
            .map(|f| f.key)
            .collect()
    }

    /// 字段是否存在且可被映射认领
    pub fn is_mappable(&self, key: &str) -> bool {
        self.field(key).map(|f| !f.disabled).unwrap_or(false)
    }
}

// ==========================================
// 客户档案 Schema
// ==========================================
static CUSTOMERS_SCHEMA: DomainSchema = DomainSchema {
    domain: ImportDomain::Customers,
    fields: &[
        FieldDefinition {
            key: "customer_code",
            label: "Customer code",
            required: true,
            disabled: false,
            field_type: FieldType::Text,
            patterns: &[
                r"^(customer_?(code|id|number|num)?|cust_?(code|id))$",
                r"^(client_?(code|id)|account_?(code|id|number|num))$",
            ],
            default_value: None,
        },
        FieldDefinition {
            key: "name",
            label: "Customer name",
            required: true,
            disabled: false,
            field_type: FieldType::Text,
            patterns: &[
                r"^(name|company_?name|customer_?name|business_?name)$",
                r"^(company|customer|client|vendor|account)_?name$",
                r"^(full_?name|legal_?name|dba|company)$",
            ],
            default_value: None,
        },
        FieldDefinition {
            key: "website",
            label: "Website",
            required: false,
            disabled: false,
            field_type: FieldType::Text,
            patterns: &[r"^(website|web_?site|url|web_?address|homepage|www)$"],
            default_value: None,
        },
        FieldDefinition {
            key: "contact_name",
            label: "Contact name",
            required: false,
            disabled: false,
            field_type: FieldType::Text,
            patterns: &[
                r"^(contact_?name|contact_?person|primary_?contact)$",
                r"^(contact|rep|representative)$",
            ],
            default_value: None,
        },
        FieldDefinition {
            key: "contact_phone",
            label: "Contact phone",
            required: false,
            disabled: false,
            field_type: FieldType::Text,
            patterns: &[
                r"^(contact_?phone|phone_?number|phone|telephone|tel)$",
                r"^(primary_?phone|main_?phone|work_?phone|office_?phone)$",
                r"^(mobile|cell|cell_?phone)$",
            ],
            default_value: None,
        },
        FieldDefinition {
            key: "contact_email",
            label: "Contact email",
            required: false,
            disabled: false,
            field_type: FieldType::Text,
            patterns: &[
                r"^(contact_?email|email_?address|email|e_?mail)$",
                r"^(primary_?email|main_?email|work_?email)$",
            ],
            default_value: None,
        },
        FieldDefinition {
            key: "address_line1",
            label: "Address line 1",
            required: false,
            disabled: false,
            field_type: FieldType::Text,
            patterns: &[
                r"^(address_?(line)?_?1?|street_?address|street)$",
                r"^(address|addr|mailing_?address|shipping_?address)$",
            ],
            default_value: None,
        },
        FieldDefinition {
            key: "address_line2",
            label: "Address line 2",
            required: false,
            disabled: false,
            field_type: FieldType::Text,
            patterns: &[
                r"^(address_?(line)?_?2|street_?address_?2)$",
                r"^(suite|unit|apt|apartment|floor|building)$",
            ],
            default_value: None,
        },
        FieldDefinition {
            key: "city",
            label: "City",
            required: false,
            disabled: false,
            field_type: FieldType::Text,
            patterns: &[r"^(city|town|municipality|locality)$"],
            default_value: None,
        },
        FieldDefinition {
            key: "state",
            label: "State / province",
            required: false,
            disabled: false,
            field_type: FieldType::Text,
            patterns: &[r"^(state|province|region|st|state_?province|state_?code)$"],
            default_value: None,
        },
        FieldDefinition {
            key: "postal_code",
            label: "Postal code",
            required: false,
            disabled: false,
            field_type: FieldType::Text,
            patterns: &[r"^(postal_?code|post_?code|zip_?code|zip|postcode)$"],
            default_value: None,
        },
        FieldDefinition {
            key: "country",
            label: "Country",
            required: false,
            disabled: false,
            field_type: FieldType::Text,
            patterns: &[r"^(country|nation|country_?code)$"],
            default_value: Some("USA"),
        },
    ],
    unique_fields: &["customer_code", "name"],
    domain_hints: &[
        "customer", "client", "vendor", "company", "business", "contact", "phone", "email",
        "address", "city", "state", "zip",
    ],
};

// ==========================================
// 零件档案 Schema
// ==========================================
static PARTS_SCHEMA: DomainSchema = DomainSchema {
    domain: ImportDomain::Parts,
    fields: &[
        FieldDefinition {
            key: "part_number",
            label: "Part number",
            required: true,
            disabled: false,
            field_type: FieldType::Text,
            patterns: &[
                r"^part_?(number|num|no|id|code)?$",
                r"^(pn|sku|item_?(number|num|no|code)?)$",
                r"^(product_?code|product_?id|product_?number)$",
                r"^(component|assembly)_?(number|id|code)$",
            ],
            default_value: None,
        },
        FieldDefinition {
            key: "customer_code",
            label: "Customer code",
            required: false,
            disabled: false,
            field_type: FieldType::Text,
            patterns: &[
                r"^(customer_?(code|id|number)?|cust_?(code|id))$",
                r"^(client_?(code|id)|account_?(code|id))$",
            ],
            default_value: None,
        },
        FieldDefinition {
            key: "description",
            label: "Description",
            required: false,
            disabled: false,
            field_type: FieldType::Text,
            patterns: &[
                r"^(description|desc|part_?desc(ription)?)$",
                r"^(name|title|label|part_?name)$",
                r"^(product|item|part)_?(name|description)$",
            ],
            default_value: None,
        },
        FieldDefinition {
            key: "material_cost",
            label: "Material cost",
            required: false,
            disabled: false,
            field_type: FieldType::Number,
            patterns: &[
                r"^(material_?cost|mat_?cost|raw_?cost)$",
                r"^(unit_?cost|base_?cost|cost_?per_?unit|cost)$",
            ],
            default_value: None,
        },
        FieldDefinition {
            key: "notes",
            label: "Notes",
            required: false,
            disabled: false,
            field_type: FieldType::Text,
            patterns: &[r"^(notes?|comments?|remarks?|memo|internal_?notes?)$"],
            default_value: None,
        },
    ],
    unique_fields: &["part_number"],
    domain_hints: &[
        "part", "item", "product", "component", "assembly", "material", "cost", "price",
    ],
};

// ==========================================
// 库存资源档案 Schema
// ==========================================
static INVENTORY_SCHEMA: DomainSchema = DomainSchema {
    domain: ImportDomain::Inventory,
    fields: &[
        FieldDefinition {
            key: "name",
            label: "Resource name",
            required: true,
            disabled: false,
            field_type: FieldType::Text,
            patterns: &[
                r"^(name|resource_?name|operation_?name)$",
                r"^(resource|operation|work_?center|machine)$",
            ],
            default_value: None,
        },
        FieldDefinition {
            key: "code",
            label: "Resource code",
            required: false,
            disabled: false,
            field_type: FieldType::Text,
            patterns: &[
                r"^(code|resource_?(code|id)|operation_?(code|id))$",
                r"^(machine_?(code|id)|work_?center_?(code|id))$",
                r"^(short_?code|abbreviation|abbrev)$",
            ],
            default_value: None,
        },
        FieldDefinition {
            key: "labor_rate",
            label: "Hourly labor rate",
            required: false,
            disabled: false,
            field_type: FieldType::Number,
            patterns: &[
                r"^(labor_?rate|rate|hourly_?rate)$",
                r"^(cost_?per_?hour|hour_?rate|shop_?rate|machine_?rate)$",
            ],
            default_value: None,
        },
        FieldDefinition {
            key: "resource_group",
            label: "Resource group",
            required: false,
            disabled: false,
            field_type: FieldType::Text,
            patterns: &[
                r"^(resource_?group|group|category|type)$",
                r"^(department|section|area|work_?group)$",
            ],
            default_value: None,
        },
        FieldDefinition {
            key: "description",
            label: "Description",
            required: false,
            disabled: false,
            field_type: FieldType::Text,
            patterns: &[r"^(notes?|comments?|memo|remarks?|details?)$"],
            default_value: None,
        },
        FieldDefinition {
            key: "legacy_id",
            label: "Legacy system id",
            required: false,
            disabled: false,
            field_type: FieldType::Text,
            patterns: &[
                r"^(legacy_?id|old_?id|previous_?id)$",
                r"^(external_?id|source_?id|orig_?id)$",
            ],
            default_value: None,
        },
    ],
    unique_fields: &["name"],
    domain_hints: &[
        "resource", "operation", "machine", "work center", "labor", "rate", "hourly", "cnc",
        "lathe", "mill",
    ],
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_fields_customers() {
        let schema = DomainSchema::for_domain(ImportDomain::Customers);
        let required = schema.required_fields();
        assert_eq!(required, vec!["customer_code", "name"]);
    }

    #[test]
    fn test_unique_fields_per_domain() {
        assert_eq!(
            DomainSchema::for_domain(ImportDomain::Parts).unique_fields,
            &["part_number"]
        );
        assert_eq!(
            DomainSchema::for_domain(ImportDomain::Inventory).unique_fields,
            &["name"]
        );
    }

    #[test]
    fn test_field_lookup() {
        let schema = DomainSchema::for_domain(ImportDomain::Parts);
        assert!(schema.is_mappable("material_cost"));
        assert!(!schema.is_mappable("no_such_field"));
        assert_eq!(
            schema.field("material_cost").map(|f| f.field_type),
            Some(FieldType::Number)
        );
    }
}
