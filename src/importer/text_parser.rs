// ==========================================
// 车间管理系统 - 分隔文本解析器
// ==========================================
// 职责: 手写 CSV 解析（引号感知 + 逐行降级），产出表头与已编号数据行
// 红线: 逐行独立解析，单行引号不配对只降级该行，不影响其余行
// ==========================================

use crate::domain::import::{ParsedDocument, Row};
use tracing::warn;

use super::error::{ImportError, ImportResult};

// ==========================================
// 解析入口
// ==========================================
/// 将分隔文本解析为结构化文档
///
/// 第一条非空行为表头，其后每条非空行为数据行，
/// 行号从 1 起始一次性分配（表头不计入）。
///
/// # 返回
/// - Err(EmptyInput): 输入全为空行或空白行
pub fn parse_document(text: &str) -> ImportResult<ParsedDocument> {
    let mut lines = split_lines(text);
    if lines.is_empty() {
        return Err(ImportError::EmptyInput);
    }

    let headers = lines.remove(0);
    let rows = lines
        .into_iter()
        .enumerate()
        .map(|(i, cells)| Row {
            row_number: (i + 1) as u32,
            cells,
        })
        .collect();

    Ok(ParsedDocument { headers, rows })
}

/// 按行切分并解析每条记录
///
/// 行终止符兼容 LF / CRLF / 混合；空行与纯空白行跳过且不占行号。
fn split_lines(text: &str) -> Vec<Vec<String>> {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(parse_line)
        .collect()
}

// ==========================================
// 单行解析
// ==========================================
/// 引号感知地解析一行
///
/// 引号内的逗号为字面量；`""` 为转义双引号；
/// 行尾引号未闭合时整行降级为朴素切分。
fn parse_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                // 连续两个双引号是转义，单个是闭合
                if chars.peek() == Some(&'"') {
                    chars.next();
                    current.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' => in_quotes = true,
            ',' if !in_quotes => {
                fields.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }

    if in_quotes {
        warn!("行内引号未闭合, 降级为朴素切分");
        return fallback_split(line);
    }

    fields.push(current.trim().to_string());
    fields
}

/// 降级切分: 按逗号硬切，剔除所有双引号字符
fn fallback_split(line: &str) -> Vec<String> {
    line.split(',')
        .map(|field| field.replace('"', "").trim().to_string())
        .collect()
}
