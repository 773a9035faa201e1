// ==========================================
// 企业名录系统 - 行规范化
// ==========================================
// 职责: 生成名称/住所的比较键
// 红线: 不修改行的显示字段
// ==========================================

/// 比较键：TRIM 后为空视为无值
pub fn normalize(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// 非空白的原文（格式/字数检查按用户填写的内容判定）
pub fn present(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// 邮编主数据键（去除连字符）
pub fn postal_key(zip_code: &str) -> String {
    zip_code.replace('-', "")
}

/// 字符数（非字节数）
pub fn char_len(value: &str) -> usize {
    value.chars().count()
}
