//! # 嵌套解析记录
//!
//! 解析结果统一表示为字符串键到 `Value` 的有序映射。扫描器各自返回新的记录片段，
//! 编排器通过纯函数 `deep_merge` 组合片段，不会在返回后修改任何扫描器的输出。
//!
//! ## 依赖关系
//! - 被 `parsers/` 全部扫描器使用
//! - 被 `commands/` 序列化为 JSON

use serde::Serialize;
use std::collections::BTreeMap;

/// 记录中的单个值
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Record(Record),
}

impl Value {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(v) => Some(v),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        Value::Int(v as i64)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<Record> for Value {
    fn from(v: Record) -> Self {
        Value::Record(v)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

impl From<[f64; 3]> for Value {
    fn from(v: [f64; 3]) -> Self {
        Value::List(v.iter().map(|x| Value::Float(*x)).collect())
    }
}

/// 有序嵌套映射
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Record(BTreeMap<String, Value>);

impl Record {
    pub fn new() -> Self {
        Record(BTreeMap::new())
    }

    /// 插入一个键值（覆盖已有值）
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// 链式插入
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// 按路径取值，例如 `["final", "energy", "total"]`
    pub fn get_path(&self, path: &[&str]) -> Option<&Value> {
        let (first, rest) = path.split_first()?;
        let value = self.0.get(*first)?;
        if rest.is_empty() {
            Some(value)
        } else {
            value.as_record()?.get_path(rest)
        }
    }

    pub fn get_record(&self, key: &str) -> Option<&Record> {
        self.get(key).and_then(Value::as_record)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Record(iter.into_iter().collect())
    }
}

/// 深度合并两个记录
///
/// 两侧同名键都是嵌套记录时递归合并；其他冲突以 `update` 的值为准。
pub fn deep_merge(base: Record, update: Record) -> Record {
    let mut merged = base.0;
    for (key, value) in update.0 {
        let combined = match (merged.remove(&key), value) {
            (Some(Value::Record(old)), Value::Record(new)) => Value::Record(deep_merge(old, new)),
            (_, new) => new,
        };
        merged.insert(key, combined);
    }
    Record(merged)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deep_merge_nested_union() {
        let a = Record::new().with("a", Record::new().with("x", 1i64));
        let b = Record::new().with("a", Record::new().with("y", 2i64));

        let merged = deep_merge(a, b);
        let expected = Record::new().with("a", Record::new().with("x", 1i64).with("y", 2i64));
        assert_eq!(merged, expected);
    }

    #[test]
    fn test_deep_merge_scalar_last_wins() {
        let a = Record::new().with("a", 1i64);
        let b = Record::new().with("a", 2i64);
        assert_eq!(deep_merge(a, b), Record::new().with("a", 2i64));
    }

    #[test]
    fn test_deep_merge_record_replaced_by_scalar() {
        let a = Record::new().with("a", Record::new().with("x", 1i64));
        let b = Record::new().with("a", "flat");
        assert_eq!(deep_merge(a, b).get("a"), Some(&Value::from("flat")));
    }

    #[test]
    fn test_deep_merge_keeps_inputs_untouched() {
        let a = Record::new().with("k", Record::new().with("x", 1.5));
        let b = Record::new().with("k", Record::new().with("y", true));
        let a_copy = a.clone();
        let _ = deep_merge(a.clone(), b);
        assert_eq!(a, a_copy);
    }

    #[test]
    fn test_get_path() {
        let rec = Record::new().with(
            "final",
            Record::new().with("energy", Record::new().with("total", -10.0)),
        );
        assert_eq!(
            rec.get_path(&["final", "energy", "total"]).and_then(Value::as_f64),
            Some(-10.0)
        );
        assert!(rec.get_path(&["final", "missing"]).is_none());
    }

    #[test]
    fn test_serialize_json() {
        let rec = Record::new()
            .with("list", vec![1i64, 2])
            .with("none", Value::Null)
            .with("name", "MgO");
        let json = serde_json::to_string(&rec).unwrap();
        assert_eq!(json, r#"{"list":[1,2],"name":"MgO","none":null}"#);
    }
}
