use crate::assertion::types::{SchemaType, SchemaViolation};
use crate::variable::capture::json_type_name;
use serde_json::Value;

/// 递归结构校验器
///
/// 只支持 `type`、`properties`、`required`、`items` 四个关键字，
/// 其它关键字忽略。所有违例都会收集，不会在第一个处停下。
pub fn validate_schema(schema: &Value, instance: &Value) -> Vec<SchemaViolation> {
    let mut violations = Vec::new();
    validate_at(schema, instance, "$", &mut violations);
    violations
}

fn validate_at(schema: &Value, instance: &Value, path: &str, out: &mut Vec<SchemaViolation>) {
    // `true` / `{}` 之类的 schema 不做约束
    let Some(schema) = schema.as_object() else {
        return;
    };

    if let Some(type_spec) = schema.get("type") {
        let allowed = allowed_types(type_spec);
        if !allowed.is_empty() && !allowed.iter().any(|t| t.matches(instance)) {
            let expected = allowed
                .iter()
                .map(|t| t.as_str())
                .collect::<Vec<_>>()
                .join(" or ");
            out.push(violation(
                path,
                format!(
                    "expected type {}, got {}",
                    expected,
                    json_type_name(instance)
                ),
            ));
            // 类型都不对，继续往下校验没有意义
            return;
        }
    }

    if let Value::Object(fields) = instance {
        if let Some(required) = schema.get("required").and_then(Value::as_array) {
            for name in required.iter().filter_map(Value::as_str) {
                if !fields.contains_key(name) {
                    out.push(violation(
                        path,
                        format!("missing required property: {}", name),
                    ));
                }
            }
        }

        if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
            for (name, sub_schema) in properties {
                if let Some(field) = fields.get(name) {
                    validate_at(sub_schema, field, &format!("{}.{}", path, name), out);
                }
            }
        }
    }

    if let Value::Array(items) = instance {
        match schema.get("items") {
            Some(Value::Array(positional)) => {
                for (i, (sub_schema, item)) in positional.iter().zip(items).enumerate() {
                    validate_at(sub_schema, item, &format!("{}[{}]", path, i), out);
                }
            }
            Some(item_schema) => {
                for (i, item) in items.iter().enumerate() {
                    validate_at(item_schema, item, &format!("{}[{}]", path, i), out);
                }
            }
            None => {}
        }
    }
}

/// `type` 可以是字符串或字符串数组；未知类型名被忽略
fn allowed_types(type_spec: &Value) -> Vec<SchemaType> {
    match type_spec {
        Value::String(name) => SchemaType::parse(name).into_iter().collect(),
        Value::Array(names) => names
            .iter()
            .filter_map(Value::as_str)
            .filter_map(SchemaType::parse)
            .collect(),
        _ => Vec::new(),
    }
}

fn violation(path: &str, message: String) -> SchemaViolation {
    SchemaViolation {
        path: path.to_string(),
        message,
    }
}
