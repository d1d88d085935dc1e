//! Response schema for schema-constrained extraction.
//!
//! Expressed in the OpenAPI subset accepted by `generationConfig.responseSchema`.
//! Mirrors [`PolicyRecord`](super::types::PolicyRecord) minus `source_filename`,
//! which is filled in locally.

use serde_json::{json, Value};

fn string(description: &str) -> Value {
    json!({ "type": "STRING", "description": description })
}

fn string_list(description: &str) -> Value {
    json!({ "type": "ARRAY", "description": description, "items": { "type": "STRING" } })
}

fn object(properties: &[(&str, Value)]) -> Value {
    let names: Vec<&str> = properties.iter().map(|(name, _)| *name).collect();
    let map: serde_json::Map<String, Value> = properties
        .iter()
        .map(|(name, schema)| (name.to_string(), schema.clone()))
        .collect();
    json!({
        "type": "OBJECT",
        "properties": map,
        "required": names,
        "propertyOrdering": names,
    })
}

fn object_list(description: &str, item: Value) -> Value {
    json!({ "type": "ARRAY", "description": description, "items": item })
}

/// Schema for a full policy record.
pub fn policy_record_schema() -> Value {
    let basic_info = object(&[
        ("product_name", string("完整商品名稱")),
        ("product_code", string("備查文號/核准文號 (例如: 114.01.01臺壽字第...號)")),
        ("company", string("保險公司名稱")),
        ("currency", string_list("幣別列表 (例如: ['TWD', 'USD'])")),
        ("product_type", string("商品類型描述 (例如: 變額萬能壽險, 傳統型美元養老險)")),
        ("payment_period", string("繳費年期/方式")),
    ]);

    let conditions = object(&[
        ("age_range", string("投保年齡限制")),
        ("premium_limit", string("保費門檻限制")),
        ("fees_and_discounts", string("相關費用率或高保費折扣說明")),
    ]);

    let coverage = object(&[
        ("death_benefit", string("身故/喪葬給付計算邏輯")),
        ("maturity_benefit", string("滿期/祝壽金給付邏輯")),
        ("other_benefits", string_list("其他給付項目 (如完全失能, 意外給付)")),
    ]);

    let investment = object(&[
        (
            "is_investment_linked",
            json!({ "type": "BOOLEAN", "description": "是否為投資型保單" }),
        ),
        ("features", string_list("投資特色 (如: ['月撥回', '全權委託'])")),
        ("risks", string_list("風險揭露")),
    ]);

    let synonym = object(&[
        ("slang", string("客戶常說的口語 (如: 死掉, 殘廢, 存錢)")),
        ("formal", string("對應的保單專業術語 (如: 身故給付, 完全失能)")),
    ]);

    let faq = object(&[
        ("q", string("使用者可能問的問題")),
        ("a", string("根據文件的簡短回答")),
    ]);

    let rag_data = object(&[
        ("keywords", string_list("RAG 檢索用的關鍵字與同義詞")),
        ("synonym_mapping", object_list("口語與專業術語對照表", synonym)),
        ("target_audience", string("適合客群描述")),
        ("faq", object_list("5-8 組常見問答", faq)),
    ]);

    object(&[
        ("basic_info", basic_info),
        ("conditions", conditions),
        ("coverage", coverage),
        ("investment", investment),
        ("rag_data", rag_data),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::structuring::types::PolicyRecord;

    #[test]
    fn top_level_groups_are_required_in_order() {
        let schema = policy_record_schema();
        assert_eq!(schema["type"], "OBJECT");
        assert_eq!(
            schema["required"],
            json!(["basic_info", "conditions", "coverage", "investment", "rag_data"])
        );
        assert_eq!(schema["required"], schema["propertyOrdering"]);
    }

    #[test]
    fn schema_properties_match_record_fields() {
        let schema = policy_record_schema();
        let record = serde_json::to_value(PolicyRecord::default()).unwrap();

        for (group, props) in schema["properties"].as_object().unwrap() {
            let record_group = record[group].as_object().unwrap();
            let schema_fields: Vec<&String> = props["properties"].as_object().unwrap().keys().collect();
            assert_eq!(schema_fields.len(), record_group.len(), "field count differs in {group}");
            for field in schema_fields {
                assert!(record_group.contains_key(field), "{group}.{field} missing from record");
            }
        }
    }

    #[test]
    fn nested_lists_describe_items() {
        let schema = policy_record_schema();
        let synonym = &schema["properties"]["rag_data"]["properties"]["synonym_mapping"];
        assert_eq!(synonym["type"], "ARRAY");
        assert_eq!(synonym["items"]["required"], json!(["slang", "formal"]));
        let flag = &schema["properties"]["investment"]["properties"]["is_investment_linked"];
        assert_eq!(flag["type"], "BOOLEAN");
    }
}
