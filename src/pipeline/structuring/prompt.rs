/// Instruction sent alongside an inline PDF.
pub const PDF_EXTRACTION_INSTRUCTION: &str =
    "你是一位資深的保險精算師。請從這份保單中精確提取資料。請注意 product_code (文號) 的準確性。";

/// Instruction for text-based extraction of one file.
pub fn text_extraction_instruction(file_name: &str) -> String {
    format!(
        "你是一位保險專家。請分析這份文件 (檔名: {file_name}) 並提取 RAG 所需資料，\
         特別是『客戶口語 vs 專業術語』的對照。"
    )
}

/// System prompt for freeform metadata extraction. Field names must match
/// [`InsuranceMetadata`](super::types::InsuranceMetadata).
pub const METADATA_SYSTEM_PROMPT: &str = r#"
你是一個專業的保險文件分析師。請分析使用者提供的 OCR 文字，提取以下 JSON 欄位。
如果找不到對應資訊，請填 null 或空陣列 []。

必須提取的欄位:
1. product_name (字串): 產品全名
2. product_code (字串): 文號或商品代碼
3. insurance_type (字串陣列): 例如 ["終身壽險", "美元保單", "利率變動型"]
4. target_audience (字串): 適合的對象描述
5. benefits (字串陣列): 主要給付項目
6. currency (字串): 幣別 (如 USD, TWD)

請直接回傳 JSON 物件，不要包含任何解釋或 Markdown 格式。
"#;

pub fn metadata_user_prompt(document_text: &str) -> String {
    format!("這是保險文件的 OCR 內容:\n\n{document_text}")
}
