use crate::rasterizer::DEFAULT_DPI;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Question {
    pub question_number: String,
    pub question: String,
}

impl Question {
    pub fn new(question_number: impl Into<String>, question: impl Into<String>) -> Self {
        Self {
            question_number: question_number.into(),
            question: question.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FieldName {
    Name,
    Subject,
    Marks,
    Questions,
    QuestionTypes,
    Class,
    Section,
    ExamDate,
    ExamDuration,
}

impl FieldName {
    pub const ALL: [FieldName; 9] = [
        FieldName::Name,
        FieldName::Subject,
        FieldName::Marks,
        FieldName::Questions,
        FieldName::QuestionTypes,
        FieldName::Class,
        FieldName::Section,
        FieldName::ExamDate,
        FieldName::ExamDuration,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldName::Name => "name",
            FieldName::Subject => "subject",
            FieldName::Marks => "marks",
            FieldName::Questions => "questions",
            FieldName::QuestionTypes => "question_types",
            FieldName::Class => "class",
            FieldName::Section => "section",
            FieldName::ExamDate => "exam_date",
            FieldName::ExamDuration => "exam_duration",
        }
    }
}

/// Structured fields recovered from one page of OCR text.
///
/// Serialization omits every field that was not recovered, so the JSON form is
/// a sparse map: absent keys mean "not found", never `null`.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldRecord {
    pub name: Option<String>,
    pub subject: Option<String>,
    pub marks: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub questions: Vec<Question>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub question_types: Vec<String>,
    #[serde(rename = "class")]
    pub class_name: Option<String>,
    pub section: Option<String>,
    pub exam_date: Option<String>,
    pub exam_duration: Option<String>,
}

impl FieldRecord {
    pub fn is_present(&self, field: FieldName) -> bool {
        match field {
            FieldName::Name => self.name.is_some(),
            FieldName::Subject => self.subject.is_some(),
            FieldName::Marks => self.marks.is_some(),
            FieldName::Questions => !self.questions.is_empty(),
            FieldName::QuestionTypes => !self.question_types.is_empty(),
            FieldName::Class => self.class_name.is_some(),
            FieldName::Section => self.section.is_some(),
            FieldName::ExamDate => self.exam_date.is_some(),
            FieldName::ExamDuration => self.exam_duration.is_some(),
        }
    }

    pub fn present_fields(&self) -> Vec<FieldName> {
        FieldName::ALL
            .into_iter()
            .filter(|field| self.is_present(*field))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.present_fields().is_empty()
    }

    /// Flattens the record into `{field_name, value}` pairs. List values are
    /// rendered as JSON text.
    pub fn to_parsed_fields(&self) -> Vec<ParsedField> {
        self.present_fields()
            .into_iter()
            .filter_map(|field| {
                let value = match field {
                    FieldName::Name => self.name.clone(),
                    FieldName::Subject => self.subject.clone(),
                    FieldName::Marks => self.marks.clone(),
                    FieldName::Questions => serde_json::to_string(&self.questions).ok(),
                    FieldName::QuestionTypes => serde_json::to_string(&self.question_types).ok(),
                    FieldName::Class => self.class_name.clone(),
                    FieldName::Section => self.section.clone(),
                    FieldName::ExamDate => self.exam_date.clone(),
                    FieldName::ExamDuration => self.exam_duration.clone(),
                }?;

                Some(ParsedField {
                    field_name: field.as_str().to_string(),
                    value,
                })
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParsedField {
    pub field_name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    pub number: u32,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PageRecord {
    pub page_number: u32,
    pub text: String,
    pub parsed: Vec<ParsedField>,
    pub extracted_data: FieldRecord,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentRecord {
    pub id: String,
    pub filename: String,
    pub uploaded_at: DateTime<Utc>,
    pub checksum: String,
    pub pages: Vec<PageRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentSummary {
    pub id: String,
    pub filename: String,
    pub uploaded_at: DateTime<Utc>,
}

impl From<&DocumentRecord> for DocumentSummary {
    fn from(value: &DocumentRecord) -> Self {
        Self {
            id: value.id.clone(),
            filename: value.filename.clone(),
            uploaded_at: value.uploaded_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExtractionOptions {
    pub dpi: u32,
    pub language: String,
    pub ocr_timeout: Duration,
    pub max_concurrent_pages: usize,
}

impl Default for ExtractionOptions {
    fn default() -> Self {
        Self {
            dpi: DEFAULT_DPI,
            language: "eng".to_string(),
            ocr_timeout: Duration::from_secs(120),
            max_concurrent_pages: std::thread::available_parallelism()
                .map(|count| count.get())
                .unwrap_or(1),
        }
    }
}

/// How the question tiers combine on a page.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QuestionTierPolicy {
    /// Use only the first tier that matches anything; stricter tiers shadow
    /// looser ones even when the looser ones would find other questions.
    #[default]
    FirstSuccessfulTier,
    /// Run every tier and deduplicate the concatenated results.
    MergeAllTiers,
}

#[derive(Debug, Clone)]
pub struct ParserOptions {
    pub name_patterns: Vec<&'static str>,
    pub marks_patterns: Vec<&'static str>,
    pub subject_patterns: Vec<&'static str>,
    pub question_type_patterns: Vec<&'static str>,
    pub class_pattern: &'static str,
    pub section_pattern: &'static str,
    pub exam_date_pattern: &'static str,
    pub exam_duration_pattern: &'static str,
    pub annotated_question_pattern: &'static str,
    pub numbered_block_start_pattern: &'static str,
    pub numbered_block_boundary_pattern: &'static str,
    pub mark_annotation_pattern: &'static str,
    pub single_line_question_pattern: &'static str,
    pub numbered_block_min_chars: usize,
    pub single_line_min_chars: usize,
    pub question_policy: QuestionTierPolicy,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            name_patterns: vec![
                r"(?im)(?:Name|Student Name|Candidate Name)[\s:\-.]{1,5}([A-Z][A-Za-z \t.\-]{2,60}?)[ \t]*(?:\r?$|\b\d{1,3}(?:[.\s]|$))",
                r"(?i)(?:Roll No|Roll Number|Enrollment No)[\s:\-.]{1,5}([A-Z0-9][A-Za-z0-9 \t.\-]{1,30})",
                r"(?i)(?:Student ID|Reg No)[\s:\-.]{1,5}([A-Z0-9][A-Za-z0-9 \t.\-]{1,30})",
            ],
            marks_patterns: vec![
                r"(?i)Marks?[\s:\-.]{1,5}([0-9]{1,3})",
                r"(?i)Total\s+marks?[\s:\-.]{1,5}([0-9]{1,3})",
                r"(?i)(?:^|[^(\d\s])\s*(\d{1,3})\s*marks?[\s:\-.]",
            ],
            subject_patterns: vec![
                r"(?i)(?:Subject|Paper|Course)[\s:\-.]{1,5}([A-Za-z0-9 \t.\-&/]{2,50})",
                r"(?i)(?:^|\n)\s*([A-Z][A-Za-z \t]{5,40})\s+(?:Question Paper|Question|Paper|Exam|Test|Assignment|Midterm|Final)",
            ],
            question_type_patterns: vec![
                r"(?i)(Multiple\s+Choice|MCQ|Short\s+Answer|Long\s+Answer|Essay|True/False|Fill\s+in\s+the\s+Blanks)",
            ],
            class_pattern: r"(?i)(?:Class|Grade|Standard)[\s:\-.]{1,5}([A-Za-z0-9 \t.\-]{1,30})",
            section_pattern: r"(?i)(?:Section|Div)[\s:\-.]{1,5}([A-Za-z0-9 \t.\-]{1,10})",
            exam_date_pattern: r"(?i)(?:Date|Exam Date)[\s:\-.]{1,5}([0-9]{1,2}[/\-.][0-9]{1,2}[/\-.][0-9]{2,4})",
            exam_duration_pattern: r"(?i)(?:Duration|Time)[\s:\-.]{1,5}([0-9]{1,2}\s*hours?|[0-9]{1,2}:[0-9]{2}|[0-9]{1,2}\s*h\s*[0-9]{1,2}\s*m)",
            annotated_question_pattern: r"(?is)(?:^|\n)\s*(?:Q(?:uestion)?\.?\s*)?(\d{1,3})[.:)\-\s]\s*(.+?)\s*\(([0-9]+)\s*marks?\)",
            numbered_block_start_pattern: r"(?i)(?:^|\n)\s*(?:Q(?:uestion)?\.?\s*|#\s*)?(\d{1,3})[.:)\-\s]\s*",
            numbered_block_boundary_pattern: r"(?i)\n\s*(?:Q(?:uestion)?\.?\s*\d+|#\s*\d+|\d{1,3}[.:)\-])",
            mark_annotation_pattern: r"(?i)\([0-9]+\s*marks?\)",
            single_line_question_pattern: r"(?i)(?:^|\n)\s*(?:Q(?:uestion)?\.?\s*)?(\d{1,3})[.:)\-\s]\s*([^\n]+)",
            numbered_block_min_chars: 11,
            single_line_min_chars: 6,
            question_policy: QuestionTierPolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extraction_defaults_follow_rasterizer_dpi() {
        let options = ExtractionOptions::default();
        assert_eq!(options.dpi, DEFAULT_DPI);
        assert_eq!(options.language, "eng");
        assert!(options.max_concurrent_pages >= 1);
    }

    #[test]
    fn empty_record_serializes_to_empty_map() {
        let json = serde_json::to_value(FieldRecord::default()).expect("record serializes");
        assert_eq!(json, serde_json::json!({}));
    }

    #[test]
    fn class_field_uses_plain_key() {
        let record = FieldRecord {
            class_name: Some("10".to_string()),
            ..FieldRecord::default()
        };

        let json = serde_json::to_value(&record).expect("record serializes");
        assert_eq!(json, serde_json::json!({ "class": "10" }));
        assert_eq!(record.present_fields(), vec![FieldName::Class]);
    }

    #[test]
    fn parsed_fields_render_lists_as_json_text() {
        let record = FieldRecord {
            name: Some("Ada".to_string()),
            question_types: vec!["Essay".to_string()],
            ..FieldRecord::default()
        };

        let parsed = record.to_parsed_fields();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].field_name, "name");
        assert_eq!(parsed[0].value, "Ada");
        assert_eq!(parsed[1].field_name, "question_types");
        assert_eq!(parsed[1].value, r#"["Essay"]"#);
    }
}
