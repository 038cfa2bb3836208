use crate::error::ParseError;
use crate::models::{FieldRecord, ParserOptions};
use crate::questions::{compile, QuestionExtractor};
use regex::Regex;
use std::collections::BTreeSet;

/// Ordered patterns for one scalar field. The first pattern that matches
/// anywhere in the text decides the value; later patterns are not evaluated.
#[derive(Debug, Clone)]
pub struct ScalarCascade {
    field: &'static str,
    patterns: Vec<Regex>,
}

impl ScalarCascade {
    pub fn new(field: &'static str, sources: &[&str]) -> Result<Self, ParseError> {
        let patterns = sources
            .iter()
            .map(|source| compile(field, source))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { field, patterns })
    }

    pub fn field(&self) -> &'static str {
        self.field
    }

    pub fn resolve(&self, text: &str) -> Option<String> {
        self.patterns
            .iter()
            .find_map(|pattern| pattern.captures(text))
            .and_then(|captures| captures.get(1).map(|value| value.as_str().trim().to_string()))
            .filter(|value| !value.is_empty())
    }
}

/// One fixed pattern, no fallback.
#[derive(Debug, Clone)]
struct SinglePattern(Regex);

impl SinglePattern {
    fn resolve(&self, text: &str) -> Option<String> {
        self.0
            .captures(text)
            .and_then(|captures| captures.get(1).map(|value| value.as_str().trim().to_string()))
            .filter(|value| !value.is_empty())
    }
}

/// Turns the OCR text of one page into a sparse [`FieldRecord`].
///
/// All patterns are compiled once in [`FieldParser::new`]; the parser holds no
/// mutable state and can be shared across pages and documents.
#[derive(Debug, Clone)]
pub struct FieldParser {
    name: ScalarCascade,
    marks: ScalarCascade,
    subject: ScalarCascade,
    question_types: Vec<Regex>,
    class_name: SinglePattern,
    section: SinglePattern,
    exam_date: SinglePattern,
    exam_duration: SinglePattern,
    questions: QuestionExtractor,
}

impl FieldParser {
    pub fn new(options: ParserOptions) -> Result<Self, ParseError> {
        let question_types = options
            .question_type_patterns
            .iter()
            .map(|source| compile("question_types", source))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            name: ScalarCascade::new("name", &options.name_patterns)?,
            marks: ScalarCascade::new("marks", &options.marks_patterns)?,
            subject: ScalarCascade::new("subject", &options.subject_patterns)?,
            question_types,
            class_name: SinglePattern(compile("class", options.class_pattern)?),
            section: SinglePattern(compile("section", options.section_pattern)?),
            exam_date: SinglePattern(compile("exam_date", options.exam_date_pattern)?),
            exam_duration: SinglePattern(compile("exam_duration", options.exam_duration_pattern)?),
            questions: QuestionExtractor::new(&options)?,
        })
    }

    pub fn questions(&self) -> &QuestionExtractor {
        &self.questions
    }

    pub fn parse(&self, text: &str) -> FieldRecord {
        FieldRecord {
            name: self.name.resolve(text),
            subject: self.subject.resolve(text),
            marks: self.marks.resolve(text),
            questions: self.questions.extract(text),
            question_types: self.find_question_types(text),
            class_name: self.class_name.resolve(text),
            section: self.section.resolve(text),
            exam_date: self.exam_date.resolve(text),
            exam_duration: self.exam_duration.resolve(text),
        }
    }

    /// Union of every match of every question-type pattern.
    fn find_question_types(&self, text: &str) -> Vec<String> {
        self.question_types
            .iter()
            .flat_map(|pattern| {
                pattern.captures_iter(text).filter_map(|captures| {
                    captures
                        .get(1)
                        .or_else(|| captures.get(0))
                        .map(|found| found.as_str().to_string())
                })
            })
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}
