//! Question extraction.
//!
//! Three tiers of increasingly permissive patterns are evaluated in a fixed
//! order. Under [`QuestionTierPolicy::FirstSuccessfulTier`] the first tier that
//! yields at least one candidate is the only one used for the page: a single
//! annotated question suppresses the looser tiers entirely, even when they
//! would have found other questions. [`QuestionTierPolicy::MergeAllTiers`]
//! runs every tier instead. Either way the result is deduplicated on
//! normalized question text.

use crate::error::ParseError;
use crate::models::{ParserOptions, Question, QuestionTierPolicy};
use regex::Regex;
use std::collections::HashSet;

pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace('\u{a0}', " ")
}

/// Drops questions whose normalized, lower-cased text was already seen.
/// The first occurrence wins; `question_number` plays no part in the key.
pub fn dedup_questions(questions: Vec<Question>) -> Vec<Question> {
    let mut seen = HashSet::new();
    questions
        .into_iter()
        .filter(|question| seen.insert(normalize_whitespace(&question.question).to_lowercase()))
        .collect()
}

#[derive(Debug, Clone)]
pub enum QuestionTier {
    /// Numbered question terminated by an explicit `(N marks)` annotation.
    Annotated { pattern: Regex },
    /// Text from one question marker up to the next marker or end of text.
    NumberedBlock {
        start: Regex,
        boundary: Regex,
        annotation: Regex,
        min_chars: usize,
    },
    /// One numbered line.
    SingleLine { pattern: Regex, min_chars: usize },
}

impl QuestionTier {
    pub fn label(&self) -> &'static str {
        match self {
            QuestionTier::Annotated { .. } => "annotated",
            QuestionTier::NumberedBlock { .. } => "numbered_block",
            QuestionTier::SingleLine { .. } => "single_line",
        }
    }

    pub fn extract(&self, text: &str) -> Vec<Question> {
        match self {
            QuestionTier::Annotated { pattern } => pattern
                .captures_iter(text)
                .filter_map(|captures| {
                    let number = captures.get(1)?.as_str().trim();
                    let body = normalize_whitespace(captures.get(2)?.as_str());
                    Some(Question::new(number, body))
                })
                .collect(),
            QuestionTier::NumberedBlock {
                start,
                boundary,
                annotation,
                min_chars,
            } => numbered_blocks(text, start, boundary)
                .into_iter()
                .filter_map(|(number, body)| {
                    let collapsed = normalize_whitespace(body);
                    let stripped = annotation
                        .split(&collapsed)
                        .next()
                        .unwrap_or_default()
                        .trim()
                        .to_string();

                    (stripped.chars().count() >= *min_chars)
                        .then(|| Question::new(number.trim(), stripped))
                })
                .collect(),
            QuestionTier::SingleLine { pattern, min_chars } => pattern
                .captures_iter(text)
                .filter_map(|captures| {
                    let number = captures.get(1)?.as_str().trim();
                    let body = normalize_whitespace(captures.get(2)?.as_str());
                    (body.chars().count() >= *min_chars).then(|| Question::new(number, body))
                })
                .collect(),
        }
    }
}

/// Splits `text` into `(number, body)` pairs. Each body runs from the end of a
/// question marker to the start of the next boundary, or to the end of text.
/// The boundary is not consumed, so it can open the next block.
fn numbered_blocks<'t>(text: &'t str, start: &Regex, boundary: &Regex) -> Vec<(&'t str, &'t str)> {
    let mut blocks = Vec::new();
    let mut cursor = 0;

    while cursor <= text.len() {
        let Some(header) = start.captures_at(text, cursor) else {
            break;
        };
        let (Some(whole), Some(number)) = (header.get(0), header.get(1)) else {
            break;
        };

        let body_start = whole.end();
        let Some(first_char) = text[body_start..].chars().next() else {
            break;
        };

        // The body holds at least one character before a boundary may end it.
        let earliest_end = body_start + first_char.len_utf8();
        let body_end = boundary
            .find_at(text, earliest_end)
            .map(|found| found.start())
            .unwrap_or(text.len());

        blocks.push((number.as_str(), &text[body_start..body_end]));
        cursor = body_end.max(whole.start() + 1);
        while !text.is_char_boundary(cursor) {
            cursor += 1;
        }
    }

    blocks
}

#[derive(Debug, Clone)]
pub struct QuestionExtractor {
    tiers: Vec<QuestionTier>,
    policy: QuestionTierPolicy,
}

impl QuestionExtractor {
    pub fn new(options: &ParserOptions) -> Result<Self, ParseError> {
        let tiers = vec![
            QuestionTier::Annotated {
                pattern: compile("questions", options.annotated_question_pattern)?,
            },
            QuestionTier::NumberedBlock {
                start: compile("questions", options.numbered_block_start_pattern)?,
                boundary: compile("questions", options.numbered_block_boundary_pattern)?,
                annotation: compile("questions", options.mark_annotation_pattern)?,
                min_chars: options.numbered_block_min_chars,
            },
            QuestionTier::SingleLine {
                pattern: compile("questions", options.single_line_question_pattern)?,
                min_chars: options.single_line_min_chars,
            },
        ];

        Ok(Self {
            tiers,
            policy: options.question_policy,
        })
    }

    pub fn policy(&self) -> QuestionTierPolicy {
        self.policy
    }

    pub fn tiers(&self) -> &[QuestionTier] {
        &self.tiers
    }

    pub fn extract(&self, text: &str) -> Vec<Question> {
        let candidates = match self.policy {
            QuestionTierPolicy::FirstSuccessfulTier => self
                .tiers
                .iter()
                .map(|tier| tier.extract(text))
                .find(|found| !found.is_empty())
                .unwrap_or_default(),
            QuestionTierPolicy::MergeAllTiers => self
                .tiers
                .iter()
                .flat_map(|tier| tier.extract(text))
                .collect(),
        };

        dedup_questions(candidates)
    }
}

pub(crate) fn compile(field: &'static str, pattern: &str) -> Result<Regex, ParseError> {
    Regex::new(pattern).map_err(|source| ParseError::Pattern { field, source })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor(policy: QuestionTierPolicy) -> QuestionExtractor {
        let options = ParserOptions {
            question_policy: policy,
            ..ParserOptions::default()
        };
        QuestionExtractor::new(&options).expect("default patterns compile")
    }

    fn tier(extractor: &QuestionExtractor, label: &str) -> QuestionTier {
        extractor
            .tiers()
            .iter()
            .find(|tier| tier.label() == label)
            .cloned()
            .expect("tier exists")
    }

    #[test]
    fn annotated_tier_reads_number_and_text() {
        let text = "Name: John Smith\nQ1. What is 2+2? (5 marks)\nQ2. Explain gravity. (10 marks)";
        let questions = extractor(QuestionTierPolicy::FirstSuccessfulTier).extract(text);

        assert_eq!(
            questions,
            vec![
                Question::new("1", "What is 2+2?"),
                Question::new("2", "Explain gravity."),
            ]
        );
    }

    #[test]
    fn numbered_blocks_are_used_when_nothing_is_annotated() {
        let text = "1. Describe the water cycle in detail\n2. Explain the causes of\n   the French Revolution";
        let questions = extractor(QuestionTierPolicy::FirstSuccessfulTier).extract(text);

        assert_eq!(
            questions,
            vec![
                Question::new("1", "Describe the water cycle in detail"),
                Question::new("2", "Explain the causes of the French Revolution"),
            ]
        );
    }

    #[test]
    fn annotated_question_shadows_looser_tiers() {
        let text = "1. Define photosynthesis clearly (4 marks)\n\nSection B\n2) Write a short essay on your favourite book";
        let questions = extractor(QuestionTierPolicy::FirstSuccessfulTier).extract(text);

        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].question_number, "1");
        assert_eq!(questions[0].question, "Define photosynthesis clearly");
    }

    #[test]
    fn merge_policy_keeps_questions_from_every_tier() {
        let text = "1. Define photosynthesis clearly (4 marks)\n\nSection B\n2) Write a short essay on your favourite book";
        let questions = extractor(QuestionTierPolicy::MergeAllTiers).extract(text);

        assert!(questions
            .iter()
            .any(|question| question.question == "Define photosynthesis clearly"));
        assert!(questions
            .iter()
            .any(|question| question.question == "Write a short essay on your favourite book"));
    }

    #[test]
    fn short_blocks_are_discarded() {
        let extractor = extractor(QuestionTierPolicy::FirstSuccessfulTier);
        let block = tier(&extractor, "numbered_block");

        let found = block.extract("1. Too short\n2. Long enough to be kept as a question");
        assert_eq!(found, vec![Question::new("2", "Long enough to be kept as a question")]);

        let exactly_ten = block.extract("1. abcdefghij");
        assert!(exactly_ten.is_empty());
        let eleven = block.extract("1. abcdefghijk");
        assert_eq!(eleven.len(), 1);
    }

    #[test]
    fn numbered_block_strips_trailing_annotation() {
        let extractor = extractor(QuestionTierPolicy::FirstSuccessfulTier);
        let block = tier(&extractor, "numbered_block");

        let found = block.extract("3. Outline the plot of Hamlet (6 marks) and more");
        assert_eq!(found, vec![Question::new("3", "Outline the plot of Hamlet")]);
    }

    #[test]
    fn single_line_tier_applies_when_blocks_are_too_short() {
        let extractor = extractor(QuestionTierPolicy::FirstSuccessfulTier);
        let single = tier(&extractor, "single_line");

        assert_eq!(single.extract("4. abcdef"), vec![Question::new("4", "abcdef")]);
        assert!(single.extract("4. abcde").is_empty());
    }

    #[test]
    fn duplicate_questions_collapse_to_first_seen() {
        let questions = vec![
            Question::new("1", "What is  Energy?"),
            Question::new("2", "what is energy?"),
            Question::new("3", "What is power?"),
        ];

        let unique = dedup_questions(questions);
        assert_eq!(
            unique,
            vec![
                Question::new("1", "What is  Energy?"),
                Question::new("3", "What is power?"),
            ]
        );
    }

    #[test]
    fn repeated_annotated_questions_are_deduplicated() {
        let text = "1. State Newton's first law (2 marks)\n5. State   newton's FIRST law (2 marks)";
        let questions = extractor(QuestionTierPolicy::FirstSuccessfulTier).extract(text);

        assert_eq!(questions, vec![Question::new("1", "State Newton's first law")]);
    }

    #[test]
    fn text_without_markers_has_no_questions() {
        let questions = extractor(QuestionTierPolicy::FirstSuccessfulTier).extract("just some prose");
        assert!(questions.is_empty());
    }
}
