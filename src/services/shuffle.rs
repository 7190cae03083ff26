// Shuffle engine
// Regenerates a test with randomized question order and randomized MCQ options

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::model::{Id, McqQuestion, Question, Test, NO_ANSWER};
use crate::traits::TimeProvider;

/// Outcome of the shuffle precondition check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShuffleValidation {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ShuffleValidation {
    fn ok() -> Self {
        Self {
            valid: true,
            error: None,
        }
    }

    fn refused(message: &str) -> Self {
        Self {
            valid: false,
            error: Some(message.to_string()),
        }
    }
}

/// A test can be shuffled as long as it exists and has at least one question.
pub fn validate_shuffle(test: Option<&Test>) -> ShuffleValidation {
    match test {
        None => ShuffleValidation::refused("No master test provided."),
        Some(t) if t.questions.is_empty() => {
            ShuffleValidation::refused("Master test contains no questions.")
        }
        Some(_) => ShuffleValidation::ok(),
    }
}

/// Fisher-Yates: walks `i` from the end down to 1, swapping with a uniform
/// index in `[0, i]`.
pub fn shuffle_in_place<T, R: Rng + ?Sized>(items: &mut [T], rng: &mut R) {
    items.shuffle(rng);
}

/// Returns a copy of `question` with its options permuted and the correct
/// answer remapped by value. With duplicate option texts the first match wins.
pub fn shuffle_question_options<R: Rng + ?Sized>(question: &McqQuestion, rng: &mut R) -> McqQuestion {
    if question.options.is_empty() {
        return question.clone();
    }

    let correct_value = usize::try_from(question.correct_answer)
        .ok()
        .and_then(|i| question.options.get(i))
        .cloned();

    let mut options = question.options.clone();
    shuffle_in_place(&mut options, rng);

    let correct_answer = correct_value
        .and_then(|value| options.iter().position(|o| *o == value))
        .map(|i| i as i32)
        .unwrap_or(NO_ANSWER);

    McqQuestion {
        options,
        correct_answer,
        ..question.clone()
    }
}

/// Only top-level MCQs get their options shuffled; every other kind, and all
/// nested sub-questions, are copied as they are.
fn shuffle_question<R: Rng + ?Sized>(question: &Question, rng: &mut R) -> Question {
    match question {
        Question::Mcq(mcq) => Question::Mcq(shuffle_question_options(mcq, rng)),
        Question::Reading(_)
        | Question::FillInTheBlank(_)
        | Question::Writing(_)
        | Question::Unsupported(_) => question.clone(),
    }
}

/// Produces shuffled variants of a master test.
pub struct ShuffleEngine<T: TimeProvider> {
    time: T,
}

impl<T: TimeProvider> ShuffleEngine<T> {
    pub fn new(time: T) -> Self {
        Self { time }
    }

    /// Generates the shuffled variants (currently always exactly one). The
    /// source test is never modified.
    pub fn generate_tests<R: Rng + ?Sized>(&self, master: &Test, rng: &mut R) -> Vec<Test> {
        let mut questions = master.questions.clone();
        shuffle_in_place(&mut questions, rng);
        let questions: Vec<Question> = questions
            .iter()
            .map(|q| shuffle_question(q, rng))
            .collect();

        let today = self.time.today();
        let id = format!(
            "{}-{}",
            self.time.unix_timestamp_millis(),
            rng.gen_range(0..100_000)
        );

        let mut generated = Test::new(
            Id::Text(id),
            format!("Generated Test {}", today),
            String::new(),
        )
        .with_questions(questions);
        generated.created_date = Some(today);

        tracing::info!(
            "Generated shuffled test {} from {} ({} questions)",
            generated.id,
            master.id,
            generated.questions.len()
        );

        vec![generated]
    }

    /// Same as [`generate_tests`](Self::generate_tests) using the thread RNG.
    pub fn generate_tests_random(&self, master: &Test) -> Vec<Test> {
        self.generate_tests(master, &mut rand::thread_rng())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::model::{
        FillInTheBlankQuestion, ReadingQuestion, SubQuestion, WritingQuestion,
    };
    use crate::test_utils::{mcq, sample_test};
    use crate::traits::MockTimeProvider;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashMap;

    fn engine() -> ShuffleEngine<MockTimeProvider> {
        ShuffleEngine::new(MockTimeProvider::from_millis(1_704_067_200_000))
    }

    #[test]
    fn test_validate_shuffle_rejects_missing_test() {
        let result = validate_shuffle(None);
        assert!(!result.valid);
        assert_eq!(result.error.as_deref(), Some("No master test provided."));
    }

    #[test]
    fn test_validate_shuffle_rejects_empty_test() {
        let test = Test::new(Id::Number(1), "Empty", "");
        let result = validate_shuffle(Some(&test));
        assert!(!result.valid);
        assert_eq!(
            result.error.as_deref(),
            Some("Master test contains no questions.")
        );
    }

    #[test]
    fn test_validate_shuffle_accepts_single_question() {
        let test = Test::new(Id::Number(1), "One", "")
            .with_questions(vec![mcq(1, "<p>q</p>", &["a", "b"], 0)]);
        assert_eq!(validate_shuffle(Some(&test)), ShuffleValidation::ok());
    }

    #[test]
    fn test_shuffle_in_place_is_a_permutation() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut items: Vec<u32> = (0..20).collect();
        shuffle_in_place(&mut items, &mut rng);

        let mut sorted = items.clone();
        sorted.sort();
        assert_eq!(sorted, (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn test_shuffle_in_place_handles_tiny_slices() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut empty: Vec<u8> = vec![];
        shuffle_in_place(&mut empty, &mut rng);
        assert!(empty.is_empty());

        let mut one = vec![7];
        shuffle_in_place(&mut one, &mut rng);
        assert_eq!(one, vec![7]);
    }

    #[test]
    fn test_shuffle_in_place_reaches_every_position() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut first_positions: HashMap<u32, usize> = HashMap::new();

        for _ in 0..2000 {
            let mut items = vec![0u32, 1, 2, 3];
            shuffle_in_place(&mut items, &mut rng);
            *first_positions.entry(items[0]).or_default() += 1;
        }

        // Each element should lead roughly a quarter of the time.
        for value in 0..4 {
            let count = first_positions.get(&value).copied().unwrap_or(0);
            assert!(count > 350 && count < 650, "value {} led {} times", value, count);
        }
    }

    #[test]
    fn test_generate_preserves_cardinality() {
        let master = sample_test();
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let generated = engine().generate_tests(&master, &mut rng);
            assert_eq!(generated.len(), 1);
            assert_eq!(generated[0].questions.len(), master.questions.len());
            assert_eq!(generated[0].question_count, Some(master.questions.len()));
        }
    }

    #[test]
    fn test_generate_preserves_correct_option_value() {
        let master = sample_test();
        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let generated = engine().generate_tests(&master, &mut rng).remove(0);

            for question in &generated.questions {
                if let Question::Mcq(shuffled) = question {
                    let original = match master.find_question(&shuffled.id) {
                        Some(Question::Mcq(q)) => q,
                        other => panic!("unexpected source question {:?}", other),
                    };
                    assert_eq!(
                        shuffled.options[shuffled.correct_answer as usize],
                        original.options[original.correct_answer as usize]
                    );
                    let mut a = shuffled.options.clone();
                    let mut b = original.options.clone();
                    a.sort();
                    b.sort();
                    assert_eq!(a, b);
                }
            }
        }
    }

    #[test]
    fn test_generate_passes_other_kinds_through() {
        let master = sample_test();
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let generated = engine().generate_tests(&master, &mut rng).remove(0);

            for question in &generated.questions {
                if !matches!(question, Question::Mcq(_)) {
                    let id = question.id().unwrap();
                    assert_eq!(Some(question), master.find_question(id));
                }
            }
        }
    }

    #[test]
    fn test_generate_does_not_mutate_master() {
        let master = sample_test();
        let before = master.clone();
        let mut rng = StdRng::seed_from_u64(3);
        let _ = engine().generate_tests(&master, &mut rng);
        assert_eq!(master, before);
    }

    #[test]
    fn test_generate_sets_identity_and_metadata() {
        let master = sample_test();
        let mut rng = StdRng::seed_from_u64(9);
        let generated = engine().generate_tests(&master, &mut rng).remove(0);

        assert_ne!(generated.id, master.id);
        let id = generated.id.to_string();
        assert!(id.starts_with("1704067200000-"), "id was {}", id);
        assert_eq!(generated.name, "Generated Test 2024-01-01");
        assert_eq!(generated.created_date.as_deref(), Some("2024-01-01"));
    }

    #[test]
    fn test_shuffle_question_options_invalid_correct_answer() {
        let question = McqQuestion {
            id: Id::Number(1),
            text: "q".to_string(),
            options: vec!["a".to_string(), "b".to_string()],
            correct_answer: NO_ANSWER,
        };
        let mut rng = StdRng::seed_from_u64(5);
        let shuffled = shuffle_question_options(&question, &mut rng);
        assert_eq!(shuffled.correct_answer, NO_ANSWER);
    }

    #[test]
    fn test_shuffle_question_options_empty_options_unchanged() {
        let question = McqQuestion {
            id: Id::Number(1),
            text: "q".to_string(),
            options: vec![],
            correct_answer: 0,
        };
        let mut rng = StdRng::seed_from_u64(5);
        assert_eq!(shuffle_question_options(&question, &mut rng), question);
    }

    #[test]
    fn test_shuffle_question_options_duplicate_values_first_match_wins() {
        let question = McqQuestion {
            id: Id::Number(1),
            text: "q".to_string(),
            options: vec!["same".to_string(), "same".to_string()],
            correct_answer: 1,
        };
        for seed in 0..10 {
            let mut rng = StdRng::seed_from_u64(seed);
            let shuffled = shuffle_question_options(&question, &mut rng);
            assert_eq!(shuffled.correct_answer, 0);
        }
    }

    #[test]
    fn test_nested_sub_question_options_never_shuffled() {
        let subs = vec![SubQuestion {
            id: Id::Number(11),
            text: "s".to_string(),
            options: vec!["1".into(), "2".into(), "3".into(), "4".into()],
            correct_answer: 2,
        }];
        let master = Test::new(Id::Number(1), "Nested", "").with_questions(vec![
            Question::Reading(ReadingQuestion {
                id: Id::Number(2),
                title: None,
                passage: "<p>p</p>".to_string(),
                questions: subs.clone(),
            }),
            Question::FillInTheBlank(FillInTheBlankQuestion {
                id: Id::Number(3),
                title: None,
                passage: "{blank}".to_string(),
                questions: subs.clone(),
            }),
            Question::Writing(WritingQuestion {
                id: Id::Number(4),
                text: "w".to_string(),
                answer: "a".to_string(),
            }),
        ]);

        for seed in 0..10 {
            let mut rng = StdRng::seed_from_u64(seed);
            let generated = engine().generate_tests(&master, &mut rng).remove(0);
            for question in &generated.questions {
                if !question.sub_questions().is_empty() {
                    assert_eq!(question.sub_questions(), subs.as_slice());
                }
            }
        }
    }
}
