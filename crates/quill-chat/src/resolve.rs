//! Decide how a submission lands in the turn list.

use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    turn::{Conversation, Target, Turn},
};

/// How a submission interacts with existing turns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionMode {
    /// Append a new turn
    Fresh,
    /// Re-issue the request for an existing turn, keeping its prompt
    Retry,
    /// Replace the turn at the index and drop every turn after it
    Edit,
}

/// A resolved submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Submission {
    pub mode: SubmissionMode,
    /// Turn index for retry and edit; `None` for a fresh append
    pub index: Option<usize>,
}

impl Submission {
    pub fn fresh() -> Self {
        Self {
            mode: SubmissionMode::Fresh,
            index: None,
        }
    }

    pub fn retry(index: usize) -> Self {
        Self {
            mode: SubmissionMode::Retry,
            index: Some(index),
        }
    }

    pub fn edit(index: usize) -> Self {
        Self {
            mode: SubmissionMode::Edit,
            index: Some(index),
        }
    }

    /// Resolve an explicit user action: an index with a retry flag, or a plain append
    pub fn explicit(index: Option<usize>, is_retry: bool) -> Self {
        match index {
            Some(index) if is_retry => Self::retry(index),
            Some(index) => Self::edit(index),
            None => Self::fresh(),
        }
    }

    /// Where stream events for this submission should land
    pub fn target(&self) -> Target {
        match self.index {
            Some(index) => Target::Index(index),
            None => Target::Last,
        }
    }

    /// Index the submission's turn will have, given the current turn count
    pub fn turn_index(&self, len: usize) -> usize {
        self.index.unwrap_or(len)
    }
}

/// Heuristics layered over explicit submissions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Treat a plain submission after a failed last turn as a retry of that turn
    pub auto_retry_failed: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            auto_retry_failed: true,
        }
    }
}

impl RetryPolicy {
    /// Rewrite a plain append into a retry or edit of a failed last turn.
    ///
    /// The same prompt retries the turn; a different prompt replaces it.
    pub fn apply(&self, turns: &[Turn], prompt: &str, submission: Submission) -> Submission {
        if !self.auto_retry_failed || submission.mode != SubmissionMode::Fresh {
            return submission;
        }
        match turns.last() {
            Some(last) if last.is_failed() => {
                let index = turns.len() - 1;
                if last.prompt == prompt {
                    Submission::retry(index)
                } else {
                    Submission::edit(index)
                }
            }
            _ => submission,
        }
    }
}

/// Resolve a submission against the current turns
pub fn resolve_submission(
    turns: &[Turn],
    prompt: &str,
    index: Option<usize>,
    is_retry: bool,
    policy: &RetryPolicy,
) -> Submission {
    policy.apply(turns, prompt, Submission::explicit(index, is_retry))
}

/// Check that a retry or edit names an existing turn
pub fn validate_submission(conv: &Conversation, submission: &Submission) -> Result<()> {
    match submission.index {
        Some(index) if index >= conv.turns.len() => Err(Error::InvalidTurnIndex {
            index,
            len: conv.turns.len(),
        }),
        _ => Ok(()),
    }
}

/// Perform the store change for a submission and return the target turn index
pub fn apply_submission(
    conv: &mut Conversation,
    submission: &Submission,
    prompt: &str,
) -> Result<usize> {
    validate_submission(conv, submission)?;

    Ok(match (submission.mode, submission.index) {
        (SubmissionMode::Retry, Some(index)) => {
            conv.reset_answer(index);
            index
        }
        (SubmissionMode::Edit, Some(index)) => conv.replace_from(index, Turn::new(prompt)),
        _ => conv.append_turn(prompt),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turns(prompts: &[&str]) -> Vec<Turn> {
        prompts.iter().map(|p| Turn::new(*p)).collect()
    }

    #[test]
    fn test_plain_submission_is_fresh() {
        let policy = RetryPolicy::default();
        let submission = resolve_submission(&turns(&["a"]), "b", None, false, &policy);
        assert_eq!(submission, Submission::fresh());
        assert_eq!(submission.target(), Target::Last);
    }

    #[test]
    fn test_explicit_retry_and_edit() {
        let policy = RetryPolicy::default();
        let all = turns(&["a", "b", "c"]);
        assert_eq!(
            resolve_submission(&all, "b", Some(1), true, &policy),
            Submission::retry(1)
        );
        assert_eq!(
            resolve_submission(&all, "b2", Some(1), false, &policy),
            Submission::edit(1)
        );
        assert_eq!(Submission::edit(1).target(), Target::Index(1));
    }

    #[test]
    fn test_failed_last_turn_triggers_auto_retry() {
        let policy = RetryPolicy::default();
        let mut all = turns(&["a", "b"]);
        all[1].error = Some("boom".into());

        assert_eq!(
            resolve_submission(&all, "b", None, false, &policy),
            Submission::retry(1)
        );
        assert_eq!(
            resolve_submission(&all, "something else", None, false, &policy),
            Submission::edit(1)
        );
    }

    #[test]
    fn test_auto_retry_can_be_disabled() {
        let policy = RetryPolicy {
            auto_retry_failed: false,
        };
        let mut all = turns(&["a"]);
        all[0].error = Some("boom".into());
        assert_eq!(
            resolve_submission(&all, "a", None, false, &policy),
            Submission::fresh()
        );
    }

    #[test]
    fn test_earlier_failure_does_not_trigger_auto_retry() {
        let policy = RetryPolicy::default();
        let mut all = turns(&["a", "b"]);
        all[0].error = Some("boom".into());
        assert_eq!(
            resolve_submission(&all, "c", None, false, &policy),
            Submission::fresh()
        );
    }

    #[test]
    fn test_apply_edit_truncates() {
        let mut conv = Conversation::default();
        for p in ["a", "b", "c", "d"] {
            conv.append_turn(p);
        }
        let index = apply_submission(&mut conv, &Submission::edit(1), "b2").unwrap();
        assert_eq!(index, 1);
        assert_eq!(conv.turns.len(), 2);
        assert_eq!(conv.turns[1].prompt, "b2");
    }

    #[test]
    fn test_apply_retry_keeps_prompt_and_length() {
        let mut conv = Conversation::default();
        conv.append_turn("a");
        conv.turns[0].error = Some("boom".into());
        conv.turns[0].response = "part".into();

        let index = apply_submission(&mut conv, &Submission::retry(0), "ignored").unwrap();
        assert_eq!(index, 0);
        assert_eq!(conv.turns.len(), 1);
        assert_eq!(conv.turns[0].prompt, "a");
        assert!(conv.turns[0].response.is_empty());
        assert!(conv.turns[0].error.is_none());
    }

    #[test]
    fn test_apply_out_of_range_index_fails() {
        let mut conv = Conversation::default();
        conv.append_turn("a");
        let result = apply_submission(&mut conv, &Submission::edit(3), "x");
        assert!(matches!(
            result,
            Err(Error::InvalidTurnIndex { index: 3, len: 1 })
        ));
        assert_eq!(conv.turns.len(), 1);
    }
}
