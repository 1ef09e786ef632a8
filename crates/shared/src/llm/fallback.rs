use super::contracts::{Feedback, ScoredDimension};
use super::validation::parse_feedback;

/// Why a zero-scored feedback template was returned instead of an evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackReason {
    NoHumanInput,
    InsufficientTurns,
    InsufficientContent,
    Unparseable,
}

impl FallbackReason {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NoHumanInput => "no_human_input",
            Self::InsufficientTurns => "insufficient_turns",
            Self::InsufficientContent => "insufficient_content",
            Self::Unparseable => "unparseable",
        }
    }

    fn dimension_note(self) -> &'static str {
        match self {
            Self::NoHumanInput => "No input was provided by the manager, so this could not be assessed.",
            Self::InsufficientTurns => {
                "Not enough conversation turns yet to assess this dimension."
            }
            Self::InsufficientContent => {
                "The conversation did not contain enough substantive feedback to assess this dimension."
            }
            Self::Unparseable => "The evaluation could not be generated for this conversation.",
        }
    }

    fn overall(self) -> Vec<String> {
        let remarks: &[&str] = match self {
            Self::NoHumanInput => &[
                "You ended the conversation before saying anything.",
                "Start by describing the situation and the behavior you observed, then end the conversation again.",
            ],
            Self::InsufficientTurns => &[
                "Have a few more exchanges with the employee before ending the conversation.",
                "Describe the situation, the behavior and its impact, then agree on next steps.",
            ],
            Self::InsufficientContent => &[
                "Your messages were too short to evaluate.",
                "Give specific feedback: the situation, the behavior, its impact and a clear action plan.",
            ],
            Self::Unparseable => &[
                "We could not produce a structured evaluation this time.",
                "Try ending the conversation again, or start a new one.",
            ],
        };
        remarks.iter().map(ToString::to_string).collect()
    }
}

pub fn fallback_feedback(reason: FallbackReason) -> Feedback {
    let note = reason.dimension_note();
    Feedback {
        sbi_usage: ScoredDimension::zero(note),
        action_plan: ScoredDimension::zero(note),
        balance: ScoredDimension::zero(note),
        overall: reason.overall(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackSource {
    ModelOutput,
    Fallback(FallbackReason),
}

#[derive(Debug, Clone)]
pub struct FeedbackResolution {
    pub feedback: Feedback,
    pub source: FeedbackSource,
}

impl FeedbackResolution {
    pub fn fallback(reason: FallbackReason) -> Self {
        Self {
            feedback: fallback_feedback(reason),
            source: FeedbackSource::Fallback(reason),
        }
    }
}

/// Turns evaluator output into feedback, degrading to the `Unparseable`
/// template when the output is missing or does not match the contract.
pub fn resolve_feedback(model_output: Option<&str>) -> FeedbackResolution {
    match model_output.map(parse_feedback) {
        Some(Ok(feedback)) => FeedbackResolution {
            feedback,
            source: FeedbackSource::ModelOutput,
        },
        Some(Err(err)) => {
            tracing::warn!(error = %err, "evaluator output rejected, using fallback feedback");
            FeedbackResolution::fallback(FallbackReason::Unparseable)
        }
        None => FeedbackResolution::fallback(FallbackReason::Unparseable),
    }
}
