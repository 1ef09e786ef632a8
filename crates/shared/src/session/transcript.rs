use crate::messages::{ChatMessage, Role};

/// Human word count at or above which a transcript is worth evaluating.
pub const SUBSTANTIVE_WORD_COUNT: usize = 20;

const FEEDBACK_KEYWORDS: &[&str] = &[
    "feedback",
    "performance",
    "deadline",
    "expect",
    "impact",
    "improve",
    "behavior",
    "behaviour",
    "situation",
    "goal",
    "concern",
    "action plan",
    "next step",
    "support",
    "appreciate",
    "well done",
    "great job",
];

pub fn human_turns(messages: &[ChatMessage]) -> impl Iterator<Item = &ChatMessage> {
    messages
        .iter()
        .filter(|message| message.role == Role::Human)
}

pub fn human_turn_count(messages: &[ChatMessage]) -> usize {
    human_turns(messages).count()
}

pub fn human_word_count(messages: &[ChatMessage]) -> usize {
    human_turns(messages)
        .map(|message| message.content.split_whitespace().count())
        .sum()
}

pub fn mentions_feedback_keyword(messages: &[ChatMessage]) -> bool {
    human_turns(messages).any(|message| {
        let lowered = message.content.to_lowercase();
        FEEDBACK_KEYWORDS
            .iter()
            .any(|keyword| lowered.contains(keyword))
    })
}

pub fn is_substantive(messages: &[ChatMessage]) -> bool {
    human_word_count(messages) >= SUBSTANTIVE_WORD_COUNT || mentions_feedback_keyword(messages)
}

/// Case-insensitive substring match against the configured trigger phrase.
pub fn is_end_signal(input: &str, trigger: &str) -> bool {
    let trigger = trigger.trim();
    !trigger.is_empty() && input.to_lowercase().contains(&trigger.to_lowercase())
}
