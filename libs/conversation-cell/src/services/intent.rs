use crate::models::DiagnosticState;

pub const BOOK_TESTS_TRIGGER: &str = "book medical tests";
pub const BOOK_APPOINTMENT_TRIGGER: &str = "book an appointment";

pub const SMALL_TALK_VOCABULARY: [&str; 12] = [
    "hi", "hello", "hey", "help", "what", "how", "ok", "okay", "yes", "no", "thanks", "thank you",
];

const SMALL_TALK_MAX_LEN: usize = 3;

pub const ONBOARDING_PROMPT: &str = "I'm here to help you understand your symptoms and find the right care. \
Please describe what you're experiencing in a sentence or two, for example: \
\"I have had a headache and fever since yesterday.\"";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    BookTests,
    BookAppointment,
    AnswerQuestion,
    SmallTalk,
    DescribeSymptoms,
}

/// Short greetings and acknowledgements that should not start a diagnosis.
pub fn is_small_talk(content: &str) -> bool {
    let lowered = content.trim().to_lowercase();

    if lowered.chars().count() <= SMALL_TALK_MAX_LEN {
        return true;
    }

    SMALL_TALK_VOCABULARY.iter().any(|word| {
        lowered == *word
            || lowered
                .strip_prefix(word)
                .and_then(|rest| rest.chars().next())
                .is_some_and(|next| !next.is_alphanumeric())
    })
}

/// First match wins: booking phrases, a pending question, small talk, then
/// anything else is taken as a symptom description.
pub fn classify(content: &str, state: &DiagnosticState) -> Intent {
    let lowered = content.to_lowercase();

    if lowered.contains(BOOK_TESTS_TRIGGER) {
        return Intent::BookTests;
    }
    if lowered.contains(BOOK_APPOINTMENT_TRIGGER) {
        return Intent::BookAppointment;
    }
    if state.pending().is_some() {
        return Intent::AnswerQuestion;
    }
    if is_small_talk(content) {
        return Intent::SmallTalk;
    }

    Intent::DescribeSymptoms
}
