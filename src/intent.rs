//! Intent Router
//!
//! Separates casual chat from data questions. Anything that does not match a
//! conversational trigger is a data question; misrouting a greeting to the data
//! path fails gracefully, so ties resolve to data-seeking.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Conversational,
    DataSeeking,
}

/// Greeting and self-referential phrases that route to the chat branch.
const CONVERSATIONAL_TRIGGERS: &[&str] = &[
    "how are you",
    "what's up",
    "how do you feel",
    "tell me about yourself",
    "what can you do",
    "who are you",
    "introduce yourself",
    "are you gpt",
    "hello",
    "hi",
    "good morning",
    "good afternoon",
    "good evening",
    "hey",
];

pub fn classify(question: &str) -> Intent {
    let question_lower = question.to_lowercase();

    for trigger in CONVERSATIONAL_TRIGGERS {
        let matched = if trigger.contains(' ') {
            question_lower.contains(trigger)
        } else {
            // Single-word greetings match on word boundaries so "hi" does not
            // fire inside words like "machine" or "shift".
            question_lower
                .split(|c: char| !c.is_alphanumeric())
                .any(|word| word == *trigger)
        };
        if matched {
            return Intent::Conversational;
        }
    }

    Intent::DataSeeking
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn greetings_route_to_conversational() {
        assert_eq!(classify("hello"), Intent::Conversational);
        assert_eq!(classify("Hi there"), Intent::Conversational);
        assert_eq!(classify("good morning!"), Intent::Conversational);
        assert_eq!(classify("what can you do for me?"), Intent::Conversational);
    }

    #[test]
    fn triggers_are_case_insensitive() {
        assert_eq!(classify("HELLO"), Intent::Conversational);
        assert_eq!(classify("How Are You today"), Intent::Conversational);
        assert_eq!(classify("HEY"), Intent::Conversational);
    }

    #[test]
    fn data_questions_route_to_data_seeking() {
        assert_eq!(
            classify("what is the total production count for line 2"),
            Intent::DataSeeking
        );
        assert_eq!(
            classify("which machine has the highest downtime"),
            Intent::DataSeeking
        );
    }

    #[test]
    fn short_greeting_does_not_fire_inside_words() {
        // "machine" contains "hi", "shift" contains "hi"; neither is a greeting.
        assert_eq!(
            classify("machine downtime for the night shift"),
            Intent::DataSeeking
        );
        assert_eq!(classify("highest cycle time"), Intent::DataSeeking);
    }
}
