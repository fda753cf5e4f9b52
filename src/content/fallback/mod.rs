use super::{MessageKind, Topic};

/// Built-in topics as `(name, description)`.
pub const TOPICS: &[(&str, &str)] = &[
    ("Weekend plans", "What each person is planning to do on the weekend"),
    ("Food", "Favourite dishes, restaurants and something cooked recently"),
    ("Work routine", "How the week is going at work and what keeps them busy"),
    ("Travel", "Places visited recently or a trip being planned"),
    ("Series and movies", "Something watched lately and recommendations"),
    ("Weather", "How the weather has been and how it changes their plans"),
    ("Sports", "A recent game, a team they follow or exercise habits"),
    ("Music", "Songs or artists they have been listening to"),
    ("Family", "Catching up on family news and get-togethers"),
    ("Pets", "Stories about their pets or a pet they would like to have"),
];

const GREETINGS: &[&str] = &[
    "Hi! How are you doing?",
    "Hey, good morning! All good over there?",
    "Hello! Long time no talk, how have you been?",
    "Hi there! How's your day going?",
    "Hey! Hope you're having a good week.",
];

const GREETING_REPLIES: &[&str] = &[
    "Hi! I'm good, thanks. And you?",
    "Hey! All good here, busy but fine. How about you?",
    "Hello! Doing well, thanks for asking.",
    "Hi! Great to hear from you. Everything fine here.",
    "Hey, good to hear from you! I'm doing great.",
];

const FOLLOW_UPS: &[&str] = &[
    "Did you do anything fun lately?",
    "Any plans for the next few days?",
    "How's work treating you this week?",
    "Have you watched anything good recently?",
    "Tried any new place to eat lately?",
];

const REPLIES: &[&str] = &[
    "Not much, just resting a bit and catching up on things.",
    "Yes! I went out with some friends, it was really nice.",
    "Work has been busy, but it's going well.",
    "I started a new series, I'll tell you about it later.",
    "Nothing special, keeping it simple this week.",
];

const CLOSINGS: &[&str] = &[
    "Great talking to you! Talk later.",
    "I need to go now, but let's chat again soon!",
    "Nice catching up. Have a great day!",
    "Ok, I'll get back to work. Bye for now!",
    "Talk to you soon, take care!",
];

/// Built-in message pool for a script step.
pub fn messages_for(kind: MessageKind) -> &'static [&'static str] {
    match kind {
        MessageKind::Greeting => GREETINGS,
        MessageKind::GreetingReply => GREETING_REPLIES,
        MessageKind::FollowUp => FOLLOW_UPS,
        MessageKind::Reply => REPLIES,
        MessageKind::Closing => CLOSINGS,
    }
}

/// Uniformly pick a fallback message. Non-empty caller templates replace
/// the built-in pool for every kind.
pub fn pick_message(kind: MessageKind, templates: &[String]) -> String {
    let usable: Vec<&String> = templates.iter().filter(|t| !t.trim().is_empty()).collect();
    if usable.is_empty() {
        let pool = messages_for(kind);
        pool[fastrand::usize(..pool.len())].to_string()
    } else {
        usable[fastrand::usize(..usable.len())].trim().to_string()
    }
}

pub fn random_topic() -> Topic {
    let (name, description) = TOPICS[fastrand::usize(..TOPICS.len())];
    Topic {
        name: name.to_string(),
        description: description.to_string(),
    }
}
