//! The canned conversation run when no subcommand is given.

use crate::providers::Message;

pub const SESSION_ID: &str = "chat1";
pub const QUESTION: &str = "What ice cream do I like?";

pub fn history() -> Vec<Message> {
    vec![
        Message::system("You are helpful."),
        Message::human("Hi, I'm John."),
        Message::ai("Hello John!"),
        Message::human("I like tapioca ice cream."),
    ]
}
