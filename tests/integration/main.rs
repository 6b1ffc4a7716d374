//! Integration tests for the Chatline hub.

mod helpers;

mod conversation_test;
mod hub_test;
mod message_test;
mod presence_test;
mod typing_test;
