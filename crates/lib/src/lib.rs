//! chat-helper core library: Signal channel, command grammar, content resolution, the
//! tool-using agent loop, reply routing and framing, used by the `chat-helper` CLI.

pub mod agent;
pub mod bridge;
pub mod channels;
pub mod command;
pub mod config;
pub mod content;
pub mod frame;
pub mod init;
pub mod llm;
pub mod prompt;
pub mod routing;
pub mod tools;
