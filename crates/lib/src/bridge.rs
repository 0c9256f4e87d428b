//! Bridge runtime: take inbound messages, run each command as its own task, send the replies.
//!
//! Per message: access check, command parse, help short-circuit, content resolution,
//! acknowledgment, tool loop, framing, routing, send. Every failure ends at this boundary as
//! one best-effort reply or silence.

use anyhow::{Context, Result};
use chrono::Local;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::agent::{run_tool_loop, LoopSettings};
use crate::channels::{ChannelHandle, InboundMessage, SignalChannel};
use crate::command::{parse_command, CommandKind};
use crate::config::Config;
use crate::content::resolve_content;
use crate::frame;
use crate::llm::{LlmBackend, OllamaClient};
use crate::prompt;
use crate::routing::{AccessPolicy, AgentReply, Destination};
use crate::tools::{ToolExecutor, ToolRegistry};

const INBOUND_CAPACITY: usize = 64;
const RECEIVER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// How one inbound message was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationOutcome {
    /// Sender not in the allow-set; nothing sent.
    Denied,
    /// No command in the text; nothing sent.
    NoCommand,
    /// Help sent in-channel.
    Help,
    /// Expand/Condense without content; error reply sent.
    ContentMissing,
    /// Acknowledgment and framed answer sent.
    Replied,
    /// Model failed; acknowledgment and failure reply sent.
    Failed,
}

/// Everything one invocation needs. Shared read-only across concurrent invocations.
pub struct Bridge {
    policy: AccessPolicy,
    settings: LoopSettings,
    channel: Arc<dyn ChannelHandle>,
    backend: Arc<dyn LlmBackend>,
    tools: Arc<dyn ToolExecutor>,
}

impl Bridge {
    pub fn new(
        config: &Config,
        channel: Arc<dyn ChannelHandle>,
        backend: Arc<dyn LlmBackend>,
        tools: Arc<dyn ToolExecutor>,
    ) -> Self {
        Self {
            policy: AccessPolicy::from_config(config),
            settings: LoopSettings::from_config(&config.agent),
            channel,
            backend,
            tools,
        }
    }

    /// Handle one message start to finish.
    pub async fn handle_message(&self, msg: InboundMessage) -> InvocationOutcome {
        if !self.policy.is_allowed(&msg.source_id) {
            log::debug!("bridge: ignoring message from {} (not allowed)", msg.source_id);
            return InvocationOutcome::Denied;
        }
        if frame::is_own_output(&msg.text) {
            return InvocationOutcome::NoCommand;
        }
        let Some(command) = parse_command(&msg.text) else {
            return InvocationOutcome::NoCommand;
        };

        let tag = invocation_tag();
        log::info!(
            "[{}] {} (level {}) from {} in {} {}",
            tag,
            command.kind,
            command.level,
            msg.source_id,
            if msg.is_group { "group" } else { "chat" },
            msg.chat_id
        );

        if command.kind == CommandKind::Help {
            let reply = AgentReply {
                body: frame::help(self.policy.reply_mode()),
                destination: self.policy.help_destination(&msg),
            };
            self.deliver(&tag, &reply).await;
            return InvocationOutcome::Help;
        }

        let destination = self.policy.route(&msg);
        let Some(content) = resolve_content(msg.quote(), &command.remainder_text) else {
            log::info!("[{}] no content to act on", tag);
            let reply = AgentReply {
                body: frame::wrap(frame::CONTENT_MISSING),
                destination,
            };
            self.deliver(&tag, &reply).await;
            return InvocationOutcome::ContentMissing;
        };
        log::info!(
            "[{}] content: {} ({} chars)",
            tag,
            content.source_kind(),
            content.len()
        );

        let ack = AgentReply {
            body: frame::ACK_TEXT.to_string(),
            destination: destination.clone(),
        };
        self.deliver(&tag, &ack).await;

        let messages =
            prompt::initial_messages(command.kind, command.level, &content, Local::now().date_naive());
        let (body, outcome) = match run_tool_loop(
            self.backend.as_ref(),
            self.tools.as_ref(),
            &self.settings,
            messages,
            &tag,
        )
        .await
        {
            Ok(result) => {
                log::info!(
                    "[{}] answer: {} chars, {} tool call(s), {} model call(s)",
                    tag,
                    result.content.len(),
                    result.tool_calls.len(),
                    result.model_calls
                );
                let body = if result.content.is_empty() {
                    frame::EMPTY_ANSWER.to_string()
                } else {
                    result.content
                };
                (body, InvocationOutcome::Replied)
            }
            Err(e) => {
                log::error!("[{}] model failed: {}", tag, e);
                (frame::MODEL_FAILURE.to_string(), InvocationOutcome::Failed)
            }
        };

        let reply = AgentReply {
            body: frame::wrap(&body),
            destination,
        };
        self.deliver(&tag, &reply).await;
        outcome
    }

    /// Send one reply. Failures are logged; there is no one left to tell.
    async fn deliver(&self, tag: &str, reply: &AgentReply) -> bool {
        let res = match &reply.destination {
            Destination::Channel { chat_id, is_group } => {
                self.channel.send_to_chat(chat_id, *is_group, &reply.body).await
            }
            Destination::DirectMessage { recipient } => {
                self.channel.send_direct(recipient, &reply.body).await
            }
        };
        match res {
            Ok(()) => {
                log::debug!(
                    "[{}] sent {} chars to {} {}",
                    tag,
                    reply.body.chars().count(),
                    reply.destination.kind(),
                    reply.destination.id()
                );
                true
            }
            Err(e) => {
                log::error!(
                    "[{}] send to {} {} failed: {}",
                    tag,
                    reply.destination.kind(),
                    reply.destination.id(),
                    e
                );
                false
            }
        }
    }

    /// Intake loop: one task per message so slow invocations never block intake.
    /// Returns when the inbound channel closes.
    pub async fn run(self: Arc<Self>, mut inbound_rx: mpsc::Receiver<InboundMessage>) {
        while let Some(msg) = inbound_rx.recv().await {
            let bridge = Arc::clone(&self);
            tokio::spawn(async move {
                bridge.handle_message(msg).await;
            });
        }
        log::info!("bridge: inbound channel closed");
    }
}

/// Short correlation id for one invocation's log lines.
fn invocation_tag() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}

/// Wire the Signal channel, the Ollama client and the tools, then run until SIGINT/SIGTERM.
pub async fn run_bridge(config: Config) -> Result<()> {
    config.validate()?;
    let config = Arc::new(config);
    log::info!(
        "starting chat-helper: account {} model {} (max {} tool iterations, fallback {})",
        config.signal.phone_number,
        config.agent.model,
        config.agent.max_tool_iterations,
        config.agent.tool_use_fallback
    );

    let ollama = OllamaClient::new(Some(config.agent.ollama_base_url.clone()));
    check_model_installed(&ollama, &config.agent.model).await;

    let tools = ToolRegistry::with_default_tools(&config.tools).context("registering tools")?;
    log::info!("tools: {}", tools.names().join(", "));
    if config.tools.brave_api_key.is_none() {
        log::warn!("BRAVE_API_KEY is not set; web_search calls will fail");
    }

    let signal = Arc::new(SignalChannel::new(&config.signal));
    let (inbound_tx, inbound_rx) = mpsc::channel::<InboundMessage>(INBOUND_CAPACITY);
    let receiver = Arc::clone(&signal).start_inbound(inbound_tx);

    let bridge = Arc::new(Bridge::new(
        &config,
        signal.clone(),
        Arc::new(ollama),
        Arc::new(tools),
    ));
    let intake = tokio::spawn(bridge.run(inbound_rx));

    shutdown_signal().await;
    log::info!("shutdown signal received, stopping signal channel");
    signal.stop();
    intake.abort();
    stop_receiver(receiver).await;
    log::info!("chat-helper stopped");
    Ok(())
}

/// Warn (never fail) when the configured model is missing or Ollama is unreachable.
async fn check_model_installed(ollama: &OllamaClient, model: &str) {
    match ollama.list_models().await {
        Ok(models) => {
            let installed = models
                .iter()
                .any(|m| m.name == model || m.name.strip_suffix(":latest") == Some(model));
            if installed {
                log::info!("ollama: model {} is installed", model);
            } else {
                log::warn!(
                    "ollama: model {} not found among {} installed model(s); run `ollama pull {}`",
                    model,
                    models.len(),
                    model
                );
            }
        }
        Err(e) => log::warn!("ollama: could not list models: {}", e),
    }
}

/// The receive loop may be parked on a websocket read; give it a moment, then abort.
async fn stop_receiver(mut receiver: JoinHandle<()>) {
    if tokio::time::timeout(RECEIVER_DRAIN_TIMEOUT, &mut receiver)
        .await
        .is_err()
    {
        log::debug!("signal receive loop still busy, aborting");
        receiver.abort();
    }
}

/// Completes on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
