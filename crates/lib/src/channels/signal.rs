//! Signal channel: receive over the signal-cli REST API websocket, send via POST /v2/send.

use crate::channels::envelope::parse_envelope;
use crate::channels::handle::{ChannelError, ChannelHandle};
use crate::channels::inbound::InboundMessage;
use crate::config::SignalConfig;
use async_trait::async_trait;
use futures_util::StreamExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(60);
const SEND_TIMEOUT: Duration = Duration::from_secs(30);

/// Signal channel connector for one linked account.
pub struct SignalChannel {
    api_url: String,
    account: String,
    token: Option<String>,
    running: AtomicBool,
    client: reqwest::Client,
}

impl SignalChannel {
    pub fn new(config: &SignalConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(SEND_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            api_url: config.api_url.trim_end_matches('/').to_string(),
            account: config.phone_number.clone(),
            token: config.api_token.clone().filter(|t| !t.trim().is_empty()),
            running: AtomicBool::new(false),
            client,
        }
    }

    fn running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Websocket URL for receiving: http(s) base becomes ws(s), account number is path-encoded.
    pub fn receive_url(&self) -> String {
        let base = if let Some(rest) = self.api_url.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = self.api_url.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            self.api_url.clone()
        };
        format!("{}/v1/receive/{}", base, urlencoding::encode(&self.account))
    }

    /// Start the receive loop and forward messages to the bridge. Returns a handle to await on shutdown.
    pub fn start_inbound(
        self: Arc<Self>,
        inbound_tx: mpsc::Sender<InboundMessage>,
    ) -> JoinHandle<()> {
        self.running.store(true, Ordering::SeqCst);
        log::info!("signal channel: starting websocket receive loop");
        tokio::spawn(async move {
            run_receive_loop(self, inbound_tx).await;
        })
    }

    /// One websocket session, from connect until the stream ends.
    async fn receive_session(
        &self,
        inbound_tx: &mpsc::Sender<InboundMessage>,
    ) -> Result<SessionEnd, SessionError> {
        let mut request = self
            .receive_url()
            .into_client_request()
            .map_err(|e| SessionError::Connect(e.to_string()))?;
        if let Some(ref token) = self.token {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| SessionError::Connect(e.to_string()))?;
            request.headers_mut().insert("Authorization", value);
        }
        let (mut ws, _) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| SessionError::Connect(e.to_string()))?;
        log::info!("signal channel: websocket connected");

        while self.running() {
            let Some(frame) = ws.next().await else {
                return Ok(SessionEnd::Closed);
            };
            let frame = frame.map_err(|e| SessionError::Stream(e.to_string()))?;
            let text = match frame {
                Message::Text(t) => t,
                Message::Close(_) => return Ok(SessionEnd::Closed),
                _ => continue,
            };
            if serde_json::from_str::<serde_json::Value>(&text).is_err() {
                let head: String = text.chars().take(200).collect();
                log::warn!("signal channel: non-JSON frame: {}", head);
                continue;
            }
            // Only the envelope shape is logged; message bodies never are.
            log::debug!("signal channel: frame received ({} bytes)", text.len());
            let Some(msg) = parse_envelope(&text) else {
                continue;
            };
            if inbound_tx.send(msg).await.is_err() {
                return Ok(SessionEnd::InboundClosed);
            }
        }
        Ok(SessionEnd::Stopped)
    }

    async fn post_send(&self, body: serde_json::Value) -> Result<(), ChannelError> {
        let url = format!("{}/v2/send", self.api_url);
        let mut req = self.client.post(&url).json(&body);
        if let Some(ref token) = self.token {
            req = req.bearer_auth(token);
        }
        let res = req.send().await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(ChannelError::Api(format!("send failed: {} {}", status, body)));
        }
        Ok(())
    }
}

/// Why a receive session ended without an error.
enum SessionEnd {
    /// Server closed the stream.
    Closed,
    /// The bridge dropped its receiver.
    InboundClosed,
    /// `stop()` was called.
    Stopped,
}

enum SessionError {
    /// Never connected; backoff keeps growing.
    Connect(String),
    /// Connected, then the stream failed.
    Stream(String),
}

/// Next reconnect delay: doubles up to the cap.
fn next_backoff(current: Duration) -> Duration {
    (current * 2).min(MAX_BACKOFF)
}

async fn run_receive_loop(channel: Arc<SignalChannel>, inbound_tx: mpsc::Sender<InboundMessage>) {
    let mut delay = INITIAL_BACKOFF;
    while channel.running() {
        match channel.receive_session(&inbound_tx).await {
            Ok(SessionEnd::Stopped) => break,
            Ok(SessionEnd::InboundClosed) => {
                log::debug!("signal channel: inbound channel closed, stopping loop");
                return;
            }
            Ok(SessionEnd::Closed) => {
                delay = INITIAL_BACKOFF;
                log::warn!("signal channel: websocket closed, reconnecting in {:?}", delay);
            }
            Err(SessionError::Stream(e)) => {
                delay = INITIAL_BACKOFF;
                log::error!("signal channel: websocket error: {}, reconnecting in {:?}", e, delay);
            }
            Err(SessionError::Connect(e)) => {
                log::error!("signal channel: connect failed: {}, reconnecting in {:?}", e, delay);
            }
        }
        if !channel.running() {
            break;
        }
        tokio::time::sleep(delay).await;
        delay = next_backoff(delay);
    }
    log::info!("signal channel: receive loop stopped");
}

#[async_trait]
impl ChannelHandle for SignalChannel {
    fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    async fn send_to_chat(&self, chat_id: &str, is_group: bool, text: &str) -> Result<(), ChannelError> {
        let body = if is_group {
            log::info!("signal: sending to group {}", chat_id);
            serde_json::json!({ "number": self.account, "message": text, "groupId": chat_id })
        } else {
            log::info!("signal: sending to chat {}", chat_id);
            serde_json::json!({ "number": self.account, "message": text, "recipients": [chat_id] })
        };
        self.post_send(body).await
    }

    async fn send_direct(&self, recipient: &str, text: &str) -> Result<(), ChannelError> {
        log::info!("signal: sending DM to {}", recipient);
        let body = serde_json::json!({ "number": self.account, "message": text, "recipients": [recipient] });
        self.post_send(body).await
    }
}
