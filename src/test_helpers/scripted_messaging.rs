//! In-memory message bus answering outbound calls from a script and
//! recording every call it receives.

use crate::messaging::{OutboundMessage, PlatformStatusResponse, RemoteError, Reply, TowerMessaging};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

/// How the bus answers a call
#[derive(Debug, Clone)]
pub enum Behavior {
    Ack,
    Status(PlatformStatusResponse),
    Fail(RemoteError),
    /// Never answer; the caller's timeout decides
    Hang,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub target: String,
    pub message: OutboundMessage,
}

#[derive(Debug)]
struct Rule {
    target: Option<String>,
    message_name: &'static str,
    behavior: Behavior,
}

#[derive(Debug, Default)]
struct Script {
    calls: Vec<RecordedCall>,
    rules: Vec<Rule>,
}

/// Cloneable: clones share the same script and call log
#[derive(Debug, Clone, Default)]
pub struct ScriptedMessaging {
    inner: Arc<Mutex<Script>>,
}

impl ScriptedMessaging {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every `message_name` call with `behavior`. Replaces a previous
    /// rule for the same message.
    pub fn respond(&self, message_name: &'static str, behavior: Behavior) -> &Self {
        self.set_rule(None, message_name, behavior)
    }

    /// Same as [`Self::respond`] restricted to calls toward `target`
    pub fn respond_to(
        &self,
        target: impl Into<String>,
        message_name: &'static str,
        behavior: Behavior,
    ) -> &Self {
        self.set_rule(Some(target.into()), message_name, behavior)
    }

    fn set_rule(
        &self,
        target: Option<String>,
        message_name: &'static str,
        behavior: Behavior,
    ) -> &Self {
        let mut script = self.inner.lock();
        script
            .rules
            .retain(|rule| !(rule.target == target && rule.message_name == message_name));
        script.rules.push(Rule {
            target,
            message_name,
            behavior,
        });
        drop(script);
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.inner.lock().calls.clone()
    }

    /// Messages named `message_name`, in send order
    pub fn sent(&self, message_name: &str) -> Vec<RecordedCall> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter(|call| call.message.message_name() == message_name)
            .cloned()
            .collect()
    }

    pub fn count(&self, message_name: &str) -> usize {
        self.sent(message_name).len()
    }

    pub fn clear_calls(&self) {
        self.inner.lock().calls.clear();
    }

    fn behavior_for(&self, target: &str, message: &OutboundMessage) -> Behavior {
        let name = message.message_name();
        let script = self.inner.lock();
        let targeted = script
            .rules
            .iter()
            .find(|rule| rule.message_name == name && rule.target.as_deref() == Some(target));
        let general = script
            .rules
            .iter()
            .find(|rule| rule.message_name == name && rule.target.is_none());
        targeted
            .or(general)
            .map(|rule| rule.behavior.clone())
            .unwrap_or(Behavior::Ack)
    }
}

#[async_trait]
impl TowerMessaging for ScriptedMessaging {
    async fn invoke(&self, target: &str, message: OutboundMessage) -> Result<Reply, RemoteError> {
        let behavior = self.behavior_for(target, &message);
        self.inner.lock().calls.push(RecordedCall {
            target: target.to_string(),
            message,
        });
        match behavior {
            Behavior::Ack => Ok(Reply::Ack),
            Behavior::Status(status) => Ok(Reply::PlatformStatus(status)),
            Behavior::Fail(e) => Err(e),
            Behavior::Hang => futures::future::pending().await,
        }
    }
}
