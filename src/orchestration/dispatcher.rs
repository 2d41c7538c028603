//! # Dispatcher
//!
//! Outbound request/response exchanges. Every call runs as its own task
//! bounded by the comms timeout and posts exactly one [`CallCompletion`]
//! back to the mailbox: a reply, a remote failure or a timeout.

use super::types::TowerEvent;
use crate::messaging::{AgentCategory, OutboundMessage, RemoteError, Reply, TowerMessaging};
use crate::models::{PlatformId, PsId};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

/// Which exchange a completion belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    PlatformAssignment { ps_id: PsId },
    ReadyPs { ps_id: PsId },
    DroneLanded { ps_id: PsId },
    PsCompleted { ps_id: PsId },
    PsAbortToMc { ps_id: PsId },
    PsAbortToPlatform { ps_id: PsId },
    Anomaly { ps_id: PsId },
    PlatformStatus { plt_id: PlatformId },
}

impl Call {
    /// Kind of agent on the other end
    pub fn party(&self) -> AgentCategory {
        match self {
            Self::PlatformAssignment { .. } | Self::PsCompleted { .. } | Self::PsAbortToMc { .. } => {
                AgentCategory::Mc
            }
            _ => AgentCategory::Platform,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CallOutcome {
    Replied(Reply),
    Failed(RemoteError),
    TimedOut,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallCompletion {
    pub target: String,
    pub call: Call,
    pub outcome: CallOutcome,
}

#[derive(Clone)]
pub struct Dispatcher {
    messaging: Arc<dyn TowerMessaging>,
    timeout: Duration,
    mailbox: mpsc::UnboundedSender<TowerEvent>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Dispatcher {
    pub fn new(
        messaging: Arc<dyn TowerMessaging>,
        timeout: Duration,
        mailbox: mpsc::UnboundedSender<TowerEvent>,
    ) -> Self {
        Self {
            messaging,
            timeout,
            mailbox,
        }
    }

    /// Fire the exchange; its outcome arrives later as a mailbox event
    pub fn send(&self, target: impl Into<String>, message: OutboundMessage, call: Call) {
        let target = target.into();
        debug!(
            target = %target,
            message = message.message_name(),
            ps_id = ?message.ps_id(),
            "->>"
        );

        let messaging = Arc::clone(&self.messaging);
        let mailbox = self.mailbox.clone();
        let timeout = self.timeout;
        tokio::spawn(async move {
            let outcome = match tokio::time::timeout(timeout, messaging.invoke(&target, message)).await
            {
                Ok(Ok(reply)) => CallOutcome::Replied(reply),
                Ok(Err(e)) => CallOutcome::Failed(e),
                Err(_) => CallOutcome::TimedOut,
            };
            let _ = mailbox.send(TowerEvent::CallCompleted(CallCompletion {
                target,
                call,
                outcome,
            }));
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::PsAbortIndication;
    use async_trait::async_trait;

    struct Fixed(Option<Result<Reply, RemoteError>>);

    #[async_trait]
    impl TowerMessaging for Fixed {
        async fn invoke(&self, _target: &str, _message: OutboundMessage) -> Result<Reply, RemoteError> {
            match &self.0 {
                Some(result) => result.clone(),
                None => futures::future::pending().await,
            }
        }
    }

    async fn outcome_of(messaging: Fixed) -> CallCompletion {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let dispatcher = Dispatcher::new(Arc::new(messaging), Duration::from_secs(10), tx);
        dispatcher.send(
            "MC1",
            OutboundMessage::PsAbort(PsAbortIndication { ps_id: 1 }),
            Call::PsAbortToMc { ps_id: 1 },
        );
        match rx.recv().await {
            Some(TowerEvent::CallCompleted(completion)) => completion,
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_reply_is_forwarded() {
        let completion = outcome_of(Fixed(Some(Ok(Reply::Ack)))).await;
        assert_eq!(completion.target, "MC1");
        assert_eq!(completion.call, Call::PsAbortToMc { ps_id: 1 });
        assert_eq!(completion.outcome, CallOutcome::Replied(Reply::Ack));
    }

    #[tokio::test(start_paused = true)]
    async fn test_remote_failure_is_forwarded() {
        let completion =
            outcome_of(Fixed(Some(Err(RemoteError::Rejected("no".to_string()))))).await;
        assert_eq!(
            completion.outcome,
            CallOutcome::Failed(RemoteError::Rejected("no".to_string()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_silence_times_out() {
        let completion = outcome_of(Fixed(None)).await;
        assert_eq!(completion.outcome, CallOutcome::TimedOut);
    }

    #[test]
    fn test_party() {
        assert_eq!(Call::PsAbortToMc { ps_id: 1 }.party(), AgentCategory::Mc);
        assert_eq!(Call::ReadyPs { ps_id: 1 }.party(), AgentCategory::Platform);
    }
}
