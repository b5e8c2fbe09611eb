//! Agent domain events.
//!
//! Events published while agents process work:
//! - `AgentCreatedEvent` - New agent configured
//! - `MessageAddedEvent` - Message appended to a conversation
//! - `ConversationCompletedEvent` - Agent produced a final response
//! - `TaskProcessedEvent` - Background task changed status

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{domain_event, EventMetadata};

// ════════════════════════════════════════════════════════════════════════════
// AgentCreatedEvent
// ════════════════════════════════════════════════════════════════════════════

/// Published when a new agent is configured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentCreatedEvent {
    #[serde(skip)]
    pub metadata: EventMetadata,

    pub agent_id: String,

    /// Display name of the agent.
    pub name: String,

    /// Model the agent is backed by (e.g. "gpt-4o").
    pub model: String,
}

impl AgentCreatedEvent {
    pub fn new(
        agent_id: impl Into<String>,
        name: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            metadata: EventMetadata::new(),
            agent_id: agent_id.into(),
            name: name.into(),
            model: model.into(),
        }
    }
}

domain_event!(AgentCreatedEvent);

// ════════════════════════════════════════════════════════════════════════════
// MessageAddedEvent
// ════════════════════════════════════════════════════════════════════════════

/// Published when a message is appended to a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageAddedEvent {
    #[serde(skip)]
    pub metadata: EventMetadata,

    pub conversation_id: String,

    /// Author role ("user", "assistant", "system").
    pub role: String,

    pub content: String,
}

impl MessageAddedEvent {
    pub fn new(
        conversation_id: impl Into<String>,
        role: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            metadata: EventMetadata::new(),
            conversation_id: conversation_id.into(),
            role: role.into(),
            content: content.into(),
        }
    }
}

domain_event!(MessageAddedEvent);

// ════════════════════════════════════════════════════════════════════════════
// ConversationCompletedEvent
// ════════════════════════════════════════════════════════════════════════════

/// Published when the agent produces its final response for a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationCompletedEvent {
    #[serde(skip)]
    pub metadata: EventMetadata,

    pub conversation_id: String,

    pub response: String,

    /// Model-reported confidence in the range 0.0..=1.0.
    pub confidence: f64,
}

impl ConversationCompletedEvent {
    pub fn new(
        conversation_id: impl Into<String>,
        response: impl Into<String>,
        confidence: f64,
    ) -> Self {
        Self {
            metadata: EventMetadata::new(),
            conversation_id: conversation_id.into(),
            response: response.into(),
            confidence,
        }
    }
}

domain_event!(ConversationCompletedEvent);

// ════════════════════════════════════════════════════════════════════════════
// TaskProcessedEvent
// ════════════════════════════════════════════════════════════════════════════

/// Published when a background task reaches a new status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskProcessedEvent {
    #[serde(skip)]
    pub metadata: EventMetadata,

    pub task_id: String,

    pub status: String,
}

impl TaskProcessedEvent {
    pub fn new(task_id: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            metadata: EventMetadata::new(),
            task_id: task_id.into(),
            status: status.into(),
        }
    }
}

domain_event!(TaskProcessedEvent);
