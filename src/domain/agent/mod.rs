//! Agent module - Business events raised by the conversational agent.

mod events;

pub use events::{
    AgentCreatedEvent, ConversationCompletedEvent, MessageAddedEvent, TaskProcessedEvent,
};
