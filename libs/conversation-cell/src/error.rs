use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConversationError {
    #[error("Another request is still in progress")]
    Busy,

    #[error("Response discarded: the chat was cleared while the request was in flight")]
    Superseded,

    #[error("Message is empty")]
    EmptyMessage,

    #[error("Form message not found: {0}")]
    FormNotFound(String),
}
