pub mod error;
pub mod models;
pub mod services;

pub use error::ConversationError;
pub use models::*;
pub use services::booking::BookingService;
pub use services::controller::ConversationController;
pub use services::diagnostic::DiagnosticService;
pub use services::intent::{classify, Intent, ONBOARDING_PROMPT, SMALL_TALK_VOCABULARY};
pub use services::recommendation::RecommendationService;
