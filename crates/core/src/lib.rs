pub mod config;
pub mod dialog;
pub mod domain;
pub mod errors;

pub use dialog::{DialogFrame, DialogKind, DialogStack, DialogTransitionError};
pub use domain::activity::{
    Activity, ActivityType, Attachment, CardAction, ChannelAccount, ConversationAccount,
    InputHint, SuggestedActions,
};
pub use domain::booking::BookingDetails;
pub use domain::intent::{BookingEntities, CityEntity, Intent, IntentResult};
pub use errors::{ApplicationError, DomainError, InterfaceError, ServiceError};
