pub mod cards;
pub mod choices;
pub mod connector;
pub mod messages;

pub use cards::CardError;
pub use choices::{choice_prompt, ListStyle};
pub use connector::{ConnectorError, NoopConnector, RecordingConnector, ReplyConnector};
pub use messages::{Reply, ReplyBuilder};
