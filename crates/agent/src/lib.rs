//! Conversation logic for the tertulia bot.
//!
//! A turn flows through [`runtime::TurnRunner`]: the conversation's persisted
//! [`DialogStack`](tertulia_core::DialogStack) is loaded, interrupt keywords are
//! honoured, and the waterfall dialogs in [`dialogs`] run until one waits for
//! input or the stack empties. Remote collaborators (intent recognition,
//! vision, translation and the rest) sit behind the traits in [`services`].

pub mod dialogs;
pub mod interrupt;
pub mod prompts;
pub mod runtime;
pub mod services;
pub mod settings;
pub mod timex;
pub mod turn;

#[cfg(test)]
mod test_support;

pub use dialogs::{DialogError, DialogSet};
pub use interrupt::{Interrupt, InterruptPolicy};
pub use runtime::{TurnError, TurnRunner};
pub use services::DialogServices;
pub use settings::TaskSettings;
pub use turn::TurnContext;
