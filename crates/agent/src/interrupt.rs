use tertulia_channel::messages::{Reply, ReplyBuilder};
use tertulia_core::domain::activity::InputHint;

/// Keyword commands honoured while a dialog is waiting for input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Interrupt {
    Help,
    Cancel,
    Quit,
}

impl Interrupt {
    pub fn event_key(self) -> &'static str {
        match self {
            Self::Help => "interrupt.help",
            Self::Cancel => "interrupt.cancel",
            Self::Quit => "interrupt.quit",
        }
    }

    /// The single notification sent before acting on the interrupt.
    pub fn notification(self) -> Reply {
        let (text, hint) = match self {
            Self::Help => ("Ayuda...", InputHint::ExpectingInput),
            Self::Cancel => ("Cancelando...", InputHint::IgnoringInput),
            Self::Quit => ("Saliendo...", InputHint::IgnoringInput),
        };
        ReplyBuilder::new(text).input_hint(hint).build()
    }

    /// Whether the dialog stack is unwound.
    pub fn cancels_dialogs(self) -> bool {
        !matches!(self, Self::Help)
    }

    pub fn signs_out(self) -> bool {
        matches!(self, Self::Quit)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InterruptPolicy {
    pub help: Vec<&'static str>,
    pub cancel: &'static str,
    pub quit: &'static str,
}

impl Default for InterruptPolicy {
    fn default() -> Self {
        Self { help: vec!["ayuda", "?"], cancel: "cancelar", quit: "salir" }
    }
}

impl InterruptPolicy {
    /// Exact, case-insensitive keyword match on the whole turn text.
    pub fn evaluate(&self, text: Option<&str>) -> Option<Interrupt> {
        let text = text?.to_lowercase();
        if self.help.iter().any(|keyword| *keyword == text) {
            Some(Interrupt::Help)
        } else if text == self.cancel {
            Some(Interrupt::Cancel)
        } else if text == self.quit {
            Some(Interrupt::Quit)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use tertulia_core::domain::activity::InputHint;

    use super::{Interrupt, InterruptPolicy};

    #[test]
    fn keywords_match_exactly_and_ignore_case() {
        let policy = InterruptPolicy::default();

        assert_eq!(policy.evaluate(Some("AYUDA")), Some(Interrupt::Help));
        assert_eq!(policy.evaluate(Some("?")), Some(Interrupt::Help));
        assert_eq!(policy.evaluate(Some("Cancelar")), Some(Interrupt::Cancel));
        assert_eq!(policy.evaluate(Some("salir")), Some(Interrupt::Quit));
        assert_eq!(policy.evaluate(Some("quiero cancelar")), None);
        assert_eq!(policy.evaluate(Some(" cancelar ")), None);
        assert_eq!(policy.evaluate(Some("help")), None);
        assert_eq!(policy.evaluate(None), None);
    }

    #[test]
    fn help_keeps_waiting_and_others_unwind() {
        let help = Interrupt::Help.notification();
        assert_eq!(help.text.as_deref(), Some("Ayuda..."));
        assert_eq!(help.input_hint, Some(InputHint::ExpectingInput));
        assert!(!Interrupt::Help.cancels_dialogs());

        assert!(Interrupt::Cancel.cancels_dialogs());
        assert!(!Interrupt::Cancel.signs_out());
        assert!(Interrupt::Quit.signs_out());
        assert_eq!(Interrupt::Quit.notification().text.as_deref(), Some("Saliendo..."));
    }
}
