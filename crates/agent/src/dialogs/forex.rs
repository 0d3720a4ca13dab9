use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use tracing::warn;

use super::{DialogError, DialogResult, DialogSet, FrameOutcome};
use crate::turn::TurnContext;

const FOREX_FAILED: &str = "No fue posible obtener la tasa de cambio, por favor intente nuevamente.";

/// Reports today's exchange rate. Never waits for input.
pub async fn run(set: &DialogSet, ctx: &mut TurnContext) -> Result<FrameOutcome, DialogError> {
    let pair = set.settings.forex_pair.as_str();
    let rate = set.services.forex.rate(pair).await;

    match rate.map(round_rate) {
        Ok(Some(rate)) => ctx.send_text(format!(
            "La tasa de cambio del dìa es COP {rate} por USD\n\nObtenido de: {}",
            set.settings.forex_source_url
        )),
        Ok(None) => {
            warn!(
                event_name = "dialog.forex.invalid_rate",
                correlation_id = %ctx.activity().correlation_id(),
                pair,
                "rate is not a finite number"
            );
            ctx.send_text(FOREX_FAILED);
        }
        Err(error) => {
            warn!(
                event_name = "dialog.forex.failed",
                correlation_id = %ctx.activity().correlation_id(),
                pair,
                error = %error,
                "exchange rate lookup failed"
            );
            ctx.send_text(FOREX_FAILED);
        }
    }

    Ok(FrameOutcome::Complete(DialogResult::Empty))
}

/// Two decimals, half away from zero, without trailing zeros.
fn round_rate(rate: f64) -> Option<Decimal> {
    Decimal::from_f64(rate)
        .map(|rate| rate.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
        .map(|rate| rate.normalize())
}

#[cfg(test)]
mod tests {
    use tertulia_core::errors::ServiceError;

    use super::{round_rate, run, FOREX_FAILED};
    use crate::test_support::{dialog_set, message, Fakes};

    #[test]
    fn rates_round_half_away_from_zero() {
        assert_eq!(round_rate(4123.456).map(|r| r.to_string()).as_deref(), Some("4123.46"));
        assert_eq!(round_rate(3900.0).map(|r| r.to_string()).as_deref(), Some("3900"));
        assert_eq!(round_rate(f64::NAN), None);
    }

    #[tokio::test]
    async fn reports_rounded_rate_for_configured_pair() {
        let fakes = Fakes::default().with_forex_rate(4123.456);
        let set = dialog_set(&fakes);
        let mut ctx = message("trm");

        run(&set, &mut ctx).await.expect("forex");

        assert_eq!(ctx.replies().len(), 1);
        assert!(ctx.replies()[0].text_content().contains("COP 4123.46 por USD"));
        assert_eq!(fakes.calls(), vec!["forex:USD_COP".to_string()]);
    }

    #[tokio::test]
    async fn failure_sends_fixed_apology() {
        let fakes = Fakes::default()
            .with_forex_error(ServiceError::transport("forex", "connection reset"));
        let set = dialog_set(&fakes);
        let mut ctx = message("trm");

        run(&set, &mut ctx).await.expect("forex");

        assert_eq!(ctx.replies()[0].text_content(), FOREX_FAILED);
    }
}
