//! Bettor-facing messages. Queued into the store outbox together with the
//! bet settlement; `notify-relay` does the actual delivery.

use bet_store::BetSettlement;
use rust_decimal::{Decimal, RoundingStrategy};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Won {
        fixture: String,
        amount: Decimal,
        balance: Decimal,
    },
    Lost {
        fixture: String,
    },
}

impl Notification {
    pub fn for_settlement(fixture: &str, settlement: &BetSettlement) -> Self {
        match settlement.credited {
            Some(amount) => Notification::Won {
                fixture: fixture.to_string(),
                amount,
                balance: settlement.balance,
            },
            None => Notification::Lost {
                fixture: fixture.to_string(),
            },
        }
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notification::Won { fixture, amount, balance } => write!(
                f,
                "Your bet \"{fixture}\" won! +{:.2} Now your balance is {:.2}",
                cents(*amount),
                cents(*balance)
            ),
            Notification::Lost { fixture } => {
                write!(f, "Unfortunately, your bet \"{fixture}\" lost.")
            }
        }
    }
}

fn cents(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Render the outbox body for one committed settlement.
pub fn render(fixture: &str, settlement: &BetSettlement) -> String {
    Notification::for_settlement(fixture, settlement).to_string()
}
