//! Simulation scenarios: how operations are drawn.

use clap::ValueEnum;
use fundsline_common::AccountId;
use rand::rngs::StdRng;
use rand::Rng;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::population::Population;

/// Workload shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Scenario {
    /// Top-ups and transfers across random accounts.
    Mixed,
    /// Transfers hammering a small set of hot accounts.
    Contention,
    /// Transfers that always cross USD and EUR.
    CrossCurrency,
}

/// One ledger operation to perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    TopUp {
        account: AccountId,
        amount: Decimal,
    },
    Transfer {
        from: AccountId,
        to: AccountId,
        amount: Decimal,
    },
}

impl Operation {
    /// Operation label used in metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Operation::TopUp { .. } => "top_up",
            Operation::Transfer { .. } => "transfer",
        }
    }
}

const HOT_MEMBERS: usize = 2;

impl Scenario {
    /// Draw `count` operations over the population.
    pub fn plan(&self, population: &Population, count: usize, rng: &mut StdRng) -> Vec<Operation> {
        if population.len() < 2 {
            return Vec::new();
        }
        (0..count).map(|_| self.draw(population, rng)).collect()
    }

    fn draw(&self, population: &Population, rng: &mut StdRng) -> Operation {
        let members = &population.members;
        match self {
            Scenario::Mixed => {
                let accounts = population.accounts();
                let from = accounts[rng.gen_range(0..accounts.len())];
                if rng.gen_bool(0.25) {
                    return Operation::TopUp {
                        account: from,
                        amount: amount(rng),
                    };
                }
                let mut to = accounts[rng.gen_range(0..accounts.len())];
                while to == from {
                    to = accounts[rng.gen_range(0..accounts.len())];
                }
                Operation::Transfer {
                    from,
                    to,
                    amount: amount(rng),
                }
            }
            Scenario::Contention => {
                let hot = HOT_MEMBERS.min(members.len());
                let (a, b) = distinct(rng, hot);
                Operation::Transfer {
                    from: members[a].usd,
                    to: members[b].usd,
                    amount: amount(rng),
                }
            }
            Scenario::CrossCurrency => {
                let (a, b) = distinct(rng, members.len());
                let (from, to) = if rng.gen_bool(0.5) {
                    (members[a].usd, members[b].eur)
                } else {
                    (members[a].eur, members[b].usd)
                };
                Operation::Transfer {
                    from,
                    to,
                    amount: amount(rng),
                }
            }
        }
    }
}

fn distinct(rng: &mut StdRng, len: usize) -> (usize, usize) {
    let a = rng.gen_range(0..len);
    let mut b = rng.gen_range(0..len);
    while b == a {
        b = rng.gen_range(0..len);
    }
    (a, b)
}

/// Between 0.01 and 250.00.
fn amount(rng: &mut StdRng) -> Decimal {
    Decimal::new(rng.gen_range(1..=25_000), 2)
}
