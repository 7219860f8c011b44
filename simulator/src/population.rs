//! Simulated customers and their accounts.

use fundsline_common::{AccountId, CreateAccountRequest, Currency, CustomerId, TopUpRequest};
use fundsline_ledger::{InMemoryCustomerStore, LedgerEngine};
use rust_decimal::Decimal;
use tracing::info;

/// A customer holding one USD and one EUR account.
#[derive(Debug, Clone, Copy)]
pub struct Member {
    pub customer: CustomerId,
    pub usd: AccountId,
    pub eur: AccountId,
}

/// All simulated customers.
#[derive(Debug, Clone, Default)]
pub struct Population {
    pub members: Vec<Member>,
    /// Top-ups performed while seeding.
    pub seed_deposits: u64,
}

impl Population {
    /// Register `count` customers, open their accounts and fund them.
    pub async fn seed(
        engine: &LedgerEngine,
        customers: &InMemoryCustomerStore,
        count: usize,
        initial_balance: Decimal,
    ) -> anyhow::Result<Self> {
        let mut population = Population::default();

        for i in 0..count {
            let customer = customers.register(format!("customer-{i:04}")).id;
            let usd = engine
                .create_account(CreateAccountRequest::new(customer, Currency::usd()))
                .await?;
            let eur = engine
                .create_account(CreateAccountRequest::new(customer, Currency::eur()))
                .await?;

            if initial_balance > Decimal::ZERO {
                for account in [usd, eur] {
                    engine
                        .top_up(account, TopUpRequest::new(initial_balance))
                        .await?;
                    population.seed_deposits += 1;
                }
            }

            population.members.push(Member { customer, usd, eur });
        }

        info!(
            customers = count,
            initial_balance = %initial_balance,
            "Population seeded"
        );
        Ok(population)
    }

    /// Every account in the population.
    pub fn accounts(&self) -> Vec<AccountId> {
        self.members.iter().flat_map(|m| [m.usd, m.eur]).collect()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }
}
