//! Core ledger engine implementation.

use std::sync::Arc;

use fundsline_common::{
    require_positive, Account, AccountBalance, AccountId, CreateAccountRequest, Currency,
    LedgerError, Result, TopUpRequest, TransferReceipt, TransferRequest,
};
use fundsline_fx::ConversionGateway;
use fundsline_notify::{AccountNotifier, OutboxStore};
use rust_decimal::Decimal;
use tracing::{debug, info, instrument};

use crate::config::ConversionScope;
use crate::store::{AccountStore, CustomerStore};
use crate::unit::{AtomicUnit, LockKey, LockRegistry};

/// Storage collaborators of the ledger.
#[derive(Clone)]
pub struct LedgerStores {
    pub customers: Arc<dyn CustomerStore>,
    pub accounts: Arc<dyn AccountStore>,
    pub outbox: Arc<dyn OutboxStore>,
}

/// The ledger engine owns every balance mutation.
///
/// Each mutating operation runs as one [`AtomicUnit`]: balance writes,
/// change notifications and outbox entries either all happen or none do.
pub struct LedgerEngine {
    stores: LedgerStores,
    gateway: Arc<ConversionGateway>,
    notifier: AccountNotifier,
    locks: LockRegistry,
    scope: ConversionScope,
}

impl LedgerEngine {
    /// Create a new ledger engine.
    pub fn new(stores: LedgerStores, gateway: Arc<ConversionGateway>, notifier: AccountNotifier) -> Self {
        Self {
            stores,
            gateway,
            notifier,
            locks: LockRegistry::new(),
            scope: ConversionScope::default(),
        }
    }

    /// Set where cross-currency conversion happens.
    pub fn with_conversion_scope(mut self, scope: ConversionScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn conversion_scope(&self) -> ConversionScope {
        self.scope
    }

    async fn begin(&self, keys: Vec<LockKey>) -> AtomicUnit {
        AtomicUnit::begin(
            &self.locks,
            self.stores.accounts.clone(),
            self.stores.outbox.clone(),
            keys,
        )
        .await
    }

    /// Open a zero-balance account for a customer in a currency.
    #[instrument(skip(self, request))]
    pub async fn create_account(&self, request: CreateAccountRequest) -> Result<AccountId> {
        let customer_id = request
            .customer_id
            .ok_or_else(|| LedgerError::missing_field("customer_id"))?;
        let currency = request
            .currency
            .ok_or_else(|| LedgerError::missing_field("currency"))?;
        let currency = Currency::parse(currency.code())?;

        self.stores
            .customers
            .find_by_id(customer_id)
            .await?
            .ok_or(LedgerError::CustomerNotFound(customer_id))?;

        let mut unit = self
            .begin(vec![LockKey::Registration(customer_id, currency.clone())])
            .await;

        if self
            .stores
            .accounts
            .find_by_customer_and_currency(customer_id, &currency)
            .await?
            .is_some()
        {
            return Err(LedgerError::AccountExists {
                customer_id,
                currency,
            });
        }

        let id = self.stores.accounts.next_id().await?;
        let account = Account::open(id, customer_id, currency);
        unit.insert(account.clone());
        self.notifier
            .notify_account_change(&account, Decimal::ZERO, unit.outbox())
            .await?;
        unit.commit().await?;

        info!(
            account = %id,
            customer = %customer_id,
            currency = %account.currency,
            "Account created"
        );
        Ok(id)
    }

    /// Current balance of an account.
    #[instrument(skip(self))]
    pub async fn get_balance(&self, account_id: AccountId) -> Result<AccountBalance> {
        let mut unit = self.begin(vec![LockKey::Account(account_id)]).await;
        let account = unit.require(account_id).await?;
        drop(unit);

        debug!(account = %account_id, balance = %account.balance, "Balance read");
        Ok(account.balance_view())
    }

    /// Deposit into an account.
    #[instrument(skip(self, request))]
    pub async fn top_up(&self, account_id: AccountId, request: TopUpRequest) -> Result<()> {
        let amount = require_positive(request.amount, "amount")?;

        let mut unit = self.begin(vec![LockKey::Account(account_id)]).await;
        let mut account = unit.require(account_id).await?;
        account.credit(amount)?;
        unit.stage(account.clone())?;

        self.notifier
            .notify_account_change(&account, amount, unit.outbox())
            .await?;
        unit.commit().await?;

        info!(
            account = %account_id,
            amount = %amount,
            balance = %account.balance,
            "Top-up committed"
        );
        Ok(())
    }

    /// Move funds between two accounts, converting when currencies differ.
    #[instrument(skip(self, request))]
    pub async fn transfer(&self, request: TransferRequest) -> Result<TransferReceipt> {
        let amount = require_positive(request.amount_in_sender_currency, "amount_in_sender_currency")?;
        let sender_id = request.sender_account;
        let receiver_id = request.receiver_account;

        let keys = vec![LockKey::Account(sender_id), LockKey::Account(receiver_id)];

        let (mut unit, mut sender, mut receiver, credited) = match self.scope {
            ConversionScope::BeforeUnit => {
                let sender = self.find_account(sender_id).await?;
                ensure_distinct(sender_id, receiver_id)?;
                let receiver = self.find_account(receiver_id).await?;
                ensure_funds(&sender, amount)?;

                let credited = self
                    .credit_amount(&sender.currency, &receiver.currency, amount)
                    .await?;

                let mut unit = self.begin(keys).await;
                let sender = unit.require(sender_id).await?;
                let receiver = unit.require(receiver_id).await?;
                ensure_funds(&sender, amount)?;
                (unit, sender, receiver, credited)
            }
            ConversionScope::InsideUnit => {
                let mut unit = self.begin(keys).await;
                let sender = unit.require(sender_id).await?;
                ensure_distinct(sender_id, receiver_id)?;
                let receiver = unit.require(receiver_id).await?;
                ensure_funds(&sender, amount)?;

                let credited = self
                    .credit_amount(&sender.currency, &receiver.currency, amount)
                    .await?;
                (unit, sender, receiver, credited)
            }
        };

        sender.debit(amount)?;
        receiver.credit(credited)?;
        unit.stage(sender.clone())?;
        unit.stage(receiver.clone())?;

        self.notifier
            .notify_account_change(&sender, -amount, unit.outbox())
            .await?;
        self.notifier
            .notify_account_change(&receiver, credited, unit.outbox())
            .await?;
        unit.commit().await?;

        info!(
            sender = %sender_id,
            receiver = %receiver_id,
            debited = %amount,
            credited = %credited,
            "Transfer committed"
        );

        Ok(TransferReceipt {
            sender_account: sender_id,
            receiver_account: receiver_id,
            debited: amount,
            credited,
        })
    }

    async fn find_account(&self, id: AccountId) -> Result<Account> {
        self.stores
            .accounts
            .find_by_id(id)
            .await?
            .ok_or(LedgerError::AccountNotFound(id))
    }

    async fn credit_amount(&self, from: &Currency, to: &Currency, amount: Decimal) -> Result<Decimal> {
        if from == to {
            return Ok(amount);
        }
        Ok(self.gateway.convert(from, to, amount).await?)
    }
}

fn ensure_distinct(sender: AccountId, receiver: AccountId) -> Result<()> {
    if sender == receiver {
        return Err(LedgerError::validation(
            "Sender and receiver accounts must differ",
            "receiver_account",
        ));
    }
    Ok(())
}

fn ensure_funds(account: &Account, amount: Decimal) -> Result<()> {
    if !account.has_sufficient_funds(amount) {
        return Err(LedgerError::InsufficientFunds {
            required: amount,
            available: account.balance,
        });
    }
    Ok(())
}
