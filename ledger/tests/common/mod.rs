//! Shared fixtures for ledger integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fundsline_common::{
    Account, AccountChangeEvent, AccountId, CreateAccountRequest, Currency, CurrencyPair, CustomerId,
    LedgerError, Result, TopUpRequest,
};
use fundsline_fx::{ConversionGateway, CurrencyConverter, FxError, FxResult};
use fundsline_ledger::{
    AccountStore, ConversionScope, InMemoryAccountStore, InMemoryCustomerStore, LedgerEngine, LedgerStores,
};
use fundsline_notify::{AccountNotifier, InMemoryOutboxStore, NotificationSink};
use parking_lot::Mutex;
use rust_decimal::Decimal;

/// How the scripted converter answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConverterMode {
    Rate,
    Unavailable,
    Down,
}

/// Converter multiplying by a fixed rate, or failing on demand.
pub struct ScriptedConverter {
    rate: Decimal,
    mode: Mutex<ConverterMode>,
    calls: AtomicUsize,
}

impl ScriptedConverter {
    pub fn new(rate: Decimal) -> Self {
        Self {
            rate,
            mode: Mutex::new(ConverterMode::Rate),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set_mode(&self, mode: ConverterMode) {
        *self.mode.lock() = mode;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CurrencyConverter for ScriptedConverter {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn convert(&self, pair: &CurrencyPair, amount: Decimal) -> FxResult<Decimal> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mode = *self.mode.lock();
        match mode {
            ConverterMode::Rate => Ok(amount * self.rate),
            ConverterMode::Unavailable => Err(FxError::RateUnavailable(pair.clone())),
            ConverterMode::Down => Err(FxError::Transport("connection refused".to_string())),
        }
    }
}

/// Sink recording every event, optionally refusing one account.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<AccountChangeEvent>>,
    refuse: Mutex<Option<AccountId>>,
}

impl RecordingSink {
    pub fn refuse(&self, account: Option<AccountId>) {
        *self.refuse.lock() = account;
    }

    pub fn events(&self) -> Vec<AccountChangeEvent> {
        self.events.lock().clone()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn deliver(&self, event: &AccountChangeEvent) -> Result<()> {
        if *self.refuse.lock() == Some(event.account_id) {
            return Err(LedgerError::Delivery(format!(
                "consumer refused account {}",
                event.account_id
            )));
        }
        self.events.lock().push(event.clone());
        Ok(())
    }
}

/// Account store that sleeps after every write.
pub struct SlowAccountStore {
    inner: Arc<InMemoryAccountStore>,
    delay: Duration,
}

#[async_trait]
impl AccountStore for SlowAccountStore {
    async fn find_by_id(&self, id: AccountId) -> Result<Option<Account>> {
        self.inner.find_by_id(id).await
    }

    async fn find_by_customer_and_currency(
        &self,
        customer_id: CustomerId,
        currency: &Currency,
    ) -> Result<Option<Account>> {
        self.inner.find_by_customer_and_currency(customer_id, currency).await
    }

    async fn next_id(&self) -> Result<AccountId> {
        self.inner.next_id().await
    }

    async fn save(&self, account: &Account) -> Result<()> {
        self.inner.save(account).await?;
        tokio::time::sleep(self.delay).await;
        Ok(())
    }
}

/// A ledger wired to in-memory stores.
pub struct Harness {
    pub engine: Arc<LedgerEngine>,
    pub customers: Arc<InMemoryCustomerStore>,
    pub accounts: Arc<InMemoryAccountStore>,
    pub outbox: Arc<InMemoryOutboxStore>,
    pub sink: Arc<RecordingSink>,
    pub converter: Arc<ScriptedConverter>,
}

impl Harness {
    pub fn new(scope: ConversionScope) -> Self {
        Self::with_rate(scope, Decimal::new(925, 3))
    }

    pub fn with_rate(scope: ConversionScope, rate: Decimal) -> Self {
        Self::build(scope, rate, None)
    }

    /// A harness whose account writes each stall for `delay`.
    pub fn with_slow_saves(scope: ConversionScope, delay: Duration) -> Self {
        Self::build(scope, Decimal::new(925, 3), Some(delay))
    }

    fn build(scope: ConversionScope, rate: Decimal, save_delay: Option<Duration>) -> Self {
        let customers = Arc::new(InMemoryCustomerStore::new());
        let accounts = Arc::new(InMemoryAccountStore::new());
        let outbox = Arc::new(InMemoryOutboxStore::new());
        let sink = Arc::new(RecordingSink::default());
        let converter = Arc::new(ScriptedConverter::new(rate));

        let account_store: Arc<dyn AccountStore> = match save_delay {
            Some(delay) => Arc::new(SlowAccountStore {
                inner: accounts.clone(),
                delay,
            }),
            None => accounts.clone(),
        };
        let stores = LedgerStores {
            customers: customers.clone(),
            accounts: account_store,
            outbox: outbox.clone(),
        };
        let gateway = Arc::new(ConversionGateway::with_converter(converter.clone()));
        let engine = LedgerEngine::new(stores, gateway, AccountNotifier::new(sink.clone()))
            .with_conversion_scope(scope);

        Self {
            engine: Arc::new(engine),
            customers,
            accounts,
            outbox,
            sink,
            converter,
        }
    }

    pub fn customer(&self, name: &str) -> CustomerId {
        self.customers.register(name).id
    }

    pub async fn open(&self, customer: CustomerId, currency: Currency) -> AccountId {
        self.engine
            .create_account(CreateAccountRequest::new(customer, currency))
            .await
            .expect("account creation failed")
    }

    /// Open an account and top it up, then forget the side effects.
    pub async fn funded(&self, name: &str, currency: Currency, amount: Decimal) -> AccountId {
        let customer = self.customer(name);
        let id = self.open(customer, currency).await;
        if amount > Decimal::ZERO {
            self.engine
                .top_up(id, TopUpRequest::new(amount))
                .await
                .expect("top-up failed");
        }
        self.sink.clear();
        id
    }

    pub async fn balance(&self, id: AccountId) -> Decimal {
        self.engine
            .get_balance(id)
            .await
            .expect("balance lookup failed")
            .balance
    }

    /// Outbox deltas recorded for an account, in append order.
    pub fn deltas(&self, id: AccountId) -> Vec<Decimal> {
        self.outbox.entries_for(id).iter().map(|e| e.delta).collect()
    }
}

pub const SCOPES: [ConversionScope; 2] = [ConversionScope::BeforeUnit, ConversionScope::InsideUnit];
