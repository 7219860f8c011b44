//! Simulation controller.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use fundsline_common::{Currency, TopUpRequest, TransferRequest};
use fundsline_fx::{ConversionGateway, GatewayConfig, RateDesk};
use fundsline_ledger::{
    AccountStore, ConversionScope, InMemoryAccountStore, InMemoryCustomerStore, LedgerEngine,
    LedgerStores,
};
use fundsline_notify::{
    AccountNotifier, ChannelSink, DispatcherConfig, InMemoryOutboxStore, LoggingPublisher,
    OutboxDispatcher,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::metrics::SimulationMetrics;
use crate::population::Population;
use crate::scenario::{Operation, Scenario};

/// Simulation parameters.
#[derive(Debug, Clone)]
pub struct SimulationSettings {
    pub customers: usize,
    pub operations: usize,
    pub concurrency: usize,
    pub scenario: Scenario,
    pub scope: ConversionScope,
    pub seed: Option<u64>,
    pub initial_balance: Decimal,
    pub request_timeout: Duration,
    pub dispatcher: DispatcherConfig,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            customers: 20,
            operations: 1000,
            concurrency: 16,
            scenario: Scenario::Mixed,
            scope: ConversionScope::BeforeUnit,
            seed: None,
            initial_balance: Decimal::from(1_000),
            request_timeout: Duration::from_secs(5),
            dispatcher: DispatcherConfig::default(),
        }
    }
}

/// Results of the invariant checks run after the workload.
#[derive(Debug, Clone, Serialize)]
pub struct InvariantReport {
    /// Accounts found with a negative balance.
    pub negative_balances: usize,
    /// Outbox entries actually written.
    pub outbox_entries: usize,
    /// Outbox entries implied by committed mutations.
    pub expected_outbox_entries: u64,
    /// Entries still pending after the final drain.
    pub pending_entries: usize,
    /// Notifications seen by the sink consumer.
    pub notifications: u64,
}

impl InvariantReport {
    pub fn holds(&self) -> bool {
        self.negative_balances == 0
            && self.outbox_entries as u64 == self.expected_outbox_entries
            && self.pending_entries == 0
    }
}

/// Final simulation summary.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub scenario: Scenario,
    pub scope: String,
    pub gateway: String,
    pub elapsed_ms: u128,
    pub throughput: f64,
    pub average_latency_us: u64,
    pub p50_latency_us: u64,
    pub p99_latency_us: u64,
    pub success_rate: f64,
    pub published: u64,
    pub metrics: SimulationMetrics,
    pub invariants: InvariantReport,
}

/// Drives a ledger wired to an in-process rate desk.
pub struct SimulationController {
    settings: SimulationSettings,
    engine: Arc<LedgerEngine>,
    customers: Arc<InMemoryCustomerStore>,
    accounts: Arc<InMemoryAccountStore>,
    outbox: Arc<InMemoryOutboxStore>,
    dispatcher: Arc<OutboxDispatcher>,
    gateway_name: String,
    population: Population,
    metrics: Arc<Mutex<SimulationMetrics>>,
    notifications: Arc<AtomicU64>,
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
    elapsed: Duration,
}

impl SimulationController {
    /// Start the rate desk, connect the gateway and build the ledger.
    pub async fn start(settings: SimulationSettings) -> anyhow::Result<Self> {
        let desk = Arc::new(RateDesk::new());
        desk.set_rate(Currency::usd(), Currency::eur(), Decimal::new(925, 3));
        desk.set_rate(Currency::usd(), Currency::gbp(), Decimal::new(79, 2));
        let desk_addr = desk.spawn("127.0.0.1:0").await?;
        info!(addr = %desk_addr, "Rate desk started");

        let gateway_config = GatewayConfig {
            request_timeout: settings.request_timeout,
            ..GatewayConfig::stream(desk_addr.to_string())
        };
        let gateway = ConversionGateway::connect(&gateway_config).await?;
        let gateway_name = gateway.strategy().to_string();

        let customers = Arc::new(InMemoryCustomerStore::new());
        let accounts = Arc::new(InMemoryAccountStore::new());
        let outbox = Arc::new(InMemoryOutboxStore::new());

        let (sink, mut events) = ChannelSink::new(1024);
        let notifications = Arc::new(AtomicU64::new(0));
        let counter = notifications.clone();
        let consumer = tokio::spawn(async move {
            while events.recv().await.is_some() {
                counter.fetch_add(1, Ordering::Relaxed);
            }
        });

        let engine = LedgerEngine::new(
            LedgerStores {
                customers: customers.clone(),
                accounts: accounts.clone(),
                outbox: outbox.clone(),
            },
            Arc::new(gateway),
            AccountNotifier::new(Arc::new(sink)),
        )
        .with_conversion_scope(settings.scope);

        let dispatcher = Arc::new(OutboxDispatcher::new(
            outbox.clone(),
            Arc::new(LoggingPublisher),
            settings.dispatcher.clone(),
        ));
        let (shutdown, shutdown_rx) = watch::channel(false);
        let runner = dispatcher.clone();
        let dispatch_task = tokio::spawn(async move { runner.run(shutdown_rx).await });

        Ok(Self {
            settings,
            engine: Arc::new(engine),
            customers,
            accounts,
            outbox,
            dispatcher,
            gateway_name,
            population: Population::default(),
            metrics: Arc::new(Mutex::new(SimulationMetrics::new())),
            notifications,
            shutdown,
            tasks: vec![dispatch_task, consumer],
            elapsed: Duration::ZERO,
        })
    }

    /// Register customers and fund their accounts.
    pub async fn initialize(&mut self) -> anyhow::Result<()> {
        self.population = Population::seed(
            &self.engine,
            &self.customers,
            self.settings.customers,
            self.settings.initial_balance,
        )
        .await?;
        Ok(())
    }

    /// Execute the workload with bounded concurrency.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        let mut rng = match self.settings.seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        let plan = self
            .settings
            .scenario
            .plan(&self.population, self.settings.operations, &mut rng);

        info!(
            scenario = ?self.settings.scenario,
            scope = %self.settings.scope,
            operations = plan.len(),
            concurrency = self.settings.concurrency,
            "Running workload"
        );

        let start = Instant::now();
        stream::iter(plan)
            .for_each_concurrent(self.settings.concurrency.max(1), |op| {
                let engine = self.engine.clone();
                let metrics = self.metrics.clone();
                async move {
                    let kind = op.label();
                    let started = Instant::now();
                    let result = execute(&engine, op).await;
                    let latency = started.elapsed();

                    let mut metrics = metrics.lock().await;
                    match result {
                        Ok(()) => metrics.record_success(kind, latency),
                        Err(e) => metrics.record_failure(e.error_code(), latency),
                    }
                }
            })
            .await;
        self.elapsed = start.elapsed();

        Ok(())
    }

    /// Stop background tasks, check invariants and summarize.
    pub async fn finish(self) -> anyhow::Result<SimulationReport> {
        let _ = self.shutdown.send(true);
        drop(self.engine);
        for task in self.tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "Background task failed");
            }
        }

        let metrics = self.metrics.lock().await.clone();

        let mut negative_balances = 0;
        for member in &self.population.members {
            for id in [member.usd, member.eur] {
                let Some(account) = self.accounts.find_by_id(id).await? else {
                    continue;
                };
                if account.balance < Decimal::ZERO {
                    warn!(
                        customer = %member.customer,
                        account = %id,
                        balance = %account.balance,
                        "Negative balance"
                    );
                    negative_balances += 1;
                }
            }
        }

        let expected_outbox_entries = self.population.seed_deposits
            + metrics.committed("top_up")
            + 2 * metrics.committed("transfer");

        let invariants = InvariantReport {
            negative_balances,
            outbox_entries: self.outbox.len(),
            expected_outbox_entries,
            pending_entries: self.outbox.pending_count(),
            notifications: self.notifications.load(Ordering::Relaxed),
        };

        Ok(SimulationReport {
            scenario: self.settings.scenario,
            scope: self.settings.scope.to_string(),
            gateway: self.gateway_name,
            elapsed_ms: self.elapsed.as_millis(),
            throughput: metrics.throughput(self.elapsed),
            average_latency_us: metrics.average_latency_us(),
            p50_latency_us: metrics.p50_latency_us(),
            p99_latency_us: metrics.p99_latency_us(),
            success_rate: metrics.success_rate(),
            published: self.dispatcher.stats().published.load(Ordering::Relaxed),
            metrics,
            invariants,
        })
    }
}

async fn execute(engine: &LedgerEngine, op: Operation) -> fundsline_common::Result<()> {
    match op {
        Operation::TopUp { account, amount } => {
            engine.top_up(account, TopUpRequest::new(amount)).await
        }
        Operation::Transfer { from, to, amount } => engine
            .transfer(TransferRequest::new(from, to, amount))
            .await
            .map(|_| ()),
    }
}
