use clap::{Args, Parser, Subcommand};
use miette::{IntoDiagnostic, Result, miette};
use orderflow::application::delivery::CityFeeTable;
use orderflow::application::order_service::OrderService;
use orderflow::application::payment_service::{PaymentService, PaymentSettings};
use orderflow::application::side_effects::SideEffects;
use orderflow::application::signature::WebhookSigner;
use orderflow::config::AppConfig;
use orderflow::domain::ports::{
    CatalogAccessor, CatalogRef, OrderRepository, OrderRepositoryRef, PaymentProcessorRef,
    PaymentRepository, PaymentRepositoryRef,
};
use orderflow::infrastructure::directory::InMemoryDirectory;
use orderflow::infrastructure::in_memory::InMemoryStore;
use orderflow::infrastructure::notify::{TracingAuditSink, TracingNotifier};
use orderflow::infrastructure::processor::HttpPaymentProcessor;
use orderflow::infrastructure::sandbox::SandboxProcessor;
use orderflow::interfaces::csv::catalog_reader::CatalogReader;
use orderflow::interfaces::http::{self, AppState};
use orderflow::interfaces::seed::Seed;
use orderflow::telemetry;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API
    Serve(ServeArgs),
    /// Load products from a catalog CSV and print what was imported
    ImportCatalog {
        /// Catalog CSV file
        input: PathBuf,

        /// Path to persistent database (optional). If provided, uses RocksDB.
        #[arg(long)]
        db_path: Option<PathBuf>,
    },
    /// Print the hex HMAC-SHA-512 signature of a webhook payload
    SignWebhook {
        #[arg(long, env = "PROCESSOR_SECRET_KEY", hide_env_values = true)]
        secret: String,

        /// File holding the exact body to sign
        payload: PathBuf,
    },
}

#[derive(Args)]
struct ServeArgs {
    #[arg(long)]
    host: Option<String>,

    #[arg(long)]
    port: Option<u16>,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// JSON file with storefronts, products and merchants to load at startup
    #[arg(long)]
    seed: Option<PathBuf>,

    /// Use the in-process sandbox instead of the hosted processor
    #[arg(long)]
    sandbox: bool,
}

struct Storage {
    catalog: CatalogRef,
    orders: OrderRepositoryRef,
    payments: PaymentRepositoryRef,
}

impl Storage {
    fn from_store<S>(store: S) -> Self
    where
        S: CatalogAccessor + OrderRepository + PaymentRepository + Clone + 'static,
    {
        Self {
            catalog: Arc::new(store.clone()),
            orders: Arc::new(store.clone()),
            payments: Arc::new(store),
        }
    }
}

#[cfg(feature = "storage-rocksdb")]
fn open_storage(db_path: Option<&Path>) -> Result<Storage> {
    use orderflow::infrastructure::rocksdb::RocksDBStore;

    match db_path {
        Some(path) => Ok(Storage::from_store(
            RocksDBStore::open(path).into_diagnostic()?,
        )),
        None => Ok(Storage::from_store(InMemoryStore::new())),
    }
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_storage(db_path: Option<&Path>) -> Result<Storage> {
    if db_path.is_some() {
        eprintln!(
            "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to in-memory storage."
        );
    }
    Ok(Storage::from_store(InMemoryStore::new()))
}

async fn serve(args: ServeArgs) -> Result<()> {
    let mut config = AppConfig::from_env().into_diagnostic()?;
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if args.db_path.is_some() {
        config.db_path = args.db_path;
    }
    if args.seed.is_some() {
        config.seed_path = args.seed;
    }

    let storage = open_storage(config.db_path.as_deref())?;
    let directory = InMemoryDirectory::new();
    if let Some(path) = &config.seed_path {
        let seed = Seed::from_reader(File::open(path).into_diagnostic()?).into_diagnostic()?;
        seed.apply(storage.catalog.as_ref(), &directory)
            .await
            .into_diagnostic()?;
    }

    let (processor, signer) = if args.sandbox {
        let secret = config
            .processor_secret_key
            .clone()
            .unwrap_or_else(|| "sandbox-secret".to_string());
        tracing::warn!("Using the sandbox payment processor");
        let processor: PaymentProcessorRef = Arc::new(SandboxProcessor::default());
        (processor, WebhookSigner::new(secret))
    } else {
        let secret = config.require_secret().into_diagnostic()?;
        let base_url = config
            .processor_base_url
            .clone()
            .ok_or_else(|| miette!("PROCESSOR_BASE_URL is not set"))?;
        let processor: PaymentProcessorRef = Arc::new(
            HttpPaymentProcessor::new(base_url, secret, config.processor_timeout)
                .into_diagnostic()?,
        );
        (processor, WebhookSigner::new(secret))
    };

    let directory = Arc::new(directory);
    let effects = SideEffects::new(Arc::new(TracingNotifier), Arc::new(TracingAuditSink));
    let orders = OrderService::new(
        storage.catalog.clone(),
        storage.orders.clone(),
        directory.clone(),
        Arc::new(CityFeeTable::standard()),
        effects.clone(),
    );
    let payments = PaymentService::new(
        storage.orders,
        storage.payments,
        directory,
        processor,
        signer,
        PaymentSettings {
            currency: config.currency.clone(),
            default_callback_url: config.callback_url.clone(),
        },
        effects,
    );

    let app = http::router(AppState {
        orders: Arc::new(orders),
        payments: Arc::new(payments),
    });

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .into_diagnostic()?;
    tracing::info!(%addr, "orderflow listening");
    axum::serve(listener, app).await.into_diagnostic()?;
    Ok(())
}

async fn import_catalog(input: PathBuf, db_path: Option<PathBuf>) -> Result<()> {
    let storage = open_storage(db_path.as_deref())?;
    let file = File::open(input).into_diagnostic()?;
    let products = CatalogReader::new(file).products().into_diagnostic()?;

    let stdout = io::stdout();
    let mut writer = csv::Writer::from_writer(stdout.lock());
    writer
        .write_record(["product_id", "store_id", "name", "price", "stock", "variants"])
        .into_diagnostic()?;
    for product in products {
        writer
            .write_record([
                product.id.clone(),
                product.store_id.clone(),
                product.name.clone(),
                product.price.to_string(),
                product.stock.to_string(),
                product.variants.len().to_string(),
            ])
            .into_diagnostic()?;
        storage
            .catalog
            .upsert_product(product)
            .await
            .into_diagnostic()?;
    }
    writer.flush().into_diagnostic()?;
    Ok(())
}

fn sign_webhook(secret: String, payload: PathBuf) -> Result<()> {
    let body = std::fs::read(payload).into_diagnostic()?;
    let signature = WebhookSigner::new(secret).sign(&body).into_diagnostic()?;
    println!("{signature}");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Serve(args) => serve(args).await,
        Command::ImportCatalog { input, db_path } => import_catalog(input, db_path).await,
        Command::SignWebhook { secret, payload } => sign_webhook(secret, payload),
    }
}
