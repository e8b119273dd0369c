use api_client::{ApiClient, BinanceClient, LiveConnector};
use clap::{Parser, Subcommand};
use comfy_table::{presets::UTF8_FULL, Table};
use core_types::{Order, OrderType, Position};
use engine::{CloseOutcome, TradingService};
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use validator::RawOrderFields;

/// The main entry point for the Meridian trading application.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load credentials and overrides from .env before config is read.
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = configuration::load_config()?;

    let api_client: Arc<dyn ApiClient> =
        Arc::new(BinanceClient::new(&config.api, &config.dispatch));
    let service = Arc::new(TradingService::new(
        Arc::clone(&api_client),
        &config.dispatch,
        &config.sync,
    ));

    let cli = Cli::parse();
    match cli.command {
        Commands::Serve => handle_serve(service, &config).await,
        Commands::Balance => handle_balance(service).await,
        Commands::Price { symbol } => handle_price(service, &symbol).await,
        Commands::Positions => handle_positions(service).await,
        Commands::Orders => handle_orders(service).await,
        Commands::Order(args) => handle_order(service, args).await,
        Commands::Cancel { symbol, order_id } => handle_cancel(service, &symbol, order_id).await,
        Commands::ClosePosition { symbol } => handle_close(service, &symbol).await,
        Commands::SetLeverage { symbol, leverage } => {
            handle_leverage(service, &symbol, leverage).await
        }
    }
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// Order gateway and account-state mirror for Binance USD-M futures.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP/WebSocket server with the background account sync.
    Serve,
    /// Show the account balance.
    Balance,
    /// Show the latest price for a symbol.
    Price { symbol: String },
    /// Show all open positions.
    Positions,
    /// Show all open orders.
    Orders,
    /// Place a new order.
    Order(OrderArgs),
    /// Cancel an open order.
    Cancel {
        #[arg(long)]
        symbol: String,
        #[arg(long)]
        order_id: i64,
    },
    /// Close the position for a symbol with a reduce-only market order.
    ClosePosition { symbol: String },
    /// Set the leverage for a symbol (1-125).
    SetLeverage {
        #[arg(long)]
        symbol: String,
        #[arg(long)]
        leverage: i64,
    },
}

#[derive(Parser)]
struct OrderArgs {
    /// The symbol to trade (e.g., "BTCUSDT"; bare "BTC" is accepted).
    #[arg(long)]
    symbol: String,

    /// BUY or SELL.
    #[arg(long)]
    side: String,

    /// MARKET, LIMIT, STOP_MARKET, or STOP_LIMIT.
    #[arg(long = "type")]
    order_type: String,

    /// Order quantity in base asset units.
    #[arg(long)]
    quantity: String,

    /// Limit price (LIMIT and STOP_LIMIT only).
    #[arg(long)]
    price: Option<String>,

    /// Stop trigger price (STOP_MARKET and STOP_LIMIT only).
    #[arg(long)]
    stop_price: Option<String>,

    /// GTC, IOC, or FOK (defaults to GTC).
    #[arg(long)]
    time_in_force: Option<String>,

    /// Only reduce an existing position, never open or extend one.
    #[arg(long)]
    reduce_only: bool,
}

// ==============================================================================
// Command Handlers
// ==============================================================================

async fn handle_serve(
    service: Arc<TradingService>,
    config: &configuration::settings::Config,
) -> anyhow::Result<()> {
    service.spawn_refresh_loop();

    let connector = LiveConnector::new(config.api.live_trading);
    let price_rx = connector.subscribe_to_mark_prices(&config.sync.feed_symbols)?;
    service.spawn_price_feed(price_rx);

    let addr: SocketAddr = config.server.listen_addr.parse()?;
    web_server::run_server(addr, service).await
}

async fn handle_balance(service: Arc<TradingService>) -> anyhow::Result<()> {
    service.refresh_once().await?;
    let balance = service.balance().await?;

    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec![
        "Wallet Balance",
        "Available",
        "Unrealized PnL",
    ]);
    table.add_row(vec![
        balance.total_wallet_balance.to_string(),
        balance.available_balance.to_string(),
        balance.total_unrealized_profit.to_string(),
    ]);
    println!("{table}");
    Ok(())
}

async fn handle_price(service: Arc<TradingService>, symbol: &str) -> anyhow::Result<()> {
    let quote = service.price(symbol).await?;
    println!("{}: {}", quote.symbol, quote.price);
    Ok(())
}

async fn handle_positions(service: Arc<TradingService>) -> anyhow::Result<()> {
    service.refresh_once().await?;
    let positions = service.positions().await?;
    if positions.is_empty() {
        println!("No open positions.");
        return Ok(());
    }
    println!("{}", positions_table(&positions));
    Ok(())
}

async fn handle_orders(service: Arc<TradingService>) -> anyhow::Result<()> {
    service.refresh_once().await?;
    let orders = service.orders().await?;
    if orders.is_empty() {
        println!("No open orders.");
        return Ok(());
    }
    println!("{}", orders_table(&orders));
    Ok(())
}

async fn handle_order(service: Arc<TradingService>, args: OrderArgs) -> anyhow::Result<()> {
    let order_type = OrderType::from_str(&args.order_type)?;
    let raw = RawOrderFields {
        symbol: Some(args.symbol),
        side: Some(args.side),
        quantity: Some(args.quantity),
        price: args.price,
        stop_price: args.stop_price,
        time_in_force: args.time_in_force,
        reduce_only: args.reduce_only.then(|| "true".to_string()),
    };

    let order = service.place_order(&raw, order_type).await?;
    println!(
        "Order accepted: id={} status={:?}",
        order.order_id, order.status
    );
    println!("{}", orders_table(std::slice::from_ref(&order)));
    Ok(())
}

async fn handle_cancel(
    service: Arc<TradingService>,
    symbol: &str,
    order_id: i64,
) -> anyhow::Result<()> {
    let ack = service.cancel_order(symbol, order_id).await?;
    if ack.already_closed {
        println!("Order {} on {} was already closed.", ack.order_id, ack.symbol);
    } else {
        println!("Order {} on {} canceled.", ack.order_id, ack.symbol);
    }
    Ok(())
}

async fn handle_close(service: Arc<TradingService>, symbol: &str) -> anyhow::Result<()> {
    service.refresh_once().await?;
    match service.close_position(symbol).await? {
        CloseOutcome::AlreadyFlat => println!("No open position on {}.", symbol.to_uppercase()),
        CloseOutcome::Closed(order) => println!(
            "Position closed: {} {} {} (order id {})",
            order.side.as_str(),
            order.orig_qty,
            order.symbol,
            order.order_id
        ),
    }
    Ok(())
}

async fn handle_leverage(
    service: Arc<TradingService>,
    symbol: &str,
    leverage: i64,
) -> anyhow::Result<()> {
    let applied = service.set_leverage(symbol, leverage).await?;
    println!("Leverage on {} set to {}x.", symbol.to_uppercase(), applied);
    Ok(())
}

// ==============================================================================
// Table Rendering
// ==============================================================================

fn positions_table(positions: &[Position]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec![
        "Symbol",
        "Amount",
        "Entry Price",
        "Mark Price",
        "Unrealized PnL",
        "Leverage",
    ]);
    for p in positions {
        table.add_row(vec![
            p.symbol.clone(),
            p.position_amt.to_string(),
            p.entry_price.to_string(),
            p.mark_price.to_string(),
            p.unrealized_profit.to_string(),
            format!("{}x", p.leverage),
        ]);
    }
    table
}

fn orders_table(orders: &[Order]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec![
        "Order ID",
        "Symbol",
        "Side",
        "Type",
        "Qty",
        "Price",
        "Stop Price",
        "Status",
    ]);
    for o in orders {
        table.add_row(vec![
            o.order_id.to_string(),
            o.symbol.clone(),
            o.side.as_str().to_string(),
            o.order_type.as_str().to_string(),
            o.orig_qty.to_string(),
            o.price.to_string(),
            o.stop_price.to_string(),
            format!("{:?}", o.status),
        ]);
    }
    table
}
