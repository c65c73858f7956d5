use std::sync::Arc;

use anyhow::Context;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use common::{Config, Signal};
use connector::{usdt_wallet_balance, BinanceFuturesClient};
use strategy::{StrategyFileConfig, StrategyRunner};
use telegram_notify::{format_signal, TelegramNotifier};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── Logging ──────────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    info!("Starting Arbix application...");

    // ── Config ────────────────────────────────────────────────────────────────
    let cfg = Config::from_env().context("failed to load configuration")?;
    let project = cfg.project_name.clone();
    info!(testnet = cfg.binance_testnet, "Welcome to {project}!");

    // ── Telegram ──────────────────────────────────────────────────────────────
    let notifier = Arc::new(TelegramNotifier::new(
        cfg.telegram_token.clone(),
        cfg.telegram_chat_id,
    ));
    notifier
        .send_message(&format!("{project} instance started successfully."))
        .await;

    // ── Exchange connector ────────────────────────────────────────────────────
    let client = match BinanceFuturesClient::new(
        &cfg.binance_api_key,
        &cfg.binance_secret,
        &cfg.binance_futures_base_url,
    ) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            error!(error = %e, "Could not initialize Binance connector");
            notifier
                .send_message(&format!("Error: Could not initialize Binance Connector: {e}"))
                .await;
            return Err(e.into());
        }
    };
    info!(base_url = %client.base_url(), "Binance Connector initialized");

    if let Err(e) = client.ping().await {
        warn!(error = %e, "Binance Futures API ping failed");
    }

    let status = match client.server_time().await {
        Ok(ms) => format!("Binance Futures connection successful. Server Time: {ms}"),
        Err(e) => {
            warn!(error = %e, "Failed to get Binance Futures server time");
            "Binance Futures connection successful, but couldn't fetch server time.".to_string()
        }
    };
    notifier.send_message(&status).await;

    match client.account_assets().await {
        Ok(assets) => match usdt_wallet_balance(&assets) {
            Some(balance) => info!(balance, "Futures USDT wallet balance"),
            None => info!("No USDT balance found in futures account assets"),
        },
        Err(e) => warn!(error = %e, "Failed to get futures account balance"),
    }

    // ── Strategies ────────────────────────────────────────────────────────────
    let strategy_file = match StrategyFileConfig::load(&cfg.strategy_config_path) {
        Ok(file) => file,
        Err(e) => {
            error!(error = %e, "Strategy configuration unusable");
            notifier
                .send_message(&format!("CRITICAL Error: strategy configuration unusable: {e}"))
                .await;
            return Err(e.into());
        }
    };
    let runner = StrategyRunner::from_config(&strategy_file, client.clone())
        .context("failed to build strategies")?;
    if runner.is_empty() {
        warn!(path = %cfg.strategy_config_path, "No strategies configured");
    }

    // ── Signal forwarder (sends BUY/SELL to Telegram) ─────────────────────────
    let (signal_tx, mut signal_rx) = mpsc::channel::<Signal>(128);
    let forward_to = notifier.clone();
    let forwarder = tokio::spawn(async move {
        while let Some(signal) = signal_rx.recv().await {
            if signal.signal_type().is_actionable() {
                forward_to.send_message(&format_signal(&signal)).await;
            } else {
                debug!(
                    symbol = %signal.symbol(),
                    signal = %signal.signal_type(),
                    reason = signal.reason().unwrap_or_default(),
                    "Signal not forwarded"
                );
            }
        }
    });

    // ── Main loop ─────────────────────────────────────────────────────────────
    info!(every = ?cfg.poll_interval, "Setup complete. Entering evaluation loop.");
    tokio::select! {
        _ = runner.run(cfg.poll_interval, signal_tx) => {
            warn!("Strategy runner stopped");
        }
        res = tokio::signal::ctrl_c() => {
            if let Err(e) = res {
                error!(error = %e, "Failed to listen for shutdown signal");
            }
            info!("Arbix application shutting down by user request.");
        }
    }

    // The runner (and its sender) is gone, so the forwarder drains and exits.
    if let Err(e) = forwarder.await {
        warn!(error = %e, "Signal forwarder ended abnormally");
    }
    notifier
        .send_message(&format!("{project} main process stopped."))
        .await;
    info!("Arbix application stopped.");
    Ok(())
}
