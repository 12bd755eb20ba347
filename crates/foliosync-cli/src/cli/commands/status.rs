//! Broker status command handlers.

use anyhow::{Context, Result};
use comfy_table::{Cell, Table};
use foliosync_core::brokers::{BrokerStatus, ConnectionState, StatusAggregator};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::build_stack;

pub async fn once() -> Result<()> {
    let stack = build_stack()?;
    let aggregator = StatusAggregator::new(stack.client);
    print_table(&aggregator.all_statuses().await);
    Ok(())
}

pub async fn watch() -> Result<()> {
    let stack = build_stack()?;
    let interval = stack.config.poll_interval();
    let aggregator = StatusAggregator::new(stack.client);

    let (tx, mut rx) = watch::channel(Vec::new());
    let cancel = CancellationToken::new();

    let ctrlc_cancel = cancel.clone();
    ctrlc::set_handler(move || ctrlc_cancel.cancel())
        .context("Failed to install Ctrl-C handler")?;

    let poll_cancel = cancel.clone();
    let poller =
        tokio::spawn(async move { aggregator.poll(interval, poll_cancel, tx).await });

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                print_table(&rx.borrow_and_update());
            }
        }
    }

    poller.await.context("Status poll task failed")?;
    Ok(())
}

fn print_table(statuses: &[BrokerStatus]) {
    let mut table = Table::new();
    table.set_header(["Broker", "Status", "Connected", "Last checked"]);
    for record in statuses {
        table.add_row([
            Cell::new(record.broker.label()),
            Cell::new(state_label(record.status)),
            Cell::new(if record.connected { "yes" } else { "no" }),
            Cell::new(record.last_checked.format("%H:%M:%S").to_string()),
        ]);
    }
    println!("{table}");
}

fn state_label(state: ConnectionState) -> &'static str {
    match state {
        ConnectionState::Connected => "CONNECTED",
        ConnectionState::Disconnected => "DISCONNECTED",
        ConnectionState::Error => "ERROR",
    }
}
