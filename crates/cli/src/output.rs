//! Table rendering for command output.

use alphapulse_domain::entities::{Order, SymbolStatistics, TrackingSample};
use alphapulse_execution::prelude::{JobOutcome, SignalJobStatus, SweepReport, TaskStatus};
use prettytable::{Table, row};
use rust_decimal::Decimal;
use std::time::Duration;

fn price(value: Option<Decimal>) -> String {
    value.map_or_else(|| "-".to_string(), |p| p.normalize().to_string())
}

fn percent(value: Decimal) -> String {
    format!("{:+.2}%", value)
}

fn countdown(value: Option<Duration>) -> String {
    value.map_or_else(|| "-".to_string(), |d| format!("{}s", d.as_secs()))
}

pub fn orders_table(orders: &[Order]) -> Table {
    let mut table = Table::new();
    table.set_titles(row![
        "ID", "Symbol", "Dir", "Risk", "Entry", "Stop", "T1", "T2", "T3", "Status", "Exit",
        "Profit", "Created"
    ]);
    for order in orders {
        table.add_row(row![
            order.id,
            order.symbol,
            order.direction,
            order.risk_level,
            price(Some(order.entry_price)),
            price(order.stop_loss),
            price(order.targets.t1),
            price(order.targets.t2),
            price(order.targets.t3),
            order.status,
            price(order.closed_price),
            order
                .final_profit_percentage
                .map_or_else(|| "-".to_string(), percent),
            order.created_at.format("%Y-%m-%d %H:%M"),
        ]);
    }
    table
}

pub fn history_table(samples: &[TrackingSample]) -> Table {
    let mut table = Table::new();
    table.set_titles(row!["Time", "Cadence", "Price", "Profit", "SL", "TP", "Target"]);
    for sample in samples {
        table.add_row(row![
            sample.tracked_at.format("%Y-%m-%d %H:%M:%S"),
            sample.cadence,
            price(Some(sample.price)),
            percent(sample.profit_percentage),
            if sample.stop_loss_triggered { "yes" } else { "" },
            if sample.take_profit_triggered { "yes" } else { "" },
            sample.triggered_target.map_or("", |t| t.as_str()),
        ]);
    }
    table
}

pub fn sweep_table(report: &SweepReport) -> Table {
    let mut table = Table::new();
    table.set_titles(row![
        "Cadence", "Due", "Evaluated", "Transitioned", "Already closed", "Skipped", "Failed"
    ]);
    table.add_row(row![
        report.cadence,
        report.due,
        report.evaluated,
        report.transitioned,
        report.already_closed,
        report.skipped,
        report.failed,
    ]);
    table
}

/// One row per symbol, plus a total row when there is more than one symbol.
pub fn stats_table(stats: &[SymbolStatistics]) -> Table {
    let mut table = Table::new();
    table.set_titles(row![
        "Symbol", "Orders", "Open", "Closed", "Wins", "Losses", "Win rate", "Total profit"
    ]);
    let total = (stats.len() > 1).then(|| SymbolStatistics::total("TOTAL", stats));
    for s in stats.iter().chain(total.as_ref()) {
        table.add_row(row![
            s.symbol,
            s.total_orders,
            s.open_orders,
            s.closed_orders,
            s.wins,
            s.losses,
            s.win_rate()
                .map_or_else(|| "-".to_string(), |rate| format!("{rate:.2}%")),
            percent(s.total_profit),
        ]);
    }
    table
}

pub fn tasks_table(tasks: &[TaskStatus]) -> Table {
    let mut table = Table::new();
    table.set_titles(row!["Task", "Enabled", "Runs", "Last run", "Next in"]);
    for task in tasks {
        table.add_row(row![
            task.name,
            task.enabled,
            task.run_count,
            task.last_run
                .map_or_else(|| "-".to_string(), |t| t.format("%H:%M:%S").to_string()),
            countdown(task.next_run_in),
        ]);
    }
    table
}

pub fn jobs_table(jobs: &[SignalJobStatus]) -> Table {
    let mut table = Table::new();
    table.set_titles(row!["Job", "Symbol", "Cadence", "Paused", "Runs", "Last outcome", "Next in"]);
    for status in jobs {
        let job = &status.job;
        table.add_row(row![
            job.id,
            job.symbol,
            job.cadence,
            job.paused,
            job.run_count,
            job.last_run
                .as_ref()
                .map_or_else(|| "-".to_string(), |run| outcome(&run.outcome)),
            countdown(status.next_run_in),
        ]);
    }
    table
}

pub fn outcome(outcome: &JobOutcome) -> String {
    match outcome {
        JobOutcome::OrderOpened(id) => format!("opened {id}"),
        JobOutcome::Hold => "hold".to_string(),
        JobOutcome::Rejected(reason) => format!("rejected: {reason}"),
        JobOutcome::Failed(reason) => format!("failed: {reason}"),
    }
}
