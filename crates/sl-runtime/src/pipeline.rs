//! The engine: one task per operator, bounded channels in between.
//!
//! Each task is the single consumer of its input channel and the single
//! producer on its output channel; a full channel blocks the producer.
//! On input EOF the ingress task drops its sender and the close cascades
//! stage by stage: the window flushes its open windows with `reason=eof`,
//! every later stage drains, and `run` returns after the final flush.

use std::io::{Read, Write};
use std::time::Instant;

use anyhow::Context;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use sl_config::EngineConfig;
use sl_core::operator::{AggregateOp, EgressOp, FilterOp, IngressParser, ProjectOp};
use sl_core::row::{AggregateRow, EgressRow, IngressRow, RowLayout};
use sl_core::window::{self, ClosedWindow, WindowMachine};
use sl_lang::plan::{OperatorType, PlanNode};

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// A runnable instance of one compiled plan.
pub struct Pipeline {
    config: EngineConfig,
    parser: IngressParser,
    ingress_filter: FilterOp,
    machine: WindowMachine,
    aggregate: AggregateOp,
    aggregate_filter: FilterOp,
    project: ProjectOp,
    project_filter: FilterOp,
}

impl Pipeline {
    /// Instantiate every operator from the plan. Layouts and field
    /// indexes are derived here; execution never consults the catalog.
    pub fn new(plan: &PlanNode, config: EngineConfig) -> anyhow::Result<Self> {
        let node = |op: OperatorType| {
            plan.find(op)
                .with_context(|| format!("plan has no {op:?} node"))
        };

        let ingress_node = node(OperatorType::Ingress)?;
        let ingress_layout = RowLayout::new(&ingress_node.fields, &ingress_node.group_fields)?;

        let aggregate_node = node(OperatorType::Aggregate)?;
        let aggregate_layout =
            RowLayout::new(&aggregate_node.fields, &aggregate_node.group_fields)?;

        let window_node = node(OperatorType::Window)?;
        let machine = window::build_machine(window_node, &ingress_layout, config.window.max_rows)?;

        let aggregate = AggregateOp::from_node(aggregate_node, &ingress_layout)?;
        let project = ProjectOp::from_node(node(OperatorType::Project)?, &aggregate_layout)?;

        Ok(Self {
            config,
            parser: IngressParser::new(ingress_layout),
            ingress_filter: FilterOp::from_node(node(OperatorType::IngressFilter)?),
            machine,
            aggregate,
            aggregate_filter: FilterOp::from_node(node(OperatorType::AggregateFilter)?),
            project,
            project_filter: FilterOp::from_node(node(OperatorType::ProjectFilter)?),
        })
    }

    /// Run to completion: CSV rows in from `reader`, CSV rows out to
    /// `writer`. Returns the writer once the output stage has flushed its
    /// last record.
    pub async fn run<R, W>(self, reader: R, writer: W) -> anyhow::Result<W>
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
    {
        let capacity = self.config.channels.capacity;
        let separator = self.config.csv.separator_byte();
        let counter_interval = self.config.logging.counter_interval.as_duration();

        let (in_tx, in_rx) = mpsc::channel::<IngressRow>(capacity);
        let (win_tx, win_rx) = mpsc::channel::<IngressRow>(capacity);
        let (agg_tx, agg_rx) = mpsc::channel::<ClosedWindow>(capacity);
        let (agf_tx, agf_rx) = mpsc::channel::<AggregateRow>(capacity);
        let (prj_tx, prj_rx) = mpsc::channel::<AggregateRow>(capacity);
        let (prf_tx, prf_rx) = mpsc::channel::<EgressRow>(capacity);
        let (out_tx, out_rx) = mpsc::channel::<EgressRow>(capacity);

        sl_info!(sys, capacity, "pipeline starting");

        let ingress = ingress_task(reader, separator, counter_interval, self.parser, in_tx);
        let filters = [
            spawn_ingress_filter(self.ingress_filter, in_rx, win_tx),
            spawn_window(self.machine, win_rx, agg_tx),
            spawn_aggregate(self.aggregate, agg_rx, agf_tx),
            spawn_aggregate_filter(self.aggregate_filter, agf_rx, prj_tx),
            spawn_project(self.project, prj_rx, prf_tx),
            spawn_project_filter(self.project_filter, prf_rx, out_tx),
        ];
        let egress = egress_task(writer, separator, out_rx);

        ingress.await.context("ingress task panicked")?;
        for handle in filters {
            handle.await.context("operator task panicked")?;
        }
        let writer = egress.await.context("egress task panicked")??;

        sl_info!(sys, "pipeline drained");
        Ok(writer)
    }
}

// ---------------------------------------------------------------------------
// Ingress
// ---------------------------------------------------------------------------

/// Blocking reader loop. Rows that fail to parse are dropped and
/// counted; the counter is reported periodically and once at EOF.
fn ingress_task<R: Read + Send + 'static>(
    reader: R,
    separator: u8,
    counter_interval: std::time::Duration,
    parser: IngressParser,
    tx: mpsc::Sender<IngressRow>,
) -> JoinHandle<()> {
    tokio::task::spawn_blocking(move || {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .comment(Some(b'#'))
            .delimiter(separator)
            .from_reader(reader);

        let mut record = csv::StringRecord::new();
        let mut accepted = 0u64;
        let mut dropped = 0u64;
        let mut last_report = Instant::now();

        loop {
            match csv_reader.read_record(&mut record) {
                Ok(false) => break,
                Ok(true) => match parser.parse(&record) {
                    Ok(row) => {
                        if tx.blocking_send(row).is_err() {
                            return;
                        }
                        accepted += 1;
                    }
                    Err(e) => {
                        dropped += 1;
                        sl_debug!(pipe, error = %e, "row dropped at ingress");
                    }
                },
                Err(e) => {
                    dropped += 1;
                    sl_debug!(pipe, error = %e, "unreadable record dropped at ingress");
                }
            }
            if dropped > 0 && last_report.elapsed() >= counter_interval {
                sl_warn!(pipe, dropped, accepted, "ingress drop counter");
                last_report = Instant::now();
            }
        }

        if dropped > 0 {
            sl_warn!(pipe, dropped, accepted, "ingress finished with drops");
        } else {
            sl_debug!(pipe, accepted, "ingress finished");
        }
    })
}

// ---------------------------------------------------------------------------
// Filters
// ---------------------------------------------------------------------------

fn spawn_ingress_filter(
    filter: FilterOp,
    mut rx: mpsc::Receiver<IngressRow>,
    tx: mpsc::Sender<IngressRow>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(row) = rx.recv().await {
            match filter.accept(&row.payload) {
                Ok(true) => {
                    if tx.send(row).await.is_err() {
                        return;
                    }
                }
                Ok(false) => {}
                Err(e) => sl_warn!(pipe, error = %e, "ingress filter failed, row dropped"),
            }
        }
    })
}

fn spawn_aggregate_filter(
    filter: FilterOp,
    mut rx: mpsc::Receiver<AggregateRow>,
    tx: mpsc::Sender<AggregateRow>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(row) = rx.recv().await {
            match filter.accept(&row.payload) {
                Ok(true) => {
                    if tx.send(row).await.is_err() {
                        return;
                    }
                }
                Ok(false) => {}
                Err(e) => sl_warn!(pipe, error = %e, "aggregate filter failed, row dropped"),
            }
        }
    })
}

fn spawn_project_filter(
    filter: FilterOp,
    mut rx: mpsc::Receiver<EgressRow>,
    tx: mpsc::Sender<EgressRow>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(row) = rx.recv().await {
            match filter.accept(&row.payload) {
                Ok(true) => {
                    if tx.send(row).await.is_err() {
                        return;
                    }
                }
                Ok(false) => {}
                Err(e) => sl_warn!(pipe, error = %e, "project filter failed, row dropped"),
            }
        }
    })
}

// ---------------------------------------------------------------------------
// Window
// ---------------------------------------------------------------------------

/// The window worker owns the machine outright. For LiveTime the ticker
/// is polled by the same `select!` loop that receives rows, so appends
/// and rotations are totally ordered without a lock; a row polled in the
/// same round as a tick lands in the window the tick closes.
fn spawn_window(
    mut machine: WindowMachine,
    mut rx: mpsc::Receiver<IngressRow>,
    tx: mpsc::Sender<ClosedWindow>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        match machine.tick_period() {
            Some(period) => {
                let start = tokio::time::Instant::now() + period;
                let mut ticker = tokio::time::interval_at(start, period);
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
                loop {
                    tokio::select! {
                        biased;
                        row = rx.recv() => match row {
                            Some(row) => {
                                if forward(&tx, machine.push(row)).await.is_err() {
                                    return;
                                }
                            }
                            None => break,
                        },
                        _ = ticker.tick() => {
                            if forward(&tx, machine.rotate()).await.is_err() {
                                return;
                            }
                        }
                    }
                }
            }
            None => {
                while let Some(row) = rx.recv().await {
                    if forward(&tx, machine.push(row)).await.is_err() {
                        return;
                    }
                }
            }
        }
        // Input drained: flush every open window downstream.
        let _ = forward(&tx, machine.flush()).await;
    })
}

async fn forward(
    tx: &mpsc::Sender<ClosedWindow>,
    windows: Vec<ClosedWindow>,
) -> Result<(), mpsc::error::SendError<ClosedWindow>> {
    for window in windows {
        tx.send(window).await?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Aggregate & project
// ---------------------------------------------------------------------------

fn spawn_aggregate(
    mut aggregate: AggregateOp,
    mut rx: mpsc::Receiver<ClosedWindow>,
    tx: mpsc::Sender<AggregateRow>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(window) = rx.recv().await {
            // Windows with zero rows are suppressed.
            if window.rows.is_empty() {
                continue;
            }
            let row = aggregate.apply(&window);
            if tx.send(row).await.is_err() {
                return;
            }
        }
    })
}

fn spawn_project(
    project: ProjectOp,
    mut rx: mpsc::Receiver<AggregateRow>,
    tx: mpsc::Sender<EgressRow>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(row) = rx.recv().await {
            if tx.send(project.project(row)).await.is_err() {
                return;
            }
        }
    })
}

// ---------------------------------------------------------------------------
// Egress
// ---------------------------------------------------------------------------

/// Blocking writer loop; flushes after every record.
fn egress_task<W: Write + Send + 'static>(
    writer: W,
    separator: u8,
    mut rx: mpsc::Receiver<EgressRow>,
) -> JoinHandle<anyhow::Result<W>> {
    tokio::task::spawn_blocking(move || {
        let mut csv_writer = csv::WriterBuilder::new()
            .delimiter(separator)
            .from_writer(writer);

        while let Some(row) = rx.blocking_recv() {
            let record = EgressOp::record(&row);
            csv_writer
                .write_record(record.iter().map(String::as_str))
                .context("egress write failed")?;
            csv_writer.flush().context("egress flush failed")?;
        }

        csv_writer
            .into_inner()
            .map_err(|e| anyhow::anyhow!("egress writer teardown: {e}"))
    })
}
