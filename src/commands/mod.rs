pub mod analyze;
pub mod dump;
pub mod parse;
pub mod status;

use std::io::{self, BufRead, Write};
use std::sync::mpsc;
use std::thread;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info, warn};

use crate::cli::{ExtractArgs, LayoutFallback};
use crate::extract::{
    Callbacks, CancelFlag, CardParser, ExtractConfig, ExtractError, PdftoppmRasterizer,
    PdftotextDecoder,
};
use crate::model::CardRecord;

/// What the analysis worker reports back to the command thread.
#[derive(Debug)]
pub enum WorkerEvent {
    Progress(Option<f64>, String),
    PageProgress(f64),
    FileCompleted(String, Vec<CardRecord>),
    /// A question for the user; the answer goes back on the sender.
    Ask(String, mpsc::Sender<bool>),
    FileFailed(String),
}

pub fn extract_config(args: &ExtractArgs) -> ExtractConfig {
    let mut config = ExtractConfig {
        index_dir: args.index_dir.clone(),
        ..ExtractConfig::default()
    };
    if let Some(work_dir) = &args.work_dir {
        config.work_dir = work_dir.clone();
    }
    config
}

/// Run the card parser on a worker thread, feeding its events to `handle`.
///
/// Questions are answered on the worker when the fallback policy is fixed and
/// forwarded to `handle` otherwise. An error from `handle` cancels the worker
/// and is returned once it has stopped.
pub fn run_extraction<F>(
    args: &ExtractArgs,
    mut handle: F,
) -> Result<Result<Vec<CardRecord>, ExtractError>>
where
    F: FnMut(WorkerEvent, &CancelFlag) -> Result<()>,
{
    let decoder = PdftotextDecoder::new()?;
    let config = extract_config(args);
    let cancel = CancelFlag::new();

    let target = args.cards.clone();
    let max_pages = args.max_pages;
    let image_resolution = args.image_resolution();
    let layout_fallback = args.layout_fallback;
    let keep_going = args.keep_going;

    let (tx, rx) = mpsc::channel();
    let worker_cancel = cancel.clone();
    let worker = thread::Builder::new()
        .name("card-analysis".to_string())
        .spawn(move || {
            let callbacks = worker_callbacks(&tx, layout_fallback, keep_going);
            CardParser::new(config, Box::new(decoder), Box::new(PdftoppmRasterizer))
                .with_cancel_flag(worker_cancel)
                .with_callbacks(callbacks)
                .parse(&target, max_pages, image_resolution)
        })
        .context("failed to spawn analysis worker")?;

    let mut handler_error = None;
    for event in rx.iter() {
        if let Err(err) = handle(event, &cancel) {
            cancel.cancel();
            handler_error = Some(err);
            break;
        }
    }
    drop(rx);

    let result = worker
        .join()
        .map_err(|_| anyhow!("analysis worker panicked"))?;
    match handler_error {
        Some(err) => Err(err),
        None => Ok(result),
    }
}

fn worker_callbacks(
    tx: &mpsc::Sender<WorkerEvent>,
    layout_fallback: LayoutFallback,
    keep_going: bool,
) -> Callbacks<'static> {
    // send errors mean the command thread has stopped listening; the cancel
    // flag takes care of stopping the worker
    let progress_tx = tx.clone();
    let page_tx = tx.clone();
    let completed_tx = tx.clone();
    let ask_tx = tx.clone();
    let error_tx = tx.clone();

    let on_ask: Box<dyn FnMut(&str) -> bool> = match layout_fallback {
        LayoutFallback::Always => Box::new(|_: &str| true),
        LayoutFallback::Never => Box::new(|_: &str| false),
        LayoutFallback::Ask => Box::new(move |question: &str| {
            let (reply_tx, reply_rx) = mpsc::channel();
            if ask_tx
                .send(WorkerEvent::Ask(question.to_string(), reply_tx))
                .is_err()
            {
                return false;
            }
            reply_rx.recv().unwrap_or(false)
        }),
    };

    Callbacks {
        on_progress: Some(Box::new(move |fraction: Option<f64>, message: &str| {
            let _ = progress_tx.send(WorkerEvent::Progress(fraction, message.to_string()));
        })),
        on_page_progress: Some(Box::new(move |fraction: f64| {
            let _ = page_tx.send(WorkerEvent::PageProgress(fraction));
        })),
        on_file_completed: Some(Box::new(
            move |file: &str, cards: &mut Vec<CardRecord>| {
                let cards = std::mem::take(cards);
                let _ = completed_tx.send(WorkerEvent::FileCompleted(file.to_string(), cards));
            },
        )),
        on_ask: Some(on_ask),
        on_error: keep_going.then(|| -> Box<dyn FnMut(&str)> {
            Box::new(move |message: &str| {
                let _ = error_tx.send(WorkerEvent::FileFailed(message.to_string()));
            })
        }),
    }
}

/// Log the progress events every command treats the same way.
pub fn log_progress(event: &WorkerEvent) {
    match event {
        WorkerEvent::Progress(Some(fraction), message) => {
            info!(progress = %format!("{:.0}%", fraction * 100.0), "{message}");
        }
        WorkerEvent::Progress(None, message) => debug!("{message}"),
        WorkerEvent::PageProgress(fraction) => {
            debug!(page_progress = %format!("{:.0}%", fraction * 100.0), "page progress");
        }
        WorkerEvent::FileFailed(message) => warn!(error = %message, "file failed"),
        WorkerEvent::FileCompleted(..) | WorkerEvent::Ask(..) => {}
    }
}

/// Ask on the terminal. `None` means the user asked to cancel.
pub fn prompt_user(question: &str) -> Result<Option<bool>> {
    let mut stderr = io::stderr().lock();
    writeln!(stderr, "{question}")?;
    write!(stderr, "[y/N/c] ")?;
    stderr.flush()?;

    let mut answer = String::new();
    io::stdin()
        .lock()
        .read_line(&mut answer)
        .context("failed to read answer from stdin")?;

    Ok(parse_answer(&answer))
}

fn parse_answer(answer: &str) -> Option<bool> {
    match answer.trim().to_lowercase().as_str() {
        "y" | "yes" => Some(true),
        "c" | "cancel" => None,
        _ => Some(false),
    }
}

/// Answer a forwarded question, cancelling the worker when asked to.
pub fn answer_question(
    question: &str,
    reply: mpsc::Sender<bool>,
    cancel: &CancelFlag,
) -> Result<()> {
    let answer = match prompt_user(question)? {
        Some(answer) => answer,
        None => {
            info!("cancel requested");
            cancel.cancel();
            false
        }
    };
    // the worker may already have stopped
    let _ = reply.send(answer);
    Ok(())
}
