//! `bodega-terminal`: line-oriented scanning session.
//!
//! Reads one command per line from stdin. A line that is not a command is
//! treated as a scan: `<codigo> [UBICACION]`.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use bodega_client::{
    ClientConfig, HttpTransport, OrchestratorError, PreviewOutcome, RetryPolicy, ScanFailure, ScanOrchestrator,
    ScanOutcome, SimulatedTransport, Transport,
};
use bodega_core::{CanonicalResult, CodeFormat, EntityType, ErrorContext};

#[derive(Debug, Parser)]
#[command(name = "bodega-terminal", version, about = "Terminal de escaneo de bodega")]
struct Args {
    /// Backend base URL.
    #[arg(long, env = "BODEGA_BASE_URL", default_value = "http://localhost:3000/api")]
    base_url: String,

    /// Per-attempt timeout in milliseconds.
    #[arg(long, env = "BODEGA_TIMEOUT_MS", default_value_t = 10_000)]
    timeout_ms: u64,

    /// Retries after the first attempt.
    #[arg(long, env = "BODEGA_RETRIES", default_value_t = 3)]
    retries: u32,

    /// Delay before the first retry, in milliseconds.
    #[arg(long, env = "BODEGA_BASE_BACKOFF_MS", default_value_t = 1_000)]
    base_backoff_ms: u64,

    /// Ceiling for any retry delay, in milliseconds.
    #[arg(long, env = "BODEGA_MAX_BACKOFF_MS", default_value_t = 30_000)]
    max_backoff_ms: u64,

    /// Committed scans kept in the session history.
    #[arg(long, env = "BODEGA_HISTORY_CAPACITY", default_value_t = 20)]
    history_capacity: usize,

    /// Digit count of box labels.
    #[arg(long, env = "BODEGA_BOX_LENGTH", default_value_t = 15)]
    box_length: usize,

    /// Digit counts of pallet labels, comma separated.
    #[arg(long, env = "BODEGA_PALLET_LENGTHS", value_delimiter = ',', default_values_t = [12, 16])]
    pallet_lengths: Vec<usize>,

    /// Version tag of the label format.
    #[arg(long, env = "BODEGA_CODE_FORMAT_VERSION", default_value_t = 3)]
    code_format_version: u32,

    /// Use the in-memory development backend.
    #[arg(long, env = "BODEGA_SIMULATED")]
    simulated: bool,

    /// Target location for scans that do not name one.
    #[arg(long, env = "BODEGA_DEFAULT_LOCATION", default_value = "BODEGA")]
    default_location: String,

    /// Emit logs as JSON lines.
    #[arg(long, env = "BODEGA_LOG_JSON")]
    log_json: bool,
}

impl Args {
    fn client_config(&self) -> anyhow::Result<ClientConfig> {
        let code_format = CodeFormat::new(self.code_format_version, self.box_length, self.pallet_lengths.clone())
            .context("invalid code format")?;
        let config = ClientConfig {
            base_url: self.base_url.clone(),
            retry: RetryPolicy {
                timeout: Duration::from_millis(self.timeout_ms),
                retries: self.retries,
                base_delay: Duration::from_millis(self.base_backoff_ms),
                max_delay: Duration::from_millis(self.max_backoff_ms),
            },
            use_simulated_backend: self.simulated,
            history_capacity: self.history_capacity,
            code_format,
        };
        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // Logs go to stderr; stdout belongs to the operator.
    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq)]
enum Command<'a> {
    Scan { code: &'a str, location: Option<&'a str> },
    Confirm,
    Cancel,
    Report(&'a str),
    Preview,
    History,
    Locations,
    Sales,
    Ping,
    Help,
    Quit,
}

fn parse_command(line: &str) -> Option<Command<'_>> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let (head, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim();
    let command = match head.to_lowercase().as_str() {
        "confirmar" | "y" | "s" => Command::Confirm,
        "cancelar" | "n" => Command::Cancel,
        "reportar" => Command::Report(rest),
        "contenido" => Command::Preview,
        "historial" => Command::History,
        "ubicaciones" => Command::Locations,
        "ventas" => Command::Sales,
        "ping" => Command::Ping,
        "ayuda" | "?" => Command::Help,
        "salir" | "q" => Command::Quit,
        _ => Command::Scan {
            code: head,
            location: (!rest.is_empty()).then_some(rest),
        },
    };
    Some(command)
}

const HELP: &str = "\
comandos:
  <codigo> [UBICACION]   escanear una caja o pallet
  confirmar | y          confirmar el pallet pendiente
  cancelar | n           cancelar el paso en curso
  reportar <motivo>      reportar un problema con el pallet pendiente
  contenido              ver las cajas del pallet pendiente
  historial              últimos movimientos registrados
  ubicaciones            ubicaciones permitidas
  ventas                 ventas en borrador
  ping                   comprobar el servidor
  salir | q              terminar";

fn print_failure(failure: &ScanFailure) {
    println!("✗ {}", failure.message);
    if let Some(suggestion) = &failure.suggestion {
        println!("  → {suggestion}");
    }
}

fn print_outcome(outcome: &ScanOutcome) {
    match outcome {
        ScanOutcome::Committed(result) => println!(
            "✓ {} {} movido a {}",
            result.code.entity_type.label(),
            result.code.normalized,
            result.location
        ),
        ScanOutcome::AwaitingConfirmation(pending) => println!(
            "? pallet {} hacia {}: confirmar (y), cancelar (n) o reportar <motivo>",
            pending.code.normalized, pending.requested_location
        ),
        ScanOutcome::AlreadyCommitted(result) => {
            println!("✓ {} ya fue registrado", result.code.normalized);
        }
        ScanOutcome::IssueReported { code, reason } => println!("✓ problema reportado para {code}: {reason}"),
        ScanOutcome::Failed(failure) => print_failure(failure),
        ScanOutcome::Cancelled => println!("operación cancelada"),
    }
}

// ---------------------------------------------------------------------------
// Session loop
// ---------------------------------------------------------------------------

fn print_step(result: &Result<ScanOutcome, OrchestratorError>) {
    match result {
        Ok(outcome) => print_outcome(outcome),
        Err(e) => println!("✗ {e}"),
    }
}

/// Run one network step; Ctrl-C drops it instead of ending the process.
///
/// A dropped orchestrator step retires its request and aborts an open
/// commit, so the session is left where the step found it.
async fn interruptible<F: Future>(step: F) -> Option<F::Output> {
    tokio::select! {
        output = step => Some(output),
        _ = tokio::signal::ctrl_c() => {
            info!("step interrupted");
            println!("operación cancelada");
            None
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config = args.client_config()?;
    let transport: Arc<dyn Transport> = if config.use_simulated_backend {
        info!("using simulated backend");
        Arc::new(SimulatedTransport::new())
    } else {
        Arc::new(HttpTransport::new(&config.base_url).context("building http client")?)
    };
    let orchestrator = ScanOrchestrator::new(transport, &config);
    let session = CancellationToken::new();

    info!(base_url = %config.base_url, simulated = config.use_simulated_backend, "terminal ready");
    println!("{HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        // Ctrl-C at the prompt quits.
        let line = tokio::select! {
            line = lines.next_line() => line.context("reading stdin")?,
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted at prompt");
                break;
            }
        };
        let Some(line) = line else {
            break;
        };
        let Some(command) = parse_command(&line) else {
            continue;
        };
        match command {
            Command::Scan { code, location } => {
                let location = location.unwrap_or(&args.default_location);
                if let Some(result) = interruptible(orchestrator.submit_scan(code, location)).await {
                    print_step(&result);
                }
            }
            Command::Confirm => {
                if let Some(result) = interruptible(orchestrator.confirm()).await {
                    print_step(&result);
                }
            }
            Command::Report(reason) => {
                if let Some(result) = interruptible(orchestrator.report_issue(reason)).await {
                    print_step(&result);
                }
            }
            Command::Cancel => match orchestrator.cancel() {
                Ok(state) => println!("estado: {}", state.name()),
                Err(e) => println!("✗ {e}"),
            },
            Command::Preview => match interruptible(orchestrator.preview_pending()).await {
                None => {}
                Some(Ok(PreviewOutcome::Contents { code, boxes })) => {
                    println!("pallet {code}: {} cajas", boxes.len());
                    for b in boxes {
                        println!("  {b}");
                    }
                }
                Some(Ok(PreviewOutcome::Failed(failure))) => print_failure(&failure),
                Some(Ok(PreviewOutcome::Cancelled)) => println!("operación cancelada"),
                Some(Err(e)) => println!("✗ {e}"),
            },
            Command::History => {
                for entry in orchestrator.history() {
                    if let Some(result) = entry.result.data() {
                        println!(
                            "{}  {} {} → {}",
                            entry.timestamp_ms,
                            result.code.entity_type.label(),
                            result.code.normalized,
                            result.location
                        );
                    }
                }
            }
            Command::Locations => {
                for entity in [EntityType::Box, EntityType::Pallet] {
                    let names: Vec<&str> = orchestrator
                        .valid_locations(entity)
                        .iter()
                        .map(|l| l.as_str())
                        .collect();
                    println!("{}: {}", entity.label(), names.join(", "));
                }
            }
            Command::Sales => {
                if let Some(result) = interruptible(orchestrator.api().list_draft_sales(&session)).await {
                    match result.into_result() {
                        Ok(sales) => {
                            for sale in sales {
                                println!("{}  {} ítems", sale.id, sale.items.len());
                            }
                        }
                        Err(failure) => print_failure(&ScanFailure::from_failure(&failure, Some(ErrorContext::Sale))),
                    }
                }
            }
            Command::Ping => match interruptible(orchestrator.api().ping(&session))
                .await
                .map(CanonicalResult::into_result)
            {
                None => {}
                Some(Ok(body)) => println!("servidor disponible: {body}"),
                Some(Err(failure)) => print_failure(&ScanFailure::from_failure(&failure, None)),
            },
            Command::Help => println!("{HELP}"),
            Command::Quit => break,
        }
    }

    session.cancel();
    info!("terminal closed");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.log_json);
    run(args).await
}
