use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

#[cfg(not(feature = "http_server"))]
use anyhow::bail;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use nal2_bridge::config::BridgeConfig;
use nal2_bridge::context::FittingContext;
use nal2_bridge::dispatch::{DispatchRequest, Dispatcher};
use nal2_bridge::engine::{EntryPoint, StubEngine};
use nal2_bridge::facade::Nal2Facade;
use serde::Serialize;
use serde_json::{Map, Value};

#[derive(Parser, Debug)]
#[command(
    name = "nal2_cli",
    about = "Command-line harness for the NAL-NL2 fitting bridge"
)]
struct Cli {
    /// JSON configuration file (defaults to assets/nal2_config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Override the engine shared library path
    #[arg(long, global = true)]
    library: Option<String>,
    /// Use the in-process stub engine instead of the native library
    #[arg(long, global = true)]
    stub: bool,
    /// Print diagnostic events to stderr after the command
    #[arg(long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Call one engine function through the JSON dispatcher
    Call {
        /// Engine function name, e.g. getMPO_NL2
        #[arg(long)]
        function: String,
        /// Input parameters as inline JSON or @path/to/file.json
        #[arg(long)]
        params: Option<String>,
        #[arg(long, default_value_t = 1)]
        sequence: i64,
    },
    /// List the entry points the engine exposes
    Capabilities {
        #[arg(long)]
        json: bool,
    },
    /// Serve the dispatcher over HTTP (requires http_server feature)
    Serve {
        /// Bind address; defaults to the configured one
        #[arg(long)]
        addr: Option<String>,
    },
}

#[derive(Serialize)]
struct CapabilityReport {
    description: String,
    exposed: Vec<&'static str>,
    missing: Vec<&'static str>,
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    if cli.verbose {
        nal2_bridge::init_logging();
    }
    let context = Arc::new(build_context(&cli));

    let code = match cli.command {
        Commands::Call {
            function,
            params,
            sequence,
        } => run_call(&context, function, params, sequence),
        Commands::Capabilities { json } => run_capabilities(&context, json),
        Commands::Serve { addr } => run_serve(&context, addr),
    };

    if cli.verbose {
        for event in context.sink().snapshot().recent {
            eprintln!("[{}] {} {}", event.level, event.tag, event.rendered());
        }
    }
    code
}

fn build_context(cli: &Cli) -> FittingContext {
    let mut config = match &cli.config {
        Some(path) => BridgeConfig::load_from_file(path).with_env_overrides(),
        None => BridgeConfig::load_platform(),
    };
    if let Some(library) = &cli.library {
        config.engine.library_path = library.clone();
    }

    if cli.stub {
        FittingContext::with_engine(config, Arc::new(StubEngine::new()))
    } else {
        FittingContext::new(config)
    }
}

fn read_params(raw: Option<String>) -> Result<Map<String, Value>> {
    let Some(raw) = raw else {
        return Ok(Map::new());
    };
    let text = match raw.strip_prefix('@') {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("reading parameters from {}", path))?,
        None => raw,
    };
    serde_json::from_str(&text).context("parsing input parameters as a JSON object")
}

fn run_call(
    context: &Arc<FittingContext>,
    function: String,
    params: Option<String>,
    sequence: i64,
) -> Result<ExitCode> {
    let dispatcher = Dispatcher::new(Nal2Facade::new(Arc::clone(context)));
    let response = dispatcher.handle(DispatchRequest {
        sequence_num: sequence,
        function,
        input_parameters: Some(read_params(params)?),
    });

    println!("{}", serde_json::to_string_pretty(&response)?);
    if response.return_code == 0 {
        Ok(ExitCode::from(0))
    } else {
        Ok(ExitCode::from(2))
    }
}

fn run_capabilities(context: &Arc<FittingContext>, json: bool) -> Result<ExitCode> {
    let handle = context.engine().context("loading fitting engine")?;
    let capabilities = handle.capabilities();
    let report = CapabilityReport {
        description: handle.describe(),
        exposed: capabilities.exposed().map(EntryPoint::symbol).collect(),
        missing: capabilities.missing().map(EntryPoint::symbol).collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(ExitCode::from(0));
    }

    println!(
        "{}: {} of {} entry points",
        report.description,
        report.exposed.len(),
        EntryPoint::ALL.len()
    );
    for symbol in &report.missing {
        println!("  missing {}", symbol);
    }
    Ok(ExitCode::from(0))
}

fn run_serve(context: &Arc<FittingContext>, addr: Option<String>) -> Result<ExitCode> {
    #[cfg(feature = "http_server")]
    {
        use nal2_bridge::http::{parse_bind_addr, run_http_server, HttpState};

        let addr = parse_bind_addr(addr.as_deref().unwrap_or(&context.config().http.bind_addr));
        let dispatcher = Arc::new(Dispatcher::new(Nal2Facade::new(Arc::clone(context))));
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .context("building tokio runtime")?;

        println!("Serving NAL2 dispatcher on http://{}", addr);
        runtime.block_on(run_http_server(HttpState::new(dispatcher, addr.port()), addr))?;
        return Ok(ExitCode::from(0));
    }

    #[cfg(not(feature = "http_server"))]
    {
        let _ = (context, addr);
        bail!("nal2_cli serve requires the http_server feature");
    }
}
