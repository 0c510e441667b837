use log::{error, info, warn};
use sdwan_flow::downloader::save_details;
use sdwan_flow::render::sink_for;
use sdwan_flow::{
    BuildOptions, FlowError, FlowOutcome, FlowQuery, MissingOverlay, RenderFormat, RenderOptions,
    SchemaSpec, distinct_destinations, load_table, render_artifact, run_query,
};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

const USAGE: &str = "Usage: sdwan-flow <FILE> [options]

Options:
  --schema NAME|PATH.json      dual-underlay (default), single-underlay, destination-node
  --header-rows N              1 or 2 (default: from the schema)
  --list                       print the destination pick-list and exit
  --destination VALUE          rows whose destination equals VALUE
  --contains TEXT              rows whose destination contains TEXT, any case
  --format html|json|dot       output format (default: html)
  --output PATH                write the artifact to PATH instead of stdout
  --details PATH.csv|PATH.xlsx export the matched rows' key columns
  --title TEXT                 page title for html output
  --dedup-edges                add each (from, to, label) edge once
  --missing-overlay MODE       skip (default) or placeholder[=TEXT]";

#[derive(Debug)]
struct CliArgs {
    file: PathBuf,
    schema: String,
    header_rows: Option<usize>,
    list: bool,
    query: Option<FlowQuery>,
    format: RenderFormat,
    output: Option<PathBuf>,
    details: Option<PathBuf>,
    title: Option<String>,
    options: BuildOptions,
}

fn parse_args(args: &[String]) -> Result<CliArgs, String> {
    let mut file = None;
    let mut cli = CliArgs {
        file: PathBuf::new(),
        schema: "dual-underlay".to_string(),
        header_rows: None,
        list: false,
        query: None,
        format: RenderFormat::Html,
        output: None,
        details: None,
        title: None,
        options: BuildOptions::default(),
    };

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        let mut value = |flag: &str| {
            iter.next()
                .cloned()
                .ok_or_else(|| format!("{} needs a value", flag))
        };
        match arg.as_str() {
            "--schema" => cli.schema = value(arg)?,
            "--header-rows" => {
                let rows = value(arg)?;
                cli.header_rows = Some(
                    rows.parse()
                        .map_err(|_| format!("invalid header row count: {}", rows))?,
                );
            }
            "--list" => cli.list = true,
            "--destination" => cli.query = Some(FlowQuery::exact(value(arg)?)),
            "--contains" => cli.query = Some(FlowQuery::contains(value(arg)?)),
            "--format" => cli.format = value(arg)?.parse().map_err(|e: FlowError| e.to_string())?,
            "--output" | "-o" => cli.output = Some(PathBuf::from(value(arg)?)),
            "--details" => cli.details = Some(PathBuf::from(value(arg)?)),
            "--title" => cli.title = Some(value(arg)?),
            "--dedup-edges" => cli.options.dedup_edges = true,
            "--missing-overlay" => {
                let mode = value(arg)?;
                cli.options.missing_overlay = match mode.split_once('=') {
                    _ if mode == "skip" => MissingOverlay::Skip,
                    _ if mode == "placeholder" => MissingOverlay::Placeholder("nan".to_string()),
                    Some(("placeholder", text)) => MissingOverlay::Placeholder(text.to_string()),
                    _ => return Err(format!("invalid --missing-overlay mode: {}", mode)),
                };
            }
            "--help" | "-h" => return Err(String::new()),
            flag if flag.starts_with('-') => return Err(format!("unknown option: {}", flag)),
            path if file.is_none() => file = Some(PathBuf::from(path)),
            extra => return Err(format!("unexpected argument: {}", extra)),
        }
    }

    cli.file = file.ok_or_else(|| "missing input file".to_string())?;
    if !cli.list && cli.query.is_none() {
        return Err("one of --list, --destination or --contains is required".to_string());
    }
    Ok(cli)
}

fn run(cli: CliArgs) -> Result<(), FlowError> {
    let schema = SchemaSpec::load(&cli.schema)?;
    let table = load_table(&cli.file, &schema, cli.header_rows)?;

    if cli.list {
        for destination in distinct_destinations(&table) {
            println!("{}", destination);
        }
        return Ok(());
    }

    let Some(query) = cli.query else {
        return Ok(());
    };
    let report = match run_query(&table, &query, &cli.options) {
        FlowOutcome::Rendered(report) => report,
        FlowOutcome::NoMatch { query } => {
            eprintln!("warning: No matching destination found for '{}'", query.value);
            return Ok(());
        }
    };

    if let Some(path) = &cli.details {
        save_details(&report.details, path)?;
        info!("details written to {}", path.display());
    }

    let options = RenderOptions {
        title: cli
            .title
            .unwrap_or_else(|| format!("Flow for destination: {}", query.value)),
        ..RenderOptions::default()
    };
    let sink = sink_for(cli.format, options, Some(report.details.clone()));
    let artifact = render_artifact(sink.as_ref(), &report.graph)?;

    match &cli.output {
        Some(path) => {
            std::fs::write(path, artifact)?;
            println!(
                "{} rows matched, {} nodes, {} edges -> {}",
                report.matched,
                report.graph.node_count(),
                report.graph.edge_count(),
                path.display()
            );
            print!("{}", report.details.to_text());
        }
        None => print!("{}", artifact),
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args: Vec<String> = env::args().skip(1).collect();
    let cli = match parse_args(&args) {
        Ok(cli) => cli,
        Err(message) => {
            if message.is_empty() {
                println!("{}", USAGE);
                return ExitCode::SUCCESS;
            }
            eprintln!("error: {}\n\n{}", message, USAGE);
            return ExitCode::from(2);
        }
    };

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(FlowError::SchemaMismatch { missing }) => {
            error!("schema mismatch: {:?}", missing);
            eprintln!("error: Missing columns in uploaded file: {}", missing.join(", "));
            ExitCode::from(1)
        }
        Err(e) => {
            warn!("{:?}", e);
            eprintln!("error: {}", e);
            ExitCode::from(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_query_and_flags() {
        let cli = parse_args(&args(&[
            "routes.xlsx",
            "--contains",
            "pay",
            "--format",
            "dot",
            "--missing-overlay",
            "placeholder=?",
            "--dedup-edges",
        ]))
        .unwrap();
        assert_eq!(cli.file, PathBuf::from("routes.xlsx"));
        assert_eq!(cli.query, Some(FlowQuery::contains("pay")));
        assert_eq!(cli.format, RenderFormat::Dot);
        assert_eq!(cli.options.missing_overlay, MissingOverlay::Placeholder("?".into()));
        assert!(cli.options.dedup_edges);
    }

    #[test]
    fn rejects_bad_usage() {
        assert!(parse_args(&args(&["routes.xlsx"])).is_err());
        assert!(parse_args(&args(&["--list"])).is_err());
        assert!(parse_args(&args(&["a.csv", "--list", "--bogus"])).is_err());
        assert!(parse_args(&args(&["a.csv", "--destination"])).is_err());
        assert_eq!(parse_args(&args(&["-h"])).unwrap_err(), "");
    }
}
