use std::path::{Path, PathBuf};
use anyhow::{Context, Result, bail};
use chrono::NaiveDateTime;
use clap::{ArgAction, ColorChoice, CommandFactory, Parser, ValueEnum};
use clap_complete::Shell;
use is_terminal::IsTerminal;
use serde::{Deserialize, Serialize};
use sshmon::config::{AppConfig, LogFormat, OutputFmt};
use sshmon::filter::{AddressSelection, EventFilter};
use sshmon::parser::LogParser;
use sshmon::sources::{self, ScanOptions};
use sshmon::store::{self, DatasetCache, LoadError, DEFAULT_REFERENCE_YEAR};
use sshmon::{report, EventCode};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
enum LogLevel { Error, Warn, Info, Debug, Trace }

impl From<LogLevel> for log::LevelFilter {
    fn from(l: LogLevel) -> Self {
        match l {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "sshmon",
    about = "SSH daemon log classifier and security report",
    long_about = "Classifies sshd authentication log lines into event categories, stores them as a CSV dataset and reports failures, break-in attempts, top source addresses and hourly activity.",
    after_long_help = "Examples:\n  sshmon --log /var/log/auth.log\n  sshmon --log /var/log --log-glob 'auth.log*' --data ssh.csv\n  sshmon --codes failed-password-root,E10 --top 10\n  sshmon --ip-pattern 173.234 --since '2024-12-10 06:00' --output json\n  sshmon --users root,admin --md-path report.md --csv-path filtered.csv",
    color = ColorChoice::Auto
)]
struct Args {
    /// Log file or directory to parse into the dataset
    #[arg(long, short = 'l')]
    log: Option<String>,
    #[arg(long, short = 'g')]
    log_glob: Option<String>,
    #[arg(long, default_value_t = false)]
    recursive: bool,
    /// Dataset CSV (default $SSHMON_DATA or ./datasetssh.csv)
    #[arg(long, short = 'd')]
    data: Option<String>,
    /// Year assigned to every timestamp; syslog stamps carry none
    #[arg(long, short = 'y')]
    year: Option<i32>,
    #[arg(long)]
    daemon_marker: Option<String>,
    #[arg(long, short = 'n', default_value_t = 5)]
    top: usize,
    #[arg(long, short = 'o', value_enum, default_value = "text")]
    output: OutputFmt,
    /// Event codes to keep (tags or E-ids)
    #[arg(long, short = 'c', num_args = 0.., value_delimiter = ',')]
    codes: Vec<String>,
    #[arg(long, num_args = 0.., value_delimiter = ',', conflicts_with_all = ["top_ips", "ip_pattern"])]
    ips: Vec<String>,
    #[arg(long, conflicts_with = "ip_pattern")]
    top_ips: Option<usize>,
    #[arg(long)]
    ip_pattern: Option<String>,
    #[arg(long, short = 'u', num_args = 0.., value_delimiter = ',')]
    users: Vec<String>,
    /// Inclusive lower bound, `YYYY-MM-DD HH:MM[:SS]`
    #[arg(long)]
    since: Option<String>,
    #[arg(long)]
    until: Option<String>,
    #[arg(long)]
    md_path: Option<String>,
    #[arg(long, short = 'j')]
    json_path: Option<String>,
    /// Export the filtered events in dataset layout
    #[arg(long)]
    csv_path: Option<String>,
    #[arg(long, short = 'C', default_value_t = false)]
    no_color: bool,
    #[arg(long, default_value_t = false)]
    force_color: bool,
    #[arg(long, default_value_t = false)]
    progress: bool,
    #[arg(long)]
    log_level: Option<LogLevel>,
    #[arg(long, value_enum)]
    log_format: Option<LogFormat>,
    #[arg(long)]
    log_path: Option<String>,
    #[arg(short = 'v', long, action = ArgAction::Count)]
    verbose: u8,
    #[arg(short = 'q', long, default_value_t = false)]
    quiet: bool,
    #[arg(long, value_enum)]
    completions: Option<Shell>,
    #[arg(long)]
    completions_out: Option<String>,
    #[arg(long)]
    config: Option<String>,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            log: None,
            log_glob: None,
            recursive: false,
            data: None,
            year: None,
            daemon_marker: None,
            top: 5,
            output: OutputFmt::Text,
            codes: vec![],
            ips: vec![],
            top_ips: None,
            ip_pattern: None,
            users: vec![],
            since: None,
            until: None,
            md_path: None,
            json_path: None,
            csv_path: None,
            no_color: false,
            force_color: false,
            progress: false,
            log_level: None,
            log_format: None,
            log_path: None,
            verbose: 0,
            quiet: false,
            completions: None,
            completions_out: None,
            config: None,
        }
    }
}

fn main() {
    let mut args = Args::parse();
    if let Some(sh) = args.completions {
        let mut cmd = Args::command();
        if let Some(path) = args.completions_out.as_ref() && let Ok(mut f) = std::fs::File::create(path) {
            clap_complete::generate(sh, &mut cmd, "sshmon", &mut f);
        } else {
            clap_complete::generate(sh, &mut cmd, "sshmon", &mut std::io::stdout());
        }
        return;
    }
    if let Some(cfg) = sshmon::config::load_config(args.config.as_deref()) { apply_config(&mut args, cfg); }
    init_logging(&args);
    let term = std::env::var("TERM").unwrap_or_default();
    let no_color_env = std::env::var_os("NO_COLOR").is_some();
    let color_default = std::io::stdout().is_terminal() && !no_color_env && term != "dumb";
    let color = if args.force_color { true } else { color_default && !args.no_color };
    if let Err(e) = run(&args, color) {
        log::error!("{:#}", e);
        if !args.quiet { eprintln!("{}", report::paint(&format!("Error: {:#}", e), "1;31", color)); }
        std::process::exit(1);
    }
}

/// Level requested on the command line; `None` leaves `RUST_LOG` in charge.
fn level_filter(args: &Args) -> Option<log::LevelFilter> {
    if args.quiet { return Some(log::LevelFilter::Error); }
    if let Some(lvl) = args.log_level { return Some(lvl.into()); }
    match args.verbose {
        0 => None,
        1 => Some(log::LevelFilter::Info),
        2 => Some(log::LevelFilter::Debug),
        _ => Some(log::LevelFilter::Trace),
    }
}

fn init_logging(args: &Args) {
    use std::io::Write;
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if let Some(f) = level_filter(args) { builder.filter_level(f); }
    match args.log_format {
        Some(LogFormat::Json) => {
            builder.format(|buf, record| {
                let line = serde_json::json!({
                    "time": chrono::Local::now().to_rfc3339(),
                    "level": record.level().as_str(),
                    "module": record.module_path().unwrap_or("sshmon"),
                    "message": record.args().to_string(),
                });
                writeln!(buf, "{}", line)
            });
        }
        Some(LogFormat::Text) => {
            builder.format(|buf, record| writeln!(buf, "sshmon {:<5} {}", record.level(), record.args()));
        }
        None => {}
    }
    if let Some(path) = args.log_path.as_deref() {
        match std::fs::OpenOptions::new().create(true).append(true).open(path) {
            Ok(f) => { builder.target(env_logger::Target::Pipe(Box::new(f))); }
            Err(e) => eprintln!("sshmon: cannot open log file {}: {}", path, e),
        }
    }
    builder.init();
}

fn apply_config(args: &mut Args, cfg: AppConfig) {
    if args.data.is_none() && let Some(v) = cfg.data { args.data = Some(v); }
    if args.year.is_none() && let Some(v) = cfg.reference_year { args.year = Some(v); }
    if args.daemon_marker.is_none() && let Some(v) = cfg.daemon_marker { args.daemon_marker = Some(v); }
    if args.log_glob.is_none() && let Some(v) = cfg.log_glob { args.log_glob = Some(v); }
    if let Some(v) = cfg.recursive { args.recursive = args.recursive || v; }
    if args.top == 5 && let Some(v) = cfg.top { args.top = v; }
    if args.output == OutputFmt::Text && let Some(v) = cfg.output { args.output = v; }
    if args.codes.is_empty() && let Some(v) = cfg.codes { args.codes = v; }
    let ip_flag = !args.ips.is_empty() || args.top_ips.is_some() || args.ip_pattern.is_some();
    if !ip_flag {
        if let Some(v) = cfg.ips { args.ips = v; }
        else if let Some(v) = cfg.top_ips { args.top_ips = Some(v); }
        else if let Some(v) = cfg.ip_pattern { args.ip_pattern = Some(v); }
    }
    if args.users.is_empty() && let Some(v) = cfg.users { args.users = v; }
    if args.since.is_none() && let Some(v) = cfg.since { args.since = Some(v); }
    if args.until.is_none() && let Some(v) = cfg.until { args.until = Some(v); }
    if let Some(v) = cfg.no_color { args.no_color = args.no_color || v; }
    if args.log_format.is_none() && let Some(v) = cfg.log_format { args.log_format = Some(v); }
    if args.log_path.is_none() && let Some(v) = cfg.log_path { args.log_path = Some(v); }
    if args.md_path.is_none() && let Some(v) = cfg.md_path { args.md_path = Some(v); }
    if args.csv_path.is_none() && let Some(v) = cfg.csv_path { args.csv_path = Some(v); }
    if args.json_path.is_none() && let Some(v) = cfg.json_path { args.json_path = Some(v); }
}

fn parse_bound(s: &str) -> Result<NaiveDateTime> {
    for f in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s.trim(), f) { return Ok(dt); }
    }
    bail!("invalid time bound '{}', expected YYYY-MM-DD HH:MM[:SS]", s)
}

fn build_filter(args: &Args) -> Result<EventFilter> {
    let codes = if args.codes.is_empty() { None } else {
        Some(args.codes.iter().map(|c| c.parse::<EventCode>()).collect::<Result<Vec<_>, _>>()?)
    };
    let addresses = if !args.ips.is_empty() { AddressSelection::Only(args.ips.clone()) }
        else if let Some(n) = args.top_ips { AddressSelection::Top(n) }
        else if let Some(p) = args.ip_pattern.as_ref() { AddressSelection::Containing(p.clone()) }
        else { AddressSelection::All };
    let users = if args.users.is_empty() { None } else { Some(args.users.clone()) };
    let since = args.since.as_deref().map(parse_bound).transpose()?;
    let until = args.until.as_deref().map(parse_bound).transpose()?;
    if let (Some(s), Some(u)) = (since, until) && s > u { bail!("--since {} is after --until {}", s, u); }
    Ok(EventFilter { codes, addresses, users, since, until })
}

fn run(args: &Args, color: bool) -> Result<()> {
    let data = sshmon::config::data_path(args.data.as_deref());
    let year = args.year.unwrap_or(DEFAULT_REFERENCE_YEAR);
    let flt = build_filter(args)?;
    let mut cache = DatasetCache::new();
    if let Some(log_path) = args.log.as_ref() {
        let parser = LogParser::new(args.daemon_marker.as_deref().unwrap_or(sshmon::parser::DAEMON_MARKER));
        let opts = ScanOptions { file_glob: args.log_glob.clone(), recursive: args.recursive, progress: args.progress };
        let scan = sources::scan(Path::new(log_path), &parser, &opts).with_context(|| format!("reading logs from {}", log_path))?;
        if scan.files.is_empty() {
            log::warn!("No log files matched under {}; keeping existing dataset {}", log_path, data.display());
        } else {
            cache.save_records(&scan.records, &data).with_context(|| format!("writing dataset {}", data.display()))?;
            if !args.quiet { println!("{}", report::paint(&format!("Dataset written: {} ({} events from {} files)", data.display(), scan.records.len(), scan.files.len()), "1;36", color)); }
        }
    }
    let events = match cache.get_or_load(&data, year) {
        Ok(ev) => ev,
        Err(LoadError::NotFound(p)) => bail!("dataset '{}' not found; parse logs first with --log <path>", p.display()),
        Err(e) => return Err(e.into()),
    };
    log::info!("Loaded {} events from {}", events.len(), data.display());
    let (analysis, kept) = report::analyze(&events, &flt, args.top);
    match args.output {
        OutputFmt::Text => print!("{}", report::render_text(&analysis, color)),
        OutputFmt::Json => println!("{}", report::render_json(&analysis)?),
    }
    if let Some(p) = args.md_path.as_ref() {
        std::fs::write(p, report::render_markdown(&analysis)).with_context(|| format!("writing Markdown report {}", p))?;
        if !args.quiet { println!("{}", report::paint(&format!("Markdown written: {}", p), "1;36", color)); }
    }
    if let Some(p) = args.json_path.as_ref() {
        std::fs::write(p, report::render_json(&analysis)?).with_context(|| format!("writing JSON report {}", p))?;
        if !args.quiet { println!("{}", report::paint(&format!("JSON written: {}", p), "1;36", color)); }
    }
    if let Some(p) = args.csv_path.as_ref() {
        store::save_events(&kept, &PathBuf::from(p)).with_context(|| format!("writing CSV export {}", p))?;
        if !args.quiet { println!("{}", report::paint(&format!("CSV written: {} ({} events)", p, kept.len()), "1;36", color)); }
    }
    Ok(())
}
