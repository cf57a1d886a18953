//! log4rs setup. Library code only uses the `log` facade; nothing is written
//! anywhere until one of these functions is called.

use log::LevelFilter;
use log4rs::Handle;
use log4rs::append::rolling_file::RollingFileAppender;
use log4rs::append::rolling_file::policy::compound::{
    CompoundPolicy, roll::fixed_window::FixedWindowRoller, trigger::size::SizeTrigger,
};
use log4rs::config::{Appender, Config, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;
use parking_lot::Mutex;
use std::error::Error;
use std::path::{Path, PathBuf};

pub const EVICTION_TARGET: &str = "callcache::eviction";

const PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S%.3f)} [{l}] {t} - {m}{n}";
const ROLL_SIZE: u64 = 10 * 1024 * 1024;
const DEFAULT_RETENTION: u32 = 7;

static HANDLE: Mutex<Option<Handle>> = Mutex::new(None);

/// Parses `error|warn|info|debug|trace|off`; anything else is `Info`.
pub fn parse_level(level: &str) -> LevelFilter {
    match level.to_ascii_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

fn rolling(base: &Path, stem: &str, keep: u32) -> Result<RollingFileAppender, Box<dyn Error>> {
    let roller = FixedWindowRoller::builder()
        .build(&format!("{}", base.join(format!("{stem}.{{}}.log")).display()), keep)?;
    let policy = CompoundPolicy::new(Box::new(SizeTrigger::new(ROLL_SIZE)), Box::new(roller));
    Ok(RollingFileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(PATTERN)))
        .build(base.join(format!("{stem}.log")), Box::new(policy))?)
}

fn apply(config: Config) -> Result<(), Box<dyn Error>> {
    let mut handle = HANDLE.lock();
    match handle.as_ref() {
        Some(h) => h.set_config(config),
        None => *handle = Some(log4rs::init_config(config)?),
    }
    Ok(())
}

/// Configures process-wide logging. Calling it again replaces the configuration.
/// - dir: base directory for logs; current directory if `None`
/// - level: error|warn|info|debug|trace
/// - retention: number of rolled files to keep (default 7)
///
/// Writes `app.log`; eviction events (target `callcache::eviction`) go to
/// `eviction.log` instead.
///
/// # Errors
/// Fails if the directory cannot be created or an appender cannot be opened,
/// or if another logger implementation is already installed.
pub fn configure_logging(
    dir: Option<&Path>,
    level: Option<&str>,
    retention: Option<usize>,
) -> Result<(), Box<dyn Error>> {
    let base = match dir {
        Some(d) => d.to_path_buf(),
        None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    };
    std::fs::create_dir_all(&base)?;
    let keep = retention.map_or(DEFAULT_RETENTION, |r| u32::try_from(r).unwrap_or(u32::MAX));
    let lvl = parse_level(level.unwrap_or("info"));

    let config = Config::builder()
        .appender(Appender::builder().build("app", Box::new(rolling(&base, "app", keep)?)))
        .appender(Appender::builder().build("eviction", Box::new(rolling(&base, "eviction", keep)?)))
        .logger(Logger::builder().appender("eviction").additive(false).build(EVICTION_TARGET, lvl))
        .build(Root::builder().appender("app").build(lvl))?;
    apply(config)
}

/// Configures logging from environment variables if present:
/// - CALLCACHE_LOG_DIR
/// - CALLCACHE_LOG_LEVEL
/// - CALLCACHE_LOG_RETENTION
///
/// # Errors
/// See [`configure_logging`].
pub fn configure_from_env() -> Result<(), Box<dyn Error>> {
    let dir = std::env::var("CALLCACHE_LOG_DIR").ok().map(PathBuf::from);
    let level = std::env::var("CALLCACHE_LOG_LEVEL").ok();
    let retention =
        std::env::var("CALLCACHE_LOG_RETENTION").ok().and_then(|s| s.parse::<usize>().ok());
    configure_logging(dir.as_deref(), level.as_deref(), retention)
}

/// Initializes logging from a log4rs YAML file.
///
/// # Errors
/// Fails if the file cannot be read or parsed.
pub fn init_path(path: &Path) -> Result<(), Box<dyn Error>> {
    apply(log4rs::config::load_config_file(path, log4rs::config::Deserializers::default())?)
}
