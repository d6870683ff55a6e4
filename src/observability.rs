use tracing_subscriber::{
    EnvFilter, Layer, Registry, fmt, fmt::format::FmtSpan, layer::SubscriberExt,
    util::SubscriberInitExt,
};

const LOG_FORMAT_ENV: &str = "IMAGEGATE_LOG_FORMAT";

type FormatLayer = Box<dyn Layer<Registry> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Compact,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Self::Json,
            "compact" => Self::Compact,
            _ => Self::Pretty,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pretty => "pretty",
            Self::Compact => "compact",
            Self::Json => "json",
        }
    }

    fn layer(self) -> FormatLayer {
        match self {
            // One line per decision, with the span fields of the pass attached.
            Self::Json => fmt::layer()
                .json()
                .flatten_event(true)
                .with_current_span(true)
                .with_span_list(false)
                .with_span_events(FmtSpan::CLOSE)
                .boxed(),
            Self::Compact => fmt::layer().compact().with_target(false).boxed(),
            Self::Pretty => fmt::layer().pretty().with_target(true).boxed(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TracingSettings {
    pub filter: String,
    pub log_format: LogFormat,
    pub installed: bool,
}

pub fn init_from_env(default_level: &str) -> TracingSettings {
    let filter = filter_directive(std::env::var("RUST_LOG").ok(), default_level);
    let log_format = std::env::var(LOG_FORMAT_ENV)
        .map(|value| LogFormat::parse(&value))
        .unwrap_or(LogFormat::Pretty);
    let env_filter = EnvFilter::try_new(&filter).unwrap_or_else(|_| EnvFilter::new("imagegate=info"));

    let installed = tracing_subscriber::registry()
        .with(log_format.layer())
        .with(tracing_error::ErrorLayer::default())
        .with(env_filter)
        .try_init()
        .is_ok();

    TracingSettings {
        filter,
        log_format,
        installed,
    }
}

fn filter_directive(rust_log: Option<String>, default_level: &str) -> String {
    rust_log
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| {
            let level = default_level.trim();
            let level = if level.is_empty() { "info" } else { level };
            format!("imagegate={level}")
        })
}
