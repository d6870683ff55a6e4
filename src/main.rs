use imagegate::{
    config::Config,
    error::RuntimeError,
    runtime::{build_state, run_standalone},
};
use std::{path::PathBuf, process::ExitCode};

const USAGE: &str = "\
Usage: imagegate [OPTIONS]

Options:
  -c, --config <path>  Load settings from a YAML file (IMAGEGATE_* env still overrides)
      --check          Validate the effective settings and exit
  -h, --help           Print help
";

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Serve { config_path: Option<PathBuf> },
    Check { config_path: Option<PathBuf> },
    Help,
}

fn parse_command<I>(args: I) -> Result<Command, String>
where
    I: IntoIterator<Item = String>,
{
    let mut config_path = None;
    let mut check = false;
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        let value = match arg.as_str() {
            "-h" | "--help" => return Ok(Command::Help),
            "--check" => {
                check = true;
                continue;
            }
            "-c" | "--config" => args.next(),
            _ => match arg.strip_prefix("--config=") {
                Some(value) => Some(value.to_string()),
                None => return Err(format!("unknown argument: {arg}")),
            },
        };
        match value.filter(|value| !value.is_empty()) {
            Some(value) => config_path = Some(PathBuf::from(value)),
            None => return Err("missing value for --config".to_string()),
        }
    }

    Ok(if check {
        Command::Check { config_path }
    } else {
        Command::Serve { config_path }
    })
}

fn load_config(config_path: Option<PathBuf>) -> Result<Config, RuntimeError> {
    match config_path {
        Some(path) => Config::from_env_with_config_file(path),
        None => Config::from_env(),
    }
    .map_err(RuntimeError::Config)
}

#[tokio::main]
async fn main() -> ExitCode {
    let command = match parse_command(std::env::args().skip(1)) {
        Ok(command) => command,
        Err(err) => {
            eprintln!("{err}\n\n{USAGE}");
            return ExitCode::from(2);
        }
    };

    let (config_path, check_only) = match command {
        Command::Help => {
            println!("{USAGE}");
            return ExitCode::SUCCESS;
        }
        Command::Serve { config_path } => (config_path, false),
        Command::Check { config_path } => (config_path, true),
    };

    let config = match load_config(config_path) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::from(2);
        }
    };

    if check_only {
        return match build_state(&config) {
            Ok(_) => {
                println!(
                    "ok: bind={} realm={} token_realm={} cluster={}",
                    config.bind,
                    config.realm,
                    config.token_realm.as_deref().unwrap_or("-"),
                    config.cluster.host
                );
                ExitCode::SUCCESS
            }
            Err(err) => {
                eprintln!("{err}");
                ExitCode::from(2)
            }
        };
    }

    match run_standalone(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("server error: {err}");
            ExitCode::FAILURE
        }
    }
}
