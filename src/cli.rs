//! Argument parsing for the `iclip-demultiplex` and `iclip-group-analysis` tools.
//!
//! Parsers return `Ok(None)` when help was requested and printed.

use std::path::PathBuf;
use std::str::FromStr;

use crate::config::{Config, ConfigError};
use crate::pipeline::{DemultiplexRequest, GroupRequest};
use crate::remote::SampleId;

const CONNECTION_HELP: &str = "\
Connection options:
  -u, --username <name>   Username (default: admin)
  -p, --password <pass>   Password (default: admin)
  -s, --server <url>      Server URL (default: http://localhost:8000)
      --interval <secs>   Seconds between status polls (default: 5)
      --max-polls <n>     Give up after this many polls (default: never)
      --timeout <secs>    Give up after this many seconds (default: never)
      --config <path>     Config file (default: <config dir>/.iclip/config.toml)
  -h, --help              Show this help";

/// Options shared by both tools. Unset fields fall back to the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionArgs {
    pub server: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub interval_secs: Option<u64>,
    pub max_polls: Option<usize>,
    pub timeout_secs: Option<u64>,
    pub config: Option<PathBuf>,
}

impl ConnectionArgs {
    /// Consume the connection option at `args[*idx]`, if it is one.
    fn accept(&mut self, args: &[String], idx: &mut usize) -> Result<bool, String> {
        let flag = args[*idx].as_str();
        match flag {
            "-u" | "--username" => self.username = Some(next_value(args, idx, flag)?.to_string()),
            "-p" | "--password" => self.password = Some(next_value(args, idx, flag)?.to_string()),
            "-s" | "--server" => self.server = Some(next_value(args, idx, flag)?.to_string()),
            "--interval" => {
                let secs: u64 = parse_number(flag, next_value(args, idx, flag)?)?;
                if secs == 0 {
                    return Err("--interval must be at least 1".to_string());
                }
                self.interval_secs = Some(secs);
            }
            "--max-polls" => {
                let polls: usize = parse_number(flag, next_value(args, idx, flag)?)?;
                if polls == 0 {
                    return Err("--max-polls must be at least 1".to_string());
                }
                self.max_polls = Some(polls);
            }
            "--timeout" => self.timeout_secs = Some(parse_number(flag, next_value(args, idx, flag)?)?),
            "--config" => self.config = Some(PathBuf::from(next_value(args, idx, flag)?)),
            _ => return Ok(false),
        }
        Ok(true)
    }

    /// Load the config file and overlay the flags given on the command line.
    pub fn load_config(&self) -> Result<Config, ConfigError> {
        let mut config = Config::load(self.config.as_deref())?;
        self.apply(&mut config);
        Ok(config)
    }

    pub fn apply(&self, config: &mut Config) {
        if let Some(server) = &self.server {
            config.server.url = server.clone();
        }
        if let Some(username) = &self.username {
            config.server.username = username.clone();
        }
        if let Some(password) = &self.password {
            config.server.password = password.clone();
        }
        if let Some(secs) = self.interval_secs {
            config.polling.interval_secs = secs;
        }
        if self.max_polls.is_some() {
            config.polling.max_polls = self.max_polls;
        }
        if self.timeout_secs.is_some() {
            config.polling.timeout_secs = self.timeout_secs;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemultiplexArgs {
    pub request: DemultiplexRequest,
    pub connection: ConnectionArgs,
}

impl DemultiplexArgs {
    pub fn parse(args: Vec<String>) -> Result<Option<Self>, String> {
        let mut connection = ConnectionArgs::default();
        let mut positional = Vec::new();
        let mut idx = 0usize;
        while idx < args.len() {
            let arg = args[idx].as_str();
            if arg == "-h" || arg == "--help" {
                println!("{}", demultiplex_help());
                return Ok(None);
            }
            if !connection.accept(&args, &mut idx)? {
                if arg.starts_with('-') && arg.len() > 1 {
                    return Err(format!("Unknown argument: {arg}\n\n{}", demultiplex_help()));
                }
                positional.push(PathBuf::from(arg));
            }
            idx += 1;
        }

        let mut positional = positional.into_iter();
        let (Some(reads), Some(annotation)) = (positional.next(), positional.next()) else {
            return Err(format!(
                "Expected <multiplexed_reads> and <sample_annotation>\n\n{}",
                demultiplex_help()
            ));
        };
        if let Some(extra) = positional.next() {
            return Err(format!("Unexpected argument: {}", extra.display()));
        }
        Ok(Some(Self {
            request: DemultiplexRequest { reads, annotation },
            connection,
        }))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupArgs {
    pub request: GroupRequest,
    pub connection: ConnectionArgs,
}

impl GroupArgs {
    pub fn parse(args: Vec<String>) -> Result<Option<Self>, String> {
        let mut connection = ConnectionArgs::default();
        let mut collection = None;
        let mut name = None;
        let mut ids: Option<Vec<SampleId>> = None;
        let mut idx = 0usize;
        while idx < args.len() {
            match args[idx].as_str() {
                "-h" | "--help" => {
                    println!("{}", group_help());
                    return Ok(None);
                }
                flag @ ("-c" | "--collection") => {
                    collection = Some(next_value(&args, &mut idx, flag)?.to_string());
                }
                flag @ ("-n" | "--name") => {
                    name = Some(next_value(&args, &mut idx, flag)?.to_string());
                }
                flag @ ("-i" | "--id") => {
                    let values = take_values(&args, &mut idx);
                    if values.is_empty() {
                        return Err(format!("{flag} requires at least one sample id"));
                    }
                    let parsed = ids.get_or_insert_with(Vec::new);
                    for value in values {
                        parsed.push(SampleId(parse_number(flag, value)?));
                    }
                }
                unknown => {
                    if !connection.accept(&args, &mut idx)? {
                        return Err(format!("Unknown argument: {unknown}\n\n{}", group_help()));
                    }
                }
            }
            idx += 1;
        }

        let collection = required(collection, "--collection")?;
        let name = required(name, "--name")?;
        Ok(Some(Self {
            request: GroupRequest {
                collection,
                name,
                sample_ids: ids,
            },
            connection,
        }))
    }
}

fn required(value: Option<String>, flag: &str) -> Result<String, String> {
    match value {
        Some(value) if !value.trim().is_empty() => Ok(value),
        Some(_) => Err(format!("{flag} must not be empty")),
        None => Err(format!("{flag} is required")),
    }
}

/// Advance past a flag and return its value.
fn next_value<'a>(args: &'a [String], idx: &mut usize, flag: &str) -> Result<&'a str, String> {
    *idx += 1;
    args.get(*idx)
        .map(String::as_str)
        .ok_or_else(|| format!("{flag} requires a value"))
}

/// Take every value up to the next flag, leaving `idx` on the last one taken.
fn take_values<'a>(args: &'a [String], idx: &mut usize) -> Vec<&'a str> {
    let mut values = Vec::new();
    while let Some(next) = args.get(*idx + 1) {
        if next.starts_with('-') {
            break;
        }
        values.push(next.as_str());
        *idx += 1;
    }
    values
}

fn parse_number<T: FromStr>(flag: &str, value: &str) -> Result<T, String> {
    value
        .trim()
        .parse()
        .map_err(|_| format!("{flag} expects a non-negative integer, got '{value}'"))
}

fn demultiplex_help() -> String {
    format!(
        "iclip-demultiplex\n\n\
         Upload multiplexed iCLIP reads with their sample annotation, demultiplex them\n\
         and file the resulting samples into collections by experiment name.\n\n\
         Usage:\n  iclip-demultiplex <multiplexed_reads> <sample_annotation> [options]\n\n\
         {CONNECTION_HELP}"
    )
}

fn group_help() -> String {
    format!(
        "iclip-group-analysis\n\n\
         Run iCount group analysis on samples of a working collection.\n\n\
         Usage:\n  iclip-group-analysis -c <collection> -n <group name> [-i <id>...] [options]\n\n\
         Options:\n  \
         -c, --collection <name>  Working collection (must exist exactly once)\n  \
         -n, --name <name>        Group name\n  \
         -i, --id <id>...         Sample ids to group (default: every sample in the collection)\n\n\
         {CONNECTION_HELP}"
    )
}
