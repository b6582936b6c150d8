//! Resource client backed by the `zpool` and `zfs` command-line tools.

use ahash::AHashMap as HashMap;
use std::process::Command;
use tracing::{debug, instrument};

use super::{Client, DatasetKind, DatasetProperties, Datasets, Pool, PoolProperties, ZfsError};

const ZPOOL: &str = "zpool";
const ZFS: &str = "zfs";

/// Runs `zpool`/`zfs` with parseable (`-Hp`) output.
#[derive(Debug, Clone, Default)]
pub struct CommandClient;

impl CommandClient {
    pub fn new() -> Self {
        Self
    }
}

impl Client for CommandClient {
    #[instrument(skip(self))]
    fn pool_names(&self) -> Result<Vec<String>, ZfsError> {
        let output = run(ZPOOL, &["list", "-Ho", "name"])?;
        Ok(output
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect())
    }

    fn pool<'a>(&'a self, name: &str) -> Box<dyn Pool + 'a> {
        Box::new(CommandPool {
            name: name.to_string(),
        })
    }

    fn datasets<'a>(&'a self, pool: &str, kind: DatasetKind) -> Box<dyn Datasets + 'a> {
        Box::new(CommandDatasets {
            pool: pool.to_string(),
            kind,
        })
    }
}

struct CommandPool {
    name: String,
}

impl Pool for CommandPool {
    fn name(&self) -> &str {
        &self.name
    }

    fn properties(&self, props: &[String]) -> Result<PoolProperties, ZfsError> {
        let props = props.join(",");
        let args = ["get", "-Hpo", "name,property,value", props.as_str(), self.name.as_str()];
        let output = run(ZPOOL, &args)?;
        let command = render_command(ZPOOL, &args);

        let mut result = PoolProperties::new(&self.name);
        for (name, rows) in parse_property_output(&command, &output)? {
            if name != self.name {
                return Err(ZfsError::Parse {
                    command,
                    line: name,
                });
            }
            result.properties.extend(rows);
        }
        Ok(result)
    }
}

struct CommandDatasets {
    pool: String,
    kind: DatasetKind,
}

impl Datasets for CommandDatasets {
    fn pool(&self) -> &str {
        &self.pool
    }

    fn kind(&self) -> DatasetKind {
        self.kind
    }

    fn properties(&self, props: &[String]) -> Result<Vec<DatasetProperties>, ZfsError> {
        let props = props.join(",");
        let args = [
            "get",
            "-Hpr",
            "-t",
            self.kind.as_str(),
            "-o",
            "name,property,value",
            props.as_str(),
            self.pool.as_str(),
        ];
        let output = run(ZFS, &args)?;
        let command = render_command(ZFS, &args);

        Ok(parse_property_output(&command, &output)?
            .into_iter()
            .map(|(name, properties)| DatasetProperties { name, properties })
            .collect())
    }
}

fn render_command(program: &str, args: &[&str]) -> String {
    let mut command = program.to_string();
    for arg in args {
        command.push(' ');
        command.push_str(arg);
    }
    command
}

fn run(program: &str, args: &[&str]) -> Result<String, ZfsError> {
    let command = render_command(program, args);
    debug!("Running {}", command);

    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|source| ZfsError::Exec {
            command: command.clone(),
            source,
        })?;

    if !output.status.success() {
        return Err(ZfsError::CommandFailed {
            command,
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Parses `name<TAB>property<TAB>value` lines, grouping rows by name while
/// keeping the order in which names first appear.
pub(crate) fn parse_property_output(
    command: &str,
    output: &str,
) -> Result<Vec<(String, HashMap<String, String>)>, ZfsError> {
    let mut grouped: Vec<(String, HashMap<String, String>)> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for line in output.lines() {
        if line.trim().is_empty() {
            continue;
        }

        let mut fields = line.splitn(3, '\t');
        let (Some(name), Some(property), Some(value)) = (fields.next(), fields.next(), fields.next())
        else {
            return Err(ZfsError::Parse {
                command: command.to_string(),
                line: line.to_string(),
            });
        };

        let idx = *positions.entry(name.to_string()).or_insert_with(|| {
            grouped.push((name.to_string(), HashMap::new()));
            grouped.len() - 1
        });
        grouped[idx]
            .1
            .insert(property.to_string(), value.trim_end().to_string());
    }

    Ok(grouped)
}
