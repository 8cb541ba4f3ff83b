use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use log::info;
use std::io::Read;
use std::path::{Path, PathBuf};

use buildkite_provider::client::BuildkiteClient;
use buildkite_provider::config::Config;
use buildkite_provider::provider::{ResourceState, ResourceType};

#[derive(Parser)]
#[command(name = "terraform-provider-buildkite")]
#[command(
    author,
    version,
    about = "Manage Buildkite pipelines, teams and members",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to buildkite-provider.{toml,json,yaml,yml})
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[arg(long, global = true, env = "BUILDKITE_ORGANIZATION")]
    organization: Option<String>,

    #[arg(long, global = true, env = "BUILDKITE_API_TOKEN", hide_env_values = true)]
    api_token: Option<String>,

    /// Write the resulting state here instead of stdout
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    #[arg(short, long, global = true, default_value_t = false)]
    pretty: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a resource from its desired state
    Create(ResourceArgs),
    /// Refresh a resource's state from Buildkite
    Read(ResourceArgs),
    /// Push a resource's desired state to Buildkite
    Update(ResourceArgs),
    /// Delete a resource
    Delete(ResourceArgs),
    /// List the supported resource types
    Resources,
    /// Write a config file from the current organization and token
    Init(InitArgs),
}

#[derive(Args)]
struct InitArgs {
    /// Where to write the config; the format follows the extension
    #[arg(default_value = "buildkite-provider.toml")]
    path: PathBuf,

    /// Overwrite an existing file
    #[arg(short, long, default_value_t = false)]
    force: bool,
}

#[derive(Args)]
struct ResourceArgs {
    /// Resource type, e.g. buildkite_pipeline
    resource_type: String,

    /// JSON state file ({"id": ..., "attributes": {...}}); reads stdin when omitted
    #[arg(short, long)]
    state: Option<PathBuf>,
}

#[derive(Clone, Copy)]
enum Operation {
    Create,
    Read,
    Update,
    Delete,
}

impl Cli {
    fn client(&self) -> Result<BuildkiteClient> {
        let config = Config::load(self.config.as_deref())?
            .with_overrides(self.organization.clone(), self.api_token.clone());
        let client_config = config.client_config()?;

        BuildkiteClient::new(&client_config).context("Failed to create Buildkite client")
    }

    async fn execute_operation(&self, operation: Operation, args: &ResourceArgs) -> Result<()> {
        let resource_type: ResourceType = args.resource_type.parse()?;
        let mut state = read_state(args.state.as_deref())?;
        let client = self.client()?;

        info!("Running {resource_type} {}", state.id);

        let result = match operation {
            Operation::Create => resource_type.create(&client, &mut state).await,
            Operation::Read => resource_type.read(&client, &mut state).await,
            Operation::Update => resource_type.update(&client, &mut state).await,
            Operation::Delete => resource_type.delete(&client, &mut state).await,
        };
        result.with_context(|| format!("{resource_type} operation failed"))?;

        self.write_output(&state)
    }

    fn write_output(&self, state: &ResourceState) -> Result<()> {
        let json_output = if self.pretty {
            serde_json::to_string_pretty(state)?
        } else {
            serde_json::to_string(state)?
        };

        if let Some(output_path) = &self.output {
            std::fs::write(output_path, json_output)?;
            info!("State written to: {}", output_path.display());
        } else {
            println!("{}", json_output);
        }

        Ok(())
    }

    pub async fn execute(&self) -> Result<()> {
        match &self.command {
            Commands::Create(args) => self.execute_operation(Operation::Create, args).await,
            Commands::Read(args) => self.execute_operation(Operation::Read, args).await,
            Commands::Update(args) => self.execute_operation(Operation::Update, args).await,
            Commands::Delete(args) => self.execute_operation(Operation::Delete, args).await,
            Commands::Resources => {
                for resource_type in ResourceType::ALL {
                    println!("{resource_type}");
                }
                Ok(())
            }
            Commands::Init(args) => init_config(
                args,
                self.organization.clone(),
                self.api_token.clone(),
            ),
        }
    }
}

fn init_config(
    args: &InitArgs,
    organization: Option<String>,
    api_token: Option<String>,
) -> Result<()> {
    if args.path.exists() && !args.force {
        bail!(
            "{} already exists; pass --force to overwrite it",
            args.path.display()
        );
    }

    Config::default()
        .with_overrides(organization, api_token)
        .save(&args.path)?;
    info!("Config written to: {}", args.path.display());

    Ok(())
}

fn read_state(path: Option<&Path>) -> Result<ResourceState> {
    let contents = match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read state file: {}", path.display()))?,
        None => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read state from stdin")?;
            buffer
        }
    };

    serde_json::from_str(&contents).context("Failed to parse resource state")
}
