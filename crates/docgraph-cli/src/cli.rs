use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "docgraph",
    about = "docgraph: inspect saved object documents and the type registry",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print the built-in type tree
    Types(TypesArgs),
    /// Load a document against the built-in types and report what was left out
    Check(CheckArgs),
    /// List the objects of a document
    Objects(ObjectsArgs),
}

#[derive(Args)]
pub struct TypesArgs {
    /// Only print the subtree below this type
    #[arg(long)]
    pub root: Option<String>,
}

#[derive(Args)]
pub struct CheckArgs {
    pub file: PathBuf,
    /// Document configuration (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(Args)]
pub struct ObjectsArgs {
    pub file: PathBuf,
    /// Document configuration (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,
}
