use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use schemasketch_sql::SqlImporter;
use std::io::Read;
use std::path::PathBuf;

/// Schemasketch - reverse-engineer a schema sketch from raw SQL
#[derive(Parser)]
#[command(name = "schemasketch")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import one SQL statement and print the tree and synthesized schema
    Import {
        /// SQL file to read, or '-' for stdin
        file: PathBuf,

        /// Print only the synthesized schema
        #[arg(long, conflicts_with = "tree_only")]
        schema_only: bool,

        /// Print only the statement tree
        #[arg(long)]
        tree_only: bool,

        /// Use the generic SQL dialect instead of T-SQL
        #[arg(long)]
        generic: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Import {
            file,
            schema_only,
            tree_only,
            generic,
        } => import_command(&file, schema_only, tree_only, generic, cli.verbose),
    }
}

fn import_command(
    file: &PathBuf,
    schema_only: bool,
    tree_only: bool,
    generic: bool,
    verbose: bool,
) -> Result<()> {
    let sql = if file.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read stdin")?;
        buf
    } else {
        std::fs::read_to_string(file)
            .with_context(|| format!("failed to read {}", file.display()))?
    };

    if verbose {
        eprintln!("{} {} bytes of SQL", "Importing".cyan(), sql.len());
    }

    let importer = if generic {
        SqlImporter::generic()
    } else {
        SqlImporter::new()
    };

    let imported = match importer.import(&sql) {
        Ok(imported) => imported,
        Err(errors) => {
            for error in &errors {
                eprintln!("{} {}", "error:".red().bold(), error);
            }
            std::process::exit(1);
        }
    };

    if verbose {
        eprintln!(
            "{} {} table(s) synthesized",
            "Imported:".green(),
            imported.tables.len()
        );
    }

    let output = if schema_only {
        serde_json::to_string_pretty(&imported.tables)?
    } else if tree_only {
        serde_json::to_string_pretty(&imported.statement)?
    } else {
        serde_json::to_string_pretty(&imported)?
    };
    println!("{output}");

    Ok(())
}
