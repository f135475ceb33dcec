mod cli;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::classify::ClassifyArgs;
use cli::{Cli, Commands, RulesCommands};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let db = cli.db.as_deref();

    let result = match cli.command {
        Commands::Init {
            data_dir,
            small_business,
            vat_rate,
        } => cli::init::run(db, data_dir, small_business, vat_rate),
        Commands::Catalog { year } => cli::catalog::run(year),
        Commands::Rules { command } => match command {
            RulesCommands::Add {
                year,
                value,
                line,
                field,
                operator,
                priority,
            } => cli::rules::add(db, year, &value, &line, &field, &operator, priority),
            RulesCommands::List { year } => cli::rules::list(db, year),
            RulesCommands::Delete { id } => cli::rules::delete(db, id),
        },
        Commands::Classify {
            source_type,
            source_id,
            year,
            line,
            excluded,
            vat,
            note,
        } => cli::classify::run(
            db,
            ClassifyArgs {
                source_type: &source_type,
                source_id: &source_id,
                year,
                line: line.as_deref(),
                excluded,
                vat: &vat,
                note: note.as_deref(),
            },
        ),
        Commands::Review {
            year,
            from_date,
            to_date,
            accept,
        } => cli::review::run(db, year, from_date.as_deref(), to_date.as_deref(), accept),
        Commands::Report {
            year,
            from_date,
            to_date,
        } => cli::report::run(db, year, from_date.as_deref(), to_date.as_deref()),
        Commands::Export {
            year,
            from_date,
            to_date,
            output,
        } => cli::export::run(db, year, from_date.as_deref(), to_date.as_deref(), output),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
