use std::path::PathBuf;

use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use log::LevelFilter;
use weft_codegen::{generate, GenerateOptions};

#[derive(Parser, Debug)]
#[command(name = "weft")]
#[command(about = "Generates Zig and C++ bindings from declaration files", long_about = None)]
struct Args {
    /// Directory the generated files are written to
    #[arg(value_name = "OUTPUT")]
    output: PathBuf,

    /// Directory searched for declaration files
    #[arg(short, long, value_name = "DIR", default_value = ".")]
    source: PathBuf,

    /// Emit exception-state assertions in the generated code
    #[arg(long)]
    debug: bool,

    #[command(flatten)]
    verbosity: Verbosity<InfoLevel>,
}

fn main() -> miette::Result<()> {
    let args = Args::parse();

    let mut level = args.verbosity.log_level_filter();
    if args.debug {
        level = level.max(LevelFilter::Debug);
    }
    env_logger::Builder::new().filter_level(level).format_timestamp(None).init();

    let report = generate(&GenerateOptions {
        source_root: args.source,
        output_root: args.output,
        debug: args.debug,
    })?;
    if report.declaration_files == 0 {
        log::warn!("no declaration files found");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn arguments_are_well_formed() {
        Args::command().debug_assert();
    }

    #[test]
    fn source_defaults_to_current_directory() {
        let args = Args::parse_from(["weft", "out"]);
        assert_eq!(args.output, PathBuf::from("out"));
        assert_eq!(args.source, PathBuf::from("."));
        assert!(!args.debug);

        let args = Args::parse_from(["weft", "-s", "src", "--debug", "out"]);
        assert_eq!(args.source, PathBuf::from("src"));
        assert!(args.debug);
    }
}
