use clap::Parser;
use shortcuts::cli::commands::{Cli, Commands};
use shortcuts::cli::handlers::{self, Context};
use shortcuts::io::config_io;
use shortcuts::logging;

fn main() {
    let cli = Cli::parse();
    let data_dir = config_io::resolve_data_dir(cli.data_dir.as_deref());

    // Init runs before the config is read so it can replace a broken one
    if let Commands::Init(args) = cli.command {
        start_logging(cli.verbose, "warn");
        if let Err(e) = handlers::cmd_init(args, &data_dir) {
            eprintln!("error: {}", e);
            std::process::exit(1);
        }
        return;
    }

    let config = match config_io::read_config(&data_dir) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(1);
        }
    };
    start_logging(cli.verbose, &config.log.level);

    let ctx = Context {
        data_dir,
        config,
        json: cli.json,
    };
    if let Err(e) = handlers::dispatch(cli.command, &ctx) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn start_logging(verbose: u8, configured: &str) {
    let level = match verbose {
        0 => configured,
        1 => "info",
        _ => "debug",
    };
    if let Err(e) = logging::init_logging(level) {
        eprintln!("warning: {}", e);
    }
}
