// MultiCom - Serial Console Multiplexer
use clap::Parser;
use multicom::cli::{execute, Args};
use multicom::infrastructure::logging::init_logging;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = Args::parse();

    if !args.quiet {
        if let Err(e) = init_logging(args.verbose) {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }

    if let Err(e) = execute(args).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
