use anyhow::Result;
use clap::Parser;
use rewrite_tutor::cli;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();
    let is_headless = args.json || args.text;

    match cli::run(args).await {
        Ok(()) => {
            // Explicitly exit with code 0 on success in headless modes
            if is_headless {
                std::process::exit(0);
            }
            Ok(())
        }
        Err(e) => {
            if is_headless {
                eprintln!("error: {e:#}");
                std::process::exit(1);
            }
            Err(e)
        }
    }
}
