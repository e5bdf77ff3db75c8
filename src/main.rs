use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    match retrace_cli::cli::run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
