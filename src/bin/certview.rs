use certview::cli::start;

#[tokio::main]
async fn main() {
    if let Err(err) = start::start().await {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}
