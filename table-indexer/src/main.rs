use clap::Parser;
use tracing::error;

use table_indexer::{init_tracing, IndexingOptions};

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    let options = IndexingOptions::parse();
    init_tracing(options.verbose, options.log_json);

    let code = match table_indexer::run(options).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "Table indexer failed");
            1
        }
    };

    std::process::exit(code);
}
