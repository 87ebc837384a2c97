//! sqe CLI binary

use swapi_query_engine::cli;

#[tokio::main]
async fn main() {
    human_panic::setup_panic!();
    // Exit codes:
    // 0 - Success
    // 1 - Configuration or local I/O error
    // 2 - Invalid query or upstream rejected the request
    // 3 - Upstream unavailable or other server-side failure

    let code = cli::run().await;
    std::process::exit(code);
}
