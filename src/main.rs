#[tokio::main]
async fn main() {
    if let Err(error) = postboard::web::run().await {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}
