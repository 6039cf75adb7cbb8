use nawyk_app::app::{run, AppConfig};

fn main() {
    tracing_subscriber::fmt::init();
    let config = AppConfig::from_args(std::env::args().skip(1));
    if let Err(err) = run(config) {
        eprintln!("Failed to start Nawyk: {err}");
    }
}
