use learnhub_core::config::Config;

#[rocket::main]
async fn main() {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = learnhub_core::rocket_with_config(config).launch().await {
        eprintln!("❌ Server failed to launch: {e}");
        std::process::exit(1);
    }
}
