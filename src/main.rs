use rusty_dashboard_lib::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    rusty_dashboard_lib::run(config).await
}
