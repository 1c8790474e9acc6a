use anyhow::Result;
use gymcal_core::GymConfig;
use owo_colors::OwoColorize;

pub async fn run(config: &GymConfig) -> Result<()> {
    let calendar = &config.calendar;
    let token_json =
        gymcal_provider_google::auth::authenticate(&calendar.client_secret_path, &calendar.token_path).await?;

    eprintln!("{}", "Authentication successful!".green());
    eprintln!(
        "Token saved to {}. Store the JSON below as a CI secret:\n",
        calendar.token_path.display()
    );
    println!("{}", token_json);

    Ok(())
}
