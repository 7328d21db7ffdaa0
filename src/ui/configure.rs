//! Interactive `configure` flow

use anyhow::Result;
use inquire::{Confirm, Password, PasswordDisplayMode, Select, Text};
use tracing::info;

use crate::aws::AwsCredentials;
use crate::aws::credentials::StoredCredentials;
use crate::config::{ConfigStore, ScanPeriod, DEFAULT_MODEL, DEFAULT_REGION};

pub fn run(store: &ConfigStore) -> Result<()> {
    let mut config = store.load();

    println!("⚙️  aws-insights configuration");
    println!("Settings are stored in {}\n", store.path().display());

    let key_help = if config.api_key.is_some() {
        "Leave empty to keep the stored key"
    } else {
        "Used for every analysis; stored with owner-only permissions"
    };
    let api_key = Password::new("OpenAI API key:")
        .without_confirmation()
        .with_display_mode(PasswordDisplayMode::Masked)
        .with_help_message(key_help)
        .prompt()?;
    if !api_key.trim().is_empty() {
        config.api_key = Some(api_key.trim().to_string());
    }

    let model = Text::new("Model:")
        .with_default(config.model.as_deref().unwrap_or(DEFAULT_MODEL))
        .prompt()?;
    config.model = Some(model.trim().to_string());

    let region = Text::new("AWS region:")
        .with_default(config.region.as_deref().unwrap_or(DEFAULT_REGION))
        .prompt()?;
    config.region = Some(region.trim().to_string());

    let current_period = config
        .scan_period
        .and_then(ScanPeriod::new)
        .unwrap_or_default()
        .days();
    let cursor = ScanPeriod::ALLOWED
        .iter()
        .position(|d| *d == current_period)
        .unwrap_or(0);
    let period = Select::new("Default scan period (days):", ScanPeriod::ALLOWED.to_vec())
        .with_starting_cursor(cursor)
        .prompt()?;
    config.scan_period = Some(period);

    let has_credentials = config
        .credentials
        .as_ref()
        .and_then(AwsCredentials::from_stored);
    let prompt = match &has_credentials {
        Some(creds) => format!("Replace stored AWS credentials ({})?", creds.masked_access_key()),
        None => "Store AWS credentials for live scans?".to_string(),
    };
    if Confirm::new(&prompt)
        .with_default(has_credentials.is_none())
        .prompt()?
    {
        let access_key = Text::new("AWS access key ID:").prompt()?;
        let secret_key = Password::new("AWS secret access key:")
            .without_confirmation()
            .with_display_mode(PasswordDisplayMode::Masked)
            .prompt()?;
        let session_token = Text::new("AWS session token (optional):")
            .prompt_skippable()?
            .filter(|t| !t.trim().is_empty());

        match AwsCredentials::from_parts(Some(access_key), Some(secret_key), session_token) {
            Some(creds) => config.credentials = Some(StoredCredentials::from(&creds)),
            None => println!(
                "⚠️  Both an access key and a secret key are required; credentials were not changed."
            ),
        }
    }

    store.save(&config)?;
    info!("Saved configuration to {:?}", store.path());
    println!("\n✅ Configuration saved to {}", store.path().display());
    Ok(())
}
