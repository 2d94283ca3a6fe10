use std::path::Path;
use std::time::Duration;

use clap::{Parser, Subcommand};
use inquire::{Confirm, Text};

use crate::config::{self, ConfigError, DEFAULT_TIMEZONE, Settings};
use crate::runtime;
use crate::service::audio::{AlarmSounder, PlaybackError, RodioSounder};

#[derive(Parser)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Run,
    Setup,
    TestSound {
        #[arg(long, default_value_t = 10)]
        seconds: u64,
    },
}

pub async fn cli<F>(get_prop: F, config_path: &str)
where
    F: Fn(&str) -> Option<String>,
{
    let cli = Cli::parse();
    match &cli.command {
        Commands::Run => match build_settings(&get_prop, config_path) {
            Ok(settings) => runtime::run_alarm(settings).await,
            Err(err) => println!("Cannot start the alarm: {}", err),
        },
        Commands::Setup => {
            if let Err(err) = run_setup(config_path) {
                println!("Setup failed: {}", err);
            }
        }
        Commands::TestSound { seconds } => {
            let sound_file = get_prop("ALARM_SOUND_FILE").filter(|v| !v.trim().is_empty());
            if let Err(err) = test_sound(sound_file, *seconds).await {
                println!("Sound test failed: {}", err);
            }
        }
    }
}

fn build_settings<F>(get_prop: &F, config_path: &str) -> Result<Settings, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let (username, magic_cookie) = resolve_credentials(get_prop, config_path)?;
    Settings::from_props(get_prop, username, magic_cookie)
}

// Prompted values are saved back to the config file so the next run starts
// without asking again.
fn resolve_credentials<F>(get_prop: &F, config_path: &str) -> Result<(String, String), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let saved_user = get_prop("CALENDAR_USERNAME").filter(|v| !v.trim().is_empty());
    let saved_cookie = get_prop("CALENDAR_MAGIC_COOKIE").filter(|v| !v.trim().is_empty());
    if saved_user.is_none() || saved_cookie.is_none() {
        println!("No saved calendar credentials were found.");
    }
    let mut prompted = Vec::new();
    let username = match saved_user {
        Some(value) => value,
        None => {
            let value = prompt_required("Google account name:", "CALENDAR_USERNAME")?;
            prompted.push(("CALENDAR_USERNAME", value.clone()));
            value
        }
    };
    let magic_cookie = match saved_cookie {
        Some(value) => value,
        None => {
            let value = prompt_required("Calendar magic cookie:", "CALENDAR_MAGIC_COOKIE")?;
            prompted.push(("CALENDAR_MAGIC_COOKIE", value.clone()));
            value
        }
    };
    if !prompted.is_empty() {
        match config::append_props(config_path, &prompted) {
            Ok(()) => println!("Saved the calendar credentials to {}.", config_path),
            Err(err) => println!("Credentials will be used for this run only: {}", err),
        }
    }
    Ok((username, magic_cookie))
}

fn prompt_required(label: &str, key: &'static str) -> Result<String, ConfigError> {
    Text::new(label)
        .prompt()
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or(ConfigError::Missing(key))
}

fn run_setup(config_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    if Path::new(config_path).exists() {
        let overwrite = Confirm::new(&format!("{} already exists. Overwrite it?", config_path))
            .with_default(false)
            .prompt()?;
        if !overwrite {
            println!("Keeping the existing configuration.");
            return Ok(());
        }
    }
    let username = Text::new("Google account name (the calendar's email address):").prompt()?;
    let magic_cookie =
        Text::new("Calendar magic cookie (the secret from the private feed address):").prompt()?;
    let timezone = Text::new("Timezone (IANA name):")
        .with_default(DEFAULT_TIMEZONE)
        .prompt()?;
    timezone
        .trim()
        .parse::<chrono_tz::Tz>()
        .map_err(|_| format!("unknown timezone {}", timezone))?;
    let sound_file = Text::new("Alarm sound file (leave blank for the built-in tone):")
        .with_default("")
        .prompt()?;

    let mut contents = format!(
        "CALENDAR_USERNAME={}\nCALENDAR_MAGIC_COOKIE={}\nTIMEZONE={}\n",
        username.trim(),
        magic_cookie.trim(),
        timezone.trim()
    );
    if !sound_file.trim().is_empty() {
        contents.push_str(&format!("ALARM_SOUND_FILE={}\n", sound_file.trim()));
    }
    std::fs::write(config_path, contents)?;
    println!("Saved {}.", config_path);
    Ok(())
}

async fn test_sound(sound_file: Option<String>, seconds: u64) -> Result<(), PlaybackError> {
    let sounder = RodioSounder::new(sound_file);
    println!("Playing the alarm sound for {} seconds.", seconds);
    sounder.start().await?;
    tokio::time::sleep(Duration::from_secs(seconds)).await;
    sounder.stop().await?;
    Ok(())
}
