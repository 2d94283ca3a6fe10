#![allow(non_snake_case)]

mod models;
mod cli;
mod clients;
mod handlers;
mod service;
mod runtime;
mod tasks;
mod events;
mod config;

use std::env;
use std::path::Path;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::AppConfig;

const DEFAULT_CONFIG_PATH: &str = "calendar-alarm.conf";

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path = env::var("CONFIG_FILE").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let config = if Path::new(&config_path).exists() {
        match AppConfig::from_file(&config_path) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("Cannot load {}: {}", config_path, err);
                std::process::exit(1);
            }
        }
    } else {
        AppConfig::default()
    };

    let get_prop = |key: &str| -> Option<String> {
        config.get(key).or_else(|| env::var(key).ok())
    };

    cli::cli(get_prop, &config_path).await;
}
