#![allow(non_snake_case)]

pub mod events;
pub mod handlers;
pub mod models;
pub mod service;
pub mod tasks;
pub mod clients;
pub mod runtime;
pub mod config;
