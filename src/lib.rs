#![doc = "The `taskdeck` library crate."]
#![doc = ""]
#![doc = "This crate contains the domain models, authentication mechanisms, routing"]
#![doc = "configuration, email delivery, weather lookup and error handling for the"]
#![doc = "TaskDeck API. It is used by the main binary (`main.rs`) to construct and"]
#![doc = "run the application."]

pub mod auth;
pub mod config;
pub mod error;
pub mod mailer;
pub mod models;
pub mod routes;
pub mod sweep;
pub mod weather;
