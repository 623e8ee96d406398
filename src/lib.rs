pub mod app;
pub mod banner;
pub mod config;
pub mod detail;
pub mod firestore;
pub mod language;
pub mod models;
pub mod my_list;
pub mod session;
pub mod tmdb;
pub mod toast;
pub mod ui;
pub mod view;
