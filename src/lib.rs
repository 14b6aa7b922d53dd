pub mod cities;
pub mod config;
pub mod controller;
pub mod form;
pub mod initialization;
pub mod prediction;
pub mod ui;
pub mod utilities;
