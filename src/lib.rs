pub mod coordinator;
pub mod counter;
pub mod host;
pub mod monitor;
pub mod panel;
pub mod settings;
pub mod site;
