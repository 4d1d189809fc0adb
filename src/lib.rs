pub mod definition;
pub mod error;
pub mod grdm;
pub mod logging;
pub mod manager;
pub mod mapper;
pub mod output;
pub mod settings;
