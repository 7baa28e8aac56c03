pub mod error;
pub mod local_client;
pub mod ports;
pub mod repos;
pub mod resolver;
pub mod service;
