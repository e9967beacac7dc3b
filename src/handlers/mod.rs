pub mod commands;
pub mod responses;
