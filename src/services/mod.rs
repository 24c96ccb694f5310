pub mod commands;
pub mod issues;
pub mod reference;
