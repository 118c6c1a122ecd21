pub mod commands;
pub mod github;
pub mod history;
pub mod http;
pub mod package;
pub mod project;
pub mod repository;
pub mod resolver;
pub mod runtime;
