pub mod cache;
pub mod calc;
pub mod cli;
pub mod config;
pub mod delta;
pub mod error;
pub mod github;
pub mod html;
pub mod links;
pub mod model;
pub mod parsers;
pub mod presubmit;
pub mod profile;
pub mod publish;
pub mod report;
