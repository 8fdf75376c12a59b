pub mod arg_parser;
pub mod logger;
pub mod matcher;
pub mod metrics;
pub mod record;
pub mod registry;
pub mod report;
pub mod snapshot;
