pub mod cli_args;
pub mod data_directory;
pub mod password_source;
