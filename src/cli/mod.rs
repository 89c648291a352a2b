// CLI module
//
// This module contains command-line interface functionality:
// - arguments: Command-line argument parsing and subcommand handling

pub mod arguments;

pub use arguments::CookieShieldArguments;
