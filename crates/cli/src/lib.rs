//! Command-line front end for `pw-chat`: settings, logging and the Chromium backend.

pub mod browser;
pub mod cli;
pub mod error;
pub mod logging;
pub mod settings;
