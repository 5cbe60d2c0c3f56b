use std::{
    ffi::OsString,
    path::{Path, PathBuf},
};

use thiserror::Error;

/// Names a directory to write `obmenu.log` into. Logging is off without it.
pub const LOG_DIR_ENV: &str = "OBMENU_LOG";
pub const LOG_FILE_NAME: &str = "obmenu.log";

pub const USAGE: &str = "\
Usage: obmenu [OPTIONS] [PATH]

Edit an Openbox menu file in the terminal.

Arguments:
  [PATH]  Menu file to open (default: $XDG_CONFIG_HOME/openbox/menu.xml)

Options:
  -h, --help     Print help
  -V, --version  Print version

Environment:
  OBMENU_LOG     Directory to write obmenu.log into; RUST_LOG sets the filter";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// File to open. `None` when no path was given and no config directory
    /// could be determined; the editor then starts with an unsaved document.
    pub menu_path: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Run(Config),
    Help,
    Version,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown option '{0}'")]
    UnknownOption(String),
    #[error("unexpected argument '{0}'; only one menu file can be opened")]
    ExtraArgument(String),
}

/// Default location of the user's menu, `$XDG_CONFIG_HOME/openbox/menu.xml`.
pub fn default_menu_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| menu_path_in(&dir))
}

fn menu_path_in(config_dir: &Path) -> PathBuf {
    config_dir.join("openbox").join("menu.xml")
}

impl Config {
    /// Resolves the configuration from arguments (without the program name)
    /// and the value of [`LOG_DIR_ENV`].
    pub fn parse<I, S>(args: I, log_dir: Option<OsString>) -> Result<Command, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        let mut menu_path = None;
        let mut positional_only = false;
        for arg in args {
            let arg: OsString = arg.into();
            let text = arg.to_string_lossy().into_owned();
            if !positional_only && text.starts_with('-') && text.len() > 1 {
                match text.as_str() {
                    "-h" | "--help" => return Ok(Command::Help),
                    "-V" | "--version" => return Ok(Command::Version),
                    "--" => positional_only = true,
                    other => return Err(ConfigError::UnknownOption(other.to_string())),
                }
                continue;
            }
            if menu_path.is_some() {
                return Err(ConfigError::ExtraArgument(text));
            }
            menu_path = Some(PathBuf::from(arg));
        }

        Ok(Command::Run(Config {
            menu_path: menu_path.or_else(default_menu_path),
            log_dir: log_dir.filter(|dir| !dir.is_empty()).map(PathBuf::from),
        }))
    }

    pub fn from_env() -> Result<Command, ConfigError> {
        Self::parse(std::env::args_os().skip(1), std::env::var_os(LOG_DIR_ENV))
    }
}
