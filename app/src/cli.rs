//! Command line interface

use clap::Parser;

use loglens_core::LaunchParameters;

#[derive(Parser, Debug)]
#[command(name = "loglens")]
#[command(about = "Fast desktop log file viewer")]
#[command(version)]
pub struct Cli {
    /// Log files to open
    pub filenames: Vec<String>,

    /// Increase verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Follow (tail) opened files
    #[arg(short, long)]
    pub follow: bool,

    /// Start a fresh session instead of restoring the last one
    #[arg(long)]
    pub new_session: bool,

    /// Restore the previous session even when filenames are given
    #[arg(long)]
    pub load_session: bool,

    /// Run standalone, skipping single-instance coordination
    #[arg(short = 'm', long)]
    pub multi_instance: bool,

    /// Initial window size
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_window_size)]
    pub window_size: Option<(u32, u32)>,
}

impl Cli {
    pub fn into_parameters(self) -> LaunchParameters {
        let (window_width, window_height) = self.window_size.unwrap_or((0, 0));

        LaunchParameters {
            filenames: self.filenames,
            follow: self.follow,
            new_session: self.new_session,
            load_session: self.load_session,
            multi_instance: self.multi_instance,
            window_width,
            window_height,
        }
    }
}

fn parse_window_size(value: &str) -> Result<(u32, u32), String> {
    let (width, height) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{value}'"))?;

    let width = width
        .parse()
        .map_err(|_| format!("invalid width '{width}'"))?;
    let height = height
        .parse()
        .map_err(|_| format!("invalid height '{height}'"))?;

    Ok((width, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_window_size() {
        assert_eq!(parse_window_size("1280x800"), Ok((1280, 800)));
        assert_eq!(parse_window_size("800X600"), Ok((800, 600)));
        assert!(parse_window_size("1280").is_err());
        assert!(parse_window_size("axb").is_err());
    }

    #[test]
    fn test_parameters_from_args() {
        let cli = Cli::parse_from([
            "loglens",
            "--follow",
            "--window-size",
            "1024x768",
            "a.log",
            "b.log",
        ]);
        let params = cli.into_parameters();

        assert_eq!(params.filenames, vec!["a.log", "b.log"]);
        assert!(params.follow);
        assert!(!params.multi_instance);
        assert_eq!(params.window_width, 1024);
        assert_eq!(params.window_height, 768);
    }
}
