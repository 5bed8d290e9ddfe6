//! The option-probability file: plain-text `OPTION=N` lines adjusting
//! integer option values before the run.

use std::fs;

use sqlstorm_core::{CoreError, Opt, OptionRegistry};

use crate::error::{ConfigError, Result};

/// Applies every `OPTION=N` line of the file to the registry. `#` comments
/// and blank lines are ignored; an unknown option name aborts the run.
pub fn apply_prob_file(opts: &mut OptionRegistry, path: &str) -> Result<()> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_string(),
        source,
    })?;

    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((name, value)) = line.split_once('=') else {
            return Err(ConfigError::MalformedLine {
                path: path.to_string(),
                line: line.to_string(),
            });
        };
        let name = name.trim().to_ascii_lowercase().replace('_', "-");
        let opt = Opt::from_name(&name)
            .ok_or_else(|| CoreError::UnknownOption(name.clone()))?;
        opts.set_parsed(opt, value.trim()).map_err(ConfigError::Option)?;
        tracing::debug!(option = name, value = value.trim(), "probability override");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn applies_overrides() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# tuning\n\nDROP_COLUMN=50\nadd-index = 7\ntables=3").unwrap();
        let mut opts = OptionRegistry::new();
        apply_prob_file(&mut opts, &file.path().display().to_string()).unwrap();
        assert_eq!(opts.get_int(Opt::DropColumn), 50);
        assert_eq!(opts.get_int(Opt::AddIndex), 7);
        assert_eq!(opts.get_int(Opt::Tables), 3);
    }

    #[test]
    fn unknown_option_aborts() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "NO_SUCH_OPTION=1").unwrap();
        let mut opts = OptionRegistry::new();
        assert!(apply_prob_file(&mut opts, &file.path().display().to_string()).is_err());
    }

    #[test]
    fn malformed_line_aborts() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "just words").unwrap();
        let mut opts = OptionRegistry::new();
        assert!(apply_prob_file(&mut opts, &file.path().display().to_string()).is_err());
    }
}
