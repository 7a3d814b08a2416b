//! Console output levels

/// How much the CLI prints
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum LogLevel {
    /// Only errors
    Quiet,
    /// One line per step
    #[default]
    Normal,
    /// Per-layer detail and written files
    Verbose,
}

impl LogLevel {
    /// Level selected by `-q` / `-v`; quiet wins when both are given
    #[must_use]
    pub fn from_flags(quiet: bool, verbose: bool) -> Self {
        if quiet {
            Self::Quiet
        } else if verbose {
            Self::Verbose
        } else {
            Self::Normal
        }
    }

    /// Whether a message at `required` is printed at this level
    #[must_use]
    pub fn allows(self, required: LogLevel) -> bool {
        self != LogLevel::Quiet && (self == required || required == LogLevel::Normal)
    }
}

/// Print `msg` to stdout if `level` permits messages at `required`
pub fn log(level: LogLevel, required: LogLevel, msg: &str) {
    if level.allows(required) {
        println!("{msg}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_flags() {
        assert_eq!(LogLevel::from_flags(false, false), LogLevel::Normal);
        assert_eq!(LogLevel::from_flags(false, true), LogLevel::Verbose);
        assert_eq!(LogLevel::from_flags(true, true), LogLevel::Quiet);
    }

    #[test]
    fn test_allows() {
        assert!(LogLevel::Normal.allows(LogLevel::Normal));
        assert!(!LogLevel::Normal.allows(LogLevel::Verbose));
        assert!(LogLevel::Verbose.allows(LogLevel::Normal));
        assert!(LogLevel::Verbose.allows(LogLevel::Verbose));
        assert!(!LogLevel::Quiet.allows(LogLevel::Normal));
    }
}
