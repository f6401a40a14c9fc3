//! Transfer command construction
//!
//! The external tool is invoked as
//! `program [options] [link-option previous] source destination`.

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::{Path, PathBuf};

/// Options passed to rsync when none are configured
pub const DEFAULT_TRANSFER_OPTIONS: &[&str] = &[
    "--archive",
    "--hard-links",
    "--acls",
    "--xattrs",
    "--fuzzy",
    "--relative",
    "--verbose",
    "--delete",
];

/// Option that makes rsync hard-link unchanged files against a previous tree
pub const DEFAULT_LINK_DEST_OPTION: &str = "--link-dest";

/// Default transfer program
pub const DEFAULT_TRANSFER_PROGRAM: &str = "rsync";

/// The external tool and the options it is always run with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferTool {
    /// Executable name or path
    pub program: String,
    /// Base options, placed before everything else
    pub options: Vec<String>,
    /// Option introducing the previous snapshot to link against
    pub link_dest_option: String,
}

impl TransferTool {
    /// Build the command that fills `destination` from `source`
    pub fn command(&self, link_dest: Option<&Path>, source: &Path, destination: &Path) -> TransferCommand {
        TransferCommand::build(
            &self.program,
            &self.options,
            &self.link_dest_option,
            link_dest,
            source,
            destination,
        )
    }
}

impl Default for TransferTool {
    fn default() -> Self {
        Self {
            program: DEFAULT_TRANSFER_PROGRAM.to_string(),
            options: DEFAULT_TRANSFER_OPTIONS.iter().map(|o| o.to_string()).collect(),
            link_dest_option: DEFAULT_LINK_DEST_OPTION.to_string(),
        }
    }
}

/// A fully built invocation of the transfer tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferCommand {
    program: OsString,
    args: Vec<OsString>,
    link_dest: Option<PathBuf>,
    destination: PathBuf,
}

impl TransferCommand {
    /// Build the argument list for one snapshot
    pub fn build<S: AsRef<OsStr>>(
        program: impl AsRef<OsStr>,
        options: &[S],
        link_dest_option: &str,
        link_dest: Option<&Path>,
        source: &Path,
        destination: &Path,
    ) -> Self {
        let mut args: Vec<OsString> = options.iter().map(|o| o.as_ref().to_os_string()).collect();

        if let Some(previous) = link_dest {
            args.push(OsString::from(link_dest_option));
            args.push(previous.as_os_str().to_os_string());
        }

        args.push(source.as_os_str().to_os_string());
        args.push(destination.as_os_str().to_os_string());

        Self {
            program: program.as_ref().to_os_string(),
            args,
            link_dest: link_dest.map(Path::to_path_buf),
            destination: destination.to_path_buf(),
        }
    }

    /// The executable to run
    pub fn program(&self) -> &OsStr {
        &self.program
    }

    /// Arguments, in order
    pub fn args(&self) -> &[OsString] {
        &self.args
    }

    /// The previous snapshot this transfer links against, if any
    pub fn link_dest(&self) -> Option<&Path> {
        self.link_dest.as_deref()
    }

    /// The snapshot directory being filled
    pub fn destination(&self) -> &Path {
        &self.destination
    }
}

impl fmt::Display for TransferCommand {
    /// Render as a shell-like command line for logs
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", quote(&self.program))?;
        for arg in &self.args {
            write!(f, " {}", quote(arg))?;
        }
        Ok(())
    }
}

fn quote(arg: &OsStr) -> String {
    let text = arg.to_string_lossy();
    if !text.is_empty() && !text.contains(|c: char| c.is_whitespace() || c == '"' || c == '\'') {
        return text.into_owned();
    }
    format!("'{}'", text.replace('\'', r"'\''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args_of(cmd: &TransferCommand) -> Vec<String> {
        cmd.args()
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_build_without_previous_snapshot() {
        let cmd = TransferCommand::build(
            "rsync",
            DEFAULT_TRANSFER_OPTIONS,
            DEFAULT_LINK_DEST_OPTION,
            None,
            Path::new("/home/user"),
            Path::new("/backups/2024-01-01-00:00:00"),
        );

        let args = args_of(&cmd);
        assert!(!args.iter().any(|a| a == "--link-dest"));
        assert_eq!(&args[..8], DEFAULT_TRANSFER_OPTIONS);
        assert_eq!(args[8], "/home/user");
        assert_eq!(args[9], "/backups/2024-01-01-00:00:00");
        assert!(cmd.link_dest().is_none());
    }

    #[test]
    fn test_build_with_previous_snapshot() {
        let cmd = TransferCommand::build(
            "rsync",
            &["-a"],
            DEFAULT_LINK_DEST_OPTION,
            Some(Path::new("/backups/2023-12-31-00:00:00")),
            Path::new("/src"),
            Path::new("/backups/2024-01-01-00:00:00"),
        );

        assert_eq!(
            args_of(&cmd),
            vec![
                "-a",
                "--link-dest",
                "/backups/2023-12-31-00:00:00",
                "/src",
                "/backups/2024-01-01-00:00:00",
            ]
        );
        assert_eq!(cmd.link_dest(), Some(Path::new("/backups/2023-12-31-00:00:00")));
        assert_eq!(cmd.program(), OsStr::new("rsync"));
    }

    #[test]
    fn test_display_quotes_awkward_arguments() {
        let cmd = TransferCommand::build(
            "rsync",
            &["--archive"],
            DEFAULT_LINK_DEST_OPTION,
            None,
            Path::new("/my docs"),
            Path::new("/b/2024-01-01-00:00:00"),
        );
        assert_eq!(
            cmd.to_string(),
            "rsync --archive '/my docs' /b/2024-01-01-00:00:00"
        );
    }
}
