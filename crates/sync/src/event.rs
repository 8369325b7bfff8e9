use std::path::{MAIN_SEPARATOR, Path, PathBuf};

/// One filesystem change notification, in the form the router applies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    Create { path: PathBuf },
    Delete { path: PathBuf, is_dir: bool },
    Modify { path: PathBuf },
    Move { from: PathBuf, to: PathBuf },
}

impl ChangeEvent {
    /// Removal of an entry whose kind the provider did not report: a file
    /// delete and a directory delete, each a no-op if it matches nothing.
    pub fn ambiguous_delete(path: &Path) -> [ChangeEvent; 2] {
        [
            ChangeEvent::Delete {
                path: path.to_path_buf(),
                is_dir: false,
            },
            ChangeEvent::Delete {
                path: path.to_path_buf(),
                is_dir: true,
            },
        ]
    }
}

/// Key prefix shared by every record inside directory `path`.
pub fn dir_prefix(path: &Path) -> Option<String> {
    let s = path.to_str()?;
    let mut prefix = s.trim_end_matches(MAIN_SEPARATOR).to_owned();
    prefix.push(MAIN_SEPARATOR);
    Some(prefix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn dir_prefix_appends_exactly_one_separator() {
        assert_eq!(dir_prefix(Path::new("/a/b")).as_deref(), Some("/a/b/"));
        assert_eq!(dir_prefix(Path::new("/a/b/")).as_deref(), Some("/a/b/"));
        assert_eq!(dir_prefix(Path::new("/")).as_deref(), Some("/"));
    }

    #[test]
    fn ambiguous_delete_covers_file_then_directory() {
        let [first, second] = ChangeEvent::ambiguous_delete(Path::new("/x"));
        assert_eq!(
            first,
            ChangeEvent::Delete {
                path: "/x".into(),
                is_dir: false
            }
        );
        assert_eq!(
            second,
            ChangeEvent::Delete {
                path: "/x".into(),
                is_dir: true
            }
        );
    }
}
