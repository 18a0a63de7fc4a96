use anyhow::{Context, Result};
use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};

/// One row in the config browser: the parent directory, a subdirectory, or a
/// JSON document.
#[derive(Debug, Clone)]
pub struct BrowserItem {
    pub name: String,
    pub path: PathBuf,
    pub is_dir: bool,
}

/// Minimal directory browser for picking a channel config document.
/// Shows directories first, then JSON files; everything else is hidden.
#[derive(Debug)]
pub struct FileBrowser {
    dir: PathBuf,
    entries: Vec<BrowserItem>,
    cursor: usize,
}

impl FileBrowser {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        let entries = read_entries(&dir)?;
        Ok(Self {
            dir,
            entries,
            cursor: 0,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn entries(&self) -> &[BrowserItem] {
        &self.entries
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn move_up(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn move_down(&mut self) {
        if self.cursor + 1 < self.entries.len() {
            self.cursor += 1;
        }
    }

    /// Activates the entry under the cursor. Directories are entered and the
    /// browser stays open; a file ends the browse with its path.
    pub fn enter(&mut self) -> Result<Option<PathBuf>> {
        let Some(item) = self.entries.get(self.cursor) else {
            return Ok(None);
        };

        if item.is_dir {
            let next = item.path.clone();
            self.set_dir(next)?;
            return Ok(None);
        }

        Ok(Some(item.path.clone()))
    }

    /// Moves to the parent directory, if there is one.
    pub fn ascend(&mut self) -> Result<()> {
        if let Some(parent) = self.dir.parent() {
            let parent = parent.to_path_buf();
            self.set_dir(parent)?;
        }
        Ok(())
    }

    fn set_dir(&mut self, dir: PathBuf) -> Result<()> {
        self.entries = read_entries(&dir)?;
        self.dir = dir;
        self.cursor = 0;
        Ok(())
    }
}

fn read_entries(dir: &Path) -> Result<Vec<BrowserItem>> {
    let listing = fs::read_dir(dir)
        .with_context(|| format!("failed reading directory at {}", dir.display()))?;

    let mut entries = Vec::new();
    for entry in listing {
        let entry =
            entry.with_context(|| format!("failed reading directory at {}", dir.display()))?;
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }

        let is_dir = entry
            .file_type()
            .map(|file_type| file_type.is_dir())
            .unwrap_or(false);
        if !is_dir && !is_json_file(&path) {
            continue;
        }

        entries.push(BrowserItem { name, path, is_dir });
    }

    entries.sort_by(|a, b| match (a.is_dir, b.is_dir) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
    });

    if let Some(parent) = dir.parent() {
        entries.insert(
            0,
            BrowserItem {
                name: "..".to_owned(),
                path: parent.to_path_buf(),
                is_dir: true,
            },
        );
    }

    Ok(entries)
}

fn is_json_file(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

#[cfg(test)]
mod tests {
    use super::FileBrowser;
    use std::fs;
    use std::path::{Path, PathBuf};

    struct TempTree {
        root: PathBuf,
    }

    impl TempTree {
        fn new(name: &str) -> Self {
            let root = std::env::temp_dir().join(format!(
                "xvr-grid-picker-{name}-{}",
                std::process::id()
            ));
            let _ = fs::remove_dir_all(&root);
            fs::create_dir_all(root.join("cams")).expect("create test tree");
            fs::write(root.join("site-a.json"), b"{}").expect("write file");
            fs::write(root.join("site-b.JSON"), b"{}").expect("write file");
            fs::write(root.join("notes.txt"), b"ignored").expect("write file");
            fs::write(root.join(".hidden.json"), b"ignored").expect("write file");
            fs::write(root.join("cams").join("yard.json"), b"{}").expect("write file");
            Self { root }
        }

        fn path(&self) -> &Path {
            &self.root
        }
    }

    impl Drop for TempTree {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.root);
        }
    }

    fn entry_names(browser: &FileBrowser) -> Vec<String> {
        browser
            .entries()
            .iter()
            .map(|item| item.name.clone())
            .collect()
    }

    #[test]
    fn lists_directories_before_json_files_and_hides_the_rest() {
        let tree = TempTree::new("listing");
        let browser = FileBrowser::open(tree.path()).expect("open browser");

        assert_eq!(
            entry_names(&browser),
            vec!["..", "cams", "site-a.json", "site-b.JSON"]
        );
    }

    #[test]
    fn entering_a_directory_descends_and_resets_the_cursor() {
        let tree = TempTree::new("descend");
        let mut browser = FileBrowser::open(tree.path()).expect("open browser");

        browser.move_down();
        assert_eq!(browser.entries()[browser.cursor()].name, "cams");
        let picked = browser.enter().expect("enter directory");
        assert!(picked.is_none());
        assert!(browser.dir().ends_with("cams"));
        assert_eq!(browser.cursor(), 0);
        assert_eq!(entry_names(&browser), vec!["..", "yard.json"]);
    }

    #[test]
    fn entering_a_file_returns_its_path() {
        let tree = TempTree::new("pick");
        let mut browser = FileBrowser::open(tree.path()).expect("open browser");

        browser.move_down();
        browser.move_down();
        let picked = browser.enter().expect("enter file").expect("a file path");
        assert!(picked.ends_with("site-a.json"));
    }

    #[test]
    fn ascend_returns_to_the_parent_directory() {
        let tree = TempTree::new("ascend");
        let mut browser =
            FileBrowser::open(tree.path().join("cams")).expect("open browser in subdir");

        browser.ascend().expect("ascend");
        assert!(browser.dir().ends_with(format!(
            "xvr-grid-picker-ascend-{}",
            std::process::id()
        )));
        assert_eq!(
            entry_names(&browser),
            vec!["..", "cams", "site-a.json", "site-b.JSON"]
        );
    }

    #[test]
    fn cursor_stays_inside_the_listing() {
        let tree = TempTree::new("cursor");
        let mut browser = FileBrowser::open(tree.path()).expect("open browser");

        browser.move_up();
        assert_eq!(browser.cursor(), 0);
        for _ in 0..16 {
            browser.move_down();
        }
        assert_eq!(browser.cursor(), browser.entries().len() - 1);
    }

    #[test]
    fn missing_directory_is_an_error() {
        let tree = TempTree::new("missing");
        let result = FileBrowser::open(tree.path().join("nope"));
        assert!(result.is_err());
    }
}
