//! Output discovery by directory snapshot.
//!
//! The renderer decides its own output paths, so the only reliable way to
//! find what a run produced is to list the media directory before and after
//! and take the difference.
//!
//! Preference among new files:
//! 1. a finished `.mp4` (not under `partial_movie_files/`)
//! 2. a `.png` still
//! 3. the first new file in sorted order
//!
//! When several pipelines render into the same media directory at once, new
//! files are narrowed to those under a directory named after the script's
//! stem (Manim nests output that way). If none of them belong to the script,
//! nothing is picked: the other files are some other pipeline's output.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Set of files currently under `dir` (empty if the directory is missing).
pub fn snapshot(dir: &Path) -> BTreeSet<PathBuf> {
    if !dir.exists() {
        return BTreeSet::new();
    }
    WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .collect()
}

/// Files present in `after` but not `before`, sorted.
pub fn new_files(before: &BTreeSet<PathBuf>, after: &BTreeSet<PathBuf>) -> Vec<PathBuf> {
    after.difference(before).cloned().collect()
}

/// Choose the render output among newly created files.
pub fn pick_output(new_files: &[PathBuf], script_stem: Option<&str>) -> Option<PathBuf> {
    let owned: Vec<&PathBuf> = match script_stem {
        Some(stem) => new_files
            .iter()
            .filter(|p| p.components().any(|c| c.as_os_str() == stem))
            .collect(),
        None => new_files.iter().collect(),
    };

    let is_partial = |p: &Path| {
        p.components()
            .any(|c| c.as_os_str() == "partial_movie_files")
    };
    let has_ext = |p: &Path, ext: &str| {
        p.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(ext))
    };

    owned
        .iter()
        .find(|p| has_ext(p.as_path(), "mp4") && !is_partial(p.as_path()))
        .or_else(|| owned.iter().find(|p| has_ext(p.as_path(), "png")))
        .or_else(|| owned.first())
        .map(|p| (*p).clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"x").unwrap();
    }

    #[test]
    fn snapshot_missing_dir_is_empty() {
        let tmp = TempDir::new().unwrap();
        assert!(snapshot(&tmp.path().join("media")).is_empty());
    }

    #[test]
    fn new_files_is_set_difference() {
        let tmp = TempDir::new().unwrap();
        let media = tmp.path().join("media");
        touch(&media.join("old.png"));
        let before = snapshot(&media);
        touch(&media.join("videos/s1/720p30/Tangent.mp4"));
        let after = snapshot(&media);

        let created = new_files(&before, &after);
        assert_eq!(created, vec![media.join("videos/s1/720p30/Tangent.mp4")]);
    }

    #[test]
    fn pick_prefers_finished_video_over_partials() {
        let files = vec![
            PathBuf::from("media/videos/s/720p30/partial_movie_files/Tangent/001.mp4"),
            PathBuf::from("media/videos/s/720p30/Tangent.mp4"),
        ];
        assert_eq!(
            pick_output(&files, None),
            Some(PathBuf::from("media/videos/s/720p30/Tangent.mp4"))
        );
    }

    #[test]
    fn pick_falls_back_to_png_then_first() {
        let files = vec![
            PathBuf::from("media/texts/abc.svg"),
            PathBuf::from("media/images/s/Plane.png"),
        ];
        assert_eq!(
            pick_output(&files, None),
            Some(PathBuf::from("media/images/s/Plane.png"))
        );

        let files = vec![PathBuf::from("media/texts/abc.svg")];
        assert_eq!(pick_output(&files, None), Some(files[0].clone()));
        assert_eq!(pick_output(&[], None), None);
    }

    #[test]
    fn pick_narrows_to_own_script() {
        let files = vec![
            PathBuf::from("media/videos/manim_scene_aaaa/720p30/A.mp4"),
            PathBuf::from("media/videos/manim_scene_bbbb/720p30/B.mp4"),
        ];
        assert_eq!(
            pick_output(&files, Some("manim_scene_bbbb")),
            Some(PathBuf::from("media/videos/manim_scene_bbbb/720p30/B.mp4"))
        );
    }

    #[test]
    fn pick_ignores_other_scripts_output() {
        let files = vec![
            PathBuf::from("media/videos/manim_scene_aaaa/720p30/A.mp4"),
            PathBuf::from("media/images/manim_scene_aaaa/A.png"),
        ];
        assert_eq!(pick_output(&files, Some("manim_scene_bbbb")), None);
    }
}
