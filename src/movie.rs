//! Movie folder processing: locate the principal file, normalize names,
//! consolidate English subtitles, clean out everything else, strip
//! container metadata and relocate the result.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result};
use walkdir::WalkDir;

use crate::error::Error;
use crate::meta::NameParser;

const ENGLISH_TOKENS: [&str; 3] = ["english", "eng", "en"];

/// Runs the movie pipeline over one candidate directory. With `simulate`
/// set, subtitle consolidation and cleanup compute their resulting path
/// sets without touching the file system.
pub struct MovieProcessor<'a> {
    parser: &'a NameParser,
    simulate: bool,
}

/// Deletions computed ahead of execution so the simulate contract is a
/// projection of the same pass rather than a second code path.
#[derive(Debug, Default)]
pub struct CleanupPlan {
    pub delete_files: Vec<PathBuf>,
    /// Deepest directories first, so removal never hits a non-empty one.
    pub delete_dirs: Vec<PathBuf>,
    pub keep: Vec<PathBuf>,
}

impl<'a> MovieProcessor<'a> {
    pub fn new(parser: &'a NameParser, simulate: bool) -> Self {
        Self { parser, simulate }
    }

    /// Run the full pipeline for one movie candidate directory and move
    /// the result into `movie_dest`. A rename failure aborts the
    /// remaining steps for this candidate; the caller logs and moves on.
    pub fn process_movie(&self, movie_dir: &Path, movie_dest: &Path) -> Result<()> {
        let movie = find_largest_file(movie_dir)?;

        let (base_name, movie, movie_dir) = self.rename_movie(movie_dir, &movie)?;

        let planned = plan_subtitles(&movie_dir, &base_name)?;
        let subtitles = self.move_planned_subtitles(&planned)?;

        // In simulate mode the sources have not moved; cleanup must see
        // the subtitle paths as they stand on disk.
        let keep = if self.simulate {
            planned.into_iter().map(|(source, _)| source).collect()
        } else {
            subtitles
        };
        self.clean_dir(&movie_dir, &movie, &keep)?;

        if !self.simulate {
            // Relocation does not depend on the strip, so a strip failure
            // keeps the original file and the pipeline continues.
            if let Err(e) = strip_metadata(&movie) {
                tracing::warn!("Could not strip metadata from [{}]: {e:#}", movie.display());
            }

            move_into(&movie_dir, movie_dest)?;
        }

        Ok(())
    }

    /// Rename the candidate directory and its principal file to the
    /// normalized `<title_with_underscores>.<year>` form. Returns the new
    /// base name plus the full paths of the renamed file and directory.
    pub fn rename_movie(&self, movie_dir: &Path, movie: &Path) -> Result<(String, PathBuf, PathBuf)> {
        let movie_name = movie
            .file_name()
            .context("principal file has no file name")?
            .to_string_lossy()
            .into_owned();
        tracing::debug!("Parsing movie name into meta-data: [{movie_name}]");

        let stem = movie.file_stem().unwrap_or_default().to_string_lossy();
        let meta = self.parser.parse(&stem);
        tracing::debug!("Parsed meta-data: [{meta:?}]");

        let year = match meta.year {
            Some(year) if !meta.title.is_empty() => year,
            _ => {
                return Err(Error::MetadataIncomplete { name: movie_name }.into());
            }
        };

        let new_base_name = format!("{}.{year}", meta.title.replace(' ', "_"));
        tracing::debug!("Base name: [{new_base_name}]");

        let relative_movie = movie
            .strip_prefix(movie_dir)
            .context("principal file is outside the candidate directory")?
            .to_path_buf();

        let parent = movie_dir
            .parent()
            .context("candidate directory has no parent")?;
        let new_dir_name = parent.join(&new_base_name);
        tracing::debug!(
            "Renaming directory [{}] to [{}]",
            movie_dir.display(),
            new_dir_name.display()
        );
        fs::rename(movie_dir, &new_dir_name).with_context(|| {
            format!(
                "failed to rename directory [{}] to [{}]",
                movie_dir.display(),
                new_dir_name.display()
            )
        })?;

        let current_path = new_dir_name.join(&relative_movie);
        let new_movie_name = new_dir_name.join(match movie.extension() {
            Some(ext) => format!("{new_base_name}.{}", ext.to_string_lossy()),
            None => new_base_name.clone(),
        });
        tracing::debug!(
            "Renaming file [{}] to [{}]",
            current_path.display(),
            new_movie_name.display()
        );
        fs::rename(&current_path, &new_movie_name).with_context(|| {
            format!(
                "failed to rename file [{}] to [{}]",
                current_path.display(),
                new_movie_name.display()
            )
        })?;

        Ok((new_base_name, new_movie_name, new_dir_name))
    }

    /// Move every English subtitle into the directory root, renamed to
    /// `<base_name>.en.srt`; with more than one, all but the first get an
    /// injected `_<index>` before the suffix. Returns the resulting path
    /// set, which in simulate mode is computed without any file moves.
    pub fn process_subtitles(&self, base_dir: &Path, base_name: &str) -> Result<BTreeSet<PathBuf>> {
        tracing::debug!(
            "Processing subtitle files in directory [{}] for media with name [{base_name}]...",
            base_dir.display()
        );

        let planned = plan_subtitles(base_dir, base_name)?;
        self.move_planned_subtitles(&planned)
    }

    /// Execute a subtitle plan. A source can already sit at another
    /// file's destination name; those are staged aside under a scratch
    /// name first so an earlier move cannot overwrite them.
    fn move_planned_subtitles(&self, planned: &[(PathBuf, PathBuf)]) -> Result<BTreeSet<PathBuf>> {
        let destinations: BTreeSet<PathBuf> =
            planned.iter().map(|(_, dest)| dest.clone()).collect();

        if self.simulate {
            tracing::trace!("Resulting subtitle files: {destinations:?}");
            return Ok(destinations);
        }

        let mut pending: Vec<(PathBuf, PathBuf)> = Vec::with_capacity(planned.len());
        for (source, dest) in planned {
            if source != dest && destinations.contains(source) {
                let staged = dest.with_extension("srt.part");
                tracing::trace!("Staging [{}] as [{}]", source.display(), staged.display());
                fs::rename(source, &staged).with_context(|| {
                    format!(
                        "failed to stage subtitle [{}] as [{}]",
                        source.display(),
                        staged.display()
                    )
                })?;
                pending.push((staged, dest.clone()));
            } else {
                pending.push((source.clone(), dest.clone()));
            }
        }

        for (source, dest) in &pending {
            if source == dest {
                continue;
            }
            tracing::debug!("Moving [{}] to [{}]...", source.display(), dest.display());
            fs::rename(source, dest).with_context(|| {
                format!(
                    "failed to move subtitle [{}] to [{}]",
                    source.display(),
                    dest.display()
                )
            })?;
        }

        tracing::trace!("Resulting subtitle files: {destinations:?}");
        Ok(destinations)
    }

    /// Delete every file except the movie and its subtitles, then every
    /// now-empty subdirectory. `subtitle_files` must name the subtitle
    /// paths as they currently exist under `base_dir`. Returns the files
    /// that were kept.
    pub fn clean_dir(
        &self,
        base_dir: &Path,
        movie: &Path,
        subtitle_files: &BTreeSet<PathBuf>,
    ) -> Result<Vec<PathBuf>> {
        tracing::debug!("Removing irrelevant files from base dir [{}]", base_dir.display());
        tracing::trace!("Leaving movie file [{}] with subtitle files {subtitle_files:?}", movie.display());

        let plan = plan_cleanup(base_dir, movie, subtitle_files)?;

        if !self.simulate {
            for file in &plan.delete_files {
                tracing::trace!("Deleting file [{}]", file.display());
                fs::remove_file(file)
                    .with_context(|| format!("failed to delete file [{}]", file.display()))?;
            }
            for dir in &plan.delete_dirs {
                tracing::trace!("Deleting directory [{}]", dir.display());
                fs::remove_dir(dir)
                    .with_context(|| format!("failed to delete directory [{}]", dir.display()))?;
            }
        }

        Ok(plan.keep)
    }
}

/// Identify the principal file: the largest file anywhere under the
/// directory, ties broken by path order.
pub fn find_largest_file(base_dir: &Path) -> Result<PathBuf> {
    tracing::debug!("Looking for largest file in directory: [{}]", base_dir.display());

    let mut files: Vec<(u64, PathBuf)> = Vec::new();
    for entry in WalkDir::new(base_dir) {
        let entry = entry?;
        if entry.file_type().is_file() {
            let size = entry.metadata()?.len();
            files.push((size, entry.into_path()));
        }
    }
    tracing::trace!("Found file list: {files:?}");

    files.sort();
    let largest = files
        .pop()
        .map(|(_, path)| path)
        .with_context(|| format!("no files found in [{}]", base_dir.display()))?;

    tracing::debug!("Largest file: [{}]", largest.display());
    Ok(largest)
}

/// Find all English subtitle files under the directory, sorted by full
/// path for determinism.
pub fn find_english_subtitles(base_dir: &Path) -> Result<Vec<PathBuf>> {
    tracing::debug!("Looking for subtitle files with extension \"srt\"");

    let mut srt_english = Vec::new();
    for entry in WalkDir::new(base_dir) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let is_srt = entry
            .path()
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("srt"));
        if !is_srt {
            continue;
        }
        let file_name = entry.file_name().to_string_lossy().into_owned();
        if is_english_subtitle_name(&file_name) {
            srt_english.push(entry.into_path());
        }
    }

    srt_english.sort();

    if srt_english.is_empty() {
        tracing::debug!("No english subtitle files found");
    } else {
        tracing::trace!("English subtitle files found: {srt_english:?}");
    }

    Ok(srt_english)
}

/// Plan the subtitle consolidation: every English subtitle source paired
/// with its destination under the directory root, `<base_name>.en.srt`
/// for the first and `<base_name>_<index>.en.srt` for the rest.
pub fn plan_subtitles(base_dir: &Path, base_name: &str) -> Result<Vec<(PathBuf, PathBuf)>> {
    let english_subtitles = find_english_subtitles(base_dir)?;

    let mut planned = Vec::with_capacity(english_subtitles.len());
    for (index, file) in english_subtitles.into_iter().enumerate() {
        let mut new_name = base_name.to_string();
        if index > 0 {
            new_name.push_str(&format!("_{index}"));
        }
        new_name.push_str(".en.srt");
        planned.push((file, base_dir.join(new_name)));
    }

    Ok(planned)
}

/// Split the stem into letter runs and scan them in reverse: the language
/// indicator sits at the end of the name, so the final run decides. A
/// name tagged for another language is excluded even when "english"
/// appears earlier in it.
pub fn is_english_subtitle_name(file_name: &str) -> bool {
    let stem = Path::new(file_name)
        .file_stem()
        .unwrap_or_default()
        .to_string_lossy();
    stem.split(|c: char| !c.is_ascii_alphabetic())
        .filter(|token| !token.is_empty())
        .next_back()
        .is_some_and(|token| {
            ENGLISH_TOKENS
                .iter()
                .any(|english| token.eq_ignore_ascii_case(english))
        })
}

/// Compute the deletion plan for a cleanup pass: everything under the
/// directory except the movie and its subtitle files, with directories
/// ordered deepest-first.
pub fn plan_cleanup(
    base_dir: &Path,
    movie: &Path,
    subtitle_files: &BTreeSet<PathBuf>,
) -> Result<CleanupPlan> {
    let mut plan = CleanupPlan::default();

    for entry in WalkDir::new(base_dir).min_depth(1).contents_first(true) {
        let entry = entry?;
        let is_dir = entry.file_type().is_dir();
        let path = entry.into_path();

        if is_dir {
            plan.delete_dirs.push(path);
        } else if path == movie || subtitle_files.contains(&path) {
            tracing::debug!("Will not delete file: [{}]", path.display());
            plan.keep.push(path);
        } else {
            plan.delete_files.push(path);
        }
    }

    Ok(plan)
}

/// Rewrite the movie in place with container metadata removed, preserving
/// the audio and video streams. ffmpeg writes to a temp sibling; the
/// original is replaced only after ffmpeg reports success.
pub fn strip_metadata(movie: &Path) -> Result<()> {
    tracing::debug!("Stripping meta-data from movie: [{}]", movie.display());

    let stem = movie.file_stem().unwrap_or_default().to_string_lossy();
    let stripped_name = match movie.extension() {
        Some(ext) => format!("{stem}.out.{}", ext.to_string_lossy()),
        None => format!("{stem}.out"),
    };
    let stripped_movie = movie.with_file_name(stripped_name);

    let output = Command::new("ffmpeg")
        .arg("-i")
        .arg(movie)
        .args(["-map_metadata", "-1", "-c:v", "copy", "-c:a", "copy"])
        .arg(&stripped_movie)
        .output()
        .context("failed to run ffmpeg")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        // Drop any partial output before reporting.
        let _ = fs::remove_file(&stripped_movie);
        anyhow::bail!(
            "ffmpeg exited with {:?}: {}",
            output.status.code(),
            stderr.trim()
        );
    }

    fs::remove_file(movie)
        .with_context(|| format!("failed to remove original [{}]", movie.display()))?;
    fs::rename(&stripped_movie, movie).with_context(|| {
        format!(
            "failed to move [{}] into place as [{}]",
            stripped_movie.display(),
            movie.display()
        )
    })?;

    tracing::debug!("Stripping meta-data complete.");
    Ok(())
}

/// Move a file or directory into the destination directory, keeping its
/// name. Falls back to copy+remove when a plain rename fails (e.g. the
/// destination is on another file system).
pub fn move_into(source: &Path, dest_dir: &Path) -> Result<PathBuf> {
    let dest = dest_dir.join(
        source
            .file_name()
            .with_context(|| format!("[{}] has no file name", source.display()))?,
    );

    tracing::debug!("Moving [{}] to [{}]...", source.display(), dest.display());
    move_path(source, &dest)?;
    tracing::info!("Successfully moved [{}] to [{}]", source.display(), dest.display());

    Ok(dest)
}

/// Move a file or directory to an exact destination path, with the same
/// copy+remove fallback as [`move_into`].
pub fn move_path(source: &Path, dest: &Path) -> Result<()> {
    match fs::rename(source, dest) {
        Ok(()) => Ok(()),
        Err(e) => {
            tracing::warn!("Atomic rename failed, falling back to copy+remove: {e}");
            if source.is_dir() {
                copy_dir_recursive(source, dest)?;
                fs::remove_dir_all(source).with_context(|| {
                    format!("failed to remove [{}] after copy", source.display())
                })?;
            } else {
                fs::copy(source, dest).with_context(|| {
                    format!("copy failed [{}] -> [{}]", source.display(), dest.display())
                })?;
                fs::remove_file(source).with_context(|| {
                    format!("failed to remove [{}] after copy", source.display())
                })?;
            }
            Ok(())
        }
    }
}

fn copy_dir_recursive(source: &Path, dest: &Path) -> Result<()> {
    for entry in WalkDir::new(source) {
        let entry = entry?;
        let relative = entry.path().strip_prefix(source)?;
        let target = dest.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)
                .with_context(|| format!("failed to create [{}]", target.display()))?;
        } else {
            fs::copy(entry.path(), &target).with_context(|| {
                format!(
                    "copy failed [{}] -> [{}]",
                    entry.path().display(),
                    target.display()
                )
            })?;
        }
    }
    Ok(())
}
