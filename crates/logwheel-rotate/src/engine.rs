//! Retention engine: age gate, generation shift, depth limit, compression.

use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use chrono::{Datelike, Local, Timelike};
use regex::Regex;

use crate::compress::gzip_file;
use crate::generation::{self, generation_path};
use crate::logger::Logger;
use crate::{Retention, RotateError, RotationPolicy};

/// Applies rotation policies to the filesystem.
pub struct RetentionEngine {
    logger: Arc<dyn Logger>,
}

impl RetentionEngine {
    pub fn new(logger: Arc<dyn Logger>) -> Self {
        Self { logger }
    }

    /// Rotate the policy's files if its schedule is due right now.
    pub fn check_and_rotate(&self, policy: &mut RotationPolicy) -> usize {
        self.check_and_rotate_at(policy, &Local::now())
    }

    /// Rotate the policy's files if its schedule is due at `now`.
    ///
    /// Nothing is scanned on a tick that is not due. Errors are logged, never
    /// returned.
    pub fn check_and_rotate_at<T: Datelike + Timelike>(
        &self,
        policy: &mut RotationPolicy,
        now: &T,
    ) -> usize {
        if !policy.schedule.is_due(now) {
            return 0;
        }
        self.logger
            .debug(&format!("Policy [{}] is due ({})", policy.name, policy.schedule));
        self.rotate_logged(policy)
    }

    /// Run [`RetentionEngine::rotate_one`] and log the outcome.
    pub fn rotate_logged(&self, policy: &RotationPolicy) -> usize {
        match self.rotate_one(policy) {
            Ok(0) => {
                self.logger
                    .debug(&format!("Policy [{}]: no action", policy.name));
                0
            }
            Ok(count) => {
                self.logger
                    .info(&format!("Policy [{}]: rotated {count} file(s)", policy.name));
                count
            }
            Err(e) => {
                self.logger
                    .error(&format!("Policy [{}]: {e}", policy.name));
                0
            }
        }
    }

    /// Rotate every file of `policy.directory` whose name matches the pattern.
    ///
    /// Returns how many files were acted on. A bad pattern is logged and
    /// counts as no work; a failure on one file does not stop the others.
    pub fn rotate_one(&self, policy: &RotationPolicy) -> Result<usize, RotateError> {
        let pattern = match compile_pattern(&policy.file_pattern) {
            Ok(pattern) => pattern,
            Err(e) => {
                self.logger.error(&e.to_string());
                return Ok(0);
            }
        };

        let candidates = find_candidates(&policy.directory, &pattern)?;
        let now = SystemTime::now();
        let mut rotated = 0;
        for path in candidates {
            match self.rotate_file(policy, &path, now) {
                Ok(true) => rotated += 1,
                Ok(false) => {}
                Err(e) => self.logger.error(&e.to_string()),
            }
        }
        Ok(rotated)
    }

    fn rotate_file(
        &self,
        policy: &RotationPolicy,
        path: &Path,
        now: SystemTime,
    ) -> Result<bool, RotateError> {
        let modified = fs::metadata(path)
            .and_then(|m| m.modified())
            .map_err(|e| RotateError::io("read modification time of", path, e))?;
        let age = now
            .duration_since(modified)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        if age < policy.min_age {
            let message = format!(
                "File {} is too young to rotate ({age}s < {}s). Skipping.",
                path.display(),
                policy.min_age
            );
            if policy.simulation {
                self.logger.info(&message);
            } else {
                self.logger.debug(&message);
            }
            return Ok(false);
        }

        if policy.retention == Retention::DeleteOnly {
            self.remove(policy, path)?;
            return Ok(true);
        }

        let mut generations = generation::discover(path);
        if let Some(depth) = policy.retention.depth() {
            while generations.len() > depth {
                let oldest = generations.remove(0);
                self.remove(policy, &oldest.path)?;
            }
        }

        // Oldest first, so every target name is already free.
        let mut fresh: Vec<(PathBuf, u32)> = Vec::new();
        for generation in &generations {
            let target = generation.shifted(path);
            self.rename(policy, &generation.path, &target)?;
            if !generation.compressed {
                fresh.push((target, generation.index + 1));
            }
        }

        if policy.retention != Retention::TruncateOnly {
            let newest = generation_path(path, 0, false);
            self.copy(policy, path, &newest)?;
            fresh.push((newest, 0));
        }
        self.truncate(policy, path)?;

        if let Some(threshold) = policy.first_compress {
            for (generation, _) in fresh.iter().filter(|(_, index)| *index >= threshold) {
                self.compress(policy, generation);
            }
        }

        if policy.simulation {
            self.logger
                .info(&format!("Simulated rotation of {} done.", path.display()));
        } else {
            self.logger.info(&format!("Rotated {}", path.display()));
        }
        Ok(true)
    }

    fn remove(&self, policy: &RotationPolicy, path: &Path) -> Result<(), RotateError> {
        if policy.simulation {
            self.logger
                .info(&format!("Simulated removal of {}", path.display()));
            return Ok(());
        }
        fs::remove_file(path).map_err(|e| RotateError::io("remove", path, e))?;
        self.logger.info(&format!("Removed {}", path.display()));
        Ok(())
    }

    fn rename(&self, policy: &RotationPolicy, from: &Path, to: &Path) -> Result<(), RotateError> {
        if policy.simulation {
            self.logger.info(&format!(
                "Simulated rename of {} to {}",
                from.display(),
                to.display()
            ));
            return Ok(());
        }
        fs::rename(from, to).map_err(|e| RotateError::io("rename", from, e))?;
        self.logger
            .info(&format!("Renamed {} to {}", from.display(), to.display()));
        Ok(())
    }

    fn copy(&self, policy: &RotationPolicy, from: &Path, to: &Path) -> Result<(), RotateError> {
        if policy.simulation {
            self.logger.info(&format!(
                "Simulated copy of {} to {}",
                from.display(),
                to.display()
            ));
            return Ok(());
        }
        fs::copy(from, to).map_err(|e| RotateError::io("copy", from, e))?;
        self.logger
            .info(&format!("Copied {} to {}", from.display(), to.display()));
        Ok(())
    }

    fn truncate(&self, policy: &RotationPolicy, path: &Path) -> Result<(), RotateError> {
        if policy.simulation {
            self.logger
                .info(&format!("Simulated truncation of {}", path.display()));
            return Ok(());
        }
        truncate_in_place(path).map_err(|e| RotateError::io("truncate", path, e))?;
        self.logger.info(&format!("Truncated {}", path.display()));
        Ok(())
    }

    fn compress(&self, policy: &RotationPolicy, path: &Path) {
        if policy.simulation {
            self.logger
                .info(&format!("Simulated compression of {}", path.display()));
            return;
        }
        match gzip_file(path) {
            Ok(target) => self.logger.info(&format!(
                "Compressed {} to {}",
                path.display(),
                target.display()
            )),
            Err(e) => self
                .logger
                .error(&format!("Failed to compress {}: {e}", path.display())),
        }
    }
}

/// Compile a pattern that must match the whole file name.
fn compile_pattern(pattern: &str) -> Result<Regex, RotateError> {
    Regex::new(&format!("^(?:{pattern})$")).map_err(|source| RotateError::Pattern {
        pattern: pattern.to_string(),
        source,
    })
}

/// Regular files in `directory` whose name matches, sorted by name.
fn find_candidates(directory: &Path, pattern: &Regex) -> Result<Vec<PathBuf>, RotateError> {
    let entries =
        fs::read_dir(directory).map_err(|e| RotateError::io("read directory", directory, e))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| RotateError::io("read directory", directory, e))?;
        let path = entry.path();
        let matched = entry
            .file_name()
            .to_str()
            .is_some_and(|name| pattern.is_match(name));
        if matched && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Empty the file without replacing it, and mark it as modified now.
fn truncate_in_place(path: &Path) -> io::Result<()> {
    let file = OpenOptions::new().write(true).truncate(true).open(path)?;
    file.set_modified(SystemTime::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LogLevel;
    use crate::logger::MemoryLogger;
    use chrono::NaiveDate;
    use std::collections::BTreeMap;
    use std::time::Duration;

    const DAY: u64 = 86_400;

    fn setup() -> (tempfile::TempDir, Arc<MemoryLogger>, RetentionEngine) {
        let dir = tempfile::tempdir().unwrap();
        let logger = Arc::new(MemoryLogger::new());
        let engine = RetentionEngine::new(logger.clone());
        (dir, logger, engine)
    }

    fn policy(dir: &Path, keep_files: i64) -> RotationPolicy {
        let mut policy = RotationPolicy::new("test", dir, r"app\.log");
        policy.retention = Retention::from_keep_files(keep_files).unwrap();
        policy.schedule = "* * * * *".parse().unwrap();
        policy
    }

    fn write_aged(path: &Path, content: &str, age_secs: u64) {
        fs::write(path, content).unwrap();
        let file = OpenOptions::new().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() - Duration::from_secs(age_secs))
            .unwrap();
    }

    fn snapshot(dir: &Path) -> BTreeMap<String, Vec<u8>> {
        fs::read_dir(dir)
            .unwrap()
            .map(|e| {
                let e = e.unwrap();
                (
                    e.file_name().to_string_lossy().to_string(),
                    fs::read(e.path()).unwrap(),
                )
            })
            .collect()
    }

    fn names(dir: &Path) -> Vec<String> {
        snapshot(dir).into_keys().collect()
    }

    fn read(dir: &Path, name: &str) -> String {
        fs::read_to_string(dir.join(name)).unwrap()
    }

    fn gunzip(path: &Path) -> String {
        use flate2::read::GzDecoder;
        use std::io::Read;
        let mut content = String::new();
        GzDecoder::new(fs::File::open(path).unwrap())
            .read_to_string(&mut content)
            .unwrap();
        content
    }

    #[test]
    fn test_keep_two_drops_oldest_and_shifts() {
        let (dir, _logger, engine) = setup();
        let d = dir.path();
        write_aged(&d.join("app.log"), "live", DAY);
        write_aged(&d.join("app.log.0"), "gen0", DAY);
        write_aged(&d.join("app.log.1"), "gen1", DAY);
        write_aged(&d.join("app.log.2"), "gen2", DAY);

        let rotated = engine.rotate_one(&policy(d, 2)).unwrap();
        assert_eq!(rotated, 1);
        assert_eq!(
            names(d),
            vec!["app.log", "app.log.0", "app.log.1", "app.log.2"]
        );
        assert_eq!(read(d, "app.log.0"), "live");
        assert_eq!(read(d, "app.log.1"), "gen0");
        assert_eq!(read(d, "app.log.2"), "gen1");
        assert_eq!(read(d, "app.log"), "");
    }

    #[test]
    fn test_first_rotation_creates_generation_zero() {
        let (dir, logger, engine) = setup();
        let d = dir.path();
        write_aged(&d.join("app.log"), "hello", DAY);

        assert_eq!(engine.rotate_one(&policy(d, 3)).unwrap(), 1);
        assert_eq!(names(d), vec!["app.log", "app.log.0"]);
        assert_eq!(read(d, "app.log.0"), "hello");
        assert_eq!(read(d, "app.log"), "");
        assert!(logger.contains(LogLevel::Info, "Truncated"));
        assert!(logger.contains(LogLevel::Info, "Rotated"));
    }

    #[test]
    fn test_delete_mode_removes_candidate() {
        let (dir, logger, engine) = setup();
        let d = dir.path();
        write_aged(&d.join("app.log"), "live", DAY);
        write_aged(&d.join("app.log.0"), "gen0", DAY);

        assert_eq!(engine.rotate_one(&policy(d, -1)).unwrap(), 1);
        assert_eq!(names(d), vec!["app.log.0"]);
        assert_eq!(read(d, "app.log.0"), "gen0");
        assert!(logger.contains(LogLevel::Info, "Removed"));
        assert!(!logger.contains(LogLevel::Info, "Renamed"));
    }

    #[test]
    fn test_truncate_only_keeps_no_history() {
        let (dir, _logger, engine) = setup();
        let d = dir.path();
        write_aged(&d.join("app.log"), "live", DAY);
        write_aged(&d.join("app.log.0"), "gen0", DAY);
        write_aged(&d.join("app.log.1"), "gen1", DAY);

        assert_eq!(engine.rotate_one(&policy(d, 0)).unwrap(), 1);
        assert_eq!(names(d), vec!["app.log"]);
        assert_eq!(read(d, "app.log"), "");
    }

    #[test]
    fn test_truncation_resets_age() {
        let (dir, _logger, engine) = setup();
        let d = dir.path();
        write_aged(&d.join("app.log"), "live", DAY);
        let mut p = policy(d, 0);
        p.min_age = 3600;

        assert_eq!(engine.rotate_one(&p).unwrap(), 1);
        let modified = fs::metadata(d.join("app.log")).unwrap().modified().unwrap();
        let age = SystemTime::now().duration_since(modified).unwrap_or_default();
        assert!(age < Duration::from_secs(60));

        // Now too young for a second pass.
        assert_eq!(engine.rotate_one(&p).unwrap(), 0);
    }

    #[test]
    fn test_min_age_skips_young_files() {
        let (dir, logger, engine) = setup();
        let d = dir.path();
        write_aged(&d.join("app.log"), "live", 10);
        let mut p = policy(d, 2);
        p.min_age = 3600;

        assert_eq!(engine.rotate_one(&p).unwrap(), 0);
        assert_eq!(names(d), vec!["app.log"]);
        assert!(logger.contains(LogLevel::Debug, "too young"));

        p.simulation = true;
        assert_eq!(engine.rotate_one(&p).unwrap(), 0);
        assert!(logger.contains(LogLevel::Info, "too young"));
    }

    #[test]
    fn test_simulation_changes_nothing() {
        for keep_files in [-1, 0, 1, 2, 5] {
            let (dir, logger, engine) = setup();
            let d = dir.path();
            write_aged(&d.join("app.log"), "live", DAY);
            write_aged(&d.join("app.log.0"), "gen0", DAY);
            write_aged(&d.join("app.log.1"), "gen1", DAY);
            write_aged(&d.join("app.log.2"), "gen2", DAY);
            let before = snapshot(d);

            let mut p = policy(d, keep_files);
            p.simulation = true;
            p.first_compress = Some(0);
            assert_eq!(engine.rotate_one(&p).unwrap(), 1);

            assert_eq!(snapshot(d), before, "KeepFiles = {keep_files}");
            assert!(logger.contains(LogLevel::Info, "Simulated"));
        }
    }

    #[test]
    fn test_first_compress_from_generation_one() {
        let (dir, _logger, engine) = setup();
        let d = dir.path();
        write_aged(&d.join("app.log"), "live", DAY);
        write_aged(&d.join("app.log.0"), "gen0", DAY);
        write_aged(&d.join("app.log.1"), "gen1", DAY);

        let mut p = policy(d, 5);
        p.first_compress = Some(1);
        assert_eq!(engine.rotate_one(&p).unwrap(), 1);

        assert_eq!(
            names(d),
            vec!["app.log", "app.log.0", "app.log.1.gz", "app.log.2.gz"]
        );
        assert_eq!(read(d, "app.log.0"), "live");
        assert_eq!(gunzip(&d.join("app.log.1.gz")), "gen0");
        assert_eq!(gunzip(&d.join("app.log.2.gz")), "gen1");
    }

    #[test]
    fn test_compressed_generations_keep_shifting() {
        let (dir, _logger, engine) = setup();
        let d = dir.path();
        write_aged(&d.join("app.log"), "live", DAY);
        let mut p = policy(d, 2);
        p.first_compress = Some(1);

        // The fourth pass drops the oldest compressed generation.
        for round in 0..4 {
            write_aged(&d.join("app.log"), &format!("round {round}"), DAY);
            assert_eq!(engine.rotate_one(&p).unwrap(), 1);
        }

        assert_eq!(
            names(d),
            vec!["app.log", "app.log.0", "app.log.1.gz", "app.log.2.gz"]
        );
        assert_eq!(read(d, "app.log.0"), "round 3");
        assert_eq!(gunzip(&d.join("app.log.1.gz")), "round 2");
        assert_eq!(gunzip(&d.join("app.log.2.gz")), "round 1");
    }

    #[test]
    fn test_mixed_siblings_do_not_clobber() {
        let (dir, logger, engine) = setup();
        let d = dir.path();
        write_aged(&d.join("app.log"), "live", DAY);
        write_aged(&d.join("app.log.0"), "plain0", DAY);
        write_aged(&d.join("app.log.0.gz"), "packed0", DAY);

        let mut p = policy(d, 5);
        p.first_compress = Some(1);
        assert_eq!(engine.rotate_one(&p).unwrap(), 1);

        assert_eq!(read(d, "app.log.1"), "plain0");
        assert_eq!(read(d, "app.log.1.gz"), "packed0");
        assert!(logger.contains(LogLevel::Error, "Failed to compress"));
    }

    #[test]
    fn test_pattern_matches_whole_name() {
        let (dir, _logger, engine) = setup();
        let d = dir.path();
        write_aged(&d.join("app.log"), "live", DAY);
        write_aged(&d.join("myapp.log"), "other", DAY);
        write_aged(&d.join("app.log.bak"), "bak", DAY);

        assert_eq!(engine.rotate_one(&policy(d, -1)).unwrap(), 1);
        assert_eq!(names(d), vec!["app.log.bak", "myapp.log"]);
    }

    #[test]
    fn test_invalid_pattern_is_logged() {
        let (dir, logger, engine) = setup();
        let mut p = policy(dir.path(), 2);
        p.file_pattern = "(unclosed".into();

        assert_eq!(engine.rotate_one(&p).unwrap(), 0);
        assert!(logger.contains(LogLevel::Error, "invalid file pattern"));
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        let (dir, logger, engine) = setup();
        let p = policy(&dir.path().join("missing"), 2);

        let err = engine.rotate_one(&p).unwrap_err();
        assert!(matches!(err, RotateError::Io { op: "read directory", .. }));
        assert_eq!(engine.rotate_logged(&p), 0);
        assert!(logger.contains(LogLevel::Error, "read directory"));
    }

    #[test]
    fn test_failure_on_one_file_continues() {
        let (dir, logger, engine) = setup();
        let d = dir.path();
        write_aged(&d.join("a.log"), "a", DAY);
        // A directory where a generation is expected cannot be removed as a file.
        fs::create_dir(d.join("a.log.0")).unwrap();
        write_aged(&d.join("b.log"), "b", DAY);

        let mut p = policy(d, 0);
        p.file_pattern = r".*\.log".into();
        assert_eq!(engine.rotate_one(&p).unwrap(), 1);
        assert!(logger.contains(LogLevel::Error, "a.log.0"));
        assert_eq!(read(d, "a.log"), "a");
        assert_eq!(read(d, "b.log"), "");
    }

    #[test]
    fn test_check_and_rotate_only_when_due() {
        let (dir, _logger, engine) = setup();
        let d = dir.path();
        write_aged(&d.join("app.log"), "live", DAY);
        let mut p = policy(d, -1);
        p.schedule = "30 2 * * *".parse().unwrap();

        let not_due = NaiveDate::from_ymd_opt(2024, 3, 4)
            .unwrap()
            .and_hms_opt(2, 29, 0)
            .unwrap();
        assert_eq!(engine.check_and_rotate_at(&mut p, &not_due), 0);
        assert!(d.join("app.log").exists());

        let due = not_due + chrono::Duration::minutes(1);
        assert_eq!(engine.check_and_rotate_at(&mut p, &due), 1);
        assert!(!d.join("app.log").exists());
    }

    #[test]
    fn test_check_and_rotate_fires_once_per_minute() {
        let (dir, _logger, engine) = setup();
        let d = dir.path();
        let mut p = policy(d, -1);
        let now = NaiveDate::from_ymd_opt(2024, 3, 4)
            .unwrap()
            .and_hms_opt(10, 0, 1)
            .unwrap();

        write_aged(&d.join("app.log"), "first", DAY);
        assert_eq!(engine.check_and_rotate_at(&mut p, &now), 1);

        write_aged(&d.join("app.log"), "second", DAY);
        assert_eq!(engine.check_and_rotate_at(&mut p, &now), 0);
        assert_eq!(read(d, "app.log"), "second");
    }

    #[test]
    fn test_rotated_siblings_are_not_candidates() {
        let (dir, _logger, engine) = setup();
        let d = dir.path();
        write_aged(&d.join("app.log"), "live", DAY);
        let mut p = policy(d, 3);
        p.file_pattern = r"app\.log.*".into();

        // Candidates are listed before anything is renamed.
        assert_eq!(engine.rotate_one(&p).unwrap(), 1);
        assert_eq!(names(d), vec!["app.log", "app.log.0"]);
    }
}
