use anyhow::Result;
use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime};

/// Maps a level name to a filter; unknown names fall back to `info`.
pub fn parse_level(log_level: &str) -> log::LevelFilter {
    match log_level.to_lowercase().as_str() {
        "trace" => log::LevelFilter::Trace,
        "debug" => log::LevelFilter::Debug,
        "warn" => log::LevelFilter::Warn,
        "error" => log::LevelFilter::Error,
        "off" => log::LevelFilter::Off,
        _ => log::LevelFilter::Info,
    }
}

/// Log files older than this are removed at startup.
pub const LOG_RETENTION: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Console output follows `log_level`; the daily file under `log_dir` always
/// records at least `debug`.
pub fn setup_logging(log_dir: &Path, log_level: &str) -> Result<()> {
    if !log_dir.exists() {
        fs::create_dir_all(log_dir)?;
    }
    prune_logs(log_dir, LOG_RETENTION, SystemTime::now())?;

    let log_path = log_dir.join(format!("neobot_{}.log", chrono::Local::now().format("%Y-%m-%d")));
    let console_level = parse_level(log_level);
    let file_level = console_level.max(log::LevelFilter::Debug);

    let console = fern::Dispatch::new()
        .level(console_level)
        .chain(std::io::stdout());
    let file = fern::Dispatch::new()
        .level(file_level)
        .chain(fern::log_file(log_path)?);

    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{} | {:<5} | {} - {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(file_level)
        // The socket libraries are chatty below info.
        .level_for("tungstenite", log::LevelFilter::Info)
        .level_for("tokio_tungstenite", log::LevelFilter::Info)
        .chain(console)
        .chain(file)
        .apply()?;

    Ok(())
}

/// Deletes `.log` files in `log_dir` last modified more than `max_age`
/// before `now`. Returns how many were removed.
fn prune_logs(log_dir: &Path, max_age: Duration, now: SystemTime) -> Result<usize> {
    let mut removed = 0;
    for entry in fs::read_dir(log_dir)?.filter_map(|res| res.ok()) {
        let path = entry.path();
        if !path.extension().is_some_and(|ext| ext == "log") {
            continue;
        }
        let Ok(modified) = entry.metadata().and_then(|m| m.modified()) else {
            continue;
        };
        if now.duration_since(modified).is_ok_and(|age| age > max_age) {
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) => eprintln!("Failed to delete old log file {:?}: {}", path, e),
            }
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("DEBUG"), log::LevelFilter::Debug);
        assert_eq!(parse_level("trace"), log::LevelFilter::Trace);
        assert_eq!(parse_level("fatal"), log::LevelFilter::Info);
    }

    fn touch(path: &Path, contents: &str, age: Duration) {
        fs::write(path, contents).unwrap();
        fs::File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(SystemTime::now() - age)
            .unwrap();
    }

    #[test]
    fn test_prune_removes_only_expired_logs() {
        let dir = tempfile::tempdir().unwrap();
        let day = Duration::from_secs(24 * 60 * 60);
        let expired = dir.path().join("neobot_2026-01-01.log");
        let recent = dir.path().join("neobot_2026-01-06.log");
        let other = dir.path().join("notes.txt");
        touch(&expired, "old", day * 8);
        touch(&recent, "new", day * 2);
        touch(&other, "keep", day * 30);

        let removed = prune_logs(dir.path(), LOG_RETENTION, SystemTime::now()).unwrap();
        assert_eq!(removed, 1);
        assert!(!expired.exists());
        assert!(recent.exists());
        assert!(other.exists());
    }

    #[test]
    fn test_prune_on_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(prune_logs(dir.path(), LOG_RETENTION, SystemTime::now()).unwrap(), 0);
    }
}
