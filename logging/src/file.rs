use std::fs::{self, File, OpenOptions};
use std::io::{Error, Write};
use std::path::{Path, PathBuf};
use time::format_description::FormatItem;
use time::macros::format_description;
use time::{Date, Duration};

const FILE_DATE_FORMAT: &[FormatItem] = format_description!("[year]-[month]-[day]");

/// Appends log lines to `<dir>/<prefix>-YYYY-MM-DD.log`, opening a new file when the
/// date changes and deleting files older than the retention window.
pub struct DailyFile {
    dir: PathBuf,
    prefix: String,
    retention_days: u32,
    current: Option<(Date, File)>,
}
impl DailyFile {
    pub fn new<P: AsRef<Path>>(dir: P, prefix: &str, retention_days: u32) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            prefix: prefix.to_string(),
            retention_days: retention_days.max(1),
            current: None,
        }
    }

    pub fn file_name(&self, date: Date) -> String {
        format!(
            "{}-{}.log",
            self.prefix,
            date.format(&FILE_DATE_FORMAT).unwrap_or_default()
        )
    }

    fn date_of(&self, file_name: &str) -> Option<Date> {
        let date = file_name
            .strip_prefix(&self.prefix)?
            .strip_prefix('-')?
            .strip_suffix(".log")?;
        Date::parse(date, &FILE_DATE_FORMAT).ok()
    }

    pub fn write_line(&mut self, date: Date, line: &str) -> Result<(), Error> {
        let rotate = !matches!(&self.current, Some((d, _)) if *d == date);
        if rotate {
            fs::create_dir_all(&self.dir)?;
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(self.dir.join(self.file_name(date)))?;
            self.current = Some((date, file));
            self.prune(date)?;
        }
        if let Some((_, file)) = self.current.as_mut() {
            writeln!(file, "{line}")?;
        }
        Ok(())
    }

    /// Keeps today's file and the previous `retention_days - 1` days.
    pub fn prune(&self, today: Date) -> Result<usize, Error> {
        let oldest = today - Duration::days(i64::from(self.retention_days) - 1);
        let mut removed = 0;
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(date) = name.to_str().and_then(|n| self.date_of(n)) else {
                continue;
            };
            if date < oldest {
                fs::remove_file(entry.path())?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    pub fn flush(&mut self) -> Result<(), Error> {
        match self.current.as_mut() {
            Some((_, file)) => file.flush(),
            None => Ok(()),
        }
    }
}
