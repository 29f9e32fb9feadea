use super::{DetailType, Direction, Sample, StatType};
use anyhow::Result;
use chrono::{DateTime, Local};
use serde_json::{json, Map, Value};
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::PathBuf,
    time::SystemTime,
};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum StatCategory {
    Counters,
    Samples,
}

impl StatCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatCategory::Counters => "counters",
            StatCategory::Samples => "samples",
        }
    }
}

/// A single value of a stats writeout
pub enum StatEntry<'a> {
    Counter {
        stat_type: StatType,
        detail: DetailType,
        dir: Direction,
        value: u64,
    },
    Samples {
        sample: Sample,
        values: &'a [i64],
        expected_min_max: (i64, i64),
    },
}

/// Destination of a stats writeout. A writeout is `begin`, any number of
/// `write` calls and `end`.
pub trait StatsLogSink {
    fn begin(&mut self, category: StatCategory, created: SystemTime) -> Result<()>;

    fn write(&mut self, time: SystemTime, entry: &StatEntry) -> Result<()>;

    fn end(&mut self) -> Result<()>;
}

fn format_time(time: SystemTime) -> String {
    DateTime::<Local>::from(time).format("%H:%M:%S").to_string()
}

fn format_date_time(time: SystemTime) -> String {
    DateTime::<Local>::from(time)
        .format("%Y.%m.%d %H:%M:%S")
        .to_string()
}

/// Appends writeouts to a file, one value per line. The file is truncated
/// after `rotation_count` writeouts.
pub struct StatFileWriter {
    filename: PathBuf,
    file: BufWriter<File>,
    rotation_count: usize,
    writeouts: usize,
    headers: bool,
}

impl StatFileWriter {
    pub fn new(filename: impl Into<PathBuf>, rotation_count: usize, headers: bool) -> Result<Self> {
        let filename = filename.into();
        let file = BufWriter::new(File::create(&filename)?);
        Ok(Self {
            filename,
            file,
            rotation_count,
            writeouts: 0,
            headers,
        })
    }
}

impl StatsLogSink for StatFileWriter {
    fn begin(&mut self, category: StatCategory, created: SystemTime) -> Result<()> {
        if self.writeouts >= self.rotation_count {
            self.file = BufWriter::new(File::create(&self.filename)?);
            self.writeouts = 0;
        }
        if self.headers {
            writeln!(
                self.file,
                "{},{}",
                category.as_str(),
                format_date_time(created)
            )?;
        }
        Ok(())
    }

    fn write(&mut self, time: SystemTime, entry: &StatEntry) -> Result<()> {
        let time = format_time(time);
        match entry {
            StatEntry::Counter {
                stat_type,
                detail,
                dir,
                value,
            } => writeln!(
                self.file,
                "{time},{},{},{},{value}",
                stat_type.as_str(),
                detail.as_str(),
                dir.as_str()
            )?,
            StatEntry::Samples {
                sample,
                values,
                expected_min_max: (min, max),
            } => {
                write!(self.file, "{time},{},{min},{max}", sample.as_str())?;
                for value in values.iter() {
                    write!(self.file, ",{value}")?;
                }
                writeln!(self.file)?;
            }
        }
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        self.writeouts += 1;
        self.file.flush()?;
        Ok(())
    }
}

/// Collects a single writeout into a JSON object
#[derive(Default)]
pub struct StatsJsonWriter {
    tree: Map<String, Value>,
    entries: Vec<Value>,
}

impl StatsJsonWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn finish(self) -> Value {
        Value::Object(self.tree)
    }
}

impl StatsLogSink for StatsJsonWriter {
    fn begin(&mut self, category: StatCategory, created: SystemTime) -> Result<()> {
        self.tree.clear();
        self.entries.clear();
        self.tree.insert("type".to_owned(), category.as_str().into());
        self.tree
            .insert("created".to_owned(), format_date_time(created).into());
        Ok(())
    }

    fn write(&mut self, time: SystemTime, entry: &StatEntry) -> Result<()> {
        let entry = match entry {
            StatEntry::Counter {
                stat_type,
                detail,
                dir,
                value,
            } => json!({
                "time": format_time(time),
                "type": stat_type.as_str(),
                "detail": detail.as_str(),
                "dir": dir.as_str(),
                "value": value.to_string(),
            }),
            StatEntry::Samples {
                sample,
                values,
                expected_min_max: (min, max),
            } => json!({
                "time": format_time(time),
                "sample": sample.as_str(),
                "min": min.to_string(),
                "max": max.to_string(),
                "values": values.iter().map(|v| v.to_string()).collect::<Vec<_>>(),
            }),
        };
        self.entries.push(entry);
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        let entries = std::mem::take(&mut self.entries);
        self.tree.insert("entries".to_owned(), Value::Array(entries));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_file(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("lattice_{}_{}", name, std::process::id()))
    }

    #[test]
    fn json_sampler_entry() {
        let mut writer = StatsJsonWriter::new();
        writer
            .begin(StatCategory::Samples, SystemTime::now())
            .unwrap();
        writer
            .write(
                SystemTime::now(),
                &StatEntry::Samples {
                    sample: Sample::ActiveElectionDuration,
                    values: &[1, 2],
                    expected_min_max: (0, 5),
                },
            )
            .unwrap();
        writer.end().unwrap();
        let json = writer.finish();
        assert_eq!(json["type"], "samples");
        let entry = &json["entries"][0];
        assert_eq!(entry["sample"], "active_election_duration");
        assert_eq!(entry["max"], "5");
        assert_eq!(entry["values"][1], "2");
    }

    #[test]
    fn file_writer_rotates() {
        let path = temp_file("rotation.stat");
        let mut writer = StatFileWriter::new(&path, 1, false).unwrap();
        let counter = StatEntry::Counter {
            stat_type: StatType::Ledger,
            detail: DetailType::Send,
            dir: Direction::In,
            value: 3,
        };

        for _ in 0..2 {
            writer
                .begin(StatCategory::Counters, SystemTime::now())
                .unwrap();
            writer.write(SystemTime::now(), &counter).unwrap();
            writer.end().unwrap();
        }

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].ends_with(",ledger,send,in,3"));
        let _ = std::fs::remove_file(&path);
    }
}
