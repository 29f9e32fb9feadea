use super::{
    DetailType, Direction, Sample, StatCategory, StatEntry, StatFileWriter, StatType,
    StatsConfig, StatsJsonWriter, StatsLogSink,
};
use anyhow::Result;
use bounded_vec_deque::BoundedVecDeque;
use lattice_core::utils::get_env_bool;
use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Condvar, Mutex, RwLock,
    },
    thread::JoinHandle,
    time::{Duration, Instant, SystemTime},
};
use tracing::{debug, warn};

/// Thread safe counters and samplers, keyed by type, detail and direction.
/// A background thread periodically writes them to the configured log files.
pub struct Stats {
    config: StatsConfig,
    mutables: Arc<RwLock<StatMutables>>,
    thread: Mutex<Option<JoinHandle<()>>>,
    stats_loop: Arc<StatsLoop>,
    enable_logging: bool,
}

impl Default for Stats {
    fn default() -> Self {
        Self::new(StatsConfig::default())
    }
}

impl Stats {
    pub fn new(config: StatsConfig) -> Self {
        let mutables = Arc::new(RwLock::new(StatMutables {
            counters: BTreeMap::new(),
            samplers: BTreeMap::new(),
            timestamp: Instant::now(),
        }));
        Self {
            config: config.clone(),
            thread: Mutex::new(None),
            stats_loop: Arc::new(StatsLoop {
                condition: Condvar::new(),
                mutables: Arc::clone(&mutables),
                config,
                loop_state: Mutex::new(StatsLoopState {
                    stopped: false,
                    counters: Writeout::new(),
                    samples: Writeout::new(),
                }),
            }),
            mutables,
            enable_logging: get_env_bool("LATTICE_LOG_STATS").unwrap_or(false),
        }
    }

    pub fn start(&self) {
        if !self.should_run() {
            return;
        };

        let stats_loop = Arc::clone(&self.stats_loop);
        *self.thread.lock().unwrap() = Some(
            std::thread::Builder::new()
                .name("Stats".to_string())
                .spawn(move || stats_loop.run())
                .unwrap(),
        );
    }

    fn should_run(&self) -> bool {
        !self.config.log_counters_interval.is_zero() || !self.config.log_samples_interval.is_zero()
    }

    pub fn stop(&self) {
        self.stats_loop.loop_state.lock().unwrap().stopped = true;
        self.stats_loop.condition.notify_all();
        let handle = self.thread.lock().unwrap().take();
        if let Some(handle) = handle {
            handle.join().unwrap();
        }
    }

    /// Add `value` to given counter
    pub fn add(&self, stat_type: StatType, detail: DetailType, value: u64) {
        self.add_dir(stat_type, detail, Direction::In, value)
    }

    /// Add `value` to given counter. The type level counter (`DetailType::All`)
    /// is incremented as well.
    pub fn add_dir(&self, stat_type: StatType, detail: DetailType, dir: Direction, value: u64) {
        if value == 0 {
            return;
        }

        if self.enable_logging {
            debug!(
                "Stat: {}::{}::{} += {}",
                stat_type.as_str(),
                detail.as_str(),
                dir.as_str(),
                value
            );
        }

        let key = CounterKey::new(stat_type, detail, dir);
        let all_key = CounterKey::new(stat_type, DetailType::All, dir);

        // Two steps to avoid taking the write lock in the common case
        {
            let lock = self.mutables.read().unwrap();
            if let Some(counter) = lock.counters.get(&key) {
                counter.add(value);
                if key != all_key {
                    if let Some(all_counter) = lock.counters.get(&all_key) {
                        all_counter.add(value);
                    }
                }
                return;
            }
        }
        {
            let mut lock = self.mutables.write().unwrap();
            lock.counters.entry(key).or_default().add(value);
            if key != all_key {
                lock.counters.entry(all_key).or_default().add(value);
            }
        }
    }

    pub fn inc(&self, stat_type: StatType, detail: DetailType) {
        self.add_dir(stat_type, detail, Direction::In, 1)
    }

    pub fn inc_dir(&self, stat_type: StatType, detail: DetailType, dir: Direction) {
        self.add_dir(stat_type, detail, dir, 1)
    }

    pub fn sample(&self, sample: Sample, value: i64, expected_min_max: (i64, i64)) {
        if self.enable_logging {
            debug!("Sample: {} -> {}", sample.as_str(), value);
        }

        {
            let lock = self.mutables.read().unwrap();
            if let Some(sampler) = lock.samplers.get(&sample) {
                sampler.add(value);
                return;
            }
        }
        {
            let mut lock = self.mutables.write().unwrap();
            lock.samplers
                .entry(sample)
                .or_insert_with(|| SamplerEntry::new(self.config.max_samples, expected_min_max))
                .add(value)
        }
    }

    /// Returns and clears the samples collected so far
    pub fn samples(&self, sample: Sample) -> Vec<i64> {
        let lock = self.mutables.read().unwrap();
        match lock.samplers.get(&sample) {
            Some(sampler) => sampler.collect(),
            None => Vec::new(),
        }
    }

    /// Writes all counters or all samples to `sink`. Writing samples drains them.
    pub fn write_out(&self, category: StatCategory, sink: &mut dyn StatsLogSink) -> Result<()> {
        let lock = self.mutables.read().unwrap();
        lock.write_out(category, sink, SystemTime::now())
    }

    /// Returns the duration since `clear()` was last called, or node startup if it's never called.
    pub fn last_reset(&self) -> Duration {
        self.mutables.read().unwrap().timestamp.elapsed()
    }

    pub fn clear(&self) {
        let mut lock = self.mutables.write().unwrap();
        lock.counters.clear();
        lock.samplers.clear();
        lock.timestamp = Instant::now();
    }

    pub fn count(&self, stat_type: StatType, detail: DetailType, dir: Direction) -> u64 {
        let key = CounterKey::new(stat_type, detail, dir);
        self.mutables
            .read()
            .unwrap()
            .counters
            .get(&key)
            .map(|i| i.value())
            .unwrap_or_default()
    }

    /// Sum of all detail counters of the given type
    pub fn count_all(&self, stat_type: StatType, dir: Direction) -> u64 {
        self.count(stat_type, DetailType::All, dir)
    }

    pub fn dump(&self, category: StatCategory) -> Result<serde_json::Value> {
        let mut sink = StatsJsonWriter::new();
        self.write_out(category, &mut sink)?;
        Ok(sink.finish())
    }
}

impl Drop for Stats {
    fn drop(&mut self) {
        self.stop();
    }
}

#[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
struct CounterKey {
    stat_type: StatType,
    detail: DetailType,
    dir: Direction,
}

impl CounterKey {
    fn new(stat_type: StatType, detail: DetailType, dir: Direction) -> Self {
        Self {
            stat_type,
            detail,
            dir,
        }
    }
}

struct StatMutables {
    /// Sorted by key to simplify processing of log output
    counters: BTreeMap<CounterKey, CounterEntry>,
    samplers: BTreeMap<Sample, SamplerEntry>,

    /// Time of last clear() call
    timestamp: Instant,
}

impl StatMutables {
    fn write_out(
        &self,
        category: StatCategory,
        sink: &mut dyn StatsLogSink,
        time: SystemTime,
    ) -> Result<()> {
        sink.begin(category, time)?;
        match category {
            StatCategory::Counters => {
                for (key, entry) in &self.counters {
                    let entry = StatEntry::Counter {
                        stat_type: key.stat_type,
                        detail: key.detail,
                        dir: key.dir,
                        value: entry.value(),
                    };
                    sink.write(time, &entry)?;
                }
            }
            StatCategory::Samples => {
                for (sample, entry) in &self.samplers {
                    let values = entry.collect();
                    let entry = StatEntry::Samples {
                        sample: *sample,
                        values: &values,
                        expected_min_max: entry.expected_min_max,
                    };
                    sink.write(time, &entry)?;
                }
            }
        }
        sink.end()
    }
}

#[derive(Default)]
struct CounterEntry(AtomicU64);

impl CounterEntry {
    fn add(&self, value: u64) {
        self.0.fetch_add(value, Ordering::SeqCst);
    }

    fn value(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

struct SamplerEntry {
    samples: Mutex<BoundedVecDeque<i64>>,
    expected_min_max: (i64, i64),
}

impl SamplerEntry {
    fn new(max_samples: usize, expected_min_max: (i64, i64)) -> Self {
        Self {
            samples: Mutex::new(BoundedVecDeque::new(max_samples)),
            expected_min_max,
        }
    }

    fn add(&self, value: i64) {
        self.samples.lock().unwrap().push_back(value);
    }

    fn collect(&self) -> Vec<i64> {
        self.samples.lock().unwrap().drain(..).collect()
    }
}

struct StatsLoop {
    mutables: Arc<RwLock<StatMutables>>,
    condition: Condvar,
    loop_state: Mutex<StatsLoopState>,
    config: StatsConfig,
}

impl StatsLoop {
    fn run(&self) {
        let mut guard = self.loop_state.lock().unwrap();
        while !guard.stopped {
            guard = self
                .condition
                .wait_timeout_while(guard, Duration::from_secs(1), |g| !g.stopped)
                .unwrap()
                .0;

            if !guard.stopped {
                if let Err(e) = self.run_one(&mut guard) {
                    warn!("Could not write stats: {:?}", e);
                }
            }
        }
    }

    fn run_one(&self, state: &mut StatsLoopState) -> Result<()> {
        let stats = self.mutables.read().unwrap();
        let now = SystemTime::now();
        for category in [StatCategory::Counters, StatCategory::Samples] {
            let (interval, filename, writeout) = match category {
                StatCategory::Counters => (
                    self.config.log_counters_interval,
                    &self.config.log_counters_filename,
                    &mut state.counters,
                ),
                StatCategory::Samples => (
                    self.config.log_samples_interval,
                    &self.config.log_samples_filename,
                    &mut state.samples,
                ),
            };
            if interval.is_zero() || writeout.last.elapsed() < interval {
                continue;
            }

            if writeout.file.is_none() {
                writeout.file = Some(StatFileWriter::new(
                    filename,
                    self.config.log_rotation_count,
                    self.config.log_headers,
                )?);
            }
            if let Some(file) = writeout.file.as_mut() {
                stats.write_out(category, file, now)?;
            }
            writeout.last = Instant::now();
        }
        Ok(())
    }
}

struct StatsLoopState {
    stopped: bool,
    counters: Writeout,
    samples: Writeout,
}

/// Log file of one stat category, opened on its first writeout
struct Writeout {
    file: Option<StatFileWriter>,
    last: Instant,
}

impl Writeout {
    fn new() -> Self {
        Self {
            file: None,
            last: Instant::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters() {
        let stats = Stats::default();
        stats.add(StatType::Ledger, DetailType::Send, 5);
        stats.inc(StatType::Ledger, DetailType::Send);
        stats.inc(StatType::Ledger, DetailType::Receive);
        assert_eq!(stats.count(StatType::Ledger, DetailType::Send, Direction::In), 6);
        assert_eq!(stats.count(StatType::Ledger, DetailType::Receive, Direction::In), 1);
        assert_eq!(stats.count_all(StatType::Ledger, Direction::In), 7);
        assert_eq!(stats.count(StatType::Ledger, DetailType::Send, Direction::Out), 0);
    }

    #[test]
    fn adding_zero_creates_no_entry() {
        let stats = Stats::default();
        stats.add(StatType::Vote, DetailType::Vote, 0);
        let json = stats.dump(StatCategory::Counters).unwrap();
        assert_eq!(json["entries"].as_array().map(|a| a.len()), Some(0));
    }

    #[test]
    fn directions_are_counted_separately() {
        let stats = Stats::default();
        stats.inc_dir(StatType::Message, DetailType::Publish, Direction::In);
        stats.inc_dir(StatType::Message, DetailType::Publish, Direction::Out);
        stats.inc_dir(StatType::Message, DetailType::Publish, Direction::Out);
        assert_eq!(stats.count(StatType::Message, DetailType::Publish, Direction::In), 1);
        assert_eq!(stats.count(StatType::Message, DetailType::Publish, Direction::Out), 2);
    }

    #[test]
    fn samples() {
        let stats = Stats::default();
        stats.sample(Sample::ActiveElectionDuration, 5, (1, 10));
        stats.sample(Sample::ActiveElectionDuration, 11, (1, 10));
        stats.sample(Sample::CementingBatchSize, 42, (1, 10));

        assert_eq!(stats.samples(Sample::ActiveElectionDuration), [5, 11]);
        assert!(stats.samples(Sample::ActiveElectionDuration).is_empty());
        assert_eq!(stats.samples(Sample::CementingBatchSize), [42]);
    }

    #[test]
    fn sampler_is_bounded() {
        let stats = Stats::new(StatsConfig {
            max_samples: 2,
            ..Default::default()
        });
        for i in 0..5 {
            stats.sample(Sample::ActiveElectionDuration, i, (0, 10));
        }
        assert_eq!(stats.samples(Sample::ActiveElectionDuration), [3, 4]);
    }

    #[test]
    fn dump_counters() {
        let stats = Stats::default();
        stats.inc(StatType::ConfirmingSet, DetailType::Insert);
        let json = stats.dump(StatCategory::Counters).unwrap();
        assert_eq!(json["type"], "counters");
        let entries = json["entries"].as_array().unwrap();
        assert!(entries
            .iter()
            .any(|e| e["type"] == "confirming_set" && e["detail"] == "insert" && e["value"] == "1"));
    }

    #[test]
    fn dumping_samples_drains_them() {
        let stats = Stats::default();
        stats.sample(Sample::CementingBatchSize, 7, (1, 10));
        let json = stats.dump(StatCategory::Samples).unwrap();
        assert_eq!(json["type"], "samples");
        assert_eq!(json["entries"][0]["values"][0], "7");
        assert!(stats.samples(Sample::CementingBatchSize).is_empty());
    }

    #[test]
    fn clear() {
        let stats = Stats::default();
        stats.inc(StatType::Ledger, DetailType::Send);
        stats.clear();
        assert_eq!(stats.count(StatType::Ledger, DetailType::Send, Direction::In), 0);
    }
}
