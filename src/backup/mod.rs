use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{error, info, warn};

use crate::backup::copy::{CopyOutcome, EntryOps, LocalFs, TreeCopier};
use crate::backup::retention::enforce_retention;
use crate::config::{Config, Schedule};
use crate::types::TimeOfDay;
use crate::util::paths::is_existing_dir;

pub mod copy;
pub mod retention;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    CopyingAll,
    WaitingFixedDelay,
    WaitingForTimeOfDay,
    WaitingForDestination,
}

/// What the scheduler does once a cycle has finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextRun {
    After(Duration),
    AtTimeOfDay { time: TimeOfDay, wait: Duration },
    WhenDestinationAvailable,
}

impl NextRun {
    pub fn state(&self) -> SchedulerState {
        match self {
            NextRun::After(_) => SchedulerState::WaitingFixedDelay,
            NextRun::AtTimeOfDay { .. } => SchedulerState::WaitingForTimeOfDay,
            NextRun::WhenDestinationAvailable => SchedulerState::WaitingForDestination,
        }
    }
}

/// Drives backup cycles over every configured destination, one at a time, and
/// decides when the next cycle is due.
pub struct Scheduler<O = LocalFs> {
    config: Config,
    copier: TreeCopier<O>,
    state: SchedulerState,
    poll_interval: Duration,
}

impl Scheduler<LocalFs> {
    pub fn new(config: Config) -> Self {
        Self::with_copier(config, TreeCopier::new())
    }
}

impl<O: EntryOps> Scheduler<O> {
    pub fn with_copier(config: Config, copier: TreeCopier<O>) -> Self {
        Self {
            config,
            copier,
            state: SchedulerState::Idle,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Runs cycles forever, starting immediately.
    pub fn run(&mut self) -> ! {
        loop {
            let next = self.step();
            self.wait(next);
        }
    }

    /// Runs one cycle and arms the next one, leaving the scheduler in the matching
    /// waiting state.
    pub fn step(&mut self) -> NextRun {
        let any_success = self.run_cycle();
        let next = self.next_run(any_success, TimeOfDay::now());
        match next {
            NextRun::After(delay) if self.config.is_continuous() => info!(
                "successful continuous mode copy, scheduling next operation in {} seconds",
                delay.as_secs()
            ),
            NextRun::After(delay) => {
                info!("scheduled next copy to occur in {} seconds", delay.as_secs())
            }
            NextRun::AtTimeOfDay { time, wait } => info!(
                "scheduling copy for next occurrence of {} (in {} seconds)",
                time,
                wait.as_secs()
            ),
            NextRun::WhenDestinationAvailable => {
                info!("waiting for a destination to become available")
            }
        }
        self.state = next.state();
        next
    }

    /// Backs up to every destination in order. Returns whether at least one of them
    /// ended up with a usable snapshot.
    pub fn run_cycle(&mut self) -> bool {
        self.state = SchedulerState::CopyingAll;
        let mut any_success = false;
        for dest in self.config.destinations() {
            if self.backup_destination(dest) {
                any_success = true;
            }
        }
        any_success
    }

    fn backup_destination(&self, dest: &Path) -> bool {
        info!("processing destination {}", dest.display());
        if !is_existing_dir(dest) {
            warn!("destination directory {} does not exist", dest.display());
            return false;
        }
        if let Err(err) = fs::read_dir(self.config.source()) {
            error!(
                "source {} is not readable ({}), leaving {} untouched",
                self.config.source().display(),
                err,
                dest.display()
            );
            return false;
        }
        if let Err(err) = enforce_retention(dest, self.config.keep_count()) {
            error!("skipping destination {}: {}", dest.display(), err);
            return false;
        }

        let started = Instant::now();
        let outcome = self.copier.copy(self.config.source(), dest);
        let minutes = started.elapsed().as_secs() / 60;
        match outcome {
            CopyOutcome::Success => info!("copy complete, took {} minutes", minutes),
            CopyOutcome::PartialFailure(skipped) => warn!(
                "copy complete with {} entries skipped, took {} minutes",
                skipped, minutes
            ),
            CopyOutcome::Disconnected => {
                error!("copy to {} failed, destination disconnected", dest.display())
            }
        }
        outcome.is_usable()
    }

    /// Picks the next wake-up for the configured mode, `now` being the local time of
    /// day at which the cycle finished.
    pub fn next_run(&self, any_success: bool, now: TimeOfDay) -> NextRun {
        if self.config.is_continuous() && !any_success {
            return NextRun::WhenDestinationAvailable;
        }
        match self.config.schedule() {
            Schedule::Every(delay) => NextRun::After(delay),
            Schedule::Daily(time) => NextRun::AtTimeOfDay {
                time,
                wait: now.wait_until(&time),
            },
        }
    }

    /// Blocks until any configured destination exists as a directory, checking once
    /// per poll interval.
    pub fn wait_for_destination(&mut self) -> PathBuf {
        self.state = SchedulerState::WaitingForDestination;
        loop {
            thread::sleep(self.poll_interval);
            if let Some(dest) = self
                .config
                .destinations()
                .iter()
                .find(|d| is_existing_dir(d))
            {
                info!("destination available: {}", dest.display());
                return dest.clone();
            }
        }
    }

    fn wait(&mut self, next: NextRun) {
        match next {
            NextRun::After(delay) => thread::sleep(delay),
            NextRun::AtTimeOfDay { wait, .. } => thread::sleep(wait),
            NextRun::WhenDestinationAvailable => {
                self.wait_for_destination();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::tempdir;

    fn config(
        source: &Path,
        dests: &[PathBuf],
        keep: usize,
        schedule: Schedule,
        continuous: bool,
    ) -> Config {
        Config::new(source, dests, keep, schedule, continuous).expect("config")
    }

    fn every(secs: u64) -> Schedule {
        Schedule::Every(Duration::from_secs(secs))
    }

    fn snapshots(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .expect("read")
            .map(|e| e.expect("entry").file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn fixed_delay_after_any_cycle() {
        let src = tempdir().expect("src");
        let cfg = config(src.path(), &[PathBuf::from("/nowhere")], 1, every(90), false);
        let scheduler = Scheduler::new(cfg);
        let now = TimeOfDay::new(12, 0, 0).expect("time");
        assert_eq!(scheduler.next_run(true, now), NextRun::After(Duration::from_secs(90)));
        assert_eq!(scheduler.next_run(false, now), NextRun::After(Duration::from_secs(90)));
    }

    #[test]
    fn time_of_day_waits_for_next_occurrence() {
        let src = tempdir().expect("src");
        let target = TimeOfDay::new(3, 0, 0).expect("time");
        let cfg = config(src.path(), &[PathBuf::from("/nowhere")], 1, Schedule::Daily(target), false);
        let scheduler = Scheduler::new(cfg);

        let before = TimeOfDay::new(2, 0, 0).expect("time");
        assert_eq!(
            scheduler.next_run(true, before),
            NextRun::AtTimeOfDay { time: target, wait: Duration::from_secs(3600) }
        );
        let same = scheduler.next_run(false, target);
        assert_eq!(
            same,
            NextRun::AtTimeOfDay { time: target, wait: Duration::from_secs(86_400) }
        );
        assert_eq!(same.state(), SchedulerState::WaitingForTimeOfDay);
    }

    #[test]
    fn continuous_mode_branches_on_success() {
        let src = tempdir().expect("src");
        let cfg = config(src.path(), &[PathBuf::from("/nowhere")], 1, every(5), true);
        let scheduler = Scheduler::new(cfg);
        let now = TimeOfDay::new(8, 0, 0).expect("time");
        assert_eq!(scheduler.next_run(true, now), NextRun::After(Duration::from_secs(5)));
        assert_eq!(scheduler.next_run(false, now), NextRun::WhenDestinationAvailable);
    }

    #[test]
    fn missing_destination_does_not_block_others() {
        let src = tempdir().expect("src");
        let dest = tempdir().expect("dest");
        fs::write(src.path().join("a.txt"), "a").expect("write");
        let missing = dest.path().join("missing");
        let good = dest.path().join("good");
        fs::create_dir(&good).expect("mkdir");

        let cfg = config(src.path(), &[missing.clone(), good.clone()], 3, every(60), false);
        let mut scheduler = Scheduler::new(cfg);
        assert_eq!(scheduler.state(), SchedulerState::Idle);

        let next = scheduler.step();
        assert_eq!(next, NextRun::After(Duration::from_secs(60)));
        assert_eq!(scheduler.state(), SchedulerState::WaitingFixedDelay);
        assert!(!missing.exists());
        let taken = snapshots(&good);
        assert_eq!(taken.len(), 1);
        assert!(good.join(&taken[0]).join("a.txt").is_file());
    }

    #[test]
    fn structural_error_skips_only_that_destination() {
        let src = tempdir().expect("src");
        let dest = tempdir().expect("dest");
        fs::write(src.path().join("a.txt"), "a").expect("write");
        let broken = dest.path().join("broken");
        let good = dest.path().join("good");
        fs::create_dir_all(broken.join("not-a-timestamp")).expect("mkdir");
        fs::create_dir(&good).expect("mkdir");

        let cfg = config(src.path(), &[broken.clone(), good.clone()], 3, every(60), false);
        let mut scheduler = Scheduler::new(cfg);
        assert!(scheduler.run_cycle());
        assert_eq!(scheduler.state(), SchedulerState::CopyingAll);
        assert_eq!(snapshots(&broken), vec!["not-a-timestamp"]);
        assert_eq!(snapshots(&good).len(), 1);
    }

    #[test]
    fn missing_source_neither_evicts_nor_copies() {
        let holder = tempdir().expect("holder");
        let dest = tempdir().expect("dest");
        fs::create_dir(dest.path().join("1")).expect("mkdir");

        let cfg = config(&holder.path().join("gone"), &[dest.path().to_path_buf()], 1, every(60), false);
        let mut scheduler = Scheduler::new(cfg);
        assert!(!scheduler.run_cycle());
        assert_eq!(snapshots(dest.path()), vec!["1"]);
    }

    #[test]
    fn source_that_is_a_file_neither_evicts_nor_copies() {
        let holder = tempdir().expect("holder");
        let dest = tempdir().expect("dest");
        let source = holder.path().join("source");
        fs::write(&source, "not a directory").expect("write");
        fs::create_dir(dest.path().join("1")).expect("mkdir");

        let cfg = config(&source, &[dest.path().to_path_buf()], 1, every(60), true);
        let mut scheduler = Scheduler::new(cfg);
        assert_eq!(scheduler.step(), NextRun::WhenDestinationAvailable);
        assert_eq!(snapshots(dest.path()), vec!["1"]);
    }

    #[test]
    fn unreadable_source_neither_evicts_nor_copies() {
        let src = tempdir().expect("src");
        let dest = tempdir().expect("dest");
        fs::write(src.path().join("a.txt"), "a").expect("write");
        fs::create_dir(dest.path().join("1")).expect("mkdir");
        fs::set_permissions(src.path(), fs::Permissions::from_mode(0o000)).expect("chmod");
        if fs::read_dir(src.path()).is_ok() {
            // Privileged users list through the mode bits.
            fs::set_permissions(src.path(), fs::Permissions::from_mode(0o755)).expect("chmod");
            return;
        }

        let cfg = config(src.path(), &[dest.path().to_path_buf()], 1, every(60), true);
        let mut scheduler = Scheduler::new(cfg);
        let any_success = scheduler.run_cycle();

        fs::set_permissions(src.path(), fs::Permissions::from_mode(0o755)).expect("chmod");
        assert!(!any_success);
        assert_eq!(snapshots(dest.path()), vec!["1"]);
    }

    #[test]
    fn no_usable_destination_in_continuous_mode_waits_for_one() {
        let src = tempdir().expect("src");
        let holder = tempdir().expect("holder");
        let dest = holder.path().join("usb");

        let cfg = config(src.path(), &[dest.clone()], 2, every(5), true);
        let mut scheduler = Scheduler::new(cfg).with_poll_interval(Duration::from_millis(5));
        assert_eq!(scheduler.step(), NextRun::WhenDestinationAvailable);
        assert_eq!(scheduler.state(), SchedulerState::WaitingForDestination);

        let plug = {
            let dest = dest.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(50));
                fs::create_dir(&dest).expect("mkdir");
            })
        };
        assert_eq!(scheduler.wait_for_destination(), dest);
        plug.join().expect("join");

        assert_eq!(scheduler.step(), NextRun::After(Duration::from_secs(5)));
        assert_eq!(snapshots(&dest).len(), 1);
    }
}
