//! Module for running many downloads with a bounded amount of workers

use std::{
	collections::VecDeque,
	path::{
		Path,
		PathBuf,
	},
	sync::atomic::{
		AtomicBool,
		Ordering,
	},
	time::Duration,
};

use parking_lot::Mutex;

use crate::{
	data::job_state::{
		JobStatus,
		StateFile,
	},
	error::CustomThreadJoin,
	main::{
		download::{
			DownloadFailure,
			DownloadProgress,
			DownloadResult,
			Downloaded,
			FailureKind,
			download_single,
		},
		rate_limit::RateLimiter,
		retry::{
			RetryPolicy,
			is_rate_limited,
			retry,
		},
	},
	traits::download_options::DownloadOptions,
};

/// A single unit of work for [run_batch]
#[derive(Debug, Clone, PartialEq)]
pub struct BatchItem {
	/// Index the caller uses to identify the item (like the index into [`crate::data::job_state::ChannelJob::jobs`])
	pub index:      usize,
	pub url:        String,
	/// Directory the media should be downloaded into
	pub output_dir: PathBuf,
}

/// Settings for a single batch run
#[derive(Debug, Clone, PartialEq)]
pub struct BatchSettings {
	/// Amount of worker threads, at least 1
	pub parallel:      usize,
	pub retry:         RetryPolicy,
	/// Initial delay between requests, see [RateLimiter::new]
	pub initial_delay: Duration,
}

impl Default for BatchSettings {
	fn default() -> Self {
		return Self {
			parallel:      1,
			retry:         RetryPolicy::default(),
			initial_delay: crate::main::rate_limit::DEFAULT_INITIAL_DELAY,
		};
	}
}

/// Events for hooks to know what is currently happening in a batch
#[derive(Debug, Clone, PartialEq)]
pub enum BatchProgress {
	/// A worker took the item and is starting it
	/// values: (index, url)
	JobStarting(usize, String),
	/// The title of the item is known
	/// values: (index, title)
	JobTitle(usize, String),
	/// The download of the item has progressed
	/// values: (index, percent)
	JobProgress(usize, u8),
	/// The item is being converted
	/// values: (index)
	JobConverting(usize),
	/// A transient error happened and the item will be retried
	/// values: (index, retry number (1-based), delay, error message)
	JobRetrying(usize, u32, Duration, String),
	/// The item is done, either successfully or not
	/// values: (index, result)
	JobFinished(usize, DownloadResult),
}

/// Hooks called by [run_batch], called from multiple worker threads
pub trait BatchHooks: Sync {
	/// Called on every status change of a item, before [BatchProgress] events for the change
	/// A error here stops the whole batch after the currently running items
	fn on_transition(&self, index: usize, status: JobStatus, result: Option<&DownloadResult>) -> Result<(), crate::Error>;
	/// Called for every progress event
	fn on_progress(&self, progress: BatchProgress);
	/// Checked before every item is taken, returning `true` stops taking new items
	fn should_terminate(&self) -> bool;
}

/// Result of a whole batch
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BatchOutcome {
	/// Results of all finished items, in order of their index
	pub results:    Vec<(usize, DownloadResult)>,
	/// Whether the batch was stopped before all items were taken
	pub terminated: bool,
}

impl BatchOutcome {
	/// Count of successful items
	pub fn success_count(&self) -> usize {
		return self.results.iter().filter(|(_, v)| return v.success()).count();
	}

	/// Count of failed items
	pub fn failed_count(&self) -> usize {
		return self.results.len() - self.success_count();
	}
}

/// Map the final outcome of a item to its [JobStatus]
pub fn status_for(result: &DownloadResult) -> JobStatus {
	return match &result.failure {
		None => JobStatus::Done,
		Some(failure) if failure.kind == FailureKind::NeedsCookies => JobStatus::NeedsCookies,
		Some(_) => JobStatus::Failed,
	};
}

/// Download all `items` with [download_single], see [run_batch_with]
pub fn run_batch<A: DownloadOptions + ?Sized, H: BatchHooks + ?Sized>(
	items: Vec<BatchItem>,
	options: &A,
	settings: &BatchSettings,
	hooks: &H,
) -> Result<BatchOutcome, crate::Error> {
	return run_batch_with(items, settings, hooks, |item, pgcb| {
		return download_single(options, &item.url, &item.output_dir, pgcb);
	});
}

/// Run `download` for all `items` on `settings.parallel` worker threads
///
/// Every item goes through: rate-limit wait, [JobStatus::Running], `download` with retries, final status
/// A failed item never stops the batch, only a error from [BatchHooks::on_transition] does
pub fn run_batch_with<H, F>(
	items: Vec<BatchItem>,
	settings: &BatchSettings,
	hooks: &H,
	download: F,
) -> Result<BatchOutcome, crate::Error>
where
	H: BatchHooks + ?Sized,
	F: Fn(&BatchItem, &mut dyn FnMut(DownloadProgress)) -> Result<Downloaded, DownloadFailure> + Sync,
{
	let workers = settings.parallel.max(1).min(items.len().max(1));
	let total = items.len();

	let queue = Mutex::new(items.into_iter().collect::<VecDeque<_>>());
	let limiter = Mutex::new(RateLimiter::new(settings.initial_delay));
	let results = Mutex::new(Vec::with_capacity(total));
	let abort = AtomicBool::new(false);
	let terminated = AtomicBool::new(false);

	debug!("Starting batch of {} items with {} workers", total, workers);

	let worker_results = std::thread::scope(|s| {
		let mut handles = Vec::with_capacity(workers);

		for worker_id in 0..workers {
			let handle = std::thread::Builder::new()
				.name(format!("batch worker {worker_id}"))
				.spawn_scoped(s, || {
					return worker_loop(
						settings,
						hooks,
						&download,
						&queue,
						&limiter,
						&results,
						&abort,
						&terminated,
					);
				})
				.map_err(|err| return crate::Error::custom_ioerror_location(err.kind(), err.to_string(), "batch worker spawn"));

			handles.push(handle);
		}

		return handles
			.into_iter()
			.map(|handle| return handle.and_then(CustomThreadJoin::join_err).and_then(|v| return v))
			.collect::<Vec<Result<(), crate::Error>>>();
	});

	// the first error is returned, all others are only logged
	let mut first_err = None;
	for res in worker_results {
		if let Err(err) = res {
			if first_err.is_none() {
				first_err = Some(err);
			} else {
				warn!("Additional batch worker error: {}", err);
			}
		}
	}

	if let Some(err) = first_err {
		return Err(err);
	}

	let mut results = results.into_inner();
	results.sort_by_key(|(index, _)| return *index);

	return Ok(BatchOutcome {
		results,
		terminated: terminated.into_inner() || !queue.into_inner().is_empty(),
	});
}

/// Loop of a single worker, takes items until the queue is empty or termination is requested
#[allow(clippy::too_many_arguments)]
fn worker_loop<H, F>(
	settings: &BatchSettings,
	hooks: &H,
	download: &F,
	queue: &Mutex<VecDeque<BatchItem>>,
	limiter: &Mutex<RateLimiter>,
	results: &Mutex<Vec<(usize, DownloadResult)>>,
	abort: &AtomicBool,
	terminated: &AtomicBool,
) -> Result<(), crate::Error>
where
	H: BatchHooks + ?Sized,
	F: Fn(&BatchItem, &mut dyn FnMut(DownloadProgress)) -> Result<Downloaded, DownloadFailure> + Sync,
{
	loop {
		if abort.load(Ordering::Acquire) {
			return Ok(());
		}

		if hooks.should_terminate() {
			terminated.store(true, Ordering::Release);
			return Ok(());
		}

		let Some(item) = queue.lock().pop_front() else {
			return Ok(());
		};

		// the lock is not held while sleeping, so that other workers can still record results
		let delay = limiter.lock().delay();
		if !delay.is_zero() {
			std::thread::sleep(delay);
		}

		// termination may have been requested while sleeping, the item stays untouched
		if hooks.should_terminate() {
			terminated.store(true, Ordering::Release);
			queue.lock().push_front(item);
			return Ok(());
		}

		if let Err(err) = run_item(settings, hooks, download, limiter, results, &item) {
			abort.store(true, Ordering::Release);
			return Err(err);
		}
	}
}

/// Run a single item through all its states
fn run_item<H, F>(
	settings: &BatchSettings,
	hooks: &H,
	download: &F,
	limiter: &Mutex<RateLimiter>,
	results: &Mutex<Vec<(usize, DownloadResult)>>,
	item: &BatchItem,
) -> Result<(), crate::Error>
where
	H: BatchHooks + ?Sized,
	F: Fn(&BatchItem, &mut dyn FnMut(DownloadProgress)) -> Result<Downloaded, DownloadFailure> + Sync,
{
	let index = item.index;

	hooks.on_transition(index, JobStatus::Running, None)?;
	hooks.on_progress(BatchProgress::JobStarting(index, item.url.clone()));

	let (outcome, attempts) = retry(
		&settings.retry,
		|attempt| {
			trace!("Item {} attempt {}", index, attempt);

			let res = download(item, &mut |progress| match progress {
				DownloadProgress::MetadataFetched(title) | DownloadProgress::SingleStarting(_, title) => {
					hooks.on_progress(BatchProgress::JobTitle(index, title));
				},
				DownloadProgress::SingleProgress(percent) => hooks.on_progress(BatchProgress::JobProgress(index, percent)),
				DownloadProgress::Converting => hooks.on_progress(BatchProgress::JobConverting(index)),
				DownloadProgress::SingleFinished(_) => (),
			});

			match &res {
				Ok(_) => limiter.lock().record_success(),
				Err(failure) => limiter.lock().record_failure(is_rate_limited(&failure.message)),
			}

			return res;
		},
		|retry_no, delay, failure| {
			hooks.on_progress(BatchProgress::JobRetrying(index, retry_no, delay, failure.message.clone()));
		},
	);

	let result = DownloadResult::from_outcome(item.url.clone(), outcome, attempts);

	hooks.on_transition(index, status_for(&result), Some(&result))?;
	hooks.on_progress(BatchProgress::JobFinished(index, result.clone()));

	results.lock().push((index, result));

	return Ok(());
}

/// Keeps a [StateFile] up-to-date with the transitions of a batch over one channel
///
/// The state file is saved after every recorded transition
#[derive(Debug)]
pub struct StateRecorder {
	state:    Mutex<StateFile>,
	base_dir: PathBuf,
	/// Index into [`StateFile::channels`]
	channel:  usize,
}

impl StateRecorder {
	/// Create a new recorder for `channel` of `state`, which is saved into `base_dir`
	pub fn new(state: StateFile, base_dir: &Path, channel: usize) -> Self {
		return Self {
			state: Mutex::new(state),
			base_dir: base_dir.to_owned(),
			channel,
		};
	}

	/// Record the transition of job `index` to `status` and save the state
	pub fn record(&self, index: usize, status: JobStatus, result: Option<&DownloadResult>) -> Result<(), crate::Error> {
		let mut state = self.state.lock();

		let Some(channel) = state.channels.get_mut(self.channel) else {
			return Err(crate::Error::other(format!("Channel index {} not in state", self.channel)));
		};
		let Some(job) = channel.jobs.get_mut(index) else {
			return Err(crate::Error::other(format!("Job index {index} not in channel state")));
		};

		job.status = status;

		if let Some(result) = result {
			job.attempts = job.attempts.saturating_add(result.attempts);
			job.error = result.failure.as_ref().map(|v| return v.message.clone());

			if result.output_file.is_some() {
				job.output_file.clone_from(&result.output_file);
			}
			if let Some(title) = &result.title {
				title.clone_into(&mut job.title);
			}
		}

		channel.touch();

		return state.save(&self.base_dir);
	}

	/// Consume the recorder and get the latest state
	pub fn into_state(self) -> StateFile {
		return self.state.into_inner();
	}
}

#[cfg(test)]
mod test {
	use std::sync::atomic::AtomicUsize;

	use super::*;
	use crate::data::{
		channel::{
			ChannelInfo,
			Platform,
		},
		job_state::{
			ChannelJob,
			Job,
		},
	};

	/// Hooks that record everything
	#[derive(Default)]
	struct RecordingHooks {
		transitions:     Mutex<Vec<(usize, JobStatus)>>,
		events:          Mutex<Vec<BatchProgress>>,
		terminate_after: Option<usize>,
		started:         AtomicUsize,
	}

	impl BatchHooks for RecordingHooks {
		fn on_transition(&self, index: usize, status: JobStatus, _result: Option<&DownloadResult>) -> Result<(), crate::Error> {
			if status == JobStatus::Running {
				self.started.fetch_add(1, Ordering::SeqCst);
			}
			self.transitions.lock().push((index, status));

			return Ok(());
		}

		fn on_progress(&self, progress: BatchProgress) {
			self.events.lock().push(progress);
		}

		fn should_terminate(&self) -> bool {
			return self
				.terminate_after
				.is_some_and(|v| return self.started.load(Ordering::SeqCst) >= v);
		}
	}

	fn settings(parallel: usize) -> BatchSettings {
		return BatchSettings {
			parallel,
			retry: RetryPolicy {
				max_retries: 3,
				base_delay:  Duration::ZERO,
			},
			initial_delay: Duration::ZERO,
		};
	}

	fn items(amount: usize) -> Vec<BatchItem> {
		return (0..amount)
			.map(|i| {
				return BatchItem {
					index:      i,
					url:        format!("https://example.com/{i}"),
					output_dir: PathBuf::from("/out"),
				};
			})
			.collect();
	}

	fn ok(item: &BatchItem) -> Result<Downloaded, DownloadFailure> {
		return Ok(Downloaded {
			title:         Some(format!("title {}", item.index)),
			output_file:   PathBuf::from(format!("/out/{}.mp4", item.index)),
			was_converted: false,
		});
	}

	#[test]
	fn test_all_success_parallel() {
		let hooks = RecordingHooks::default();

		let outcome = run_batch_with(items(5), &settings(3), &hooks, |item, pgcb| {
			pgcb(DownloadProgress::SingleProgress(50));
			return ok(item);
		})
		.expect("Expected batch to finish");

		assert_eq!(5, outcome.success_count());
		assert_eq!(0, outcome.failed_count());
		assert!(!outcome.terminated);
		assert_eq!(
			vec![0, 1, 2, 3, 4],
			outcome.results.iter().map(|(i, _)| return *i).collect::<Vec<_>>()
		);

		let transitions = hooks.transitions.lock();
		assert_eq!(10, transitions.len());
		for i in 0..5 {
			let statuses: Vec<JobStatus> = transitions
				.iter()
				.filter(|(idx, _)| return *idx == i)
				.map(|(_, s)| return *s)
				.collect();
			assert_eq!(vec![JobStatus::Running, JobStatus::Done], statuses);
		}

		let events = hooks.events.lock();
		assert!(events.contains(&BatchProgress::JobProgress(2, 50)));
	}

	#[test]
	fn test_parallel_limit() {
		let hooks = RecordingHooks::default();
		let in_flight = AtomicUsize::new(0);
		let max_in_flight = AtomicUsize::new(0);

		let outcome = run_batch_with(items(6), &settings(2), &hooks, |item, _| {
			let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
			max_in_flight.fetch_max(now, Ordering::SeqCst);
			std::thread::sleep(Duration::from_millis(50));
			in_flight.fetch_sub(1, Ordering::SeqCst);

			return ok(item);
		})
		.expect("Expected batch to finish");

		assert_eq!(6, outcome.success_count());
		assert_eq!(0, in_flight.load(Ordering::SeqCst));

		let max = max_in_flight.load(Ordering::SeqCst);
		assert!(max <= 2, "Expected at most 2 downloads at the same time, got {max}");
		assert!(max > 1, "Expected downloads to run at the same time, got {max}");
	}

	#[test]
	fn test_failure_does_not_abort() {
		let hooks = RecordingHooks::default();

		let outcome = run_batch_with(items(3), &settings(1), &hooks, |item, _| {
			return match item.index {
				0 => Err(DownloadFailure::new(FailureKind::Other, "Video unavailable")),
				1 => Err(DownloadFailure::new(FailureKind::NeedsCookies, "login")),
				_ => ok(item),
			};
		})
		.expect("Expected batch to finish");

		assert_eq!(1, outcome.success_count());
		assert_eq!(2, outcome.failed_count());
		assert_eq!(
			vec![
				(0, JobStatus::Running),
				(0, JobStatus::Failed),
				(1, JobStatus::Running),
				(1, JobStatus::NeedsCookies),
				(2, JobStatus::Running),
				(2, JobStatus::Done),
			],
			*hooks.transitions.lock()
		);
	}

	#[test]
	fn test_transient_is_retried() {
		let hooks = RecordingHooks::default();
		let calls = AtomicUsize::new(0);

		let outcome = run_batch_with(items(1), &settings(1), &hooks, |item, _| {
			if calls.fetch_add(1, Ordering::SeqCst) < 2 {
				return Err(DownloadFailure::new(FailureKind::Transient, "HTTP Error 503"));
			}
			return ok(item);
		})
		.expect("Expected batch to finish");

		assert_eq!(3, calls.load(Ordering::SeqCst));
		assert_eq!(3, outcome.results[0].1.attempts);
		assert!(outcome.results[0].1.success());

		let retries = hooks
			.events
			.lock()
			.iter()
			.filter(|v| return matches!(v, BatchProgress::JobRetrying(..)))
			.count();
		assert_eq!(2, retries);
	}

	#[test]
	fn test_termination_leaves_items_untouched() {
		let hooks = RecordingHooks {
			terminate_after: Some(2),
			..Default::default()
		};

		let outcome = run_batch_with(items(5), &settings(1), &hooks, |item, _| return ok(item)).expect("Expected batch to finish");

		assert!(outcome.terminated);
		assert_eq!(2, outcome.results.len());
		assert!(hooks.transitions.lock().iter().all(|(i, _)| return *i < 2));
	}

	#[test]
	fn test_hook_error_stops_batch() {
		struct FailingHooks;

		impl BatchHooks for FailingHooks {
			fn on_transition(&self, _: usize, _: JobStatus, _: Option<&DownloadResult>) -> Result<(), crate::Error> {
				return Err(crate::Error::other("disk full"));
			}

			fn on_progress(&self, _: BatchProgress) {}

			fn should_terminate(&self) -> bool {
				return false;
			}
		}

		let res = run_batch_with(items(3), &settings(2), &FailingHooks, |item, _| return ok(item));

		assert_eq!(Err(crate::Error::other("disk full")), res);
	}

	#[test]
	fn test_empty_batch() {
		let hooks = RecordingHooks::default();

		let outcome = run_batch_with(Vec::new(), &settings(4), &hooks, |item, _| return ok(item)).expect("Expected batch to finish");

		assert_eq!(BatchOutcome::default(), outcome);
	}

	#[test]
	fn test_state_recorder() {
		let tmp = tempfile::Builder::new()
			.prefix("vidfetch-test-batch")
			.tempdir()
			.expect("Expected a temp dir to be created");

		let mut state = StateFile::default();
		state.upsert_channel(ChannelJob::new(
			"https://www.youtube.com/@someone",
			ChannelInfo {
				platform:       Platform::Youtube,
				channel_name:   "Someone".to_owned(),
				channel_url:    "https://www.youtube.com/@someone".to_owned(),
				follower_count: None,
				video_count:    2,
			},
			tmp.path().join("youtube"),
			vec![Job::new("a", "https://youtu.be/a", "A"), Job::new("b", "https://youtu.be/b", "B")],
		));

		let recorder = StateRecorder::new(state, tmp.path(), 0);

		recorder.record(0, JobStatus::Running, None).expect("Expected record to work");
		// saved after every transition
		let saved = StateFile::load(tmp.path()).expect("Expected state to load");
		assert_eq!(JobStatus::Running, saved.channels[0].jobs[0].status);

		let result = DownloadResult::from_outcome(
			"https://youtu.be/a",
			Err(DownloadFailure::new(FailureKind::Other, "Video unavailable")),
			2,
		);
		recorder
			.record(0, JobStatus::Failed, Some(&result))
			.expect("Expected record to work");

		let saved = StateFile::load(tmp.path()).expect("Expected state to load");
		let job = &saved.channels[0].jobs[0];
		assert_eq!(JobStatus::Failed, job.status);
		assert_eq!(2, job.attempts);
		assert_eq!(Some("Video unavailable".to_owned()), job.error);
		assert_eq!(JobStatus::Pending, saved.channels[0].jobs[1].status);

		assert!(recorder.record(5, JobStatus::Done, None).is_err());
		assert_eq!(saved, recorder.into_state());
	}
}
