use async_trait::async_trait;
use import_server::import::{
    CreateError, EntityCreator, ImportConfig, ImportError, ImportEvent, ImportOutcome,
    ImportService, ImportSummary, NewUser, RunContext,
};
use import_server::users::{PasswordService, UserDirectory};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const HEADER: &str = "username,email,password,role\n";

/// Creator with scripted failures, optional latency, and call accounting.
#[derive(Default)]
struct ScriptedCreator {
    delay: Duration,
    failures: HashMap<String, String>,
    /// Calls after this many hang until cancelled.
    hang_after: Option<usize>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedCreator {
    fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    fn failing(email: &str, message: &str) -> Self {
        let mut failures = HashMap::new();
        failures.insert(email.to_string(), message.to_string());
        Self {
            failures,
            ..Self::default()
        }
    }

    fn hanging_after(calls: usize) -> Self {
        Self {
            hang_after: Some(calls),
            ..Self::default()
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EntityCreator for ScriptedCreator {
    async fn create_user(&self, input: NewUser) -> Result<String, CreateError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if self.hang_after.is_some_and(|limit| call >= limit) {
            std::future::pending::<()>().await;
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match self.failures.get(&input.email) {
            Some(message) => Err(CreateError::new(message.clone())),
            None => Ok(format!("user-{}", input.username)),
        }
    }
}

fn csv(rows: &[(&str, &str, &str)]) -> String {
    let mut out = HEADER.to_string();
    for (username, email, role) in rows {
        out.push_str(&format!("{username},{email},password123,{role}\n"));
    }
    out
}

fn generated_csv(rows: usize) -> String {
    let mut out = HEADER.to_string();
    for i in 0..rows {
        let role = match i % 5 {
            0 => "manager",
            4 => "guest",
            _ => "member",
        };
        out.push_str(&format!("user{i},user{i}@example.com,password123,{role}\n"));
    }
    out
}

fn config() -> ImportConfig {
    ImportConfig {
        worker_count: 3,
        batch_size: 2,
        timeout: Duration::from_secs(10),
        max_records: 0,
        skip_duplicates: true,
    }
}

async fn run(creator: Arc<ScriptedCreator>, input: &str, config: &ImportConfig) -> Result<ImportSummary, ImportError> {
    ImportService::new(creator)
        .import_users(input.as_bytes(), config, &RunContext::background())
        .await
}

fn assert_consistent(summary: &ImportSummary) {
    assert_eq!(summary.success_count + summary.failure_count, summary.total_records);
    assert_eq!(summary.results.len(), summary.total_records);
}

fn outcome_set(summary: &ImportSummary) -> BTreeSet<(usize, bool, Option<String>)> {
    summary
        .results
        .iter()
        .map(|o| (o.record.line_num, o.success, o.error.clone()))
        .collect()
}

fn find_line(summary: &ImportSummary, line: usize) -> &ImportOutcome {
    summary
        .results
        .iter()
        .find(|o| o.record.line_num == line)
        .expect("outcome for line")
}

#[tokio::test]
async fn all_valid_rows_succeed() {
    let creator = Arc::new(ScriptedCreator::default());
    let input = csv(&[
        ("john.doe", "john@example.com", "manager"),
        ("jane.smith", "jane@example.com", "member"),
        ("bob.wilson", "bob@example.com", "MEMBER"),
    ]);

    let summary = run(creator.clone(), &input, &config()).await.unwrap();

    assert_eq!(summary.total_records, 3);
    assert_eq!(summary.success_count, 3);
    assert_eq!(summary.failure_count, 0);
    assert_consistent(&summary);
    assert_eq!(creator.calls(), 3);
    assert_eq!(find_line(&summary, 2).user_id.as_deref(), Some("user-john.doe"));
}

#[tokio::test]
async fn invalid_role_fails_only_that_record() {
    let creator = Arc::new(ScriptedCreator::default());
    let input = csv(&[
        ("john.doe", "john@example.com", "manager"),
        ("jane.smith", "jane@example.com", "invalid_role"),
        ("bob.wilson", "bob@example.com", "member"),
    ]);

    let summary = run(creator.clone(), &input, &config()).await.unwrap();

    assert_eq!(summary.total_records, 3);
    assert_eq!(summary.success_count, 2);
    assert_eq!(summary.failure_count, 1);
    let failed = find_line(&summary, 3);
    assert!(!failed.success);
    let error = failed.error.as_deref().unwrap();
    assert!(error.contains("invalid"));
    assert!(error.contains("invalid_role"));
    assert_eq!(creator.calls(), 2);
}

#[tokio::test]
async fn max_records_limits_processing() {
    let creator = Arc::new(ScriptedCreator::default());
    let input = csv(&[
        ("a.user", "a@example.com", "member"),
        ("b.user", "b@example.com", "member"),
        ("c.user", "c@example.com", "member"),
    ]);
    let config = ImportConfig {
        max_records: 2,
        ..config()
    };

    let summary = run(creator, &input, &config).await.unwrap();

    assert_eq!(summary.total_records, 2);
    assert_consistent(&summary);
    let lines: BTreeSet<_> = summary.results.iter().map(|o| o.record.line_num).collect();
    assert_eq!(lines, BTreeSet::from([2, 3]));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn worker_count_does_not_change_results() {
    let input = generated_csv(50);

    let single = Arc::new(ScriptedCreator::with_delay(Duration::from_millis(5)));
    let one = run(single.clone(), &input, &ImportConfig { worker_count: 1, ..config() })
        .await
        .unwrap();

    let pooled = Arc::new(ScriptedCreator::with_delay(Duration::from_millis(5)));
    let ten = run(pooled.clone(), &input, &ImportConfig { worker_count: 10, ..config() })
        .await
        .unwrap();

    assert_eq!(one.total_records, 50);
    assert_eq!(one.success_count, ten.success_count);
    assert_eq!(one.failure_count, ten.failure_count);
    assert_eq!(one.failure_count, 10);
    assert_eq!(outcome_set(&one), outcome_set(&ten));
    assert_consistent(&one);
    assert_consistent(&ten);

    assert_eq!(single.max_in_flight.load(Ordering::SeqCst), 1);
    assert!(pooled.max_in_flight.load(Ordering::SeqCst) <= 10);
}

#[tokio::test]
async fn creator_error_is_reported_verbatim() {
    let creator = Arc::new(ScriptedCreator::failing("jane@example.com", "email already exists"));
    let input = csv(&[
        ("john.doe", "john@example.com", "manager"),
        ("jane.smith", "jane@example.com", "member"),
        ("bob.wilson", "bob@example.com", "member"),
    ]);

    let summary = run(creator, &input, &config()).await.unwrap();

    assert_eq!(summary.success_count, 2);
    assert_eq!(summary.failure_count, 1);
    let failed = find_line(&summary, 3);
    assert!(!failed.success);
    assert_eq!(failed.error.as_deref(), Some("email already exists"));
    assert!(failed.user_id.is_none());
    assert!(find_line(&summary, 2).success);
    assert!(find_line(&summary, 4).success);
}

#[tokio::test]
async fn header_only_input_yields_empty_summary() {
    let creator = Arc::new(ScriptedCreator::default());

    let summary = run(creator.clone(), HEADER, &config()).await.unwrap();

    assert_eq!(summary.total_records, 0);
    assert_eq!(summary.success_count, 0);
    assert_eq!(summary.failure_count, 0);
    assert!(summary.results.is_empty());
    assert_eq!(creator.calls(), 0);
}

#[tokio::test]
async fn header_mismatch_is_an_error() {
    let creator = Arc::new(ScriptedCreator::default());
    let input = "name,mail,pass,type\njohn,john@example.com,password123,member\n";

    let err = run(creator.clone(), input, &config()).await.unwrap_err();

    assert!(matches!(err, ImportError::HeaderMismatch { .. }));
    assert!(err.to_string().contains("invalid"));
    assert_eq!(creator.calls(), 0);
}

#[tokio::test]
async fn invalid_config_is_rejected() {
    let creator = Arc::new(ScriptedCreator::default());
    let config = ImportConfig {
        worker_count: 0,
        ..config()
    };

    let err = run(creator, &csv(&[("ann", "ann@example.com", "member")]), &config)
        .await
        .unwrap_err();
    assert!(matches!(err, ImportError::InvalidConfig(_)));
}

#[tokio::test]
async fn timeout_without_progress_reports_timed_out() {
    let creator = Arc::new(ScriptedCreator::hanging_after(0));
    let config = ImportConfig {
        timeout: Duration::from_millis(100),
        ..config()
    };

    let err = run(creator, &generated_csv(4), &config).await.unwrap_err();

    assert!(matches!(err, ImportError::TimedOut));
    assert!(err.to_string().contains("timed out"));
}

#[tokio::test]
async fn timeout_after_progress_keeps_partial_summary() {
    let creator = Arc::new(ScriptedCreator::hanging_after(1));
    let config = ImportConfig {
        worker_count: 1,
        timeout: Duration::from_millis(150),
        ..config()
    };
    let input = csv(&[
        ("a.user", "a@example.com", "member"),
        ("b.user", "b@example.com", "member"),
        ("c.user", "c@example.com", "member"),
    ]);

    let err = run(creator, &input, &config).await.unwrap_err();

    match &err {
        ImportError::Interrupted { completed, total, .. } => {
            assert_eq!(*completed, 1);
            assert_eq!(*total, 3);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    let partial = err.partial_summary().unwrap();
    assert_eq!(partial.success_count, 1);
    assert!(partial.success_count + partial.failure_count <= partial.total_records);
}

#[tokio::test]
async fn caller_cancellation_stops_the_run() {
    let creator = Arc::new(ScriptedCreator::hanging_after(0));
    let cancel = CancellationToken::new();
    let ctx = RunContext::background().with_cancellation(cancel.clone());

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
    });

    let err = ImportService::new(creator)
        .import_users(generated_csv(4).as_bytes(), &config(), &ctx)
        .await
        .unwrap_err();
    assert!(matches!(err, ImportError::Cancelled));
}

#[tokio::test]
async fn caller_deadline_can_be_tighter_than_config() {
    let creator = Arc::new(ScriptedCreator::hanging_after(0));
    let ctx = RunContext::background().with_timeout(Duration::from_millis(50));
    let started = std::time::Instant::now();

    let err = ImportService::new(creator)
        .import_users(generated_csv(4).as_bytes(), &config(), &ctx)
        .await
        .unwrap_err();

    assert!(matches!(err, ImportError::TimedOut));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn events_bracket_the_run() {
    let (tx, mut rx) = tokio::sync::broadcast::channel(32);
    let service = ImportService::new(Arc::new(ScriptedCreator::default())).with_events(tx);
    let input = csv(&[
        ("a.user", "a@example.com", "member"),
        ("b.user", "b@example.com", "nobody"),
    ]);

    service
        .import_users(input.as_bytes(), &config(), &RunContext::background())
        .await
        .unwrap();

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    assert_eq!(events.first(), Some(&ImportEvent::RunStarted { total: 2 }));
    assert_eq!(
        events.last(),
        Some(&ImportEvent::RunFinished {
            success: 1,
            failure: 1
        })
    );
    assert_eq!(events.len(), 4);
}

#[tokio::test]
async fn duplicate_rows_follow_skip_flag() {
    let input = csv(&[
        ("john.doe", "john@example.com", "member"),
        ("johnny", "JOHN@example.com", "member"),
        ("jane", "jane@example.com", "member"),
    ]);
    let fast = || PasswordService::with_cost(64, 1).unwrap();

    let skipping = ImportService::new(Arc::new(UserDirectory::with_password_service(fast())));
    let summary = skipping
        .import_users(input.as_bytes(), &config(), &RunContext::background())
        .await
        .unwrap();
    assert_eq!(summary.total_records, 2);
    assert_eq!(summary.success_count, 2);

    let directory = Arc::new(UserDirectory::with_password_service(fast()));
    let strict = ImportService::new(directory.clone());
    let config = ImportConfig {
        skip_duplicates: false,
        ..config()
    };
    let summary = strict
        .import_users(input.as_bytes(), &config, &RunContext::background())
        .await
        .unwrap();
    assert_eq!(summary.total_records, 3);
    assert_eq!(summary.success_count, 2);
    assert_eq!(summary.failure_count, 1);
    let failed = summary.results.iter().find(|o| !o.success).unwrap();
    assert_eq!(failed.error.as_deref(), Some("email already exists"));
    assert_eq!(directory.len(), 2);
}

#[tokio::test]
async fn imports_from_a_file_on_disk() {
    use std::io::Write;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(generated_csv(10).as_bytes()).unwrap();
    let contents = tokio::fs::read(file.path()).await.unwrap();

    let creator = Arc::new(ScriptedCreator::default());
    let summary = ImportService::new(creator.clone())
        .import_users(contents.as_slice(), &config(), &RunContext::background())
        .await
        .unwrap();

    assert_eq!(summary.total_records, 10);
    assert_eq!(summary.failure_count, 2);
    assert_eq!(creator.calls(), 8);
}

#[tokio::test]
async fn skipped_duplicates_leave_the_cap_for_distinct_rows() {
    let creator = Arc::new(ScriptedCreator::default());
    let input = csv(&[
        ("ann", "ann@example.com", "member"),
        ("ann.dup", "ANN@example.com", "member"),
        ("bob", "bob@example.com", "member"),
    ]);
    let config = ImportConfig {
        max_records: 2,
        ..config()
    };

    let summary = run(creator.clone(), &input, &config).await.unwrap();

    assert_eq!(summary.total_records, 2);
    assert_eq!(summary.success_count, 2);
    let lines: BTreeSet<_> = summary.results.iter().map(|o| o.record.line_num).collect();
    assert_eq!(lines, BTreeSet::from([2, 4]));
    assert_eq!(creator.calls(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn timed_out_row_can_be_resubmitted() {
    // Default argon2 cost keeps the hash running well past the first deadline.
    let directory = Arc::new(UserDirectory::new().unwrap());
    let service = ImportService::new(directory.clone());
    let input = csv(&[("john.doe", "john@example.com", "member")]);

    let hurried = ImportConfig {
        timeout: Duration::from_millis(1),
        ..config()
    };
    let err = service
        .import_users(input.as_bytes(), &hurried, &RunContext::background())
        .await
        .unwrap_err();
    assert!(matches!(err, ImportError::TimedOut));
    assert!(directory.is_empty());

    let summary = service
        .import_users(input.as_bytes(), &config(), &RunContext::background())
        .await
        .unwrap();
    assert_eq!(summary.success_count, 1);
    assert_eq!(summary.failure_count, 0);
    assert_eq!(directory.len(), 1);
    assert!(directory.verify_password("john@example.com", "password123"));
}
