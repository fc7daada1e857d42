use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use parking_lot::Mutex;

use super::*;

#[derive(Debug, PartialEq, Eq)]
struct FakeEngine {
	serial: usize,
}

#[derive(Default)]
struct FakeHost {
	allocated: AtomicUsize,
	initialized: AtomicUsize,
	started: Mutex<Vec<String>>,
	destroyed: Mutex<Vec<usize>>,
	fail_at: Mutex<Option<BootstrapStage>>,
	allocate_delay: Option<Duration>,
	loader_delay: Option<Duration>,
}

impl FakeHost {
	fn failing_at(stage: BootstrapStage) -> Self {
		let host = Self::default();
		*host.fail_at.lock() = Some(stage);
		host
	}

	fn fails_at(&self, stage: BootstrapStage) -> bool {
		*self.fail_at.lock() == Some(stage)
	}
}

#[async_trait]
impl EngineHost for FakeHost {
	type Context = &'static str;
	type Engine = Arc<FakeEngine>;

	async fn allocate(&self, _context: &Self::Context) -> anyhow::Result<Self::Engine> {
		if let Some(delay) = self.allocate_delay {
			tokio::time::sleep(delay).await;
		}
		if self.fails_at(BootstrapStage::Allocate) {
			return Err(anyhow!("out of memory"));
		}
		let serial = self.allocated.fetch_add(1, Ordering::SeqCst);
		Ok(Arc::new(FakeEngine { serial }))
	}

	async fn initialize_loader(&self, _engine: &Self::Engine, _context: &Self::Context) -> anyhow::Result<()> {
		if let Some(delay) = self.loader_delay {
			tokio::time::sleep(delay).await;
		}
		if self.fails_at(BootstrapStage::InitializeLoader) {
			return Err(anyhow!("assets missing"));
		}
		self.initialized.fetch_add(1, Ordering::SeqCst);
		Ok(())
	}

	async fn start_entrypoint(&self, _engine: &Self::Engine, entrypoint: &str) -> anyhow::Result<()> {
		if self.fails_at(BootstrapStage::StartEntrypoint) {
			return Err(anyhow!("entry point {entrypoint} not found"));
		}
		self.started.lock().push(entrypoint.to_string());
		Ok(())
	}

	async fn destroy(&self, engine: Self::Engine) {
		self.destroyed.lock().push(engine.serial);
	}
}

fn broker(host: &Arc<FakeHost>, retention: EngineRetention) -> EngineBroker<FakeHost> {
	EngineBroker::new(Arc::clone(host), "main", retention)
}

#[tokio::test]
async fn repeated_claims_bootstrap_once() {
	let host = Arc::new(FakeHost::default());
	let broker = broker(&host, EngineRetention::DestroyOnLastRelease);

	let first = broker.claim(&"ctx").await.unwrap();
	let second = broker.claim(&"ctx").await.unwrap();
	let third = broker.claim(&"ctx").await.unwrap();

	assert!(Arc::ptr_eq(&first, &second) && Arc::ptr_eq(&second, &third));
	assert_eq!(host.allocated.load(Ordering::SeqCst), 1);
	assert_eq!(host.initialized.load(Ordering::SeqCst), 1);
	assert_eq!(*host.started.lock(), vec!["main".to_string()]);
	assert_eq!(broker.claims().await, 3);
}

#[tokio::test]
async fn last_release_destroys_and_next_claim_rebootstraps() {
	let host = Arc::new(FakeHost::default());
	let broker = broker(&host, EngineRetention::DestroyOnLastRelease);

	let n = 3;
	for _ in 0..n {
		broker.claim(&"ctx").await.unwrap();
	}
	for released in 1..=n {
		broker.release().await;
		let expected: Vec<usize> = if released == n { vec![0] } else { vec![] };
		assert_eq!(*host.destroyed.lock(), expected);
	}
	assert!(!broker.is_running().await);
	assert_eq!(broker.claims().await, 0);

	let engine = broker.claim(&"ctx").await.unwrap();
	assert_eq!(engine.serial, 1);
	assert_eq!(host.allocated.load(Ordering::SeqCst), 2);
	assert_eq!(*host.destroyed.lock(), vec![0]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_claims_share_one_bootstrap() {
	let host = Arc::new(FakeHost {
		allocate_delay: Some(Duration::from_millis(20)),
		..FakeHost::default()
	});
	let broker = Arc::new(broker(&host, EngineRetention::DestroyOnLastRelease));

	let claims: Vec<_> = (0..8)
		.map(|_| {
			let broker = Arc::clone(&broker);
			tokio::spawn(async move { broker.claim(&"ctx").await })
		})
		.collect();

	let mut engines = Vec::new();
	for claim in claims {
		engines.push(claim.await.unwrap().unwrap());
	}

	assert_eq!(host.allocated.load(Ordering::SeqCst), 1);
	assert!(engines.iter().all(|engine| Arc::ptr_eq(engine, &engines[0])));
	assert_eq!(broker.claims().await, 8);
}

#[tokio::test]
async fn failed_allocation_records_no_claim() {
	let host = Arc::new(FakeHost::failing_at(BootstrapStage::Allocate));
	let broker = broker(&host, EngineRetention::DestroyOnLastRelease);

	let err = broker.claim(&"ctx").await.unwrap_err();
	assert!(matches!(
		err,
		Error::Bootstrap {
			stage: BootstrapStage::Allocate,
			..
		}
	));
	assert_eq!(broker.claims().await, 0);
	assert!(!broker.is_running().await);
	assert!(host.destroyed.lock().is_empty());
}

#[tokio::test]
async fn failed_entrypoint_destroys_partial_engine_and_allows_retry() {
	let host = Arc::new(FakeHost::failing_at(BootstrapStage::StartEntrypoint));
	let broker = broker(&host, EngineRetention::DestroyOnLastRelease);

	let err = broker.claim(&"ctx").await.unwrap_err();
	match &err {
		Error::Bootstrap { stage, reason } => {
			assert_eq!(*stage, BootstrapStage::StartEntrypoint);
			assert_eq!(reason, "entry point main not found");
		}
		other => panic!("Expected Bootstrap error, got {other:?}"),
	}
	assert_eq!(*host.destroyed.lock(), vec![0]);
	assert_eq!(broker.claims().await, 0);

	*host.fail_at.lock() = None;
	let engine = broker.claim(&"ctx").await.unwrap();
	assert_eq!(engine.serial, 1);
	assert_eq!(broker.claims().await, 1);
}

#[tokio::test]
async fn failed_loader_destroys_partial_engine() {
	let host = Arc::new(FakeHost::failing_at(BootstrapStage::InitializeLoader));
	let broker = broker(&host, EngineRetention::DestroyOnLastRelease);

	assert!(broker.claim(&"ctx").await.is_err());
	assert_eq!(*host.destroyed.lock(), vec![0]);
	assert!(host.started.lock().is_empty());
}

#[tokio::test]
async fn keep_alive_survives_last_release_until_dispose() {
	let host = Arc::new(FakeHost::default());
	let broker = broker(&host, EngineRetention::KeepAlive);

	broker.claim(&"ctx").await.unwrap();
	broker.release().await;
	assert!(broker.is_running().await);
	assert!(host.destroyed.lock().is_empty());

	broker.claim(&"ctx").await.unwrap();
	assert_eq!(host.allocated.load(Ordering::SeqCst), 1);

	broker.dispose().await;
	assert!(!broker.is_running().await);
	assert_eq!(broker.claims().await, 0);
	assert_eq!(*host.destroyed.lock(), vec![0]);
}

#[tokio::test]
async fn unmatched_release_is_ignored() {
	let host = Arc::new(FakeHost::default());
	let broker = broker(&host, EngineRetention::DestroyOnLastRelease);

	broker.release().await;
	assert_eq!(broker.claims().await, 0);

	broker.claim(&"ctx").await.unwrap();
	assert_eq!(broker.claims().await, 1);
	assert!(host.destroyed.lock().is_empty());
}

#[tokio::test]
async fn interrupted_bootstrap_engine_is_destroyed_before_retry() {
	let host = Arc::new(FakeHost {
		loader_delay: Some(Duration::from_millis(200)),
		..FakeHost::default()
	});
	let broker = broker(&host, EngineRetention::DestroyOnLastRelease);

	let timed_out = tokio::time::timeout(Duration::from_millis(10), broker.claim(&"ctx")).await;
	assert!(timed_out.is_err());
	assert_eq!(host.allocated.load(Ordering::SeqCst), 1);
	assert!(!broker.is_running().await);
	assert_eq!(broker.claims().await, 0);

	let engine = broker.claim(&"ctx").await.unwrap();
	assert_eq!(*host.destroyed.lock(), vec![0]);
	assert_eq!(engine.serial, 1);
	assert_eq!(broker.claims().await, 1);
}

#[tokio::test]
async fn dispose_destroys_engine_left_by_interrupted_bootstrap() {
	let host = Arc::new(FakeHost {
		loader_delay: Some(Duration::from_millis(200)),
		..FakeHost::default()
	});
	let broker = broker(&host, EngineRetention::KeepAlive);

	let timed_out = tokio::time::timeout(Duration::from_millis(10), broker.claim(&"ctx")).await;
	assert!(timed_out.is_err());

	broker.dispose().await;
	assert_eq!(*host.destroyed.lock(), vec![0]);
	assert!(host.started.lock().is_empty());
}
