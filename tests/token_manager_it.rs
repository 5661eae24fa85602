mod common;

// std
use std::{sync::Arc, time::Duration as StdDuration};
// crates.io
use time::Duration;
// self
use airspace_gateway::{
	auth::{OAuthToken, TokenManager, TokenState},
	error::AuthError,
};
use common::FakeIssuer;

const CALLERS: usize = 16;

fn manager(issuer: Arc<FakeIssuer>) -> TokenManager {
	TokenManager::new(issuer, Some(common::credentials()))
}

fn shared(manager: TokenManager) -> Arc<TokenManager> {
	Arc::new(manager)
}

#[tokio::test]
async fn concurrent_callers_share_one_issuance() {
	let issuer = FakeIssuer::new().with_delay(StdDuration::from_millis(50)).shared();
	let manager = shared(manager(issuer.clone()));
	let results = ensure_concurrently(&manager, CALLERS).await;

	for result in results {
		let token = result.expect("Every waiter should receive the shared token.");

		assert_eq!(token.access_token.expose(), "token-1");
	}

	assert_eq!(issuer.calls(), 1);
	assert_eq!(manager.metrics().attempts(), 1);
	assert_eq!(manager.state(), TokenState::Valid);
}

#[tokio::test]
async fn failed_refresh_reaches_every_waiter_then_clears() {
	let issuer =
		FakeIssuer::new().with_delay(StdDuration::from_millis(50)).failing_on([1]).shared();
	let manager = shared(manager(issuer.clone()));
	let results = ensure_concurrently(&manager, CALLERS).await;

	for result in results {
		let err = result.expect_err("Every waiter should observe the shared failure.");

		assert!(matches!(err, AuthError::Rejected { status: Some(401), .. }));
	}

	assert_eq!(issuer.calls(), 1);
	assert_eq!(manager.state(), TokenState::RefreshFailed);

	let token = manager.ensure_valid().await.expect("A later call should retry and succeed.");

	assert_eq!(token.access_token.expose(), "token-2");
	assert_eq!(issuer.calls(), 2);
}

#[tokio::test]
async fn unconfigured_manager_fails_without_issuing() {
	let issuer = FakeIssuer::new().shared();
	let manager = TokenManager::new(issuer.clone(), None);
	let err = manager.ensure_valid().await.expect_err("Unconfigured manager should fail.");

	assert!(matches!(err, AuthError::Unconfigured));
	assert_eq!(issuer.calls(), 0);
}

#[tokio::test]
async fn token_is_replaced_after_refresh_point() {
	let issuer = FakeIssuer::new().with_expires_in(Some(Duration::seconds(2))).shared();
	let manager =
		shared(manager(issuer.clone()).with_refresh_buffer(Duration::milliseconds(1_700)));
	let first = manager.ensure_valid().await.expect("Initial token should be issued.");

	assert_eq!(first.access_token.expose(), "token-1");

	tokio::time::sleep(StdDuration::from_millis(400)).await;

	let results = ensure_concurrently(&manager, CALLERS).await;

	for result in results {
		let token = result.expect("Refreshed token should be shared.");

		assert_eq!(token.access_token.expose(), "token-2");
	}

	assert_eq!(issuer.calls(), 2);
}

#[tokio::test]
async fn abandoned_refresh_is_taken_over_by_next_caller() {
	let issuer = FakeIssuer::new().with_delay(StdDuration::from_millis(200)).shared();
	let manager = manager(issuer.clone());
	let abandoned =
		tokio::time::timeout(StdDuration::from_millis(20), manager.ensure_valid()).await;

	assert!(abandoned.is_err(), "The first call should be cancelled by the timeout.");
	assert_ne!(manager.state(), TokenState::Refreshing);

	let token = manager.ensure_valid().await.expect("The next caller should issue a token.");

	assert_eq!(token.access_token.expose(), "token-2");
	assert_eq!(issuer.calls(), 2);
}

async fn ensure_concurrently(
	manager: &Arc<TokenManager>,
	callers: usize,
) -> Vec<Result<OAuthToken, AuthError>> {
	let tasks = (0..callers)
		.map(|_| {
			let manager = Arc::clone(manager);

			tokio::spawn(async move { manager.ensure_valid().await })
		})
		.collect::<Vec<_>>();
	let mut results = Vec::with_capacity(callers);

	for task in tasks {
		results.push(task.await.expect("Token task should not panic."));
	}

	results
}
