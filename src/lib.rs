//! Bearer-token HTTP client gateway. Every outbound request carries a shared credential that is
//! acquired on demand through a single-flight coordinator and refreshed once when rejected.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod config;
pub mod coordinator;
pub mod credential;
pub mod endpoint;
pub mod error;
pub mod gateway;
pub mod obs;
pub mod store;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for tests; enabled via `cfg(test)` or the `test`
	//! feature.

	pub use crate::_prelude::*;

	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// self
	use crate::{
		config::{GatewayConfig, GatewayConfigBuilder},
		coordinator::AcquisitionCoordinator,
		credential::Credential,
		endpoint::{TokenEndpoint, TokenFuture},
		error::{AcquisitionError, ConfigError},
		gateway::Gateway,
		store::TokenStore,
	};

	/// API key used by [`test_config_builder`].
	pub const TEST_API_KEY: &str = "test-api-key";

	/// Scripted token endpoint that counts invocations and answers after a fixed delay.
	///
	/// Each call pops the next scripted outcome; once the script runs dry the last outcome is
	/// repeated.
	#[derive(Debug)]
	pub struct CountingEndpoint {
		calls: AtomicUsize,
		delay: StdDuration,
		script: Mutex<Vec<Result<String, AcquisitionError>>>,
	}
	impl CountingEndpoint {
		/// Endpoint that always issues `token`.
		pub fn issuing(token: &str, delay: StdDuration) -> Self {
			Self::scripted([Ok(token.to_owned())], delay)
		}

		/// Endpoint that always fails with `error`.
		pub fn failing(error: AcquisitionError, delay: StdDuration) -> Self {
			Self::scripted([Err(error)], delay)
		}

		/// Endpoint that walks through `outcomes` in order.
		pub fn scripted<I>(outcomes: I, delay: StdDuration) -> Self
		where
			I: IntoIterator<Item = Result<String, AcquisitionError>>,
		{
			let mut script = outcomes.into_iter().collect::<Vec<_>>();

			script.reverse();

			Self { calls: AtomicUsize::new(0), delay, script: Mutex::new(script) }
		}

		/// Number of fetches issued so far.
		pub fn calls(&self) -> usize {
			self.calls.load(Ordering::SeqCst)
		}

		fn next_outcome(&self) -> Result<String, AcquisitionError> {
			let mut script = self.script.lock();
			let next = if script.len() > 1 { script.pop() } else { script.last().cloned() };

			next.unwrap_or(Err(AcquisitionError::Interrupted))
		}
	}
	impl TokenEndpoint for CountingEndpoint {
		fn fetch(&self) -> TokenFuture<'_> {
			self.calls.fetch_add(1, Ordering::SeqCst);

			let outcome = self.next_outcome();
			let delay = self.delay;

			Box::pin(async move {
				tokio::time::sleep(delay).await;

				outcome.map(|token| Credential::new(token).issued_now())
			})
		}
	}

	/// Builds a coordinator around a fresh store and the provided endpoint.
	pub fn build_test_coordinator<E>(
		endpoint: Arc<E>,
		timeout: StdDuration,
	) -> (AcquisitionCoordinator<E>, Arc<TokenStore>)
	where
		E: ?Sized + TokenEndpoint,
	{
		let store = Arc::new(TokenStore::default());
		let coordinator = AcquisitionCoordinator::new(endpoint, store.clone(), timeout);

		(coordinator, store)
	}

	/// Loopback configuration builder pointing at a mock server base URL.
	pub fn test_config_builder(base_url: &str) -> Result<GatewayConfigBuilder> {
		let base_url = Url::parse(base_url).map_err(|source| ConfigError::InvalidPath {
			path: base_url.to_owned(),
			source,
		})?;

		Ok(GatewayConfig::builder(base_url, TEST_API_KEY)
			.request_timeout(StdDuration::from_secs(5))
			.acquisition_timeout(StdDuration::from_secs(5)))
	}

	/// Builds a reqwest-backed gateway for the provided mock server base URL.
	pub fn build_test_gateway(base_url: &str) -> Result<Gateway> {
		Gateway::new(test_config_builder(base_url)?.build()?)
	}
}

mod _prelude {
	pub use std::{
		collections::BTreeMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
		time::Duration as StdDuration,
	};

	pub use parking_lot::Mutex;
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
