//! Demonstrates trading a mounted workload identity for a machine access token with the default
//! reqwest transport, against stubbed secret-store and identity-provider endpoints.

// std
use std::{env, fs, process};
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
// self
use m2m_broker::{broker::ReqwestM2mBroker, config::BrokerConfig, url::Url};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let vault = MockServer::start_async().await;
	let keycloak = MockServer::start_async().await;
	let identity_path = env::temp_dir().join(format!("m2m_broker_demo_{}.jwt", process::id()));

	fs::write(&identity_path, "demo.identity.jwt")?;

	let login = vault
		.mock_async(|when, then| {
			when.method(POST).path("/v1/auth/kubernetes/login");
			then.status(200).body("{\"auth\":{\"client_token\":\"hvs.demo\"}}");
		})
		.await;
	let read = vault
		.mock_async(|when, then| {
			when.method(GET)
				.path("/v1/secret/data/catalog-bootstrap-m2m-client-secret")
				.header("x-vault-token", "hvs.demo");
			then.status(200).body(concat!(
				"{\"data\":{\"data\":",
				"{\"client_id\":\"demo-id\",\"client_secret\":\"demo-secret\"}}}",
			));
		})
		.await;
	let revoke = vault
		.mock_async(|when, then| {
			when.method(POST).path("/v1/auth/token/revoke-self");
			then.status(204);
		})
		.await;
	let exchange = keycloak
		.mock_async(|when, then| {
			when.method(POST).path("/realms/master/protocol/openid-connect/token");
			then.status(200).body("{\"access_token\":\"demo-access\",\"expires_in\":300}");
		})
		.await;
	let config = BrokerConfig::builder(
		Url::parse(&vault.base_url())?,
		Url::parse(&keycloak.base_url())?,
		"demo-svc",
	)
	.enabled(true)
	.identity_token_path(&identity_path)
	.build()?;
	let broker = ReqwestM2mBroker::new(config)?;
	let token = broker.machine_token().await;

	fs::remove_file(&identity_path)?;

	match token? {
		Some(token) => println!("Machine access token: {}.", token.expose()),
		None => println!("Machine tokens are disabled."),
	}

	login.assert_async().await;
	read.assert_async().await;
	exchange.assert_async().await;
	revoke.assert_async().await;

	Ok(())
}
