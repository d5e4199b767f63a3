//! Loopback demo: two complete sessions on an in-process relay hub.
//!
//! Walks the whole pipeline — registration, key generation, presence
//! discovery, an encrypted direct message both ways, then a group with a
//! fanned-out plaintext message — and prints what each side ends up
//! holding. Run with `RUST_LOG=confab_client=debug` for the full trace.

use std::time::Duration;

use anyhow::{bail, Result};
use tracing_subscriber::{fmt, EnvFilter};

use confab_client::{SessionConfig, SyncCoordinator};
use confab_net::MemoryRelay;
use confab_shared::{derive_identity_id, UserProfile};

fn profile(name: &str, email: &str) -> UserProfile {
    UserProfile {
        display_name: name.into(),
        email: email.into(),
        avatar_ref: format!("avatar://{}", name.to_lowercase()),
    }
}

async fn wait_for(what: &str, mut condition: impl FnMut() -> bool) -> Result<()> {
    for _ in 0..500 {
        if condition() {
            return Ok(());
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    bail!("timed out waiting for {what}");
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("confab_client=info,confab_net=info,warn"));
    fmt().with_env_filter(filter).init();

    let scratch = std::env::temp_dir().join(format!("confab-loopback-{}", std::process::id()));
    let relay = MemoryRelay::new();

    let alice = SyncCoordinator::start(
        &relay,
        profile("Alice", "alice@example.com"),
        &SessionConfig::at(scratch.join("alice")),
    )
    .await?;
    let bob = SyncCoordinator::start(
        &relay,
        profile("Bob", "bob@example.com"),
        &SessionConfig::at(scratch.join("bob")),
    )
    .await?;

    wait_for("presence discovery", || {
        !alice.contacts().is_empty() && !bob.contacts().is_empty()
    })
    .await?;
    tracing::info!(
        alice_sees = alice.contacts().len(),
        bob_sees = bob.contacts().len(),
        "directories populated"
    );

    let bob_id = derive_identity_id("Bob");
    let alice_id = derive_identity_id("Alice");

    let dm = alice.send_direct("tea at five, bring scones", &bob_id);
    tracing::info!(encrypted = dm.encrypted, "alice sent a direct message");
    wait_for("bob's copy", || !bob.messages().is_empty()).await?;

    bob.send_direct("on my way", &alice_id);
    wait_for("alice's reply copy", || alice.messages().len() == 2).await?;

    let group = alice.create_group("wonderland", vec![bob_id.clone()]);
    wait_for("group sync", || !bob.groups().is_empty()).await?;
    alice.send_group("croquet afterwards?", &group.id);
    wait_for("group delivery", || bob.messages().len() == 3).await?;

    for (who, coordinator) in [("alice", &alice), ("bob", &bob)] {
        for message in coordinator.messages() {
            tracing::info!(
                session = who,
                from = %message.sender_id,
                encrypted = message.encrypted,
                text = message.display_text(),
                "held message"
            );
        }
    }

    alice.disconnect();
    bob.disconnect();
    tracing::info!("loopback run complete");
    Ok(())
}
