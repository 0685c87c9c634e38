use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use log::info;
use tokio_util::sync::CancellationToken;

use refresh::coordinator::ServiceCoordinator;
use refresh::host::{Browser, DomNode, LocalStore, MediaState, RuntimeBus};
use refresh::panel::StatsPanel;

/// Scripted walkthrough against the simulated host: open a watch tab, let an
/// ad appear mid-playback, and watch the skip/reload/restore cycle run.
#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    info!("Refresh starting up...");

    let data_dir = std::env::temp_dir().join("refresh");
    std::fs::create_dir_all(&data_dir)?;
    let storage = LocalStore::open(data_dir.join("storage.json"))?;

    let (browser, nav_rx) = Browser::new();
    let (bus, bus_rx) = RuntimeBus::channel(16);
    let coordinator = Arc::new(ServiceCoordinator::new(
        browser.clone(),
        storage.clone(),
        bus,
    ));
    coordinator.install()?;

    let shutdown = CancellationToken::new();
    let coordinator_task = tokio::spawn({
        let coordinator = coordinator.clone();
        let shutdown = shutdown.clone();
        async move { coordinator.run(nav_rx, bus_rx, shutdown).await }
    });

    let tab = browser
        .open_tab("https://www.youtube.com/watch?v=dQw4w9WgXcQ")
        .await;
    tab.set_media(MediaState::playing(Some(240.0)));

    // Let playback get past the startup grace and the young-video guards.
    tokio::time::sleep(Duration::from_secs(9)).await;
    tab.seek(42.5);

    info!("simulating a mid-roll ad");
    tab.set_player_text("Ad • 0:15 Skip ad");
    tab.insert_node(DomNode::new(&["ytp-ad-skip-button-container"]));

    let mut reloaded = false;
    for _ in 0..50 {
        if tab.reload_count() > 0 {
            reloaded = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
    info!("page reloaded: {reloaded}");

    // The reloaded page gets its media element back so restore can seek.
    tokio::time::sleep(Duration::from_millis(500)).await;
    tab.set_media(MediaState::playing(Some(240.0)));
    tokio::time::sleep(Duration::from_secs(1)).await;
    info!("playback position after restore: {:?}", tab.current_time());

    let panel = StatsPanel::new(browser.clone(), storage);
    panel.refresh();
    let view = panel.view();
    info!(
        "ads blocked today: {} ({})",
        view.ads_blocked,
        view.status.message()
    );
    if let Some(badge) = browser.badge(tab.id()) {
        info!("badge text: {:?}", badge.text);
    }

    shutdown.cancel();
    let _ = coordinator_task.await;
    Ok(())
}
