//! One product extraction: launch, navigate, settle, read, close.

use std::time::Instant;

use aliexpress_product::{extract_page, PageData};
use tracing::info;

use crate::browser::{BrowserLauncher, SessionGuard};
use crate::config::BrowserSettings;
use crate::error::BrowserError;

/// Render `url` in a fresh browser and extract its product data.
///
/// The browser is closed before this returns on every path where it was
/// launched. A page without `runParams.data` is not an error here.
pub async fn extract_product_page(
    launcher: &dyn BrowserLauncher,
    settings: &BrowserSettings,
    url: &str,
) -> Result<PageData, BrowserError> {
    let started = Instant::now();

    info!(url, "opening browser");
    let mut guard = SessionGuard::new(launcher.launch(settings).await?);

    let outcome = drive(&mut guard, settings, url).await;
    guard.release().await;

    if let Ok(page) = &outcome {
        info!(
            url,
            found = !page.is_not_found(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "extraction finished"
        );
    }
    outcome
}

async fn drive(
    guard: &mut SessionGuard,
    settings: &BrowserSettings,
    url: &str,
) -> Result<PageData, BrowserError> {
    let session = guard.session()?;

    info!(url, "loading product page");
    let timeout = settings.navigation_timeout;
    tokio::time::timeout(timeout, session.navigate(url))
        .await
        .map_err(|_| BrowserError::NavigationTimeout(timeout.as_millis() as u64))??;

    info!(
        delay_ms = settings.settle_delay.as_millis() as u64,
        "waiting for product data to load"
    );
    tokio::time::sleep(settings.settle_delay).await;

    info!("extracting product data");
    let data = session.run_params_data().await?;
    Ok(extract_page(data.as_ref()))
}
