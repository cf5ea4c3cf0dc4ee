//! Privileged-side request handlers for the satchel wallet.
//!
//! The main process owns every side effect the renderer may not perform
//! itself: network uploads to the support backend and queries against the
//! host OS. [`install`] registers all of them on a [`Registry`].

pub mod bug_report;
pub mod locale;
pub mod multipart;

pub use bug_report::{UploadError, Uploader};
use satchel::{Registry, Router, api};

/// Registers every main-process handler on `registry`.
pub fn install(registry: &mut Registry, uploader: Uploader) -> satchel::Result<()> {
    registry.handle(api::SUBMIT_BUG_REPORT, move |request| {
        let uploader = uploader.clone();
        async move { uploader.upload(request).await }
    })?;
    registry.handle(api::DETECT_SYSTEM_LOCALE, locale::handle)?;
    Ok(())
}

/// Returns a sealed router serving every main-process handler.
pub fn router(uploader: Uploader) -> satchel::Result<Router> {
    let mut registry = Registry::new();
    install(&mut registry, uploader)?;
    Ok(registry.seal())
}

#[cfg(test)]
mod tests {
    use satchel::{Endpoint, Error};

    use super::*;
    use crate::bug_report::tests::{request, serve_once};

    fn endpoints() -> (Endpoint, Endpoint) {
        let main = router(Uploader::direct()).unwrap();
        Endpoint::pair(main, Registry::new().seal())
    }

    #[test]
    fn installing_twice_is_a_registration_error() {
        let mut registry = Registry::new();
        install(&mut registry, Uploader::direct()).unwrap();
        let err = install(&mut registry, Uploader::direct()).unwrap_err();
        assert!(matches!(err, Error::AlreadyRegistered { .. }));
    }

    #[tokio::test]
    async fn bug_report_resolves_when_backend_answers_200() {
        let (_main, renderer) = endpoints();
        let (port, server) = serve_once(200);

        renderer
            .call(api::SUBMIT_BUG_REPORT, &request(port, None))
            .await
            .unwrap();
        server.join().unwrap();
    }

    #[tokio::test]
    async fn bug_report_rejects_when_backend_answers_503() {
        let (_main, renderer) = endpoints();
        let (port, server) = serve_once(503);

        let err = renderer
            .call(api::SUBMIT_BUG_REPORT, &request(port, None))
            .await
            .unwrap_err();
        match err {
            Error::Rejected { channel, message } => {
                assert_eq!(channel, api::SUBMIT_BUG_REPORT_REQUEST_CHANNEL);
                assert_eq!(message.as_deref(), Some("support backend answered HTTP 503"));
            }
            other => panic!("expected Rejected, got {other:?}"),
        }
        server.join().unwrap();
    }

    #[tokio::test]
    async fn locale_is_served_over_the_channel() {
        let (_main, renderer) = endpoints();
        let locale = renderer.call(api::DETECT_SYSTEM_LOCALE, &()).await.unwrap();
        assert!(locale == "en-US" || locale == "ja-JP");
    }
}
