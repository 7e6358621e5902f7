use tokio::select;
use tokio_util::sync::CancellationToken;

/// Detects Ctrl-C and cancels the token so the tray can stop the running session before exiting.
///
/// On Windows processes without a console won't receive it, closing stdin is the other way out.
pub async fn detect_shutdown(cancelation: CancellationToken) {
    select! {
        _ = tokio::signal::ctrl_c() => {
            cancelation.cancel();
        },
        _ = cancelation.cancelled() => {},
    };
}
